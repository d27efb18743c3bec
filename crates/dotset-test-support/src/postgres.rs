//! Disposable `PostgreSQL` databases for integration suites.
//!
//! `DOTSET_TEST_DATABASE_URL` points at an existing server; a fresh database is
//! created on it per test and dropped afterwards. Without it, a throwaway
//! cluster is started from local `initdb`/`postgres` binaries.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use postgres::NoTls;
use tempfile::TempDir;
use url::Url;

/// Environment variable naming an externally managed server.
pub const DATABASE_URL_ENV: &str = "DOTSET_TEST_DATABASE_URL";

/// Handle to a disposable database; everything is torn down on drop.
pub struct TestDatabase {
    connection_string: String,
    server: Option<LocalServer>,
    cleanup: Option<DbCleanup>,
}

impl TestDatabase {
    /// Connection string for the database.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Some(cleanup) = &self.cleanup {
            let _ = run_admin_statement(
                &cleanup.admin_url,
                format!("DROP DATABASE IF EXISTS \"{}\"", cleanup.database),
            );
        }
        if let Some(server) = &mut self.server {
            let _ = server.process.kill();
            let _ = server.process.wait();
        }
    }
}

struct LocalServer {
    process: Child,
    _data_dir: TempDir,
}

struct DbCleanup {
    admin_url: String,
    database: String,
}

/// Start (or attach to) a disposable `PostgreSQL` database.
///
/// # Errors
///
/// Returns an error when no external URL is configured and the local
/// binaries are missing or fail to start. Suites treat this as a skip.
pub fn start_postgres() -> Result<TestDatabase> {
    match std::env::var(DATABASE_URL_ENV) {
        Ok(url) => attach_external(&url),
        Err(_) => start_local(),
    }
}

fn attach_external(base_url: &str) -> Result<TestDatabase> {
    let parsed = Url::parse(base_url).context("invalid postgres connection url")?;
    let database = unique_database_name();

    let mut admin = parsed.clone();
    admin.set_path("/postgres");
    let mut candidates = vec![admin.to_string()];
    if admin.path() != parsed.path() {
        candidates.push(parsed.to_string());
    }

    let mut last_error = None;
    for admin_url in candidates {
        match run_admin_statement(&admin_url, format!("CREATE DATABASE \"{database}\"")) {
            Ok(()) => {
                let mut connection = parsed.clone();
                connection.set_path(&format!("/{database}"));
                return Ok(TestDatabase {
                    connection_string: connection.to_string(),
                    server: None,
                    cleanup: Some(DbCleanup {
                        admin_url,
                        database,
                    }),
                });
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("failed to create test database")))
}

fn start_local() -> Result<TestDatabase> {
    let initdb = resolve_binary("initdb")?;
    let server_bin = resolve_binary("postgres")?;
    let pg_isready = resolve_binary("pg_isready")?;

    let data_dir = tempfile::Builder::new()
        .prefix("dotset-pg-")
        .tempdir()
        .context("failed to create postgres data directory")?;
    let data_path = data_dir
        .path()
        .to_str()
        .context("data dir contains non-utf8 characters")?
        .to_string();

    let status = Command::new(&initdb)
        .args(["-D", &data_path, "--username=postgres", "--auth=trust"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to run initdb")?;
    if !status.success() {
        bail!("initdb exited with failure status");
    }

    let port = reserve_port()?;
    let process = Command::new(&server_bin)
        .args(["-D", &data_path, "-p", &port.to_string(), "-h", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start postgres process")?;
    let mut server = LocalServer {
        process,
        _data_dir: data_dir,
    };

    if let Err(err) = wait_for_ready(&pg_isready, port) {
        let _ = server.process.kill();
        let _ = server.process.wait();
        return Err(err);
    }

    Ok(TestDatabase {
        connection_string: format!("postgres://postgres@127.0.0.1:{port}/postgres"),
        server: Some(server),
        cleanup: None,
    })
}

fn resolve_binary(name: &str) -> Result<PathBuf> {
    let mut search: Vec<PathBuf> = std::env::var_os("PATH")
        .map_or_else(Vec::new, |paths| std::env::split_paths(&paths).collect());
    search.extend(
        [
            "/usr/lib/postgresql/16/bin",
            "/usr/lib/postgresql/15/bin",
            "/opt/homebrew/opt/postgresql@16/bin",
            "/usr/local/bin",
        ]
        .into_iter()
        .map(PathBuf::from),
    );

    search
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| anyhow!("{name} binary is required for postgres tests"))
}

fn reserve_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve port")?;
    let port = listener
        .local_addr()
        .context("failed to read listener address")?
        .port();
    drop(listener);
    Ok(port)
}

fn wait_for_ready(pg_isready: &Path, port: u16) -> Result<()> {
    let port = port.to_string();
    for _ in 0..30 {
        let ready = Command::new(pg_isready)
            .args(["-h", "127.0.0.1", "-p", &port, "-U", "postgres"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        if ready {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(200));
    }
    bail!("postgres process did not become ready in time")
}

// The blocking client drives its own runtime; keep it off any caller runtime thread.
fn run_admin_statement(admin_url: &str, statement: String) -> Result<()> {
    let admin_url = admin_url.to_string();
    thread::spawn(move || -> Result<()> {
        let config = postgres::Config::from_str(&admin_url)?;
        let mut client = config.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .with_context(|| format!("failed to run `{statement}`"))
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow!("admin statement thread panicked")))
}

fn unique_database_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("dotset_test_{}_{nanos}", std::process::id())
}
