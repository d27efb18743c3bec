//! Argument parsing and command dispatch.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dotset_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build, init_logging};
use tracing::debug;

use crate::commands::maintenance::{handle_clean, handle_flush, handle_init};
use crate::commands::settings::{handle_all, handle_forget, handle_get, handle_has, handle_set};
use crate::commands::Outcome;
use crate::context::{CliResult, open_store, resolve_config};

/// Parses CLI arguments, executes the requested command, and prints its
/// output. Returns the process exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build: env!("CARGO_PKG_VERSION"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }
    debug!(
        command = command_label(&cli.command),
        build = build(),
        "dotset command starting"
    );

    match dispatch(cli) {
        Ok(outcome) => {
            if let Some(text) = &outcome.text {
                println!("{text}");
            }
            outcome.exit_code
        }
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn dispatch(cli: Cli) -> CliResult<Outcome> {
    let config = resolve_config(&cli.globals)?;
    let format = cli.globals.output;
    let mut store = open_store(&config)?;

    match cli.command {
        Command::Get(args) => handle_get(&mut store, &args, format),
        Command::Set(args) => handle_set(&mut store, &args, format),
        Command::Has(args) => handle_has(&mut store, &args),
        Command::Forget(args) => handle_forget(&mut store, &args),
        Command::All(args) => handle_all(&mut store, &args, format),
        Command::Flush => handle_flush(&mut store),
        Command::Clean(args) => handle_clean(&mut store, &args, format),
        Command::Init => handle_init(store.rows_mut()),
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Get(_) => "get",
        Command::Set(_) => "set",
        Command::Has(_) => "has",
        Command::Forget(_) => "forget",
        Command::All(_) => "all",
        Command::Flush => "flush",
        Command::Clean(_) => "clean",
        Command::Init => "init",
    }
}

#[derive(Parser)]
#[command(
    name = "dotset",
    version,
    about = "Dotted-path settings backed by PostgreSQL rows and a JSON cache file"
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) globals: GlobalArgs,
    #[arg(
        long,
        global = true,
        env = "DOTSET_LOG",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log level directive (RUST_LOG takes precedence)"
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "DOTSET_LOG_FORMAT",
        value_parser = LogFormat::from_str,
        help = "Log output format: pretty or json (defaults by build profile)"
    )]
    pub(crate) log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args, Default)]
pub(crate) struct GlobalArgs {
    #[arg(
        long,
        global = true,
        env = "DOTSET_CONFIG",
        help = "JSON or YAML configuration file"
    )]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Path of the JSON cache file")]
    pub(crate) cache_file: Option<PathBuf>,
    #[arg(long, global = true, help = "PostgreSQL connection URL")]
    pub(crate) database_url: Option<String>,
    #[arg(long, global = true, help = "Settings table name")]
    pub(crate) table: Option<String>,
    #[arg(long, global = true, help = "Defaults namespace used for fallback and clean")]
    pub(crate) namespace: Option<String>,
    #[arg(long, global = true, help = "JSON or YAML defaults document")]
    pub(crate) defaults: Option<PathBuf>,
    #[arg(long, global = true, help = "Do not fall back to defaults for missing keys")]
    pub(crate) no_fallback: bool,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the value stored at a key.
    Get(GetArgs),
    /// Store a value at a key.
    Set(SetArgs),
    /// Exit 0 when the key is stored and 1 otherwise.
    Has(KeyArgs),
    /// Remove a key.
    Forget(KeyArgs),
    /// Print every stored setting.
    All(AllArgs),
    /// Delete every stored setting.
    Flush,
    /// Reconcile stored settings with the defaults namespace.
    Clean(CleanArgs),
    /// Create the settings table if it does not exist.
    Init,
}

#[derive(Args)]
pub(crate) struct KeyArgs {
    #[arg(help = "Dotted settings key")]
    pub(crate) key: String,
}

#[derive(Args)]
pub(crate) struct GetArgs {
    #[arg(help = "Dotted settings key")]
    pub(crate) key: String,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Value returned when nothing is stored (JSON, or a plain string)"
    )]
    pub(crate) default: Option<String>,
}

#[derive(Args)]
pub(crate) struct SetArgs {
    #[arg(help = "Dotted settings key")]
    pub(crate) key: String,
    #[arg(
        allow_hyphen_values = true,
        help = "Value to store (JSON, or a plain string)"
    )]
    pub(crate) value: String,
}

#[derive(Args, Default)]
pub(crate) struct AllArgs {
    #[arg(long, help = "Read every row instead of the cache file")]
    pub(crate) no_cache: bool,
}

#[derive(Args, Default)]
pub(crate) struct CleanArgs {
    #[arg(long, help = "Delete every stored setting before inserting defaults")]
    pub(crate) flush: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
