//! CLI error type and settings store construction.

use std::fmt::{self, Display, Formatter};

use anyhow::anyhow;
use dotset_config::{ConfigError, SettingsConfig, SettingsStore, load_config};
use dotset_data::PgSettingsRows;

use crate::cli::GlobalArgs;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidKey { key } => Self::validation(format!("invalid settings key '{key}'")),
            ConfigError::InvalidSetting { field, reason } => {
                Self::validation(format!("invalid configuration: {field} {reason}"))
            }
            ConfigError::InvalidEnv { name, value } => {
                Self::validation(format!("invalid value '{value}' for {name}"))
            }
            ConfigError::DocumentParse { path, reason } => {
                Self::validation(format!("failed to parse {}: {reason}", path.display()))
            }
            other => Self::failure(other),
        }
    }
}

/// Merge the configuration file, `DOTSET_*` variables, and command-line flags,
/// in increasing order of precedence.
pub(crate) fn resolve_config(globals: &GlobalArgs) -> CliResult<SettingsConfig> {
    let mut config = match &globals.config {
        Some(path) => load_config(path)?,
        None => SettingsConfig::default(),
    };
    config.apply_env()?;
    apply_flags(&mut config, globals);
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut SettingsConfig, globals: &GlobalArgs) {
    if let Some(cache_file) = &globals.cache_file {
        config.cache_file.clone_from(cache_file);
    }
    if let Some(url) = &globals.database_url {
        config.connection = Some(url.clone());
    }
    if let Some(table) = &globals.table {
        config.table.clone_from(table);
    }
    if let Some(namespace) = &globals.namespace {
        config.namespace = Some(namespace.clone());
    }
    if let Some(defaults) = &globals.defaults {
        config.defaults_file = Some(defaults.clone());
    }
    if globals.no_fallback {
        config.fallback = false;
    }
}

/// Connect to the configured database and open the settings store.
pub(crate) fn open_store(config: &SettingsConfig) -> CliResult<SettingsStore<PgSettingsRows>> {
    let url = config.connection.as_deref().ok_or_else(|| {
        CliError::validation(
            "database URL is required (pass --database-url or set DOTSET_DATABASE_URL)",
        )
    })?;
    let rows = PgSettingsRows::connect(url, &config.table).map_err(|err| {
        CliError::failure(anyhow!(err).context("failed to connect to the settings database"))
    })?;
    Ok(SettingsStore::open(config, rows)?)
}
