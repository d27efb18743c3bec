//! Loading of configuration and defaults documents, plus environment overrides.
//!
//! # Design
//! - `.yaml`/`.yml` files are parsed with `serde_yaml`; everything else is JSON.
//! - Environment overrides are applied through a lookup closure so callers and
//!   tests can supply their own variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::SettingsConfig;
use crate::validate::{parse_bool, parse_key_match};

/// Overrides `cache_file`.
pub const ENV_CACHE_FILE: &str = "DOTSET_CACHE_FILE";
/// Overrides `connection`.
pub const ENV_DATABASE_URL: &str = "DOTSET_DATABASE_URL";
/// Overrides `table`.
pub const ENV_TABLE: &str = "DOTSET_TABLE";
/// Overrides `fallback`.
pub const ENV_FALLBACK: &str = "DOTSET_FALLBACK";
/// Overrides `namespace`.
pub const ENV_NAMESPACE: &str = "DOTSET_NAMESPACE";
/// Overrides `defaults_file`.
pub const ENV_DEFAULTS_FILE: &str = "DOTSET_DEFAULTS_FILE";
/// Overrides `key_match`.
pub const ENV_KEY_MATCH: &str = "DOTSET_KEY_MATCH";

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml")
        })
}

/// Read a JSON or YAML document into a JSON value.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read and
/// [`ConfigError::DocumentParse`] when its content is not valid for the format.
pub fn read_document(path: &Path) -> ConfigResult<Value> {
    let contents = fs::read(path).map_err(|source| ConfigError::Io {
        operation: "document.read",
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = if is_yaml(path) {
        serde_yaml::from_slice::<Value>(&contents).map_err(|err| err.to_string())
    } else {
        serde_json::from_slice::<Value>(&contents).map_err(|err| err.to_string())
    };
    parsed.map_err(|reason| ConfigError::DocumentParse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Load a [`SettingsConfig`] from a JSON or YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not describe a valid
/// configuration.
pub fn load_config(path: &Path) -> ConfigResult<SettingsConfig> {
    let document = read_document(path)?;
    let config = serde_json::from_value(document).map_err(|err| ConfigError::DocumentParse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    debug!(path = %path.display(), "settings configuration loaded");
    Ok(config)
}

impl SettingsConfig {
    /// Apply `DOTSET_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a boolean or key-match override
    /// cannot be parsed.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply `DOTSET_*` overrides resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a boolean or key-match override
    /// cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CACHE_FILE) {
            self.cache_file = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_DATABASE_URL) {
            self.connection = Some(value);
        }
        if let Some(value) = lookup(ENV_TABLE) {
            self.table = value;
        }
        if let Some(value) = lookup(ENV_FALLBACK) {
            self.fallback = parse_bool(ENV_FALLBACK, &value)?;
        }
        if let Some(value) = lookup(ENV_NAMESPACE) {
            self.namespace = Some(value);
        }
        if let Some(value) = lookup(ENV_DEFAULTS_FILE) {
            self.defaults_file = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_KEY_MATCH) {
            self.key_match = parse_key_match(ENV_KEY_MATCH, &value)?;
        }
        Ok(())
    }
}
