//! Validation helpers and parsing utilities for configuration values.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{KeyMatch, SettingsConfig};

impl SettingsConfig {
    /// Check the configuration for values the store cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] when the cache path is empty,
    /// the table is not a plain SQL identifier, or the connection string is blank.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache_file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidSetting {
                field: "cache_file",
                reason: "must not be empty",
            });
        }
        if dotset_data::validate_table_name(&self.table).is_err() {
            return Err(ConfigError::InvalidSetting {
                field: "table",
                reason: "must be a plain SQL identifier",
            });
        }
        if self
            .connection
            .as_deref()
            .is_some_and(|connection| connection.trim().is_empty())
        {
            return Err(ConfigError::InvalidSetting {
                field: "connection",
                reason: "must not be blank",
            });
        }
        Ok(())
    }
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_bool(name: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
        }),
    }
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_key_match(name: &'static str, value: &str) -> ConfigResult<KeyMatch> {
    value
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
        })
}
