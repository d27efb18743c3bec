//! Typed configuration models and operation payloads.
//!
//! # Design
//! - Pure data carriers used by the store, the loader, and the CLI.
//! - Defaults mirror a stock deployment: `settings.json` cache, the
//!   `settings__lists` table, fallback enabled, no defaults namespace.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dotset_data::DEFAULT_TABLE;

/// Default cache file location, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = "settings.json";

/// How reconciliation decides that a default key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMatch {
    /// Search for the default key's literal text anywhere within each stored
    /// key (unanchored), so `a.b` also matches `a.bc`.
    #[default]
    Pattern,
    /// The stored key equals the default key or lies beneath it.
    Segment,
}

impl KeyMatch {
    /// Canonical string label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Segment => "segment",
        }
    }
}

impl fmt::Display for KeyMatch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for KeyMatch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pattern" => Ok(Self::Pattern),
            "segment" => Ok(Self::Segment),
            other => Err(format!("invalid key match mode '{other}'")),
        }
    }
}

/// Behavioural options consumed by the settings store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsOptions {
    /// Consult the defaults source when a key is not stored.
    pub fallback: bool,
    /// Namespace of the defaults used for qualified fallback and `clean`.
    pub namespace: Option<String>,
    /// Existence check used when inserting missing defaults.
    pub key_match: KeyMatch,
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            fallback: true,
            namespace: None,
            key_match: KeyMatch::default(),
        }
    }
}

/// Complete deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    /// Path of the JSON cache file.
    pub cache_file: PathBuf,
    /// Database connection URL for the row store.
    pub connection: Option<String>,
    /// Table holding one row per top-level key.
    pub table: String,
    /// Whether missing keys fall back to the defaults source.
    pub fallback: bool,
    /// Defaults namespace; empty strings are treated as unset.
    pub namespace: Option<String>,
    /// Optional JSON/YAML document providing defaults.
    pub defaults_file: Option<PathBuf>,
    /// Existence check used during reconciliation.
    pub key_match: KeyMatch,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            connection: None,
            table: DEFAULT_TABLE.to_string(),
            fallback: true,
            namespace: None,
            defaults_file: None,
            key_match: KeyMatch::default(),
        }
    }
}

impl SettingsConfig {
    /// Store options derived from this configuration.
    #[must_use]
    pub fn options(&self) -> SettingsOptions {
        SettingsOptions {
            fallback: self.fallback,
            namespace: self
                .namespace
                .as_deref()
                .map(str::trim)
                .filter(|namespace| !namespace.is_empty())
                .map(str::to_string),
            key_match: self.key_match,
        }
    }
}

/// Arguments for reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Drop every stored setting before re-inserting defaults.
    pub flush: bool,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Whether all stored settings were flushed first.
    pub flushed: bool,
    /// Stored dotted keys that were forgotten.
    pub removed: Vec<String>,
    /// Default dotted keys that were inserted.
    pub inserted: Vec<String>,
}

impl CleanReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.flushed && self.removed.is_empty() && self.inserted.is_empty()
    }
}
