//! Write-through JSON cache file mirroring every stored settings row.
//!
//! # Design
//! - The whole file is one JSON object: top-level key to nested value.
//! - Every mutation rewrites the full file, so the file is always a complete
//!   snapshot that can be loaded on its own.
//! - Unreadable or malformed content degrades to an empty mapping.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::path;

/// Flat key/value cache backed by a single JSON file.
#[derive(Debug)]
pub struct FlatCache {
    path: PathBuf,
    mapping: Value,
}

impl FlatCache {
    /// Open the cache at `path`, creating the file with `{}` when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file (or its parent directory) cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    operation: "cache.create_dir",
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            write_mapping(&path, &Value::Object(Map::new()))?;
        }
        let mut cache = Self {
            path,
            mapping: Value::Object(Map::new()),
        };
        cache.reload();
        Ok(cache)
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the persisted file. Missing or malformed content yields an empty mapping.
    #[must_use]
    pub fn load(&self) -> Map<String, Value> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Map::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "settings cache unreadable; treating as empty");
                return Map::new();
            }
        };
        match serde_json::from_slice::<Value>(&contents) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "settings cache is not valid JSON; treating as empty");
                Map::new()
            }
        }
    }

    /// Replace the in-memory mapping with the file's current content.
    pub fn reload(&mut self) {
        self.mapping = Value::Object(self.load());
    }

    /// Value at `key`, or `None` when absent or `null`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        path::navigate(&self.mapping, &path::split(key))
            .filter(|value| !value.is_null())
            .cloned()
    }

    /// Whether every segment of `key` resolves, including explicit `null` leaves.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        path::contains(&self.mapping, &path::split(key))
    }

    /// Store `value` at `key` and persist the whole mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<Value> {
        path::set_at(&mut self.mapping, &path::split(key), value.clone());
        self.store()?;
        Ok(value)
    }

    /// Remove `key` and persist the whole mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn forget(&mut self, key: &str) -> ConfigResult<()> {
        path::delete_at(&mut self.mapping, &path::split(key));
        self.store()
    }

    /// Persist an empty mapping and clear the in-memory copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written.
    pub fn flush(&mut self) -> ConfigResult<()> {
        self.mapping = Value::Object(Map::new());
        self.store()
    }

    /// Copy of the full mapping.
    #[must_use]
    pub fn get_all(&self) -> Map<String, Value> {
        self.mapping.as_object().cloned().unwrap_or_default()
    }

    fn store(&self) -> ConfigResult<()> {
        write_mapping(&self.path, &self.mapping)
    }
}

fn write_mapping(path: &Path, mapping: &Value) -> ConfigResult<()> {
    let encoded = serde_json::to_vec(mapping).map_err(|source| ConfigError::Encode {
        operation: "cache.encode",
        source,
    })?;
    fs::write(path, &encoded).map_err(|source| ConfigError::Io {
        operation: "cache.write",
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = encoded.len(), "settings cache written");
    Ok(())
}
