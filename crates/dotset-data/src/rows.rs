//! Row model and the storage contract shared by every settings backend.
//!
//! # Design
//! - One row per top-level settings key; the value column holds the encoded
//!   sub-tree for that key, or `NULL`.
//! - Backends are synchronous and take `&mut self`: the settings store is a
//!   single-writer, blocking component.

use std::collections::BTreeMap;

use crate::error::Result;

/// Raw projection of a settings row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRow {
    /// Top-level settings key (unique).
    pub key: String,
    /// Encoded value blob, `None` when the column is `NULL`.
    pub value: Option<Vec<u8>>,
}

impl SettingRow {
    /// Construct a row from its parts.
    #[must_use]
    pub fn new(key: impl Into<String>, value: Option<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Storage operations the settings store needs from a row backend.
pub trait SettingsRows {
    /// Look up the row for a top-level key.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    fn find_row(&mut self, key: &str) -> Result<Option<SettingRow>>;

    /// Insert a new row.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the write.
    fn insert_row(&mut self, key: &str, value: Option<&[u8]>) -> Result<()>;

    /// Replace the value of an existing row.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the write.
    fn update_row(&mut self, key: &str, value: Option<&[u8]>) -> Result<()>;

    /// Delete the row for a top-level key. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the delete.
    fn delete_row(&mut self, key: &str) -> Result<()>;

    /// List every stored row ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    fn list_rows(&mut self) -> Result<Vec<SettingRow>>;

    /// Delete every row, reporting whether the delete succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend rejects the delete.
    fn delete_all_rows(&mut self) -> Result<bool>;
}

/// In-process row backend keyed by top-level setting.
#[derive(Debug, Clone, Default)]
pub struct MemoryRows {
    rows: BTreeMap<String, Option<Vec<u8>>>,
}

impl MemoryRows {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl SettingsRows for MemoryRows {
    fn find_row(&mut self, key: &str) -> Result<Option<SettingRow>> {
        Ok(self
            .rows
            .get(key)
            .map(|value| SettingRow::new(key, value.clone())))
    }

    fn insert_row(&mut self, key: &str, value: Option<&[u8]>) -> Result<()> {
        self.rows.insert(key.to_string(), value.map(<[u8]>::to_vec));
        Ok(())
    }

    fn update_row(&mut self, key: &str, value: Option<&[u8]>) -> Result<()> {
        if let Some(slot) = self.rows.get_mut(key) {
            *slot = value.map(<[u8]>::to_vec);
        }
        Ok(())
    }

    fn delete_row(&mut self, key: &str) -> Result<()> {
        self.rows.remove(key);
        Ok(())
    }

    fn list_rows(&mut self) -> Result<Vec<SettingRow>> {
        Ok(self
            .rows
            .iter()
            .map(|(key, value)| SettingRow::new(key.clone(), value.clone()))
            .collect())
    }

    fn delete_all_rows(&mut self) -> Result<bool> {
        self.rows.clear();
        Ok(true)
    }
}
