//! Read-only defaults consulted for fallback lookups and reconciliation.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigResult;
use crate::loader::read_document;
use crate::path;

/// Source of default settings, addressed by dotted keys whose first segment
/// is a namespace.
pub trait DefaultsSource {
    /// Whole nested structure registered under `namespace`.
    fn nested(&self, namespace: &str) -> Option<Value>;

    /// Whether the dotted key resolves (explicit `null` counts as present).
    fn has(&self, key: &str) -> bool;

    /// Value at the dotted key.
    fn get(&self, key: &str) -> Option<Value>;
}

/// Defaults held as one in-memory JSON tree keyed by namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsDocument {
    root: Value,
}

impl DefaultsDocument {
    /// Wrap an existing tree.
    #[must_use]
    pub const fn new(root: Value) -> Self {
        Self { root }
    }

    /// Load a JSON or YAML document (chosen by file extension).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        read_document(path).map(Self::new)
    }

    /// Underlying tree.
    #[must_use]
    pub const fn root(&self) -> &Value {
        &self.root
    }
}

impl DefaultsSource for DefaultsDocument {
    fn nested(&self, namespace: &str) -> Option<Value> {
        self.get(namespace)
    }

    fn has(&self, key: &str) -> bool {
        path::contains(&self.root, &path::split(key))
    }

    fn get(&self, key: &str) -> Option<Value> {
        path::navigate(&self.root, &path::split(key)).cloned()
    }
}
