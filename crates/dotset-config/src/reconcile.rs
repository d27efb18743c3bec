//! Reconciliation of stored settings against a defaults namespace.
//!
//! # Design
//! - Defaults are flattened to dotted keys, except that array-shaped
//!   containers stay whole: their elements are not individual settings.
//! - Stored keys missing from the defaults are forgotten unless they sit
//!   beneath an array-shaped default.
//! - Defaults with no matching stored key are written through the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use dotset_data::SettingsRows;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::defaults::DefaultsSource;
use crate::error::ConfigResult;
use crate::model::{CleanOptions, CleanReport, KeyMatch};
use crate::path::{self, DELIMITER};
use crate::service::SettingsStore;

/// Aligns a store with the defaults registered under one namespace.
pub struct Reconciler {
    namespace: String,
    defaults: Arc<dyn DefaultsSource>,
    key_match: KeyMatch,
}

impl Reconciler {
    /// Reconciler for `namespace` within `defaults`.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        defaults: Arc<dyn DefaultsSource>,
        key_match: KeyMatch,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            defaults,
            key_match,
        }
    }

    /// Flattened defaults of the namespace, or `None` when the namespace is unknown.
    #[must_use]
    pub fn default_keys(&self) -> Option<BTreeMap<String, Value>> {
        let root = self.defaults.nested(&self.namespace)?;
        let mut flat = BTreeMap::new();
        self.collect_defaults(&root, None, &mut flat);
        Some(flat)
    }

    fn collect_defaults(
        &self,
        node: &Value,
        prefix: Option<&str>,
        flat: &mut BTreeMap<String, Value>,
    ) {
        for (segment, value) in path::children(node) {
            let key = path::join(prefix, &segment);
            if path::is_array_shaped(value) {
                let qualified = path::join(Some(&self.namespace), &key);
                let whole = self
                    .defaults
                    .get(&qualified)
                    .unwrap_or_else(|| Value::Array(Vec::new()));
                flat.insert(key, whole);
            } else if value.is_object() && !path::is_empty_value(value) {
                self.collect_defaults(value, Some(&key), flat);
            } else {
                flat.insert(key, value.clone());
            }
        }
    }

    /// Whether `key` already has a stored counterpart under the configured matching mode.
    #[must_use]
    pub fn key_exists(&self, key: &str, stored: &BTreeMap<String, Value>) -> bool {
        match self.key_match {
            KeyMatch::Segment => stored.keys().any(|candidate| {
                candidate == key
                    || candidate
                        .strip_prefix(key)
                        .is_some_and(|rest| rest.starts_with(DELIMITER))
            }),
            KeyMatch::Pattern => {
                if stored.contains_key(key) {
                    return true;
                }
                match Regex::new(&regex::escape(key)) {
                    Ok(pattern) => stored.keys().any(|candidate| pattern.is_match(candidate)),
                    Err(_) => stored.keys().any(|candidate| candidate.contains(key)),
                }
            }
        }
    }

    /// Run one reconciliation pass against `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, forgetting, flushing, or writing settings fails.
    pub fn run<R: SettingsRows>(
        &self,
        store: &mut SettingsStore<R>,
        options: CleanOptions,
    ) -> ConfigResult<CleanReport> {
        let Some(defaults) = self.default_keys() else {
            warn!(namespace = %self.namespace, "defaults namespace not found; nothing reconciled");
            return Ok(CleanReport::default());
        };

        let mut report = CleanReport::default();
        let mut stored = path::flatten(&Value::Object(store.get_all(false)?));

        if options.flush {
            store.flush()?;
            report.flushed = true;
            stored.clear();
        } else {
            let stale: Vec<String> = stored
                .keys()
                .filter(|key| !defaults.contains_key(*key) && !represents_array(key, &defaults))
                .cloned()
                .collect();
            for key in stale {
                store.forget(&key)?;
                debug!(key = %key, "stale setting removed");
                stored.remove(&key);
                report.removed.push(key);
            }
        }

        for (key, value) in defaults {
            if self.key_exists(&key, &stored) || represents_array(&key, &stored) {
                continue;
            }
            store.set(&key, value)?;
            debug!(key = %key, "default setting inserted");
            report.inserted.push(key);
        }

        Ok(report)
    }
}

/// Whether any ancestor of `key` is an array-shaped entry of `flat`.
fn represents_array(key: &str, flat: &BTreeMap<String, Value>) -> bool {
    key.match_indices(DELIMITER)
        .map(|(index, _)| &key[..index])
        .any(|ancestor| flat.get(ancestor).is_some_and(path::is_array_shaped))
}
