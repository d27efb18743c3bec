//! Settings store: row-backed nested values fronted by the JSON cache file.
//!
//! # Design
//! - One row per top-level key; the row value holds the whole sub-tree as JSON.
//! - Reads consult the cache first and only fall through to rows on a miss,
//!   backfilling the cache with the row they loaded.
//! - Writes update the row, then mirror the row's new value into the cache.
//! - Undecodable row values degrade to an empty object and are never surfaced.

use std::fmt;
use std::sync::Arc;

use dotset_data::{SettingRow, SettingsRows};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::cache::FlatCache;
use crate::defaults::{DefaultsDocument, DefaultsSource};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{CleanOptions, CleanReport, SettingsConfig, SettingsOptions};
use crate::path::{self, KeyPath};
use crate::reconcile::Reconciler;

/// Dotted-path settings store over a row backend and a [`FlatCache`].
pub struct SettingsStore<R> {
    rows: R,
    cache: FlatCache,
    options: SettingsOptions,
    defaults: Option<Arc<dyn DefaultsSource>>,
}

impl<R> fmt::Debug for SettingsStore<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SettingsStore")
            .field("cache", &self.cache.path())
            .field("options", &self.options)
            .field("defaults", &self.defaults.is_some())
            .finish_non_exhaustive()
    }
}

fn encode(value: &Value) -> ConfigResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| ConfigError::Encode {
        operation: "settings_store.encode",
        source,
    })
}

fn decode(row: &SettingRow) -> Value {
    let Some(bytes) = row.value.as_deref() else {
        return Value::Null;
    };
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        warn!(key = %row.key, error = %err, "stored setting is not valid JSON; treating as empty");
        Value::Object(Map::new())
    })
}

impl<R: SettingsRows> SettingsStore<R> {
    /// Assemble a store from its collaborators.
    #[must_use]
    pub const fn new(rows: R, cache: FlatCache, options: SettingsOptions) -> Self {
        Self {
            rows,
            cache,
            options,
            defaults: None,
        }
    }

    /// Build a store from a deployment configuration.
    ///
    /// Opens (or creates) the cache file and loads the defaults document when
    /// one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the cache file cannot
    /// be created, or the defaults document cannot be read.
    pub fn open(config: &SettingsConfig, rows: R) -> ConfigResult<Self> {
        config.validate()?;
        let cache = FlatCache::open(&config.cache_file)?;
        let store = Self::new(rows, cache, config.options());
        match &config.defaults_file {
            Some(path) => Ok(store.with_defaults(DefaultsDocument::from_path(path)?)),
            None => Ok(store),
        }
    }

    /// Attach the defaults consulted for fallback lookups and `clean`.
    #[must_use]
    pub fn with_defaults<D>(mut self, defaults: D) -> Self
    where
        D: DefaultsSource + 'static,
    {
        self.defaults = Some(Arc::new(defaults));
        self
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &SettingsOptions {
        &self.options
    }

    /// Cache in front of the rows.
    #[must_use]
    pub const fn cache(&self) -> &FlatCache {
        &self.cache
    }

    /// Row backend.
    #[must_use]
    pub const fn rows(&self) -> &R {
        &self.rows
    }

    /// Mutable row backend, for maintenance such as schema provisioning.
    pub const fn rows_mut(&mut self) -> &mut R {
        &mut self.rows
    }

    /// Re-read the cache file, picking up external edits or deletion.
    pub fn reload_cache(&mut self) {
        self.cache.reload();
    }

    fn find(&mut self, key: &str) -> ConfigResult<Option<SettingRow>> {
        self.rows
            .find_row(key)
            .map_err(ConfigError::data("settings_store.find_row"))
    }

    /// Store `value` at `key`, creating the row on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the row or cache write fails.
    #[instrument(name = "settings_store.set", skip(self, value))]
    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<Value> {
        let key = KeyPath::parse(key)?;
        let head = key.head();

        let row_value = match self.find(head)? {
            None => {
                let fresh = path::build_from_segments(key.rest(), value.clone());
                let encoded = if path::is_empty_value(&fresh) {
                    None
                } else {
                    Some(encode(&fresh)?)
                };
                self.rows
                    .insert_row(head, encoded.as_deref())
                    .map_err(ConfigError::data("settings_store.insert_row"))?;
                debug!(row = head, "settings row inserted");
                fresh
            }
            Some(row) => {
                let mut current = decode(&row);
                path::set_at(&mut current, key.rest(), value.clone());
                let encoded = encode(&current)?;
                self.rows
                    .update_row(head, Some(encoded.as_slice()))
                    .map_err(ConfigError::data("settings_store.update_row"))?;
                debug!(row = head, "settings row updated");
                current
            }
        };

        self.cache.set(head, row_value)?;
        Ok(value)
    }

    /// Value at `key`, resolved from the cache, the rows, then the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the row lookup fails.
    #[instrument(name = "settings_store.get", skip(self))]
    pub fn get(&mut self, key: &str) -> ConfigResult<Option<Value>> {
        let key = KeyPath::parse(key)?;
        self.resolve(&key, None)
    }

    /// Like [`Self::get`], returning `default` when nothing is stored.
    ///
    /// A non-null `default` takes precedence over the defaults source.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the row lookup fails.
    #[instrument(name = "settings_store.get", skip(self, default))]
    pub fn get_or(&mut self, key: &str, default: Value) -> ConfigResult<Value> {
        let key = KeyPath::parse(key)?;
        let explicit = (!default.is_null()).then(|| default.clone());
        Ok(self.resolve(&key, explicit)?.unwrap_or(default))
    }

    fn resolve(&mut self, key: &KeyPath, default: Option<Value>) -> ConfigResult<Option<Value>> {
        if let Some(value) = self.fetch_path(key)? {
            return Ok(Some(value));
        }
        if default.is_some() {
            return Ok(default);
        }
        if !self.options.fallback {
            return Ok(None);
        }
        let Some(defaults) = &self.defaults else {
            return Ok(None);
        };
        if let Some(namespace) = &self.options.namespace {
            let qualified = format!("{namespace}.{}", key.as_str());
            if defaults.has(&qualified) {
                debug!(key = %qualified, "settings fallback to namespaced default");
                return Ok(defaults.get(&qualified).filter(|value| !value.is_null()));
            }
        }
        Ok(defaults
            .get(key.as_str())
            .filter(|value| !value.is_null()))
    }

    /// Stored value at `key` without consulting the defaults.
    ///
    /// On a cache miss the row is loaded and, when it holds a value at `key`,
    /// mirrored into the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the row lookup fails.
    pub fn fetch(&mut self, key: &str) -> ConfigResult<Option<Value>> {
        let key = KeyPath::parse(key)?;
        self.fetch_path(&key)
    }

    fn fetch_path(&mut self, key: &KeyPath) -> ConfigResult<Option<Value>> {
        if self.cache.has(key.as_str()) {
            debug!(key = key.as_str(), "settings cache hit");
            return Ok(self.cache.get(key.as_str()));
        }
        debug!(key = key.as_str(), "settings cache miss");
        let Some(row) = self.find(key.head())? else {
            return Ok(None);
        };
        let decoded = decode(&row);
        let found = path::navigate(&decoded, key.rest())
            .filter(|value| !value.is_null())
            .cloned();
        if found.is_some() {
            self.cache.set(key.head(), decoded)?;
        }
        Ok(found)
    }

    /// Whether `key` is stored, counting explicit `null` values as present.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the row lookup fails.
    #[instrument(name = "settings_store.has", skip(self))]
    pub fn has(&mut self, key: &str) -> ConfigResult<bool> {
        let key = KeyPath::parse(key)?;
        if self.cache.has(key.as_str()) {
            return Ok(true);
        }
        let Some(row) = self.find(key.head())? else {
            return Ok(false);
        };
        if key.is_top_level() {
            return Ok(true);
        }
        Ok(path::contains(&decode(&row), key.rest()))
    }

    /// Remove `key`; a row left empty is deleted outright.
    ///
    /// A nested path that is not stored leaves its row unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the row or cache write fails.
    #[instrument(name = "settings_store.forget", skip(self))]
    pub fn forget(&mut self, key: &str) -> ConfigResult<()> {
        let key = KeyPath::parse(key)?;
        let head = key.head();

        let Some(row) = self.find(head)? else {
            return self.cache.forget(key.as_str());
        };

        if !key.is_top_level() {
            let mut current = decode(&row);
            if path::delete_at(&mut current, key.rest()).is_none() {
                debug!(row = head, "settings path not stored; row left untouched");
                return self.cache.forget(key.as_str());
            }
            if !path::is_empty_value(&current) {
                let encoded = encode(&current)?;
                self.rows
                    .update_row(head, Some(encoded.as_slice()))
                    .map_err(ConfigError::data("settings_store.update_row"))?;
                debug!(row = head, "settings row trimmed");
                self.cache.set(head, current)?;
                return Ok(());
            }
        }

        self.rows
            .delete_row(head)
            .map_err(ConfigError::data("settings_store.delete_row"))?;
        debug!(row = head, "settings row deleted");
        self.cache.forget(head)
    }

    /// Every stored top-level key with its value.
    ///
    /// With `use_cache` the cache snapshot is returned; otherwise every row is
    /// decoded, bypassing (and not refreshing) the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be listed.
    pub fn get_all(&mut self, use_cache: bool) -> ConfigResult<Map<String, Value>> {
        if use_cache {
            return Ok(self.cache.get_all());
        }
        let rows = self
            .rows
            .list_rows()
            .map_err(ConfigError::data("settings_store.list_rows"))?;
        Ok(rows
            .iter()
            .map(|row| (row.key.clone(), decode(row)))
            .collect())
    }

    /// Empty the cache and delete every row.
    ///
    /// Returns whether the row backend reported success.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file cannot be written or the rows cannot
    /// be deleted.
    #[instrument(name = "settings_store.flush", skip(self))]
    pub fn flush(&mut self) -> ConfigResult<bool> {
        self.cache.flush()?;
        let deleted = self
            .rows
            .delete_all_rows()
            .map_err(ConfigError::data("settings_store.delete_all_rows"))?;
        info!(deleted, "settings flushed");
        Ok(deleted)
    }

    /// Reconcile stored settings with the namespace's defaults.
    ///
    /// Without a configured namespace or defaults source this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if any underlying store operation fails.
    #[instrument(name = "settings_store.clean", skip(self))]
    pub fn clean(&mut self, options: CleanOptions) -> ConfigResult<CleanReport> {
        let (Some(namespace), Some(defaults)) =
            (self.options.namespace.clone(), self.defaults.clone())
        else {
            debug!("settings clean skipped; no defaults namespace configured");
            return Ok(CleanReport::default());
        };
        let report =
            Reconciler::new(namespace, defaults, self.options.key_match).run(self, options)?;
        info!(
            flushed = report.flushed,
            removed = report.removed.len(),
            inserted = report.inserted.len(),
            "settings reconciled with defaults"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dotset_data::MemoryRows;
    use dotset_test_support::fixtures::CacheFixture;
    use serde_json::json;

    type TestResult = anyhow::Result<()>;

    fn store(fixture: &CacheFixture) -> ConfigResult<SettingsStore<MemoryRows>> {
        Ok(SettingsStore::new(
            MemoryRows::new(),
            FlatCache::open(fixture.path())?,
            SettingsOptions::default(),
        ))
    }

    fn row_json(store: &mut SettingsStore<MemoryRows>, key: &str) -> Option<Value> {
        store
            .rows
            .find_row(key)
            .ok()
            .flatten()
            .map(|row| decode(&row))
    }

    #[test]
    fn new_rows_store_the_nested_remainder() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("site.meta.title", json!("Demo"))?;
        assert_eq!(
            row_json(&mut store, "site"),
            Some(json!({"meta": {"title": "Demo"}}))
        );
        Ok(())
    }

    #[test]
    fn empty_values_insert_null_rows() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("tags", json!([]))?;
        let row = store.rows.find_row("tags")?.expect("row inserted");
        assert_eq!(row.value, None);
        assert!(store.has("tags")?);
        Ok(())
    }

    #[test]
    fn forgetting_unstored_paths_leaves_rows_alone() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("tags", json!([]))?;
        store.set("mail.host", json!("smtp"))?;

        store.forget("tags.nope")?;
        store.forget("mail.port")?;

        let tags = store.rows.find_row("tags")?.expect("row kept");
        assert_eq!(tags.value, None);
        assert_eq!(row_json(&mut store, "mail"), Some(json!({"host": "smtp"})));
        assert_eq!(fixture.contents()?, r#"{"mail":{"host":"smtp"},"tags":[]}"#);
        Ok(())
    }

    #[test]
    fn existing_rows_are_merged() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("a.b", json!(1))?;
        store.set("a.c", json!(2))?;
        assert_eq!(row_json(&mut store, "a"), Some(json!({"b": 1, "c": 2})));
        store.set("a", json!("flat"))?;
        assert_eq!(row_json(&mut store, "a"), Some(json!("flat")));
        Ok(())
    }

    #[test]
    fn undecodable_rows_degrade_to_empty() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.rows.insert_row("broken", Some(b"{oops".as_slice()))?;
        assert_eq!(store.get("broken.x")?, None);
        assert!(!store.has("broken.x")?);
        store.set("broken.x", json!(1))?;
        assert_eq!(row_json(&mut store, "broken"), Some(json!({"x": 1})));
        Ok(())
    }

    #[test]
    fn cache_misses_backfill_from_rows() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.rows.insert_row("mail", Some(br#"{"host":"smtp"}"#.as_slice()))?;
        assert!(!store.cache().has("mail"));
        assert_eq!(store.get("mail.host")?, Some(json!("smtp")));
        assert!(store.cache().has("mail.host"));
        assert_eq!(fixture.contents()?, r#"{"mail":{"host":"smtp"}}"#);

        assert_eq!(store.get("mail.port")?, None);
        assert!(!store.cache().has("mail.port"));
        Ok(())
    }

    #[test]
    fn invalid_keys_are_rejected_everywhere() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        assert!(matches!(store.set("a..b", json!(1)), Err(ConfigError::InvalidKey { .. })));
        assert!(matches!(store.get(""), Err(ConfigError::InvalidKey { .. })));
        assert!(matches!(store.has(".a"), Err(ConfigError::InvalidKey { .. })));
        assert!(matches!(store.forget("a."), Err(ConfigError::InvalidKey { .. })));
        assert!(store.rows().is_empty());
        Ok(())
    }

    #[test]
    fn fallback_prefers_namespaced_defaults() -> TestResult {
        let fixture = CacheFixture::new()?;
        let options = SettingsOptions {
            namespace: Some("app".to_string()),
            ..SettingsOptions::default()
        };
        let mut store = SettingsStore::new(
            MemoryRows::new(),
            FlatCache::open(fixture.path())?,
            options,
        )
        .with_defaults(DefaultsDocument::new(json!({
            "app": {"name": "namespaced"},
            "name": "bare",
            "only_bare": true
        })));

        assert_eq!(store.get("name")?, Some(json!("namespaced")));
        assert_eq!(store.get("only_bare")?, Some(json!(true)));
        assert_eq!(store.get_or("name", json!("explicit"))?, json!("explicit"));
        assert_eq!(store.get_or("missing", Value::Null)?, Value::Null);

        store.set("name", json!("stored"))?;
        assert_eq!(store.get("name")?, Some(json!("stored")));
        Ok(())
    }

    #[test]
    fn disabled_fallback_ignores_defaults() -> TestResult {
        let fixture = CacheFixture::new()?;
        let options = SettingsOptions {
            fallback: false,
            ..SettingsOptions::default()
        };
        let mut store = SettingsStore::new(
            MemoryRows::new(),
            FlatCache::open(fixture.path())?,
            options,
        )
        .with_defaults(DefaultsDocument::new(json!({"name": "bare"})));
        assert_eq!(store.get("name")?, None);
        assert_eq!(store.get_or("name", json!(1))?, json!(1));
        Ok(())
    }

    #[test]
    fn forgetting_missing_rows_still_clears_cache() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("k.v", json!(1))?;
        store.rows.delete_row("k")?;
        assert!(store.has("k.v")?);
        store.forget("k.v")?;
        assert!(!store.has("k.v")?);
        Ok(())
    }

    #[test]
    fn get_all_without_cache_reads_rows() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("a.b", json!(1))?;
        store.rows.insert_row("direct", Some(b"2".as_slice()))?;
        let from_rows = store.get_all(false)?;
        assert_eq!(Value::Object(from_rows), json!({"a": {"b": 1}, "direct": 2}));
        assert_eq!(Value::Object(store.get_all(true)?), json!({"a": {"b": 1}}));
        Ok(())
    }

    #[test]
    fn open_wires_config_and_defaults() -> TestResult {
        let fixture = CacheFixture::new()?;
        let defaults = fixture.write_sibling("defaults.json", r#"{"app":{"theme":"dark"}}"#)?;
        let config = SettingsConfig {
            cache_file: fixture.path().to_path_buf(),
            namespace: Some("app".to_string()),
            defaults_file: Some(defaults),
            ..SettingsConfig::default()
        };
        let mut store = SettingsStore::open(&config, MemoryRows::new())?;
        assert_eq!(store.get("theme")?, Some(json!("dark")));
        assert_eq!(fixture.contents()?, "{}");
        Ok(())
    }

    #[test]
    fn clean_without_namespace_is_a_noop() -> TestResult {
        let fixture = CacheFixture::new()?;
        let mut store = store(&fixture)?;
        store.set("keep", json!(1))?;
        let report = store.clean(CleanOptions { flush: true })?;
        assert!(report.is_noop());
        assert_eq!(store.get("keep")?, Some(json!(1)));
        Ok(())
    }
}
