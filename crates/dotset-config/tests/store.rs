use anyhow::Result;
use dotset_config::{
    CleanOptions, DefaultsDocument, FlatCache, KeyMatch, SettingsOptions, SettingsStore,
};
use dotset_data::{MemoryRows, SettingsRows};
use dotset_test_support::fixtures::CacheFixture;
use serde_json::{Value, json};

fn open_store(fixture: &CacheFixture, options: SettingsOptions) -> Result<SettingsStore<MemoryRows>> {
    let cache = FlatCache::open(fixture.path())?;
    Ok(SettingsStore::new(MemoryRows::new(), cache, options))
}

fn plain_store(fixture: &CacheFixture) -> Result<SettingsStore<MemoryRows>> {
    open_store(fixture, SettingsOptions::default())
}

fn app_defaults() -> DefaultsDocument {
    DefaultsDocument::new(json!({
        "app": {
            "name": "demo",
            "hosts": ["a", "b"],
            "mail": {"driver": "smtp", "port": 25}
        }
    }))
}

fn reconciling_store(fixture: &CacheFixture, key_match: KeyMatch) -> Result<SettingsStore<MemoryRows>> {
    let options = SettingsOptions {
        namespace: Some("app".to_string()),
        key_match,
        ..SettingsOptions::default()
    };
    Ok(open_store(fixture, options)?.with_defaults(app_defaults()))
}

#[test]
fn set_then_get_round_trips() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    let cases = [
        ("flag", json!(true)),
        ("count", json!(42)),
        ("site.title", json!("Demo")),
        ("site.meta.tags", json!(["a", "b"])),
        ("mail", json!({"host": "smtp", "ports": [25, 587], "tls": {"enabled": false}})),
        ("deep.list", json!([])),
    ];
    for (key, value) in &cases {
        store.set(key, value.clone())?;
    }
    for (key, value) in &cases {
        assert_eq!(store.get(key)?.as_ref(), Some(value), "cached {key}");
    }

    fixture.remove()?;
    store.reload_cache();
    for (key, value) in &cases {
        assert_eq!(store.get(key)?.as_ref(), Some(value), "from rows {key}");
    }
    Ok(())
}

#[test]
fn dotted_keys_nest_under_one_row() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("a.b", json!(1))?;
    assert_eq!(Value::Object(store.get_all(true)?), json!({"a": {"b": 1}}));

    store.set("a.c", json!(2))?;
    assert_eq!(store.get("a")?, Some(json!({"b": 1, "c": 2})));
    assert_eq!(store.rows().len(), 1);
    Ok(())
}

#[test]
fn array_elements_are_addressable() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("servers", json!(["a"]))?;
    store.set("servers.1", json!("b"))?;
    assert_eq!(store.get("servers")?, Some(json!(["a", "b"])));
    assert_eq!(store.get("servers.0")?, Some(json!("a")));
    Ok(())
}

#[test]
fn forgetting_the_only_child_removes_the_row() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("a.b", json!(1))?;
    store.forget("a.b")?;

    assert!(store.rows().is_empty());
    assert_eq!(store.get("a")?, None);
    assert_eq!(store.get_or("a", json!("fallback"))?, json!("fallback"));
    assert_eq!(fixture.contents()?, "{}");
    Ok(())
}

#[test]
fn forgetting_one_child_keeps_siblings() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("a.b", json!(1))?;
    store.set("a.c", json!(2))?;
    store.forget("a.b")?;
    assert_eq!(store.get("a")?, Some(json!({"c": 2})));

    fixture.remove()?;
    store.reload_cache();
    assert_eq!(store.get("a")?, Some(json!({"c": 2})));
    assert!(!store.has("a.b")?);
    Ok(())
}

#[test]
fn flush_empties_everything() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("x", json!("1"))?;
    assert!(store.flush()?);
    assert!(store.get_all(true)?.is_empty());
    assert!(store.get_all(false)?.is_empty());
    assert!(!store.has("x")?);
    assert_eq!(fixture.contents()?, "{}");
    Ok(())
}

#[test]
fn cache_and_rows_agree_after_writes() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;

    store.set("a.b", json!(1))?;
    assert_eq!(store.cache().has("a.b"), store.has("a.b")?);
    store.set("a.c.d", Value::Null)?;
    assert!(store.cache().has("a.c.d"));
    assert!(store.has("a.c.d")?);

    store.forget("a.b")?;
    assert_eq!(store.cache().has("a.b"), store.has("a.b")?);
    assert!(!store.has("a.b")?);

    fixture.remove()?;
    store.reload_cache();
    assert!(store.has("a.c.d")?);
    assert!(!store.has("a.b")?);
    assert_eq!(store.get("a")?, Some(json!({"c": {"d": null}})));
    Ok(())
}

#[test]
fn cache_file_matches_expected_snapshots() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    assert_eq!(fixture.contents()?, "{}");
    store.set("key", json!("value"))?;
    assert_eq!(fixture.contents()?, r#"{"key":"value"}"#);

    let nested = CacheFixture::new()?;
    let mut store = plain_store(&nested)?;
    store.set("key1.key2", json!("value"))?;
    assert_eq!(nested.contents()?, r#"{"key1":{"key2":"value"}}"#);

    let container = CacheFixture::new()?;
    let mut store = plain_store(&container)?;
    store.set("key", json!({"v1": 1, "v2": 2}))?;
    assert_eq!(store.get("key")?, Some(json!({"v1": 1, "v2": 2})));
    Ok(())
}

#[test]
fn stored_rows_hold_json_blobs() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("site.meta.title", json!("Demo"))?;
    let row = store
        .rows_mut()
        .find_row("site")?
        .expect("row for top-level key");
    let blob = row.value.expect("non-empty value is encoded");
    assert_eq!(
        serde_json::from_slice::<Value>(&blob)?,
        json!({"meta": {"title": "Demo"}})
    );
    Ok(())
}

#[test]
fn clean_removes_stale_keys_and_inserts_missing_defaults() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = reconciling_store(&fixture, KeyMatch::Pattern)?;
    store.set("name", json!("custom"))?;
    store.set("hosts", json!(["x", "y", "z"]))?;
    store.set("legacy.flag", json!(true))?;
    store.set("mail.driver", json!("ses"))?;

    let report = store.clean(CleanOptions::default())?;
    assert!(!report.flushed);
    assert_eq!(report.removed, vec!["legacy.flag".to_string()]);
    assert_eq!(report.inserted, vec!["mail.port".to_string()]);

    assert_eq!(store.get("name")?, Some(json!("custom")));
    assert_eq!(store.get("hosts")?, Some(json!(["x", "y", "z"])));
    assert_eq!(store.get("mail")?, Some(json!({"driver": "ses", "port": 25})));
    assert!(!store.has("legacy")?);
    Ok(())
}

#[test]
fn clean_is_idempotent() -> Result<()> {
    for key_match in [KeyMatch::Pattern, KeyMatch::Segment] {
        let fixture = CacheFixture::new()?;
        let mut store = reconciling_store(&fixture, key_match)?;
        store.set("legacy", json!(1))?;
        store.set("hosts.0", json!("only"))?;

        store.clean(CleanOptions::default())?;
        let once = store.get_all(false)?;

        let second = store.clean(CleanOptions::default())?;
        assert!(second.is_noop(), "{key_match}: {second:?}");
        assert_eq!(store.get_all(false)?, once);
    }
    Ok(())
}

#[test]
fn clean_with_flush_restores_defaults() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = reconciling_store(&fixture, KeyMatch::Segment)?;
    store.set("name", json!("custom"))?;
    store.set("legacy", json!(1))?;

    let report = store.clean(CleanOptions { flush: true })?;
    assert!(report.flushed);
    assert!(report.removed.is_empty());
    assert_eq!(
        report.inserted,
        vec!["hosts", "mail.driver", "mail.port", "name"]
    );
    assert_eq!(
        Value::Object(store.get_all(false)?),
        json!({"hosts": ["a", "b"], "mail": {"driver": "smtp", "port": 25}, "name": "demo"})
    );
    assert_eq!(store.get_all(true)?, store.get_all(false)?);
    Ok(())
}

#[test]
fn fallback_reads_namespaced_defaults_until_overridden() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = reconciling_store(&fixture, KeyMatch::Pattern)?;
    assert_eq!(store.get("mail.port")?, Some(json!(25)));
    assert!(!store.has("mail.port")?);

    store.set("mail.port", json!(587))?;
    assert_eq!(store.get("mail.port")?, Some(json!(587)));
    Ok(())
}

#[test]
fn clean_keeps_overrides_of_keys_with_regex_metacharacters() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let options = SettingsOptions {
        namespace: Some("app".to_string()),
        ..SettingsOptions::default()
    };
    let mut store = open_store(&fixture, options)?.with_defaults(DefaultsDocument::new(json!({
        "app": {"limits": {"price+tax": "default", "cost[eur]": 1}}
    })));
    store.set("limits.price+tax", json!("custom"))?;
    store.set("limits.cost[eur]", json!(2))?;

    let report = store.clean(CleanOptions::default())?;
    assert!(report.is_noop(), "{report:?}");
    assert_eq!(store.get("limits.price+tax")?, Some(json!("custom")));
    assert_eq!(store.get("limits.cost[eur]")?, Some(json!(2)));
    assert!(store.clean(CleanOptions::default())?.is_noop());
    Ok(())
}

#[test]
fn forgetting_a_missing_child_of_an_empty_row_keeps_the_row() -> Result<()> {
    let fixture = CacheFixture::new()?;
    let mut store = plain_store(&fixture)?;
    store.set("tags", json!([]))?;
    assert!(store.has("tags")?);

    store.forget("tags.nope")?;
    assert!(store.has("tags")?);
    assert_eq!(store.rows().len(), 1);

    fixture.remove()?;
    store.reload_cache();
    assert!(store.has("tags")?);
    Ok(())
}
