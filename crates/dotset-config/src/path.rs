//! Dotted-path parsing and nested value navigation.
//!
//! # Design
//! - Paths are split on `.` with no escaping.
//! - Objects are addressed by key, arrays by canonical decimal index.
//! - Writes create missing intermediate containers; a scalar in the way is
//!   replaced by an empty object.
//! - Removing an element from the middle of an array turns it into an
//!   index-keyed object so the remaining elements keep their addresses.

use std::collections::BTreeMap;
use std::mem;

use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// Segment delimiter for dotted keys.
pub const DELIMITER: char = '.';

/// Split a dotted key into its segments.
#[must_use]
pub fn split(key: &str) -> Vec<&str> {
    key.split(DELIMITER).collect()
}

/// A validated dotted key: at least one segment and no empty segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse and validate a dotted key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] when the key is empty or contains an
    /// empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(key: &str) -> ConfigResult<Self> {
        let segments: Vec<String> = split(key).into_iter().map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(Self {
            raw: key.to_string(),
            segments,
        })
    }

    /// The key as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Top-level segment (the row key).
    #[must_use]
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    /// Segments below the top-level one.
    #[must_use]
    pub fn rest(&self) -> &[String] {
        &self.segments[1..]
    }

    /// All segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the key addresses a whole row.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }
}

fn array_index(segment: &str) -> Option<usize> {
    segment
        .parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == segment)
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => array_index(segment).and_then(|index| items.get(index)),
        _ => None,
    }
}

fn existing_child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => array_index(segment).and_then(move |index| items.get_mut(index)),
        _ => None,
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Map::new(),
    }
}

fn child_or_insert<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    let slot = match &*node {
        Value::Array(items) => array_index(segment).filter(|index| *index <= items.len()),
        _ => None,
    };
    match (node, slot) {
        (Value::Array(items), Some(index)) => {
            if index == items.len() {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        (Value::Object(map), _) => map.entry(segment.to_string()).or_insert(Value::Null),
        (other, _) => {
            *other = Value::Object(into_object(mem::take(other)));
            child_or_insert(other, segment)
        }
    }
}

/// Walk `root` through `segments`.
///
/// Returns `None` when a segment is missing or an intermediate value is not a
/// container. An empty segment list yields `root` itself.
#[must_use]
pub fn navigate<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| child(node, segment.as_ref()))
}

/// Whether every segment resolves, counting explicit `null` leaves as present.
#[must_use]
pub fn contains<S: AsRef<str>>(root: &Value, segments: &[S]) -> bool {
    navigate(root, segments).is_some()
}

/// Assign `value` at `segments`, creating intermediate containers as needed.
///
/// Returns the value previously stored at that position, or `None` when the
/// position did not exist. An empty segment list replaces `root`.
pub fn set_at<S: AsRef<str>>(root: &mut Value, segments: &[S], value: Value) -> Option<Value> {
    let Some((last, parents)) = segments.split_last() else {
        return Some(mem::replace(root, value));
    };
    let parent = parents
        .iter()
        .fold(root, |node, segment| child_or_insert(node, segment.as_ref()));
    let existed = child(parent, last.as_ref()).is_some();
    let previous = mem::replace(child_or_insert(parent, last.as_ref()), value);
    existed.then_some(previous)
}

/// Remove the entry addressed by `segments`.
///
/// Returns the removed value, or `None` when navigation fails partway or the
/// final entry does not exist (nothing to delete). An empty segment list is a
/// no-op.
pub fn delete_at<S: AsRef<str>>(root: &mut Value, segments: &[S]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    let last = last.as_ref();
    let parent = parents
        .iter()
        .try_fold(root, |node, segment| existing_child_mut(node, segment.as_ref()))?;

    match parent {
        Value::Object(map) => map.remove(last),
        Value::Array(items) => {
            let index = array_index(last).filter(|index| *index < items.len())?;
            if index + 1 == items.len() {
                return items.pop();
            }
            let mut map = into_object(Value::Array(mem::take(items)));
            let removed = map.remove(last);
            *parent = Value::Object(map);
            removed
        }
        _ => None,
    }
}

/// Build `{s1: {s2: {... {sn: leaf}}}}` from `segments`.
///
/// An empty segment list yields `leaf` unwrapped.
#[must_use]
pub fn build_from_segments<S: AsRef<str>>(segments: &[S], leaf: Value) -> Value {
    segments.iter().rev().fold(leaf, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.as_ref().to_string(), inner);
        Value::Object(map)
    })
}

/// Whether a value counts as empty: `null` or a container without entries.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether a value is array-shaped: a JSON array, or a non-empty object whose
/// keys are all canonical array indices.
#[must_use]
pub fn is_array_shaped(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(map) => !map.is_empty() && map.keys().all(|key| array_index(key).is_some()),
        _ => false,
    }
}

/// Flatten nested containers into dotted keys.
///
/// Non-empty containers are descended into; scalars and empty containers are
/// leaves. A scalar root produces no entries.
#[must_use]
pub fn flatten(root: &Value) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    flatten_into(root, None, &mut flat);
    flat
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn children(node: &Value) -> Vec<(String, &Value)> {
    match node {
        Value::Object(map) => map.iter().map(|(key, value)| (key.clone(), value)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value))
            .collect(),
        _ => Vec::new(),
    }
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn join(prefix: Option<&str>, segment: &str) -> String {
    prefix.map_or_else(|| segment.to_string(), |prefix| format!("{prefix}{DELIMITER}{segment}"))
}

fn flatten_into(node: &Value, prefix: Option<&str>, flat: &mut BTreeMap<String, Value>) {
    for (segment, value) in children(node) {
        let key = join(prefix, &segment);
        let descend = (value.is_object() || value.is_array()) && !is_empty_value(value);
        if descend {
            flatten_into(value, Some(&key), flat);
        } else {
            flat.insert(key, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_paths_reject_empty_segments() {
        let key = KeyPath::parse("a.b.c").expect("valid key");
        assert_eq!(key.head(), "a");
        assert_eq!(key.rest().to_vec(), vec!["b".to_string(), "c".to_string()]);
        assert!(!key.is_top_level());
        assert!(KeyPath::parse("solo").expect("valid key").is_top_level());

        for bad in ["", ".", "a..b", ".a", "a."] {
            assert!(
                matches!(KeyPath::parse(bad), Err(ConfigError::InvalidKey { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn navigate_walks_objects_and_arrays() {
        let root = json!({"a": {"b": [10, {"c": null}]}});
        assert_eq!(navigate(&root, &["a", "b", "0"]), Some(&json!(10)));
        assert_eq!(navigate(&root, &["a", "b", "1", "c"]), Some(&Value::Null));
        assert_eq!(navigate(&root, &["a", "b", "01"]), None);
        assert_eq!(navigate(&root, &["a", "x"]), None);
        assert_eq!(navigate(&root, &["a", "b", "0", "deeper"]), None);
        assert_eq!(navigate::<&str>(&root, &[]), Some(&root));
        assert!(contains(&root, &["a", "b", "1", "c"]));
    }

    #[test]
    fn set_at_creates_intermediates_and_returns_previous() {
        let mut root = json!({});
        assert_eq!(set_at(&mut root, &["a", "b", "c"], json!(1)), None);
        assert_eq!(root, json!({"a": {"b": {"c": 1}}}));

        assert_eq!(set_at(&mut root, &["a", "b", "c"], json!(2)), Some(json!(1)));
        assert_eq!(set_at(&mut root, &["a", "d"], json!("x")), None);
        assert_eq!(root, json!({"a": {"b": {"c": 2}, "d": "x"}}));
    }

    #[test]
    fn set_at_replaces_scalars_in_the_way() {
        let mut root = json!({"a": "scalar"});
        set_at(&mut root, &["a", "b"], json!(true));
        assert_eq!(root, json!({"a": {"b": true}}));

        let mut scalar_root = json!(5);
        set_at(&mut scalar_root, &["k"], json!(1));
        assert_eq!(scalar_root, json!({"k": 1}));
    }

    #[test]
    fn set_at_with_no_segments_replaces_root() {
        let mut root = json!({"old": true});
        assert_eq!(set_at::<&str>(&mut root, &[], json!([1])), Some(json!({"old": true})));
        assert_eq!(root, json!([1]));
    }

    #[test]
    fn set_at_handles_array_indices() {
        let mut root = json!({"list": ["a", "b"]});
        set_at(&mut root, &["list", "1"], json!("B"));
        set_at(&mut root, &["list", "2"], json!("c"));
        assert_eq!(root, json!({"list": ["a", "B", "c"]}));

        set_at(&mut root, &["list", "7"], json!("far"));
        assert_eq!(
            root,
            json!({"list": {"0": "a", "1": "B", "2": "c", "7": "far"}})
        );
    }

    #[test]
    fn delete_at_removes_leaves_and_reports_misses() {
        let mut root = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(delete_at(&mut root, &["a", "b"]), Some(json!(1)));
        assert_eq!(root, json!({"a": {"c": 2}}));

        assert_eq!(delete_at(&mut root, &["a", "missing"]), None);
        assert_eq!(delete_at(&mut root, &["x", "y", "z"]), None);
        assert_eq!(delete_at::<&str>(&mut root, &[]), None);
        assert_eq!(root, json!({"a": {"c": 2}}));
    }

    #[test]
    fn delete_at_keeps_array_addresses_stable() {
        let mut root = json!({"list": [1, 2, 3]});
        assert_eq!(delete_at(&mut root, &["list", "2"]), Some(json!(3)));
        assert_eq!(root, json!({"list": [1, 2]}));

        assert_eq!(delete_at(&mut root, &["list", "0"]), Some(json!(1)));
        assert_eq!(root, json!({"list": {"1": 2}}));
        assert_eq!(navigate(&root, &["list", "1"]), Some(&json!(2)));
    }

    #[test]
    fn build_from_segments_nests_or_returns_leaf() {
        assert_eq!(
            build_from_segments(&["a", "b"], json!("v")),
            json!({"a": {"b": "v"}})
        );
        assert_eq!(build_from_segments::<&str>(&[], json!("v")), json!("v"));
    }

    #[test]
    fn array_shape_detection() {
        assert!(is_array_shaped(&json!([])));
        assert!(is_array_shaped(&json!({"0": "a", "3": "b"})));
        assert!(!is_array_shaped(&json!({})));
        assert!(!is_array_shaped(&json!({"0": "a", "name": "b"})));
        assert!(!is_array_shaped(&json!("0")));
    }

    #[test]
    fn flatten_produces_dotted_leaves() {
        let flat = flatten(&json!({
            "app": {"name": "demo", "tags": ["x", "y"], "empty": {}},
            "debug": false
        }));
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["app.empty", "app.name", "app.tags.0", "app.tags.1", "debug"]
        );
        assert_eq!(flat["app.empty"], json!({}));
        assert!(flatten(&json!("scalar")).is_empty());
    }
}
