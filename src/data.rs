//! Page data and the cascade merge.
//!
//! Every page carries a [`Data`] object assembled from several layers:
//!
//! ```text
//! _data.* of the root          ← lowest precedence
//! _data.* of each subdirectory
//! filename prefix (order/date)
//! front matter of the page     ← highest precedence
//! ```
//!
//! Each layer is merged on top of the previous one with [`merge_data`].
//! Plain keys are replaced; keys listed in the site's `merged_keys` table are
//! combined instead, so `tags` declared in a directory accumulate with the
//! tags declared on each page.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Arbitrary page data: a JSON object.
pub type Data = Map<String, Value>;

pub const URL: &str = "url";
pub const BASENAME: &str = "basename";
pub const LAYOUT: &str = "layout";
pub const TEMPLATE_ENGINE: &str = "template_engine";
pub const RENDER_ORDER: &str = "render_order";
pub const DRAFT: &str = "draft";
pub const DATE: &str = "date";
pub const ORDER: &str = "order";
pub const LANG: &str = "lang";
pub const ID: &str = "id";
pub const TAGS: &str = "tags";
pub const TITLE: &str = "title";
pub const CONTENT: &str = "content";

/// How a key listed in `merged_keys` combines parent and child values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Shallow object merge, child entries win.
    Object,
    /// Parent items followed by child items.
    Array,
    /// Like `Array`, but items are stringified and deduplicated.
    StringArray,
}

/// Keys that combine rather than override, by strategy.
pub type MergedKeys = BTreeMap<String, MergeStrategy>;

/// Default merged keys: tags accumulate down the tree.
pub fn default_merged_keys() -> MergedKeys {
    let mut keys = MergedKeys::new();
    keys.insert(TAGS.to_string(), MergeStrategy::StringArray);
    keys
}

/// Merge `child` on top of `parent`.
pub fn merge_data(parent: &Data, child: &Data, merged_keys: &MergedKeys) -> Data {
    let mut merged = parent.clone();
    for (key, child_val) in child {
        let combined = match (merged_keys.get(key), merged.remove(key)) {
            (Some(strategy), Some(parent_val)) => combine(*strategy, parent_val, child_val.clone()),
            (Some(MergeStrategy::StringArray), None) => {
                Value::Array(string_array(to_items(child_val.clone())))
            }
            (_, _) => child_val.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

fn combine(strategy: MergeStrategy, parent: Value, child: Value) -> Value {
    match strategy {
        MergeStrategy::Object => match (parent, child) {
            (Value::Object(mut base), Value::Object(overlay)) => {
                base.extend(overlay);
                Value::Object(base)
            }
            (_, child) => child,
        },
        MergeStrategy::Array => {
            let mut items = to_items(parent);
            items.extend(to_items(child));
            Value::Array(items)
        }
        MergeStrategy::StringArray => {
            let mut items = to_items(parent);
            items.extend(to_items(child));
            Value::Array(string_array(items))
        }
    }
}

fn to_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn string_array(items: Vec<Value>) -> Vec<Value> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        let s = match item {
            Value::String(s) => s,
            Value::Null => continue,
            other => other.to_string(),
        };
        if !seen.contains(&s) {
            seen.push(s);
        }
    }
    seen.into_iter().map(Value::String).collect()
}

/// Normalize `tags` to an array of strings.
pub fn normalize_tags(data: &mut Data) {
    if let Some(tags) = data.remove(TAGS) {
        data.insert(TAGS.to_string(), Value::Array(string_array(to_items(tags))));
    }
}

/// Look up a dotted key (`author.name`) inside nested objects.
pub fn lookup<'a>(data: &'a Data, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn get_str<'a>(data: &'a Data, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

pub fn get_bool(data: &Data, key: &str) -> Option<bool> {
    data.get(key).and_then(Value::as_bool)
}

pub fn render_order(data: &Data) -> i64 {
    data.get(RENDER_ORDER).and_then(Value::as_i64).unwrap_or(0)
}

pub fn is_draft(data: &Data) -> bool {
    get_bool(data, DRAFT).unwrap_or(false)
}

pub fn tags(data: &Data) -> Vec<&str> {
    match data.get(TAGS) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    }
}

/// The engine chain override: a single name or a list of names.
pub fn template_engines(data: &Data) -> Option<Vec<String>> {
    match data.get(TEMPLATE_ENGINE)? {
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
        ),
        Value::Bool(false) => Some(Vec::new()),
        _ => None,
    }
}

/// Convert a TOML value into JSON data.
pub fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, from_toml(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Data {
        match value {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        }
    }

    #[test]
    fn child_overrides_parent() {
        let parent = data(json!({"title": "Parent", "layout": "base.tera"}));
        let child = data(json!({"title": "Child"}));
        let merged = merge_data(&parent, &child, &default_merged_keys());
        assert_eq!(merged["title"], "Child");
        assert_eq!(merged["layout"], "base.tera");
    }

    #[test]
    fn tags_accumulate_without_duplicates() {
        let parent = data(json!({"tags": ["blog", "rust"]}));
        let child = data(json!({"tags": ["rust", "release"]}));
        let merged = merge_data(&parent, &child, &default_merged_keys());
        assert_eq!(merged["tags"], json!(["blog", "rust", "release"]));
    }

    #[test]
    fn string_tag_becomes_array() {
        let parent = Data::new();
        let child = data(json!({"tags": "news"}));
        let merged = merge_data(&parent, &child, &default_merged_keys());
        assert_eq!(merged["tags"], json!(["news"]));
    }

    #[test]
    fn numeric_tags_are_stringified() {
        let mut d = data(json!({"tags": [2024, "x"]}));
        normalize_tags(&mut d);
        assert_eq!(d["tags"], json!(["2024", "x"]));
    }

    #[test]
    fn object_strategy_merges_shallowly() {
        let mut keys = MergedKeys::new();
        keys.insert("meta".into(), MergeStrategy::Object);
        let parent = data(json!({"meta": {"a": 1, "b": {"x": 1}}}));
        let child = data(json!({"meta": {"b": {"y": 2}, "c": 3}}));
        let merged = merge_data(&parent, &child, &keys);
        assert_eq!(merged["meta"], json!({"a": 1, "b": {"y": 2}, "c": 3}));
    }

    #[test]
    fn array_strategy_keeps_duplicates() {
        let mut keys = MergedKeys::new();
        keys.insert("scripts".into(), MergeStrategy::Array);
        let parent = data(json!({"scripts": ["a.js"]}));
        let child = data(json!({"scripts": ["a.js", "b.js"]}));
        let merged = merge_data(&parent, &child, &keys);
        assert_eq!(merged["scripts"], json!(["a.js", "a.js", "b.js"]));
    }

    #[test]
    fn unlisted_objects_are_replaced() {
        let parent = data(json!({"author": {"name": "A", "email": "a@x"}}));
        let child = data(json!({"author": {"name": "B"}}));
        let merged = merge_data(&parent, &child, &default_merged_keys());
        assert_eq!(merged["author"], json!({"name": "B"}));
    }

    #[test]
    fn lookup_dotted_keys() {
        let d = data(json!({"author": {"name": "Ada"}, "list": [1, 2]}));
        assert_eq!(lookup(&d, "author.name"), Some(&json!("Ada")));
        assert_eq!(lookup(&d, "list.1"), Some(&json!(2)));
        assert_eq!(lookup(&d, "author.missing"), None);
    }

    #[test]
    fn template_engine_forms() {
        let d = data(json!({"template_engine": "tera, md"}));
        assert_eq!(template_engines(&d), Some(vec!["tera".into(), "md".into()]));
        let d = data(json!({"template_engine": ["md"]}));
        assert_eq!(template_engines(&d), Some(vec!["md".into()]));
        let d = data(json!({"template_engine": false}));
        assert_eq!(template_engines(&d), Some(vec![]));
        assert_eq!(template_engines(&Data::new()), None);
    }

    #[test]
    fn toml_tables_convert() {
        let value: toml::Value = toml::from_str("a = 1\n[b]\nc = \"d\"").unwrap();
        assert_eq!(from_toml(value), json!({"a": 1, "b": {"c": "d"}}));
    }
}
