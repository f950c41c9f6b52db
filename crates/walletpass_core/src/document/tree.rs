//! Dot-path helpers over the variant document type.

use serde_json::{json, Map, Value};

/// Language tag attached to every localized string written by this crate.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Provider review-workflow key, never persisted locally or echoed back.
pub const REVIEW_STATUS_KEY: &str = "reviewStatus";

/// Reads the value at a dot-separated object path.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, key| current.as_object()?.get(key))
}

/// Reads a string at `path`; non-string values yield `None`.
pub fn get_str<'a>(doc: &'a Value, path: &str) -> Option<&'a str> {
    get_path(doc, path)?.as_str()
}

pub fn get_string(doc: &Value, path: &str) -> Option<String> {
    get_str(doc, path).map(str::to_string)
}

/// Writes `value` at `path`, creating intermediate objects and replacing
/// non-object intermediates.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = doc;
    for key in parents {
        current = ensure_object(current)
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert((*last).to_string(), value);
}

/// Writes a string at `path` only when present.
pub fn set_opt(doc: &mut Value, path: &str, value: Option<&str>) {
    if let Some(value) = value {
        set_path(doc, path, Value::String(value.to_string()));
    }
}

/// Builds a provider localized string.
pub fn localized(value: &str) -> Value {
    json!({
        "defaultValue": {
            "language": DEFAULT_LANGUAGE,
            "value": value,
        }
    })
}

/// Writes a localized string at `path` only when present.
pub fn set_localized(doc: &mut Value, path: &str, value: Option<&str>) {
    if let Some(value) = value {
        set_path(doc, path, localized(value));
    }
}

/// Reads the default value of a localized string at `path`.
pub fn localized_value(doc: &Value, path: &str) -> Option<String> {
    get_string(doc, &format!("{path}.defaultValue.value"))
}

/// Returns a copy of `doc` with every object key in `keys` removed at any depth.
pub fn strip_keys(doc: &Value, keys: &[&str]) -> Value {
    match doc {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), strip_keys(value, keys)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| strip_keys(item, keys)).collect())
        }
        scalar => scalar.clone(),
    }
}

/// Removes provider review metadata at any depth.
pub fn strip_review_status(doc: &Value) -> Value {
    strip_keys(doc, &[REVIEW_STATUS_KEY])
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced with an object above"),
    }
}

#[cfg(test)]
mod tests {
    use super::{get_path, localized_value, set_localized, set_path, strip_review_status};
    use serde_json::json;

    #[test]
    fn set_path_creates_and_replaces_intermediates() {
        let mut doc = json!({ "venue": "flat" });
        set_path(&mut doc, "venue.name.defaultValue.value", json!("Hall A"));
        assert_eq!(
            get_path(&doc, "venue.name.defaultValue.value"),
            Some(&json!("Hall A"))
        );
    }

    #[test]
    fn localized_roundtrip() {
        let mut doc = json!({});
        set_localized(&mut doc, "eventName", Some("Final"));
        set_localized(&mut doc, "missing", None);
        assert_eq!(localized_value(&doc, "eventName").as_deref(), Some("Final"));
        assert_eq!(doc["eventName"]["defaultValue"]["language"], "en-US");
        assert!(doc.get("missing").is_none());
    }

    #[test]
    fn strip_review_status_walks_objects_and_arrays_without_mutating_input() {
        let original = json!({
            "id": "123",
            "reviewStatus": "UNDER_REVIEW",
            "nested": { "reviewStatus": "DRAFT", "value": "keep me" },
            "items": [ { "reviewStatus": "x", "id": 1 } ]
        });
        let stripped = strip_review_status(&original);

        assert_eq!(
            stripped,
            json!({
                "id": "123",
                "nested": { "value": "keep me" },
                "items": [ { "id": 1 } ]
            })
        );
        assert_eq!(original["reviewStatus"], "UNDER_REVIEW");
    }
}
