//! Accessors for the dynamic JSON columns (`extra`, `metadata`, `attributes`).
//!
//! These columns are opaque maps; all reads go through the helpers below and
//! schema evolution lives here, never in static type definitions.

use serde_json::{Map, Value};

/// Read a string field from a JSON object, if present and a string.
pub fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Read a numeric field as f64, if present and numeric.
pub fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

/// Read an integer field, if present and integral.
pub fn get_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

/// Set a field on a JSON object. A non-object value is replaced by a fresh
/// object first, so callers can chain sets onto `Value::Null`.
pub fn set(value: &mut Value, key: &str, v: Value) {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .expect("just ensured object")
        .insert(key.to_string(), v);
}

/// Shallow-merge `patch` into `base`. Keys in `patch` win; both must be
/// objects for any merging to happen (otherwise `patch` replaces `base`).
pub fn merge(base: &mut Value, patch: &Value) {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(b), Some(p)) => {
            for (k, v) in p {
                b.insert(k.clone(), v.clone());
            }
        }
        _ => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_on_null_creates_object() {
        let mut v = Value::Null;
        set(&mut v, "trigger_count", json!(3));
        assert_eq!(get_i64(&v, "trigger_count"), Some(3));
    }

    #[test]
    fn merge_overwrites_and_preserves() {
        let mut base = json!({"a": 1, "b": 2});
        merge(&mut base, &json!({"b": 3, "c": 4}));
        assert_eq!(base, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_replaces_non_object_base() {
        let mut base = json!("scalar");
        merge(&mut base, &json!({"k": true}));
        assert_eq!(base, json!({"k": true}));
    }
}
