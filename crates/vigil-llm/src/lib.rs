//! `vigil-llm` — transport-agnostic model adapter.
//!
//! The core depends only on two calls: `structured(prompt, schema)` for
//! JSON decisions and `text(prompt)` for free-form generation. Recovery
//! policy belongs to callers; this crate only classifies failures.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde_json::Value;

pub use client::HttpLlm;
pub use error::{LlmError, Result};

/// Default hard cap on a single model call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The model contract consumed by the daemon.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Generate an object conforming to `schema` (a JSON Schema document).
    /// The adapter validates shape before returning; mismatches surface as
    /// [`LlmError::Validation`].
    async fn structured(&self, prompt: &str, schema: &Value) -> Result<Value>;

    /// Generate plain text.
    async fn text(&self, prompt: &str) -> Result<String>;
}

/// Check a value against the coarse shape of a JSON Schema document:
/// required top-level properties must be present and primitive types must
/// match. Full draft validation is the provider's job; this is the local
/// guard against malformed model output.
pub fn check_schema(value: &Value, schema: &Value) -> std::result::Result<(), String> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let props = schema.get("properties").and_then(Value::as_object);
    for key in required.iter().filter_map(Value::as_str) {
        let Some(field) = value.get(key) else {
            return Err(format!("missing required field: {key}"));
        };
        let Some(expected) = props
            .and_then(|p| p.get(key))
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let ok = match expected {
            "string" => field.is_string(),
            "number" => field.is_number(),
            "integer" => field.is_i64() || field.is_u64(),
            "boolean" => field.is_boolean(),
            "array" => field.is_array(),
            "object" => field.is_object(),
            _ => true,
        };
        if !ok {
            return Err(format!("field {key} is not of type {expected}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["send", "message", "confidence"],
            "properties": {
                "send": {"type": "boolean"},
                "message": {"type": "string"},
                "confidence": {"type": "number"}
            }
        })
    }

    #[test]
    fn conforming_value_passes() {
        let v = json!({"send": true, "message": "hi", "confidence": 0.8});
        assert!(check_schema(&v, &schema()).is_ok());
    }

    #[test]
    fn missing_field_fails() {
        let v = json!({"send": true, "confidence": 0.8});
        assert!(check_schema(&v, &schema()).is_err());
    }

    #[test]
    fn wrong_type_fails() {
        let v = json!({"send": "yes", "message": "hi", "confidence": 0.8});
        assert!(check_schema(&v, &schema()).is_err());
    }
}
