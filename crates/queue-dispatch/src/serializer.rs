//! Payload serialization between application objects and wire-format strings.
//!
//! Payloads cross the dispatch boundary as [serde_json::Value] so the core
//! never depends on a concrete application type; a [MessageSerializer] turns
//! that neutral form into the string the provider carries and back. The rest
//! of the crate never inspects the wire format.

use crate::error::SerializationError;
use serde_json::Value;

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;

/// Converts payloads to and from wire-format strings
pub trait MessageSerializer: Send + Sync {
    /// Serialize a payload into its wire representation
    fn serialize(&self, payload: &Value) -> Result<String, SerializationError>;

    /// Deserialize a wire-format body back into a payload
    fn deserialize(&self, raw: &str) -> Result<Value, SerializationError>;
}

/// JSON serializer used by default.
///
/// String payloads pass through unchanged in both directions: a body sent as
/// `X` arrives as `X`, not `"X"`. Everything else is standard JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl MessageSerializer for JsonSerializer {
    fn serialize(&self, payload: &Value) -> Result<String, SerializationError> {
        match payload {
            Value::String(text) => Ok(text.clone()),
            other => Ok(serde_json::to_string(other)?),
        }
    }

    fn deserialize(&self, raw: &str) -> Result<Value, SerializationError> {
        match serde_json::from_str(raw) {
            Ok(value) => Ok(value),
            // Bodies produced by the string pass-through above are not JSON
            Err(_) => Ok(Value::String(raw.to_string())),
        }
    }
}
