//! JSON codec for property values.
//!
//! Property tables store opaque JSON payloads in a text column. All encoding
//! and decoding goes through this module so the storage format can change
//! without touching callers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DbError;

/// Encode a value for storage.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if `value` cannot be serialized.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, DbError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a stored payload.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if the payload is not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, DbError> {
    Ok(serde_json::from_str(payload)?)
}

/// Whether a stored payload counts as empty: `null`, `""`, `[]` or `{}`.
///
/// Payloads that are not valid JSON are treated as non-empty.
pub fn is_empty_payload(payload: &str) -> bool {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Null) => true,
        Ok(Value::String(s)) => s.is_empty(),
        Ok(Value::Array(a)) => a.is_empty(),
        Ok(Value::Object(o)) => o.is_empty(),
        Ok(_) | Err(_) => false,
    }
}
