//! Response envelope normalization.
//!
//! Replies look like `{"code": "SUCCESS", "data": ...}`. Anything else that
//! decodes as JSON is a server failure carrying the full reply.

use crate::error::{NetworkError, RequestFailure, RequestResult};
use serde_json::Value;

/// Discriminant value for a successful reply.
pub const SUCCESS_CODE: &str = "SUCCESS";

/// Resolve a decoded envelope into its `data` field or a server failure.
///
/// A successful envelope without `data` resolves to `null`.
pub fn resolve_envelope(envelope: Value) -> RequestResult<Value> {
    let is_success = envelope
        .get("code")
        .and_then(Value::as_str)
        .is_some_and(|code| code == SUCCESS_CODE);

    if !is_success {
        return Err(RequestFailure::Server(envelope));
    }

    match envelope {
        Value::Object(mut map) => Ok(map.remove("data").unwrap_or(Value::Null)),
        // unreachable: `get("code")` only matches objects
        _ => Ok(Value::Null),
    }
}

/// Returns `true` if a declared content type is JSON.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("application/json"))
}

/// Classify a binary download body.
///
/// A body declared as JSON is an encoded failure envelope and always rejects
/// as server-classified (or network-classified if it does not decode). Any
/// other content type resolves with the raw bytes.
pub fn classify_file_body(content_type: Option<&str>, body: Vec<u8>) -> RequestResult<Vec<u8>> {
    if !is_json_content_type(content_type) {
        return Ok(body);
    }

    let decoded: Value = serde_json::from_slice(&body)
        .map_err(|e| NetworkError::Decode(format!("file error body: {e}")))?;
    Err(RequestFailure::Server(decoded))
}
