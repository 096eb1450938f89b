//! Flat request payloads.
//!
//! A payload is an ordered mapping of string keys to primitive JSON values.
//! Key order is preserved end to end (`serde_json` is built with
//! `preserve_order`), which the signer relies on: the query string it signs
//! must match the one sent on the wire byte for byte.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Ordered key/value payload for queries and request bodies.
pub type Payload = Map<String, Value>;

/// Convert a JSON value into a payload.
///
/// Objects are taken as-is. `null` becomes an empty payload. Any other value
/// has no keys to contribute and also yields an empty payload.
pub fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Serialize a payload as an `application/x-www-form-urlencoded` query string.
///
/// Keys keep their insertion order. Strings are emitted raw, every other
/// value in its compact JSON text form (`100`, `true`, `null`). Arrays and
/// objects fall outside a flat payload; they are sent as compact JSON
/// (`[1,2]`), not joined the way a browser `URLSearchParams` would.
/// Returns an empty string for an empty payload.
pub fn encode_query(payload: &Payload) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in payload {
        serializer.append_pair(key, &query_value(value));
    }
    serializer.finish()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Join a base URL and a resource path with exactly one `/` between them.
///
/// Trailing slashes on `base` and leading slashes on `path` are dropped.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
