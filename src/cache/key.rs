//! Deterministic cache keys.
//!
//! Parameters are held in a [`BTreeMap`], so serialization always emits keys
//! in lexicographic order with serde_json's compact separators. Two calls with
//! the same parameters map to the same key however they were assembled.

use std::collections::BTreeMap;

use serde::ser::Error as _;
use serde::Serialize;
use serde_json::Value;

/// Keyword parameters of a cached computation.
pub type Params = BTreeMap<String, Value>;

/// Convert a serializable parameter struct into [`Params`].
pub fn to_params<P: Serialize>(params: &P) -> Result<Params, serde_json::Error> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(serde_json::Error::custom(format!(
            "computation parameters must serialize to an object, got {other}"
        ))),
    }
}

/// `operation:params:session`.
pub fn cache_key(operation: &str, params: &Params, session: &str) -> String {
    // A BTreeMap of JSON values always serializes.
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{operation}:{params}:{session}")
}
