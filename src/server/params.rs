//! Query string parsing.
//!
//! Handlers take the raw query as a sorted map so unknown parameters can be
//! rejected and the request parameters reproduced in pagination links.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ExploreError;

pub type RawQuery = BTreeMap<String, String>;

/// Parameters that identify a page rather than a result.
const PAGING: [&str; 2] = ["page", "request_id"];

/// Fail on any parameter not in `allowed`.
pub fn reject_unknown(query: &RawQuery, allowed: &[&str]) -> Result<(), ExploreError> {
    match query.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(unknown) => Err(ExploreError::Validation(format!("Unknown parameter: {unknown}"))),
        None => Ok(()),
    }
}

/// Boolean parameter `name`, `default` when absent.
pub fn flag(query: &RawQuery, name: &str, default: bool) -> Result<bool, ExploreError> {
    let Some(value) = query.get(name) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" | "t" => Ok(true),
        "0" | "false" | "no" | "n" | "off" | "f" => Ok(false),
        _ => Err(ExploreError::Validation(format!("Invalid boolean for {name}: {value:?}"))),
    }
}

/// Non-negative integer parameter `name`, `None` when absent.
pub fn number(query: &RawQuery, name: &str) -> Result<Option<usize>, ExploreError> {
    query
        .get(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ExploreError::Validation(format!("Invalid value for {name}: {value:?}")))
        })
        .transpose()
}

/// Requested page index, 0 when absent.
pub fn page(query: &RawQuery) -> Result<usize, ExploreError> {
    Ok(number(query, "page")?.unwrap_or(0))
}

/// Client session id, freshly generated when the client has none.
pub fn session(query: &RawQuery) -> String {
    match query.get("request_id") {
        Some(id) if !id.is_empty() => id.clone(),
        _ => Uuid::new_v4().simple().to_string(),
    }
}

/// The query without its paging parameters, for link construction.
pub fn link_query(query: &RawQuery) -> RawQuery {
    query
        .iter()
        .filter(|(k, _)| !PAGING.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Decode a JSON request body.
pub fn body<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ExploreError> {
    serde_json::from_value(value).map_err(|e| ExploreError::Validation(format!("Invalid body: {e}")))
}
