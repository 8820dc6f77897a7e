// src/ingest/providers/static_api.rs
//! Structured JSON sources, including the curated known-events list shipped
//! with the crate.

use serde_json::Value;

use crate::error::FetchError;
use crate::ingest::types::ApiRecord;

/// Endpoint that resolves to [`KNOWN_EVENTS_JSON`] instead of a network call.
pub const BUILTIN_KNOWN_EVENTS: &str = "builtin:known-events";

pub const KNOWN_EVENTS_JSON: &str = include_str!("../../../config/known_events.json");

/// Body for `builtin:` endpoints, `None` for anything else.
pub fn builtin_body(endpoint: &str) -> Option<&'static str> {
    (endpoint.trim() == BUILTIN_KNOWN_EVENTS).then_some(KNOWN_EVENTS_JSON)
}

/// Accepts a top-level array or an object wrapping one under `items`,
/// `events` or `data`. Elements that are not objects are skipped.
pub fn parse_api_records(body: &str) -> Result<Vec<ApiRecord>, FetchError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(format!("json: {e}")))?;
    let list = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => ["items", "events", "data"]
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| FetchError::Parse("no items/events/data array".into()))?,
        _ => return Err(FetchError::Parse("expected array or object".into())),
    };

    Ok(list
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|v| serde_json::from_value::<ApiRecord>(v).ok())
        .collect())
}
