//! Recursive removal of empty fields from request payloads.
//!
//! The OT Base API treats an empty filter value as an invalid filter, so every
//! parameter map passes through a [`Sanitizer`] before it is sent. Keys whose
//! value is `null` or the empty string are dropped, nested mappings and
//! sequences are cleaned recursively and dropped when nothing is left.
//!
//! A sanitizer can also carry a set of date fields. Values under those keys
//! are rewritten into the `YYYY-MM-DD HH:MM:SS` form the server expects.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

/// Output format for normalized date fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format accepted as input for date fields.
const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Date-valued filters understood by the OT Base API.
pub const OTBASE_DATE_FIELDS: &[&str] = &["modified", "last_seen"];

/// Strip `null` and empty-string values from a payload.
///
/// Shorthand for [`Sanitizer::new`] without date normalization.
#[must_use]
pub fn sanitize(payload: &Map<String, Value>) -> Map<String, Value> {
    Sanitizer::new().sanitize(payload)
}

/// Payload sanitizer with an optional date-normalization hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sanitizer {
    date_fields: Vec<String>,
}

impl Sanitizer {
    /// Create a sanitizer that only strips empty values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            date_fields: Vec::new(),
        }
    }

    /// Create a sanitizer that also normalizes the given date fields.
    #[must_use]
    pub fn with_date_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            date_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Sanitizer used for OT Base requests (`modified` and `last_seen` are dates).
    #[must_use]
    pub fn otbase() -> Self {
        Self::with_date_fields(OTBASE_DATE_FIELDS.iter().copied())
    }

    /// Names of the fields subject to date normalization.
    #[must_use]
    pub fn date_fields(&self) -> &[String] {
        &self.date_fields
    }

    /// Return a cleaned copy of `payload`.
    #[must_use]
    pub fn sanitize(&self, payload: &Map<String, Value>) -> Map<String, Value> {
        let mut result = Map::new();

        for (key, value) in payload {
            // A set date field holds a string or epoch seconds; any other
            // shape is dropped rather than forwarded as a filter.
            if self.is_date_field(key) && is_truthy(value) {
                match normalize_date(value) {
                    Some(normalized) => {
                        result.insert(key.clone(), Value::String(normalized));
                    }
                    None if value.is_string() => {
                        result.insert(key.clone(), value.clone());
                    }
                    None => {}
                }
                continue;
            }

            match value {
                Value::Object(inner) => {
                    let cleaned = self.sanitize(inner);
                    if !cleaned.is_empty() {
                        result.insert(key.clone(), Value::Object(cleaned));
                    }
                }
                Value::Array(items) => {
                    let cleaned = self.sanitize_sequence(items);
                    if !cleaned.is_empty() {
                        result.insert(key.clone(), Value::Array(cleaned));
                    }
                }
                other if is_empty_leaf(other) => {}
                other => {
                    result.insert(key.clone(), other.clone());
                }
            }
        }

        result
    }

    fn sanitize_sequence(&self, items: &[Value]) -> Vec<Value> {
        items
            .iter()
            .filter_map(|item| match item {
                Value::Object(inner) => {
                    let cleaned = self.sanitize(inner);
                    (!cleaned.is_empty()).then_some(Value::Object(cleaned))
                }
                other if is_empty_leaf(other) => None,
                other => Some(other.clone()),
            })
            .collect()
    }

    fn is_date_field(&self, key: &str) -> bool {
        self.date_fields.iter().any(|field| field == key)
    }
}

fn is_empty_leaf(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Normalize a date value, or `None` when it is not a recognized date.
fn normalize_date(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            if NaiveDateTime::parse_from_str(s, DATE_FORMAT).is_ok() {
                Some(s.clone())
            } else {
                NaiveDateTime::parse_from_str(s, ISO_TIMESTAMP_FORMAT)
                    .ok()
                    .map(|dt| dt.format(DATE_FORMAT).to_string())
            }
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format(DATE_FORMAT).to_string()),
        _ => None,
    }
}
