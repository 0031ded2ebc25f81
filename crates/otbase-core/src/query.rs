//! Flattening of request payloads into HTTP query parameters.
//!
//! List and filter operations send their (sanitized) parameters in the query
//! string. Scalars become one pair each, sequences repeat the key once per
//! element, and nested mappings are sent as compact JSON text.

use serde_json::{Map, Value};

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Build the query pairs for a payload.
    #[must_use]
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let mut params = Self::new();
        for (key, value) in payload {
            params.push_value(key, value);
        }
        params
    }

    /// Append a value, expanding sequences into repeated keys.
    pub fn push_value(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if item.is_array() {
                        self.pairs.push((key.to_string(), item.to_string()));
                    } else {
                        self.push_value(key, item);
                    }
                }
            }
            Value::String(s) => self.pairs.push((key.to_string(), s.clone())),
            other => self.pairs.push((key.to_string(), other.to_string())),
        }
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }

    /// Borrow the collected key/value pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::QueryParams;
    use serde_json::json;

    fn pairs(value: serde_json::Value) -> Vec<(String, String)> {
        QueryParams::from_payload(value.as_object().unwrap()).into_pairs()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn scalars_become_single_pairs() {
        let result = pairs(json!({"include": "nics,ports", "limit": 25, "active": true}));
        assert!(result.contains(&pair("include", "nics,ports")));
        assert!(result.contains(&pair("limit", "25")));
        assert!(result.contains(&pair("active", "true")));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn sequences_repeat_the_key() {
        let result = pairs(json!({"priority": ["high", "low"]}));
        assert_eq!(result, vec![pair("priority", "high"), pair("priority", "low")]);
    }

    #[test]
    fn nested_mappings_are_sent_as_json() {
        let result = pairs(json!({"filter": {"vendor": "Siemens"}}));
        assert_eq!(result, vec![pair("filter", r#"{"vendor":"Siemens"}"#)]);
    }

    #[test]
    fn null_is_skipped() {
        let mut params = QueryParams::new();
        params.push_value("name", &serde_json::Value::Null);
        assert!(params.is_empty());
    }
}
