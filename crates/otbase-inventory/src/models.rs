//! Operation table and parameter handling for the OT Base connector.

use otbase_core::{Error, FilterNormalization};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Untyped parameter mapping handed over by the host for one invocation.
pub type Params = Map<String, Value>;

/// Operations exposed to the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET devices`
    GetDevicesList,
    /// `GET devices/{device_id}`
    GetDeviceDetails,
    /// `DELETE devices/{device_id}`
    DeleteDeviceDetails,
    /// `GET vulnerabilities`
    GetVulnerabilitiesList,
    /// `GET vulnerabilities/{cve_id}`
    GetVulnerabilityDetails,
    /// `GET dataflow`
    GetDataFlow,
    /// `GET networks`
    GetNetworkList,
    /// `GET networks/{network_id}`
    GetNetworkDetails,
    /// Caller-supplied URL and method
    CustomEndpoint,
}

impl Operation {
    /// Returns the operation name used by the host.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetDevicesList => "get_devices_list",
            Self::GetDeviceDetails => "get_device_details",
            Self::DeleteDeviceDetails => "delete_device_details",
            Self::GetVulnerabilitiesList => "get_vulnerabilities_list",
            Self::GetVulnerabilityDetails => "get_vulnerability_details",
            Self::GetDataFlow => "get_data_flow",
            Self::GetNetworkList => "get_network_list",
            Self::GetNetworkDetails => "get_network_details",
            Self::CustomEndpoint => "custom_endpoint",
        }
    }

    /// Returns all available operations.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::GetDevicesList,
            Self::GetDeviceDetails,
            Self::DeleteDeviceDetails,
            Self::GetVulnerabilitiesList,
            Self::GetVulnerabilityDetails,
            Self::GetDataFlow,
            Self::GetNetworkList,
            Self::GetNetworkDetails,
            Self::CustomEndpoint,
        ]
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

/// Confirmation returned by a successful device deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteConfirmation {
    /// Human-readable confirmation
    pub message: String,
}

impl DeleteConfirmation {
    /// Confirmation for the given device id.
    #[must_use]
    pub fn for_device(device_id: &str) -> Self {
        Self {
            message: format!("Successfully deleted device: {device_id}"),
        }
    }

    /// Convert into the JSON value handed back to the host.
    #[must_use]
    pub fn into_value(self) -> Value {
        serde_json::json!({ "message": self.message })
    }
}

/// Request for the `custom_endpoint` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEndpointRequest {
    /// Absolute URL, or a path relative to the API base URL
    pub endpoint: String,
    /// HTTP method
    pub method: Method,
    /// Parameters: query string for GET, JSON body otherwise
    pub body: Params,
}

impl CustomEndpointRequest {
    /// Extract the request from the invocation parameters.
    ///
    /// `method` defaults to GET and is case-insensitive; `body` may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a missing endpoint, an unknown
    /// method, or a body that is not a mapping.
    pub fn from_params(params: &Params) -> Result<Self, Error> {
        let endpoint = match params.get("endpoint") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(Error::InvalidParameter(
                    "Missing required parameter: endpoint".to_string(),
                ))
            }
        };

        let method = match params.get("method") {
            None | Some(Value::Null) => Method::GET,
            Some(Value::String(s)) if s.trim().is_empty() => Method::GET,
            Some(Value::String(s)) => Method::from_bytes(s.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| Error::InvalidParameter(format!("Invalid HTTP method: {s}")))?,
            Some(other) => {
                return Err(Error::InvalidParameter(format!(
                    "Invalid HTTP method: {other}"
                )))
            }
        };

        let body = match params.get("body") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(s)) if s.trim().is_empty() => Params::new(),
            Some(Value::String(s)) => match serde_json::from_str(s) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(Error::InvalidParameter(
                        "body must be a JSON object".to_string(),
                    ))
                }
            },
            Some(_) => {
                return Err(Error::InvalidParameter(
                    "body must be a JSON object".to_string(),
                ))
            }
        };

        Ok(Self {
            endpoint,
            method,
            body,
        })
    }
}

/// Remove and return a path identifier from the parameters.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] when the id is missing, empty, or would
/// escape its path segment.
pub fn take_path_id(params: &mut Params, key: &str) -> Result<String, Error> {
    let id = match params.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(Error::InvalidParameter(format!(
                "Missing required parameter: {key}"
            )))
        }
    };

    if id.contains(['/', '\\', '?', '#']) || is_dot_segment(&id) {
        return Err(Error::InvalidParameter(format!("Invalid {key}: {id}")));
    }
    Ok(id)
}

/// URL resolution collapses `.` and `..` segments, percent-encoded or not.
fn is_dot_segment(id: &str) -> bool {
    let decoded = id.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// Lower-case a multi-value filter and flatten it into one string in place.
///
/// Sequences are flattened according to `policy`; a plain string is
/// lower-cased as a whole. Anything else is left for the sanitizer.
pub fn normalize_filter(params: &mut Params, key: &str, policy: FilterNormalization) {
    let normalized = match params.get(key) {
        Some(Value::Array(items)) if !items.is_empty() => {
            let lowered: Vec<String> = items
                .iter()
                .filter_map(filter_text)
                .map(|s| s.to_lowercase())
                .collect();
            match policy {
                FilterNormalization::JoinAll => lowered.join(","),
                FilterNormalization::LastOnly => lowered.last().cloned().unwrap_or_default(),
            }
        }
        Some(Value::String(s)) if !s.is_empty() => s.to_lowercase(),
        _ => return,
    };

    params.insert(key.to_string(), Value::String(normalized));
}

fn filter_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}
