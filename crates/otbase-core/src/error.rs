//! Error types for OT Base operations.
//!
//! Every failure the connector can surface is one variant of [`Error`], so the
//! hosting platform only ever sees a single error kind with a readable message.
//! Transport errors from `reqwest` are classified here and never escape.

use serde::Serialize;
use thiserror::Error;

/// Main error type for OT Base operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Server certificate validation failed
    #[error("SSL certificate validation failed")]
    TlsVerification,

    /// No connection could be established within the connect timeout
    #[error("The request timed out while trying to connect to the server")]
    ConnectTimeout,

    /// The server accepted the connection but did not answer in time
    #[error("The server did not send any data in the allotted amount of time")]
    ReadTimeout,

    /// Network, DNS or client-certificate transport failure
    #[error("Invalid endpoint or credentials")]
    Connection,

    /// The server answered with a status other than 2xx or 404
    #[error("{status_code}:{body}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Response body as text
        body: String,
    },

    /// The requested operation is not part of the operation table
    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),

    /// Health check failed; the cause is deliberately not reported
    #[error("Invalid credentials or health check failed")]
    HealthCheck,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Missing or malformed operation parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Any other HTTP transport failure
    #[error("HTTP request failed: {0}")]
    HttpError(String),
}

/// Specialized result type for OT Base operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
    /// Optional invocation ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// HTTP status code, for API errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TlsVerification => "TLS_VERIFICATION",
            Self::ConnectTimeout => "CONNECT_TIMEOUT",
            Self::ReadTimeout => "READ_TIMEOUT",
            Self::Connection => "CONNECTION_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::UnknownOperation(_) => "UNKNOWN_OPERATION",
            Self::HealthCheck => "HEALTH_CHECK_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::HttpError(_) => "HTTP_ERROR",
        }
    }

    /// Returns the HTTP status code carried by API errors.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Converts the error into an `ErrorResponse`.
    #[must_use]
    pub fn into_error_response(self) -> ErrorResponse {
        self.into_error_response_with_id(None)
    }

    /// Converts the error into an `ErrorResponse` with an invocation ID.
    #[must_use]
    pub fn into_error_response_with_id(self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                status_code: self.status_code(),
            },
            request_id,
        }
    }

    /// Returns true if the error points at the connector setup rather than the request.
    #[must_use]
    pub const fn is_config_related(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::TlsVerification | Self::Connection | Self::HealthCheck
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            if err.is_connect() {
                Self::ConnectTimeout
            } else {
                Self::ReadTimeout
            }
        } else if is_certificate_error(&err) {
            Self::TlsVerification
        } else if err.is_connect() {
            Self::Connection
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

// Messages rustls and OpenSSL render when the server certificate fails
// verification. Alerts about our own client certificate ("bad certificate",
// "certificate required") are transport failures and must not match.
const SERVER_CERTIFICATE_MARKERS: &[&str] = &[
    "invalid peer certificate",
    "certificate verify failed",
    "self signed certificate",
    "self-signed certificate",
    "unable to get local issuer certificate",
    "certificate has expired",
    "hostname mismatch",
];

/// Walks the source chain looking for a server certificate validation failure.
///
/// Neither TLS backend exposes a typed error through reqwest, so the check
/// relies on the rendered messages of the underlying errors.
fn is_certificate_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let message = e.to_string().to_ascii_lowercase();
        if SERVER_CERTIFICATE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            return true;
        }
        current = e.source();
    }
    false
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("Invalid server URL: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::TlsVerification.error_code(), "TLS_VERIFICATION");
        assert_eq!(Error::ConnectTimeout.error_code(), "CONNECT_TIMEOUT");
        assert_eq!(Error::ReadTimeout.error_code(), "READ_TIMEOUT");
        assert_eq!(Error::Connection.error_code(), "CONNECTION_ERROR");
        assert_eq!(
            Error::Api {
                status_code: 500,
                body: String::new()
            }
            .error_code(),
            "API_ERROR"
        );
        assert_eq!(
            Error::UnknownOperation("x".to_string()).error_code(),
            "UNKNOWN_OPERATION"
        );
        assert_eq!(Error::HealthCheck.error_code(), "HEALTH_CHECK_FAILED");
        assert_eq!(
            Error::ConfigError("x".to_string()).error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::InvalidParameter("x".to_string()).error_code(),
            "INVALID_PARAMETER"
        );
        assert_eq!(Error::ParseError("x".to_string()).error_code(), "PARSE_ERROR");
        assert_eq!(Error::HttpError("x".to_string()).error_code(), "HTTP_ERROR");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Api {
            status_code: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "500:boom");

        assert_eq!(
            Error::Connection.to_string(),
            "Invalid endpoint or credentials"
        );
        assert_eq!(
            Error::UnknownOperation("reboot".to_string()).to_string(),
            "Unsupported operation: reboot"
        );
    }

    #[test]
    fn test_status_code() {
        let err = Error::Api {
            status_code: 401,
            body: String::new(),
        };
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(Error::ReadTimeout.status_code(), None);
    }

    #[test]
    fn test_into_error_response() {
        let err = Error::Api {
            status_code: 503,
            body: "maintenance".to_string(),
        };
        let response = err.clone().into_error_response();

        assert_eq!(response.error.code, "API_ERROR");
        assert_eq!(response.error.message, "503:maintenance");
        assert_eq!(response.error.status_code, Some(503));
        assert!(response.request_id.is_none());

        let response_with_id = err.into_error_response_with_id(Some("req-456".to_string()));
        assert_eq!(response_with_id.request_id, Some("req-456".to_string()));
    }

    #[test]
    fn test_error_response_serialization_skips_empty_fields() {
        let response = Error::HealthCheck.into_error_response();
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("HEALTH_CHECK_FAILED"));
        assert!(!json.contains("request_id"));
        assert!(!json.contains("status_code"));
    }

    #[test]
    fn test_is_config_related() {
        assert!(Error::ConfigError("x".to_string()).is_config_related());
        assert!(Error::TlsVerification.is_config_related());
        assert!(Error::Connection.is_config_related());
        assert!(!Error::ReadTimeout.is_config_related());
        assert!(!Error::InvalidParameter("device_id".to_string()).is_config_related());
    }

    #[derive(Debug)]
    struct Wrapper(Box<dyn std::error::Error + 'static>);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("error trying to connect")
        }
    }

    impl std::error::Error for Wrapper {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    fn wrapped(message: &str) -> Wrapper {
        Wrapper(message.to_string().into())
    }

    #[test]
    fn test_certificate_error_found_in_source_chain() {
        assert!(is_certificate_error(&wrapped("invalid peer certificate: UnknownIssuer")));
        assert!(is_certificate_error(&wrapped(
            "error:0A000086:SSL routines:tls_post_process_server_certificate:certificate verify failed"
        )));
        assert!(is_certificate_error(&wrapped(
            "self-signed certificate in certificate chain"
        )));
        assert!(!is_certificate_error(&wrapped("connection refused")));
    }

    #[test]
    fn test_client_certificate_rejection_is_not_verification_failure() {
        assert!(!is_certificate_error(&wrapped("received fatal alert: CertificateRequired")));
        assert!(!is_certificate_error(&wrapped("received fatal alert: BadCertificate")));
        assert!(!is_certificate_error(&wrapped(
            "error:0A00045C:SSL routines:ssl3_read_bytes:tlsv13 alert certificate required"
        )));
        assert!(!is_certificate_error(&wrapped(
            "error:0A000412:SSL routines:ssl3_read_bytes:sslv3 alert bad certificate"
        )));
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let otbase_err: Error = err.into();
        assert!(matches!(otbase_err, Error::ConfigError(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let otbase_err: Error = err.into();
        assert!(matches!(otbase_err, Error::ParseError(_)));
    }
}
