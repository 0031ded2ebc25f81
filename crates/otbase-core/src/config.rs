//! Connector configuration supplied by the hosting platform.
//!
//! The host hands over a flat JSON mapping (`server_url`, `username`,
//! `password`, `verify_ssl`, `pfx_path`, `pfx_password`, ...). This module
//! parses and validates it once; the resulting [`ConnectorConfig`] is never
//! mutated afterwards.

use crate::client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::Error;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Path appended to the server URL for every API call.
pub const API_BASE_PATH: &str = "/ot-base/api/v1/";

/// How multi-value filters (`include`, `priority`) are flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNormalization {
    /// Lower-case every element and join them with commas.
    #[default]
    JoinAll,
    /// Keep only the last lower-cased element.
    LastOnly,
}

/// Configuration for one OT Base connector instance.
#[derive(Debug, Deserialize, Validate)]
pub struct ConnectorConfig {
    /// Server address, with or without scheme
    #[validate(length(min = 1, message = "server_url must not be empty"))]
    pub server_url: String,

    /// Basic auth user name
    #[serde(default)]
    pub username: String,

    /// Basic auth password
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// Whether to verify the server's TLS certificate
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Optional PKCS12 client certificate bundle
    #[serde(default, deserialize_with = "deserialize_optional_path")]
    pub pfx_path: Option<PathBuf>,

    /// Password protecting the PKCS12 bundle
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub pfx_password: Option<SecretString>,

    /// Connect timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Flattening policy for multi-value filters
    #[serde(default)]
    pub filter_normalization: FilterNormalization,
}

const fn default_verify_ssl() -> bool {
    true
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(SecretString::from(value.unwrap_or_default()))
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(SecretString::from))
}

// Hosts send an empty string for an unset file field.
fn deserialize_optional_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from))
}

impl ConnectorConfig {
    /// Create a configuration with basic auth credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the server URL cannot be normalized.
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            server_url: server_url.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            verify_ssl: default_verify_ssl(),
            pfx_path: None,
            pfx_password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            filter_normalization: FilterNormalization::default(),
        };

        config.check()?;
        Ok(config)
    }

    /// Parse the configuration mapping handed over by the hosting platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if fields are missing, mistyped, or invalid.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Validate field ranges and the server URL.
    ///
    /// The `with_*` setters do not validate, so anything built from a
    /// modified configuration runs this again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first invalid field.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        self.base_url()?;
        Ok(())
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Authenticate with a PKCS12 client certificate bundle.
    #[must_use]
    pub fn with_client_certificate(
        mut self,
        pfx_path: impl Into<PathBuf>,
        pfx_password: Option<String>,
    ) -> Self {
        self.pfx_path = Some(pfx_path.into());
        self.pfx_password = pfx_password.map(SecretString::from);
        self
    }

    /// Set the connect timeout in seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Set the total request timeout in seconds.
    #[must_use]
    pub const fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the multi-value filter flattening policy.
    #[must_use]
    pub const fn with_filter_normalization(mut self, policy: FilterNormalization) -> Self {
        self.filter_normalization = policy;
        self
    }

    /// Get the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Path of the client certificate bundle, if configured.
    #[must_use]
    pub fn pfx_path(&self) -> Option<&Path> {
        self.pfx_path.as_deref()
    }

    /// Fully-qualified API base URL, always ending in [`API_BASE_PATH`].
    ///
    /// `https://` is assumed when the server URL carries no scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting URL cannot be parsed.
    pub fn base_url(&self) -> Result<Url, Error> {
        let trimmed = self.server_url.trim().trim_matches('/');
        let url = if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            format!("{trimmed}{API_BASE_PATH}")
        } else {
            format!("https://{trimmed}{API_BASE_PATH}")
        };

        let parsed = Url::parse(&url)?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(Error::ConfigError(format!(
                "Invalid server URL: {}",
                self.server_url
            )));
        }
        Ok(parsed)
    }
}
