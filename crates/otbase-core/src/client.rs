//! HTTP client for the OT Base REST API.
//!
//! [`ServiceClient`] owns everything that stays fixed for a connector
//! instance: the API base URL, basic auth credentials, TLS policy, timeouts and
//! the auth transport (plain basic auth, or basic auth over a PKCS12 client
//! certificate). Each call maps the HTTP outcome onto [`ApiResponse`] or a
//! uniform [`Error`].

use crate::config::ConnectorConfig;
use crate::query::QueryParams;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Identity, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How requests authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTransport {
    /// HTTP basic auth only
    Basic,
    /// HTTP basic auth over a TLS session presenting a PKCS12 client certificate
    ClientCertificate {
        /// Location of the certificate bundle
        pfx_path: PathBuf,
    },
}

/// Non-JSON response returned to the caller as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawResponse {
    /// HTTP status code
    pub status_code: u16,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// True for 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

/// Result of a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Decoded JSON body of a 2xx response
    Json(Value),
    /// 2xx response without a JSON body, or a 404
    Raw(RawResponse),
}

impl ApiResponse {
    /// True unless this is a raw non-2xx response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        match self {
            Self::Json(_) => true,
            Self::Raw(raw) => raw.is_success(),
        }
    }

    /// True if the server answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Raw(raw) if raw.is_not_found())
    }

    /// Borrow the JSON body, if any.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Convert into the JSON value handed back to the host.
    ///
    /// Raw responses become `{"status_code", "content_type", "body"}`.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Raw(raw) => json!({
                "status_code": raw.status_code,
                "content_type": raw.content_type,
                "body": raw.body,
            }),
        }
    }
}

struct ClientCertificate {
    path: PathBuf,
    password: Option<SecretString>,
}

/// Builder for [`ServiceClient`].
pub struct ServiceClientBuilder {
    base_url: Url,
    username: String,
    password: SecretString,
    verify_ssl: bool,
    client_certificate: Option<ClientCertificate>,
    connect_timeout: Duration,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ServiceClientBuilder {
    /// Create a builder for an already-qualified API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let raw = base_url.as_ref();
        let base_url = if raw.ends_with('/') {
            Url::parse(raw)?
        } else {
            Url::parse(&format!("{raw}/"))?
        };

        Ok(Self {
            base_url,
            username: String::new(),
            password: SecretString::from(String::new()),
            verify_ssl: true,
            client_certificate: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: None,
        })
    }

    /// Create a builder from the connector configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range or the server
    /// URL cannot be normalized.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        config.check()?;
        let mut builder = Self::new(config.base_url()?)?
            .with_basic_auth(&config.username, config.password.expose_secret())
            .with_verify_ssl(config.verify_ssl)
            .with_timeouts(config.connect_timeout(), config.request_timeout());

        if let Some(path) = config.pfx_path() {
            builder = builder.with_client_certificate(
                path,
                config.pfx_password.as_ref().map(|p| p.expose_secret()),
            );
        }

        Ok(builder)
    }

    /// Configure HTTP basic authentication credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: &str) -> Self {
        self.username = username.into();
        self.password = SecretString::from(password.to_owned());
        self
    }

    /// Present a PKCS12 client certificate on every connection.
    #[must_use]
    pub fn with_client_certificate(
        mut self,
        path: impl Into<PathBuf>,
        password: Option<&str>,
    ) -> Self {
        self.client_certificate = Some(ClientCertificate {
            path: path.into(),
            password: password.map(|p| SecretString::from(p.to_owned())),
        });
        self
    }

    /// Set whether to verify the server certificate.
    #[must_use]
    pub const fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Set the connect and total request timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.connect_timeout = connect;
        self.timeout = total;
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the certificate bundle cannot be read or
    /// decoded, or the HTTP client cannot be created.
    pub fn build(self) -> Result<ServiceClient> {
        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers())
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!self.verify_ssl);

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let transport = match &self.client_certificate {
            Some(certificate) => {
                let identity = load_identity(&certificate.path, certificate.password.as_ref())?;
                tracing::debug!(
                    pfx_path = %certificate.path.display(),
                    "Loaded client certificate bundle"
                );
                builder = builder.use_native_tls().identity(identity);
                AuthTransport::ClientCertificate {
                    pfx_path: certificate.path.clone(),
                }
            }
            None => AuthTransport::Basic,
        };

        let http = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(ServiceClient {
            http,
            base_url: self.base_url,
            username: self.username,
            password: Arc::new(self.password),
            transport,
        })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn load_identity(path: &Path, password: Option<&SecretString>) -> Result<Identity> {
    let der = std::fs::read(path).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read client certificate {}: {e}",
            path.display()
        ))
    })?;
    let password = password.map_or("", |p| p.expose_secret());
    Identity::from_pkcs12_der(&der, password).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to load client certificate {}: {e}",
            path.display()
        ))
    })
}

/// HTTP client bound to one OT Base server.
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: Arc<SecretString>,
    transport: AuthTransport,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl ServiceClient {
    /// Build a client straight from the connector configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot produce a working client.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        ServiceClientBuilder::from_config(config)?.build()
    }

    /// Return the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Return the auth transport selected at construction.
    #[must_use]
    pub const fn auth_transport(&self) -> &AuthTransport {
        &self.transport
    }

    /// Resolve an endpoint relative to the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint does not form a valid URL.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| Error::InvalidParameter(format!("Invalid endpoint {endpoint}: {e}")))
    }

    /// Call an endpoint below the API base path.
    ///
    /// `params` go to the query string, `body` is sent as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for statuses other than 2xx and 404, and the
    /// transport variants of [`Error`] when no response arrives.
    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
        params: Option<&Map<String, Value>>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint_url(endpoint)?;
        self.send(method, url, body, params).await
    }

    /// Call an absolute URL with the same credentials, bypassing the base path.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceClient::call`], plus [`Error::InvalidParameter`] for an
    /// unparseable URL.
    pub async fn call_absolute(
        &self,
        url: &str,
        method: Method,
        body: Option<&Value>,
        params: Option<&Map<String, Value>>,
    ) -> Result<ApiResponse> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidParameter(format!("Invalid endpoint {url}: {e}")))?;
        self.send(method, url, body, params).await
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        params: Option<&Map<String, Value>>,
    ) -> Result<ApiResponse> {
        tracing::debug!(%method, %url, "Sending OT Base request");

        let mut request = self
            .http
            .request(method, url.clone())
            .basic_auth(&self.username, Some(self.password.expose_secret()));

        if let Some(params) = params {
            let query = QueryParams::from_payload(params);
            if !query.is_empty() {
                request = request.query(query.pairs());
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = Error::from(e);
            tracing::error!(%url, error = %err, "OT Base request failed");
            err
        })?;

        map_response(&url, response).await
    }
}

async fn map_response(url: &Url, response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.map_err(Error::from)?;

    if status.is_success() {
        tracing::info!(%url, status = status.as_u16(), "Successfully got response");
        let is_json = content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json && !body.trim().is_empty() {
            return Ok(ApiResponse::Json(serde_json::from_str(&body)?));
        }
        return Ok(ApiResponse::Raw(RawResponse {
            status_code: status.as_u16(),
            content_type,
            body,
        }));
    }

    if status == StatusCode::NOT_FOUND {
        tracing::warn!(%url, "OT Base resource not found");
        return Ok(ApiResponse::Raw(RawResponse {
            status_code: status.as_u16(),
            content_type,
            body,
        }));
    }

    tracing::error!(%url, status = status.as_u16(), "OT Base returned an error status");
    Err(Error::Api {
        status_code: status.as_u16(),
        body,
    })
}
