//! Asynchronous OT Base inventory client.

use crate::models::{CustomEndpointRequest, Params};
use crate::Result;
use otbase_core::client::{ApiResponse, ServiceClient, ServiceClientBuilder};
use otbase_core::{ConnectorConfig, Sanitizer};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("otbase-inventory/", env!("CARGO_PKG_VERSION"));

/// Builder for [`OtBaseClient`].
pub struct OtBaseClientBuilder {
    inner: ServiceClientBuilder,
    sanitizer: Sanitizer,
}

impl OtBaseClientBuilder {
    /// Create a builder for an already-qualified API base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let inner = ServiceClientBuilder::new(base_url)?.with_user_agent(USER_AGENT);
        Ok(Self {
            inner,
            sanitizer: Sanitizer::otbase(),
        })
    }

    /// Create a builder from the connector configuration.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        let inner = ServiceClientBuilder::from_config(config)?.with_user_agent(USER_AGENT);
        Ok(Self {
            inner,
            sanitizer: Sanitizer::otbase(),
        })
    }

    /// Configure HTTP basic authentication credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: &str) -> Self {
        self.inner = self.inner.with_basic_auth(username, password);
        self
    }

    /// Present a PKCS12 client certificate on every connection.
    #[must_use]
    pub fn with_client_certificate(
        mut self,
        path: impl Into<PathBuf>,
        password: Option<&str>,
    ) -> Self {
        self.inner = self.inner.with_client_certificate(path, password);
        self
    }

    /// Set whether to verify the server certificate.
    #[must_use]
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.inner = self.inner.with_verify_ssl(verify);
        self
    }

    /// Set the connect and total request timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.inner = self.inner.with_timeouts(connect, total);
        self
    }

    /// Replace the payload sanitizer.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<OtBaseClient> {
        let inner = self.inner.build()?;
        Ok(OtBaseClient {
            inner,
            sanitizer: self.sanitizer,
        })
    }
}

/// Asynchronous OT Base inventory client.
#[derive(Debug, Clone)]
pub struct OtBaseClient {
    inner: ServiceClient,
    sanitizer: Sanitizer,
}

impl OtBaseClient {
    /// Construct a client from the connector configuration.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        OtBaseClientBuilder::from_config(config)?.build()
    }

    /// Return the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// List devices matching the filters in `params`.
    pub async fn list_devices(&self, params: &Params) -> Result<ApiResponse> {
        self.get("devices", params).await
    }

    /// Fetch one device.
    pub async fn get_device(&self, device_id: &str, params: &Params) -> Result<ApiResponse> {
        self.get(&format!("devices/{device_id}"), params).await
    }

    /// Delete one device.
    pub async fn delete_device(&self, device_id: &str) -> Result<ApiResponse> {
        self.inner
            .call(&format!("devices/{device_id}"), Method::DELETE, None, None)
            .await
    }

    /// List vulnerabilities matching the filters in `params`.
    pub async fn list_vulnerabilities(&self, params: &Params) -> Result<ApiResponse> {
        self.get("vulnerabilities", params).await
    }

    /// Fetch one vulnerability by CVE id.
    pub async fn get_vulnerability(&self, cve_id: &str) -> Result<ApiResponse> {
        self.inner
            .call(&format!("vulnerabilities/{cve_id}"), Method::GET, None, None)
            .await
    }

    /// Fetch data flow records matching the filters in `params`.
    pub async fn get_data_flow(&self, params: &Params) -> Result<ApiResponse> {
        self.get("dataflow", params).await
    }

    /// List networks matching the filters in `params`.
    pub async fn list_networks(&self, params: &Params) -> Result<ApiResponse> {
        self.get("networks", params).await
    }

    /// Fetch one network.
    pub async fn get_network(&self, network_id: &str) -> Result<ApiResponse> {
        self.inner
            .call(&format!("networks/{network_id}"), Method::GET, None, None)
            .await
    }

    /// Send a caller-defined request.
    ///
    /// Absolute endpoints bypass the API base path; relative ones are resolved
    /// against it. The sanitized body goes to the query string for GET and is
    /// sent as JSON otherwise.
    pub async fn custom_request(&self, request: &CustomEndpointRequest) -> Result<ApiResponse> {
        let payload = self.sanitizer.sanitize(&request.body);
        let (body, query) = if request.method == Method::GET {
            (None, Some(&payload))
        } else {
            (Some(Value::Object(payload.clone())), None)
        };

        if is_absolute(&request.endpoint) {
            self.inner
                .call_absolute(&request.endpoint, request.method.clone(), body.as_ref(), query)
                .await
        } else {
            self.inner
                .call(&request.endpoint, request.method.clone(), body.as_ref(), query)
                .await
        }
    }

    async fn get(&self, endpoint: &str, params: &Params) -> Result<ApiResponse> {
        let payload = self.sanitizer.sanitize(params);
        self.inner
            .call(endpoint, Method::GET, None, Some(&payload))
            .await
    }
}

fn is_absolute(endpoint: &str) -> bool {
    Url::parse(endpoint).is_ok_and(|url| url.has_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use otbase_core::Error;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> OtBaseClient {
        OtBaseClientBuilder::new(format!("{}/ot-base/api/v1", server.uri()))
            .unwrap()
            .with_basic_auth("admin", "secret")
            .build()
            .unwrap()
    }

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn list_devices_sends_sanitized_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ot-base/api/v1/devices"))
            .and(query_param("vendor", "Siemens"))
            .and(query_param("modified", "2023-11-14 22:13:20"))
            .and(query_param_is_missing("site"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "d-1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let response = test_client(&server)
            .list_devices(&params(json!({
                "vendor": "Siemens",
                "site": "",
                "modified": 1_700_000_000
            })))
            .await
            .unwrap();
        assert_eq!(response.into_value(), json!([{"id": "d-1"}]));
    }

    #[tokio::test]
    async fn get_device_uses_id_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ot-base/api/v1/devices/d-42"))
            .and(query_param("include", "nics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "d-42"})))
            .mount(&server)
            .await;

        let response = test_client(&server)
            .get_device("d-42", &params(json!({"include": "nics"})))
            .await
            .unwrap();
        assert_eq!(response.as_json(), Some(&json!({"id": "d-42"})));
    }

    #[tokio::test]
    async fn delete_device_uses_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/ot-base/api/v1/devices/d-42"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let response = test_client(&server).delete_device("d-42").await.unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn vulnerability_and_network_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ot-base/api/v1/vulnerabilities/CVE-2021-44228"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cve": "CVE-2021-44228"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ot-base/api/v1/networks/12"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let vuln = client.get_vulnerability("CVE-2021-44228").await.unwrap();
        assert_eq!(vuln.into_value()["cve"], json!("CVE-2021-44228"));

        let network = client.get_network("12").await.unwrap();
        assert!(network.is_not_found());
    }

    #[tokio::test]
    async fn list_endpoints_hit_their_paths() {
        let server = MockServer::start().await;
        for endpoint in ["vulnerabilities", "dataflow", "networks"] {
            Mock::given(method("GET"))
                .and(path(format!("/ot-base/api/v1/{endpoint}").as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"source": endpoint})))
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = test_client(&server);
        let empty = Params::new();
        assert_eq!(
            client.list_vulnerabilities(&empty).await.unwrap().into_value(),
            json!({"source": "vulnerabilities"})
        );
        assert_eq!(
            client.get_data_flow(&empty).await.unwrap().into_value(),
            json!({"source": "dataflow"})
        );
        assert_eq!(
            client.list_networks(&empty).await.unwrap().into_value(),
            json!({"source": "networks"})
        );
    }

    #[tokio::test]
    async fn custom_get_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reports/assets"))
            .and(query_param("site", "plant-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": 1})))
            .mount(&server)
            .await;

        let request = CustomEndpointRequest {
            endpoint: format!("{}/reports/assets", server.uri()),
            method: Method::GET,
            body: params(json!({"site": "plant-1", "zone": null})),
        };
        let response = test_client(&server).custom_request(&request).await.unwrap();
        assert_eq!(response.into_value(), json!({"rows": 1}));
    }

    #[tokio::test]
    async fn custom_post_sends_sanitized_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ot-base/api/v1/devices/search"))
            .and(body_json(json!({"vendor": "Siemens"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 2})))
            .mount(&server)
            .await;

        let request = CustomEndpointRequest {
            endpoint: "devices/search".to_string(),
            method: Method::POST,
            body: params(json!({"vendor": "Siemens", "model": ""})),
        };
        let response = test_client(&server).custom_request(&request).await.unwrap();
        assert_eq!(response.into_value(), json!({"total": 2}));
    }

    #[tokio::test]
    async fn server_error_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .list_devices(&Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(502));
        assert!(matches!(err, Error::Api { .. }));
    }

    #[test]
    fn absolute_endpoint_detection() {
        assert!(is_absolute("https://otbase.local/api"));
        assert!(!is_absolute("devices/search"));
        assert!(!is_absolute("/devices"));
    }
}
