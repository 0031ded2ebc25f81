//! Operation handlers and the entry points used by the hosting platform.
//!
//! Every handler takes the connector configuration and the invocation
//! parameters, builds a fresh [`OtBaseClient`], normalizes the parameters it
//! knows about and returns the JSON value handed back to the host.

use crate::client::OtBaseClient;
use crate::models::{
    normalize_filter, take_path_id, CustomEndpointRequest, DeleteConfirmation, Operation, Params,
};
use crate::Result;
use async_trait::async_trait;
use otbase_core::{ConnectorConfig, Error};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

/// Interface the hosting platform drives.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Run a named operation with the host-supplied configuration mapping.
    async fn execute(&self, config: &Value, operation: &str, params: Params) -> Result<Value>;

    /// Verify that the configuration reaches a working server.
    async fn check_health(&self, config: &Value) -> Result<bool>;
}

/// The OT Base inventory connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtBaseInventory;

#[async_trait]
impl Connector for OtBaseInventory {
    async fn execute(&self, config: &Value, operation: &str, params: Params) -> Result<Value> {
        let config = ConnectorConfig::from_value(config.clone())?;
        execute(&config, operation, params).await
    }

    async fn check_health(&self, config: &Value) -> Result<bool> {
        let config = ConnectorConfig::from_value(config.clone()).map_err(|err| {
            tracing::error!(error = %err, "Health check failed");
            Error::HealthCheck
        })?;
        check_health(&config).await
    }
}

/// Dispatch `operation` to its handler.
///
/// # Errors
///
/// Returns [`Error::UnknownOperation`] for names outside the operation table,
/// and whatever the handler fails with otherwise.
pub async fn execute(config: &ConnectorConfig, operation: &str, params: Params) -> Result<Value> {
    let invocation_id = Uuid::new_v4();
    let span = tracing::info_span!("execute", %invocation_id, operation);

    async move {
        tracing::debug!("Invoking operation");
        let result = match operation.parse::<Operation>() {
            Ok(op) => run(config, op, params).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            tracing::error!(error = %err, code = err.error_code(), "Operation failed");
        }
        result
    }
    .instrument(span)
    .await
}

/// Run an already-resolved operation.
///
/// # Errors
///
/// Returns the handler's error.
pub async fn run(config: &ConnectorConfig, operation: Operation, params: Params) -> Result<Value> {
    match operation {
        Operation::GetDevicesList => get_devices_list(config, params).await,
        Operation::GetDeviceDetails => get_device_details(config, params).await,
        Operation::DeleteDeviceDetails => delete_device_details(config, params).await,
        Operation::GetVulnerabilitiesList => get_vulnerabilities_list(config, params).await,
        Operation::GetVulnerabilityDetails => get_vulnerability_details(config, params).await,
        Operation::GetDataFlow => get_data_flow(config, params).await,
        Operation::GetNetworkList => get_network_list(config, params).await,
        Operation::GetNetworkDetails => get_network_details(config, params).await,
        Operation::CustomEndpoint => custom_endpoint(config, params).await,
    }
}

/// Check the server by listing devices without filters.
///
/// Every failure, including a non-2xx raw response, is reported as
/// [`Error::HealthCheck`].
///
/// # Errors
///
/// Returns [`Error::HealthCheck`] whenever the device listing does not succeed.
pub async fn check_health(config: &ConnectorConfig) -> Result<bool> {
    let listing = async {
        let client = OtBaseClient::from_config(config)?;
        client.list_devices(&Params::new()).await
    };

    match listing.await {
        Ok(response) if response.is_success() => Ok(true),
        Ok(response) => {
            let status = response.into_value()["status_code"].clone();
            tracing::error!(%status, "Health check failed");
            Err(Error::HealthCheck)
        }
        Err(err) => {
            tracing::error!(error = %err, "Health check failed");
            Err(Error::HealthCheck)
        }
    }
}

/// `get_devices_list`: filters in `params`, `include` flattened.
pub async fn get_devices_list(config: &ConnectorConfig, mut params: Params) -> Result<Value> {
    normalize_filter(&mut params, "include", config.filter_normalization);
    let client = OtBaseClient::from_config(config)?;
    Ok(client.list_devices(&params).await?.into_value())
}

/// `get_device_details`: requires `device_id`, `include` flattened.
pub async fn get_device_details(config: &ConnectorConfig, mut params: Params) -> Result<Value> {
    let device_id = take_path_id(&mut params, "device_id")?;
    normalize_filter(&mut params, "include", config.filter_normalization);
    let client = OtBaseClient::from_config(config)?;
    Ok(client.get_device(&device_id, &params).await?.into_value())
}

/// `delete_device_details`: requires `device_id`.
///
/// A successful deletion yields a confirmation message; a 404 is returned as
/// the raw response.
pub async fn delete_device_details(config: &ConnectorConfig, mut params: Params) -> Result<Value> {
    let device_id = take_path_id(&mut params, "device_id")?;
    let client = OtBaseClient::from_config(config)?;
    let response = client.delete_device(&device_id).await?;

    if response.is_success() {
        tracing::info!(%device_id, "Deleted device");
        Ok(DeleteConfirmation::for_device(&device_id).into_value())
    } else {
        Ok(response.into_value())
    }
}

/// `get_vulnerabilities_list`: filters in `params`, `priority` flattened.
pub async fn get_vulnerabilities_list(
    config: &ConnectorConfig,
    mut params: Params,
) -> Result<Value> {
    normalize_filter(&mut params, "priority", config.filter_normalization);
    let client = OtBaseClient::from_config(config)?;
    Ok(client.list_vulnerabilities(&params).await?.into_value())
}

/// `get_vulnerability_details`: requires `cve_id`.
pub async fn get_vulnerability_details(
    config: &ConnectorConfig,
    mut params: Params,
) -> Result<Value> {
    let cve_id = take_path_id(&mut params, "cve_id")?;
    let client = OtBaseClient::from_config(config)?;
    Ok(client.get_vulnerability(&cve_id).await?.into_value())
}

/// `get_data_flow`: filters in `params`.
pub async fn get_data_flow(config: &ConnectorConfig, params: Params) -> Result<Value> {
    let client = OtBaseClient::from_config(config)?;
    Ok(client.get_data_flow(&params).await?.into_value())
}

/// `get_network_list`: filters in `params`.
pub async fn get_network_list(config: &ConnectorConfig, params: Params) -> Result<Value> {
    let client = OtBaseClient::from_config(config)?;
    Ok(client.list_networks(&params).await?.into_value())
}

/// `get_network_details`: requires `network_id`.
pub async fn get_network_details(config: &ConnectorConfig, mut params: Params) -> Result<Value> {
    let network_id = take_path_id(&mut params, "network_id")?;
    let client = OtBaseClient::from_config(config)?;
    Ok(client.get_network(&network_id).await?.into_value())
}

/// `custom_endpoint`: `endpoint`, optional `method` and `body`.
pub async fn custom_endpoint(config: &ConnectorConfig, params: Params) -> Result<Value> {
    let request = CustomEndpointRequest::from_params(&params)?;
    let client = OtBaseClient::from_config(config)?;
    Ok(client.custom_request(&request).await?.into_value())
}
