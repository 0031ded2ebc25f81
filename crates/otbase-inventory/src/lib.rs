//! OT Base inventory connector.
//!
//! Exposes the OT Base asset-inventory REST API as a fixed set of named
//! operations (devices, vulnerabilities, networks, data flow and a custom
//! endpoint escape hatch) for a connector-hosting automation platform.
//!
//! The host calls [`Connector::execute`] with an operation name and a
//! parameter map, or [`Connector::check_health`] to verify the configuration.

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod operations;

pub use client::{OtBaseClient, OtBaseClientBuilder};
pub use models::{CustomEndpointRequest, DeleteConfirmation, Operation, Params};
pub use operations::{check_health, execute, Connector, OtBaseInventory};

/// Convenient result alias that reuses the shared OT Base error type.
pub type Result<T> = otbase_core::Result<T>;
