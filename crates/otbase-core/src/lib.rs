//! # otbase-core
//!
//! Core types and utilities for talking to an OT Base inventory server.
//!
//! This crate provides the payload sanitizer, query encoding, connector
//! configuration, error handling, and the HTTP service client that the
//! operation layer in `otbase-inventory` builds on.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and structured error responses
//! - [`sanitize`] - Recursive removal of empty fields from request payloads
//! - [`query`] - Flattening of sanitized payloads into URL query pairs
//! - [`config`] - Connector configuration supplied by the hosting platform
//! - [`client`] - HTTP client with auth transport selection and response mapping

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod sanitize;

pub use client::{ApiResponse, AuthTransport, RawResponse, ServiceClient, ServiceClientBuilder};
pub use config::{ConnectorConfig, FilterNormalization};
pub use error::{Error, ErrorResponse, Result};
pub use query::QueryParams;
pub use sanitize::{sanitize, Sanitizer};
