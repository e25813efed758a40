//! Traits describing gateway capabilities and shared helper types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{Address, AddressId, GatewayResponse, MunicipalityMeta, ScheduleResponse};

/// Minimum query length before an address search touches the network.
pub const MIN_QUERY_LEN: usize = 2;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Failed to decode a provider response body.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Upstream answered with a non-success status, relayed as-is.
    #[error("Upstream error status: {status}")]
    Upstream {
        /// HTTP status code from the upstream API.
        status: u16,
    },
    /// The municipality has no registered plugin.
    #[error("Unsupported municipality")]
    UnsupportedMunicipality,
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
/// Query parameters for searching addresses.
pub struct AddressQuery {
    /// Partial address text to look up.
    pub text: String,
}

impl AddressQuery {
    /// Construct a new search query.
    #[must_use]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }

    /// Check if the query is below the minimum search length.
    ///
    /// Too-short queries short-circuit to an empty result without any
    /// network call.
    #[must_use]
    pub fn is_too_short(&self) -> bool {
        self.text.trim().chars().count() < MIN_QUERY_LEN
    }
}

#[async_trait]
/// Low-level HTTP seam the providers talk through.
///
/// A *completed* exchange always yields `Ok` with the status preserved in
/// the response; `Err` is reserved for transport-level failures. This is the
/// seam the offline cache policy wraps.
pub trait HttpGateway: Send + Sync {
    /// Perform a GET request.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails at the network level.
    async fn get(&self, url: &str) -> Result<GatewayResponse, PortError>;

    /// Perform a POST request with a JSON body. Never intercepted or cached.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails at the network level.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<GatewayResponse, PortError>;
}

#[async_trait]
/// Trait for provider-specific address search backends.
pub trait AddressPort: Send + Sync {
    /// Metadata describing the municipality handled by this port.
    fn municipality(&self) -> &MunicipalityMeta;

    /// Perform an address search within the municipality.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails.
    async fn search(&self, query: &AddressQuery) -> Result<Vec<Address>, PortError>;
}

#[async_trait]
/// Trait for provider-specific pickup schedule backends.
pub trait SchedulePort: Send + Sync {
    /// Metadata describing the municipality handled by this port.
    fn municipality(&self) -> &MunicipalityMeta;

    /// Fetch the raw pickup schedule for an address.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or the
    /// upstream answers with an error status.
    async fn schedule(&self, address: &AddressId) -> Result<ScheduleResponse, PortError>;
}
