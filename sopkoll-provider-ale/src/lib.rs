//! Provider implementation for Ale kommun using the EDP FutureWeb
//! `SimpleWastePickup` API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use sopkoll_core::{
    model::{
        Address, AddressId, MunicipalityId, MunicipalityMeta, ScheduleResponse,
        strip_disambiguator,
    },
    plugin::MunicipalityPlugin,
    ports::{AddressPort, AddressQuery, HttpGateway, PortError, SchedulePort},
};

const BASE_URL: &str = "https://edp.ale.se/FutureWeb/SimpleWastePickup";

/// URL fragment identifying this provider's API requests, used by the
/// offline cache policy to tell API responses from other assets.
pub const API_MARKER: &str = "/SimpleWastePickup/";

/// Response wrapper from `SearchAdress`.
///
/// The endpoint name really is spelled with one "d" upstream.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Succeeded")]
    succeeded: bool,
    #[serde(rename = "Buildings", default)]
    buildings: Vec<String>,
}

/// Address search implementation for Ale kommun.
pub struct AleAddressPort {
    gateway: Arc<dyn HttpGateway>,
    meta: MunicipalityMeta,
}

impl AleAddressPort {
    /// Create a new address port bound to the given HTTP gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn HttpGateway>) -> Self {
        Self {
            gateway,
            meta: municipality_meta(),
        }
    }
}

#[async_trait]
impl AddressPort for AleAddressPort {
    fn municipality(&self) -> &MunicipalityMeta {
        &self.meta
    }

    async fn search(&self, query: &AddressQuery) -> Result<Vec<Address>, PortError> {
        if query.is_too_short() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({ "searchText": query.text.trim() });
        let response = self
            .gateway
            .post_json(&format!("{BASE_URL}/SearchAdress"), &body)
            .await?;

        if !response.is_success() {
            return Err(PortError::Upstream {
                status: response.status,
            });
        }

        let decoded: SearchResponse = serde_json::from_str(&response.body)?;
        if !decoded.succeeded {
            return Ok(Vec::new());
        }

        Ok(decoded
            .buildings
            .into_iter()
            .map(|building| {
                let label = strip_disambiguator(&building);
                Address {
                    id: AddressId(building),
                    municipality: self.meta.id.clone(),
                    label,
                }
            })
            .collect())
    }
}

/// Pickup schedule implementation for Ale kommun.
pub struct AleSchedulePort {
    gateway: Arc<dyn HttpGateway>,
    meta: MunicipalityMeta,
}

impl AleSchedulePort {
    /// Create a new schedule port bound to the given HTTP gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn HttpGateway>) -> Self {
        Self {
            gateway,
            meta: municipality_meta(),
        }
    }
}

#[async_trait]
impl SchedulePort for AleSchedulePort {
    fn municipality(&self) -> &MunicipalityMeta {
        &self.meta
    }

    async fn schedule(&self, address: &AddressId) -> Result<ScheduleResponse, PortError> {
        let url = schedule_url(&address.0)?;
        let response = self.gateway.get(&url).await?;

        if !response.is_success() {
            return Err(PortError::Upstream {
                status: response.status,
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}

/// Build the plugin bundle for the Ale provider.
#[must_use]
pub fn plugin(gateway: Arc<dyn HttpGateway>) -> MunicipalityPlugin {
    let address_port = Arc::new(AleAddressPort::new(Arc::clone(&gateway)));
    let schedule_port = Arc::new(AleSchedulePort::new(gateway));

    MunicipalityPlugin {
        meta: municipality_meta(),
        address_port,
        schedule_port,
    }
}

fn municipality_meta() -> MunicipalityMeta {
    MunicipalityMeta {
        id: MunicipalityId(String::from("ale")),
        name: String::from("Ale kommun"),
    }
}

// The schedule lookup wants the full address string, disambiguator included,
// percent-encoded into the query.
fn schedule_url(address: &str) -> Result<String, PortError> {
    reqwest::Url::parse_with_params(
        &format!("{BASE_URL}/GetWastePickupSchedule"),
        &[("address", address)],
    )
    .map(String::from)
    .map_err(|err| PortError::Internal(err.to_string()))
}
