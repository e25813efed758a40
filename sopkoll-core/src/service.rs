//! High-level service facade combining providers, transformer, and store.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::model::{
    Address, AddressId, CachedSchedule, GroupedSchedule, MunicipalityId, ScheduleResponse,
    WasteScheduleItem,
};
use crate::plugin::PluginRegistry;
use crate::ports::{AddressQuery, PortError};
use crate::store::{ADDRESS_KEY, KeyValueStore, SCHEDULE_CACHE_KEY, StoreError};
use crate::transform::{TransformError, group_by_date, parse_schedule};

#[derive(thiserror::Error, Debug)]
/// Errors surfaced by the service facade.
pub enum ServiceError {
    /// A provider call failed.
    #[error(transparent)]
    Port(#[from] PortError),
    /// The persistence store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The fetched schedule could not be transformed.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where a returned schedule came from.
pub enum ScheduleSource {
    /// Fresh from the network.
    Live,
    /// Recovered from the local cache after a failed fetch.
    Cached {
        /// When the cached data was originally fetched.
        fetched_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
/// A transformed schedule plus its provenance.
pub struct ScheduleFetch {
    /// Flat items, sorted by pickup instant.
    pub items: Vec<WasteScheduleItem>,
    /// Items grouped per calendar date.
    pub grouped: Vec<GroupedSchedule>,
    /// Whether the data is live or a stale fallback.
    pub source: ScheduleSource,
}

/// Public entry point for searching addresses and loading schedules.
pub struct SopkollService {
    registry: Arc<PluginRegistry>,
    store: Arc<dyn KeyValueStore>,
}

impl SopkollService {
    /// Create a new service bound to the provided registry and store.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { registry, store }
    }

    /// List all available municipalities and their display names.
    #[must_use]
    pub fn municipalities(&self) -> Vec<(MunicipalityId, String)> {
        self.registry
            .municipalities()
            .into_iter()
            .map(|meta| (meta.id, meta.name))
            .collect()
    }

    /// Search for addresses in the given municipality.
    ///
    /// Queries below the minimum length short-circuit to an empty result
    /// without touching the network.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the municipality is unsupported or the
    /// provider call fails.
    pub async fn search_addresses(
        &self,
        municipality: MunicipalityId,
        query: AddressQuery,
    ) -> Result<Vec<Address>, PortError> {
        if query.is_too_short() {
            return Ok(Vec::new());
        }
        let plugin = self.registry.plugin(&municipality)?;
        plugin.address_port.search(&query).await
    }

    /// Load and transform the pickup schedule for an address.
    ///
    /// Network-first: a successful fetch overwrites the persisted cache and
    /// returns [`ScheduleSource::Live`]. On failure the persisted cache is
    /// consulted; it is only reused when its stored address equals the
    /// requested one, in which case the stale data is returned with
    /// [`ScheduleSource::Cached`]. Otherwise the original failure is
    /// surfaced.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] when the fetch fails without a usable
    /// cache entry, or when the schedule cannot be transformed.
    pub async fn schedule_for(
        &self,
        municipality: MunicipalityId,
        address: &AddressId,
    ) -> Result<ScheduleFetch, ServiceError> {
        let plugin = self.registry.plugin(&municipality)?;
        let now = Local::now().naive_local();

        match plugin.schedule_port.schedule(address).await {
            Ok(data) => {
                self.cache_schedule(address, &data);
                let items = parse_schedule(&data.services, now)?;
                let grouped = group_by_date(items.clone());
                Ok(ScheduleFetch {
                    items,
                    grouped,
                    source: ScheduleSource::Live,
                })
            }
            Err(err) => {
                let Some(cached) = self.cached_schedule_for(address) else {
                    return Err(err.into());
                };
                tracing::info!(address = %address.0, "schedule fetch failed, serving stale cache");
                let items = parse_schedule(&cached.data.services, now)?;
                let grouped = group_by_date(items.clone());
                Ok(ScheduleFetch {
                    items,
                    grouped,
                    source: ScheduleSource::Cached {
                        fetched_at: cached.fetched_at,
                    },
                })
            }
        }
    }

    /// Last address the user selected, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store read fails.
    pub fn last_address(&self) -> Result<Option<String>, StoreError> {
        self.store.get(ADDRESS_KEY)
    }

    /// Persist the selected address.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store write fails.
    pub fn set_address(&self, address: &str) -> Result<(), StoreError> {
        self.store.set(ADDRESS_KEY, address)
    }

    /// Forget the selected address.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store write fails.
    pub fn clear_address(&self) -> Result<(), StoreError> {
        self.store.remove(ADDRESS_KEY)
    }

    /// Direct access to the underlying store, for frontend-owned keys.
    #[must_use]
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    // Cache writes are best effort: losing the fallback copy must never fail
    // a successful fetch.
    fn cache_schedule(&self, address: &AddressId, data: &ScheduleResponse) {
        let cached = CachedSchedule {
            address: address.0.clone(),
            data: data.clone(),
            fetched_at: Utc::now(),
        };
        match serde_json::to_string(&cached) {
            Ok(json) => {
                if let Err(err) = self.store.set(SCHEDULE_CACHE_KEY, &json) {
                    tracing::warn!(%err, "failed to persist schedule cache");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to encode schedule cache"),
        }
    }

    fn cached_schedule_for(&self, address: &AddressId) -> Option<CachedSchedule> {
        let raw = self.store.get(SCHEDULE_CACHE_KEY).ok().flatten()?;
        let cached: CachedSchedule = serde_json::from_str(&raw).ok()?;
        (cached.address == address.0).then_some(cached)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{ScheduleSource, SopkollService};
    use crate::model::{
        Address, AddressId, CachedSchedule, MunicipalityId, MunicipalityMeta, RawPickupRecord,
        ScheduleResponse,
    };
    use crate::plugin::{MunicipalityPlugin, PluginRegistry};
    use crate::ports::{AddressPort, AddressQuery, PortError, SchedulePort};
    use crate::store::{KeyValueStore, MemoryStore, SCHEDULE_CACHE_KEY};

    fn meta() -> MunicipalityMeta {
        MunicipalityMeta {
            id: MunicipalityId("ale".to_owned()),
            name: "Ale kommun".to_owned(),
        }
    }

    fn sample_response() -> ScheduleResponse {
        ScheduleResponse {
            services: vec![
                RawPickupRecord {
                    waste_type: "Restavfall".to_owned(),
                    next_pickup: "2099-01-20T00:00:00".to_owned(),
                    frequency: "Varannan vecka".to_owned(),
                    bin: None,
                },
                RawPickupRecord {
                    waste_type: "Matavfall".to_owned(),
                    next_pickup: "2099-01-08T00:00:00".to_owned(),
                    frequency: "Varje vecka".to_owned(),
                    bin: None,
                },
            ],
        }
    }

    struct ScriptedSchedulePort {
        meta: MunicipalityMeta,
        responses: Mutex<VecDeque<Result<ScheduleResponse, PortError>>>,
    }

    impl ScriptedSchedulePort {
        fn new(responses: Vec<Result<ScheduleResponse, PortError>>) -> Self {
            Self {
                meta: meta(),
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl SchedulePort for ScriptedSchedulePort {
        fn municipality(&self) -> &MunicipalityMeta {
            &self.meta
        }

        async fn schedule(&self, _address: &AddressId) -> Result<ScheduleResponse, PortError> {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(Err(PortError::Upstream { status: 500 }))
        }
    }

    struct CountingAddressPort {
        meta: MunicipalityMeta,
        calls: AtomicUsize,
    }

    impl CountingAddressPort {
        fn new() -> Self {
            Self {
                meta: meta(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AddressPort for CountingAddressPort {
        fn municipality(&self) -> &MunicipalityMeta {
            &self.meta
        }

        async fn search(&self, query: &AddressQuery) -> Result<Vec<Address>, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Address {
                id: AddressId(format!("{} 1 (Test)", query.text)),
                municipality: self.meta.id.clone(),
                label: format!("{} 1", query.text),
            }])
        }
    }

    fn service_with(
        schedule_results: Vec<Result<ScheduleResponse, PortError>>,
        store: Arc<dyn KeyValueStore>,
    ) -> (SopkollService, Arc<CountingAddressPort>) {
        let address_port = Arc::new(CountingAddressPort::new());
        let plugin = MunicipalityPlugin {
            meta: meta(),
            address_port: Arc::clone(&address_port) as Arc<dyn AddressPort>,
            schedule_port: Arc::new(ScriptedSchedulePort::new(schedule_results)),
        };
        let registry = Arc::new(PluginRegistry::new(vec![plugin]));
        (SopkollService::new(registry, store), address_port)
    }

    #[tokio::test]
    async fn short_queries_never_touch_the_network() {
        let (service, port) = service_with(Vec::new(), Arc::new(MemoryStore::new()));

        let results = service
            .search_addresses(meta().id, AddressQuery::new("S"))
            .await
            .expect("short query succeeds");

        assert!(results.is_empty());
        assert_eq!(port.calls.load(Ordering::SeqCst), 0);

        let results = service
            .search_addresses(meta().id, AddressQuery::new("St"))
            .await
            .expect("search succeeds");
        assert_eq!(results.len(), 1);
        assert_eq!(port.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn live_fetch_transforms_and_caches() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let (service, _port) = service_with(
            vec![Ok(sample_response())],
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
        );

        let fetch = service
            .schedule_for(meta().id, &AddressId("Storgatan 1".to_owned()))
            .await
            .expect("live fetch succeeds");

        assert_eq!(fetch.source, ScheduleSource::Live);
        assert_eq!(fetch.items.len(), 2);
        assert_eq!(fetch.items[0].waste_type, "Matavfall");

        let raw = store
            .get(SCHEDULE_CACHE_KEY)
            .expect("store read")
            .expect("cache entry written");
        let cached: CachedSchedule = serde_json::from_str(&raw).expect("cache decodes");
        assert_eq!(cached.address, "Storgatan 1");
        assert_eq!(cached.data, sample_response());
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_cache_for_same_address() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let cached = CachedSchedule {
            address: "Storgatan 1".to_owned(),
            data: sample_response(),
            fetched_at: Utc::now(),
        };
        store
            .set(
                SCHEDULE_CACHE_KEY,
                &serde_json::to_string(&cached).expect("encode"),
            )
            .expect("seed cache");

        let (service, _port) = service_with(
            vec![Err(PortError::Upstream { status: 502 })],
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
        );

        let fetch = service
            .schedule_for(meta().id, &AddressId("Storgatan 1".to_owned()))
            .await
            .expect("fallback succeeds");

        assert!(matches!(fetch.source, ScheduleSource::Cached { .. }));
        assert_eq!(fetch.items.len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_for_other_address_is_a_blocking_error() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let cached = CachedSchedule {
            address: "Storgatan 1".to_owned(),
            data: sample_response(),
            fetched_at: Utc::now(),
        };
        store
            .set(
                SCHEDULE_CACHE_KEY,
                &serde_json::to_string(&cached).expect("encode"),
            )
            .expect("seed cache");

        let (service, _port) = service_with(
            vec![Err(PortError::Upstream { status: 502 })],
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
        );

        let result = service
            .schedule_for(meta().id, &AddressId("Kungsgatan 2".to_owned()))
            .await;

        assert!(result.is_err(), "cache for another address must not leak");
    }

    #[tokio::test]
    async fn refresh_overwrites_the_cached_schedule() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let mut second = sample_response();
        second.services.truncate(1);

        let (service, _port) = service_with(
            vec![Ok(sample_response()), Ok(second.clone())],
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
        );

        let address = AddressId("Storgatan 1".to_owned());
        let first_fetch = service
            .schedule_for(meta().id, &address)
            .await
            .expect("first fetch");
        assert_eq!(first_fetch.items.len(), 2);

        let second_fetch = service
            .schedule_for(meta().id, &address)
            .await
            .expect("second fetch");
        assert_eq!(second_fetch.items.len(), 1);

        let raw = store
            .get(SCHEDULE_CACHE_KEY)
            .expect("store read")
            .expect("cache entry");
        let cached: CachedSchedule = serde_json::from_str(&raw).expect("decode");
        assert_eq!(cached.data, second, "latest fetch wins in the cache");
    }

    #[test]
    fn address_persistence_round_trip() {
        let (service, _port) = service_with(Vec::new(), Arc::new(MemoryStore::new()));

        assert_eq!(service.last_address().expect("read"), None);
        service.set_address("Storgatan 1 (Lgh 2)").expect("write");
        assert_eq!(
            service.last_address().expect("read"),
            Some("Storgatan 1 (Lgh 2)".to_owned())
        );
        service.clear_address().expect("clear");
        assert_eq!(service.last_address().expect("read"), None);
    }
}
