//! Network-first fetch policy with cache fallback.
//!
//! GET requests try the network first; completed responses are copied into
//! the bucket and the live response is returned. Only when the network
//! itself fails does the stored copy come back. Non-GET requests pass
//! through untouched. This is deliberately *not* cache-first or
//! stale-while-revalidate: live data always wins when reachable.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use sopkoll_core::model::GatewayResponse;
use sopkoll_core::ports::{HttpGateway, PortError};

use crate::bucket::CacheBucket;

/// Plain gateway speaking HTTP through a [`reqwest::Client`].
///
/// Completed exchanges always yield `Ok` with the status preserved, so
/// upstream error statuses can be relayed as-is.
pub struct ReqwestGateway {
    client: Client,
}

impl ReqwestGateway {
    /// Create a gateway bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpGateway for ReqwestGateway {
    async fn get(&self, url: &str) -> Result<GatewayResponse, PortError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(GatewayResponse { status, body })
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<GatewayResponse, PortError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(GatewayResponse { status, body })
    }
}

/// Gateway decorator applying the offline cache policy to GET requests.
pub struct OfflineGateway {
    inner: Arc<dyn HttpGateway>,
    bucket: Arc<CacheBucket>,
    api_marker: String,
}

impl OfflineGateway {
    /// Wrap a gateway with the cache policy.
    ///
    /// URLs containing `api_marker` are cached on any completed response;
    /// everything else only on status 200.
    #[must_use]
    pub fn new(
        inner: Arc<dyn HttpGateway>,
        bucket: Arc<CacheBucket>,
        api_marker: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            bucket,
            api_marker: api_marker.into(),
        }
    }
}

#[async_trait]
impl HttpGateway for OfflineGateway {
    async fn get(&self, url: &str) -> Result<GatewayResponse, PortError> {
        match self.inner.get(url).await {
            Ok(response) => {
                let cacheable = if url.contains(&self.api_marker) {
                    true
                } else {
                    response.status == 200
                };
                if cacheable
                    && let Err(err) = self.bucket.put(url, response.clone())
                {
                    tracing::warn!(url, %err, "failed to store response in offline cache");
                }
                Ok(response)
            }
            Err(err) => match self.bucket.lookup(url) {
                Some(stored) => {
                    tracing::debug!(url, "network failed, serving cached response");
                    Ok(stored)
                }
                None => Err(err),
            },
        }
    }

    // Non-GET requests are never intercepted.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<GatewayResponse, PortError> {
        self.inner.post_json(url, body).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use async_trait::async_trait;

    use sopkoll_core::model::GatewayResponse;
    use sopkoll_core::ports::{HttpGateway, PortError};

    use super::OfflineGateway;
    use crate::bucket::{CACHE_NAME, CacheBucket};

    const API_MARKER: &str = "/SimpleWastePickup/";

    struct ScriptedGateway {
        responses: Mutex<VecDeque<Result<GatewayResponse, PortError>>>,
        posts: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<Result<GatewayResponse, PortError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                posts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpGateway for ScriptedGateway {
        async fn get(&self, _url: &str) -> Result<GatewayResponse, PortError> {
            self.responses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(Err(PortError::Internal("script exhausted".to_owned())))
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<GatewayResponse, PortError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            Ok(GatewayResponse {
                status: 200,
                body: "{}".to_owned(),
            })
        }
    }

    fn temp_cache_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sopkoll-policy-{}-{name}", std::process::id()));
        let _ignored = std::fs::remove_dir_all(&dir);
        dir
    }

    fn bucket(dir: &std::path::Path) -> Arc<CacheBucket> {
        Arc::new(CacheBucket::open(dir, CACHE_NAME).expect("open bucket"))
    }

    fn response(status: u16, body: &str) -> GatewayResponse {
        GatewayResponse {
            status,
            body: body.to_owned(),
        }
    }

    fn offline() -> Result<GatewayResponse, PortError> {
        Err(PortError::Internal("connection refused".to_owned()))
    }

    #[tokio::test]
    async fn successful_get_is_stored_and_returned_live() {
        let dir = temp_cache_dir("store");
        let cache = bucket(&dir);
        let inner = ScriptedGateway::new(vec![Ok(response(200, "live"))]);
        let gateway = OfflineGateway::new(inner, Arc::clone(&cache), API_MARKER);

        let url = "https://edp.ale.se/FutureWeb/SimpleWastePickup/GetWastePickupSchedule?address=X";
        let got = gateway.get(url).await.expect("live fetch");
        assert_eq!(got, response(200, "live"));
        assert_eq!(cache.lookup(url), Some(response(200, "live")));

        let _ignored = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn offline_get_returns_stored_response_byte_for_byte() {
        let dir = temp_cache_dir("fallback");
        let cache = bucket(&dir);
        let inner = ScriptedGateway::new(vec![Ok(response(200, "cached body")), offline()]);
        let gateway = OfflineGateway::new(inner, Arc::clone(&cache), API_MARKER);

        let url = "https://edp.ale.se/FutureWeb/SimpleWastePickup/GetWastePickupSchedule?address=X";
        let live = gateway.get(url).await.expect("live fetch");
        let fallback = gateway.get(url).await.expect("cache fallback");
        assert_eq!(fallback, live);

        let _ignored = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn offline_get_without_cache_propagates_the_failure() {
        let dir = temp_cache_dir("nofallback");
        let cache = bucket(&dir);
        let inner = ScriptedGateway::new(vec![offline()]);
        let gateway = OfflineGateway::new(inner, cache, API_MARKER);

        let result = gateway.get("https://edp.ale.se/annat").await;
        assert!(result.is_err());

        let _ignored = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn api_paths_cache_any_completed_response() {
        let dir = temp_cache_dir("apierr");
        let cache = bucket(&dir);
        let inner = ScriptedGateway::new(vec![Ok(response(500, "fel"))]);
        let gateway = OfflineGateway::new(inner, Arc::clone(&cache), API_MARKER);

        let url = "https://edp.ale.se/FutureWeb/SimpleWastePickup/GetWastePickupSchedule?address=X";
        let got = gateway.get(url).await.expect("completed exchange");
        assert_eq!(got.status, 500);
        assert_eq!(cache.lookup(url), Some(response(500, "fel")));

        let _ignored = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn other_paths_cache_only_status_200() {
        let dir = temp_cache_dir("asset404");
        let cache = bucket(&dir);
        let inner = ScriptedGateway::new(vec![Ok(response(404, "saknas"))]);
        let gateway = OfflineGateway::new(inner, Arc::clone(&cache), API_MARKER);

        let url = "https://edp.ale.se/startsida";
        let got = gateway.get(url).await.expect("completed exchange");
        assert_eq!(got.status, 404);
        assert_eq!(cache.lookup(url), None, "non-200 asset must not be cached");

        let _ignored = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn post_passes_through_uncached() {
        let dir = temp_cache_dir("post");
        let cache = bucket(&dir);
        let inner = ScriptedGateway::new(Vec::new());
        let gateway = OfflineGateway::new(Arc::clone(&inner) as Arc<dyn HttpGateway>, Arc::clone(&cache), API_MARKER);

        let url = "https://edp.ale.se/FutureWeb/SimpleWastePickup/SearchAdress";
        let got = gateway
            .post_json(url, &serde_json::json!({"searchText": "Storgatan"}))
            .await
            .expect("post succeeds");
        assert_eq!(got.status, 200);
        assert_eq!(inner.posts.load(Ordering::SeqCst), 1);
        assert_eq!(cache.lookup(url), None, "POST responses are never cached");

        let _ignored = std::fs::remove_dir_all(&dir);
    }
}
