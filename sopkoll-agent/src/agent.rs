//! Agent lifecycle: activation, install, inbox, and the reminder timer.
//!
//! The agent owns its tasks for the lifetime of the process. Once the
//! reminder timer is armed it cannot be cancelled from the foreground; it
//! goes away only when the process does.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;

use sopkoll_core::ports::HttpGateway;

use crate::AgentError;
use crate::bucket::{CACHE_NAME, CacheBucket, remove_stale_buckets};
use crate::notify::Notifier;
use crate::reminder;

const REMINDER_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
/// Static configuration for the agent.
pub struct AgentConfig {
    /// Directory holding the cache bucket files.
    pub cache_dir: PathBuf,
    /// URLs precached at install time.
    pub precache: Vec<String>,
    /// URL fragment identifying schedule API requests in the bucket.
    pub api_marker: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Messages the foreground can post to the agent inbox.
pub enum AgentMessage {
    /// Arm the recurring reminder check. Idempotent.
    ScheduleNotifications,
}

#[derive(Clone, Default)]
/// Registry of active foreground client contexts.
pub struct ClientRegistry {
    active: Arc<AtomicUsize>,
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently registered clients.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Register a foreground context for as long as the guard lives.
    #[must_use]
    pub fn register(&self) -> ClientGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ClientGuard {
            active: Arc::clone(&self.active),
        }
    }
}

/// RAII registration of one foreground context.
pub struct ClientGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
/// Foreground-side handle to a spawned agent.
pub struct AgentHandle {
    tx: mpsc::UnboundedSender<AgentMessage>,
    clients: ClientRegistry,
}

impl AgentHandle {
    /// Ask the agent to arm the reminder timer. Safe to send repeatedly.
    pub fn schedule_notifications(&self) {
        if self.tx.send(AgentMessage::ScheduleNotifications).is_err() {
            tracing::debug!("agent inbox is gone, dropping arm message");
        }
    }

    /// Register the calling context as an active foreground client.
    #[must_use]
    pub fn register_client(&self) -> ClientGuard {
        self.clients.register()
    }
}

/// The background agent itself. Constructed only through [`Agent::spawn`].
pub struct Agent;

impl Agent {
    /// Activate, open the current bucket, kick off install, and start the
    /// inbox loop.
    ///
    /// Returns the foreground handle plus the shared bucket (the offline
    /// fetch policy needs it).
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when the cache dir cannot be prepared.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        gateway: Arc<dyn HttpGateway>,
        notifier: Arc<dyn Notifier>,
        config: &AgentConfig,
    ) -> Result<(AgentHandle, Arc<CacheBucket>), AgentError> {
        let removed = remove_stale_buckets(&config.cache_dir, CACHE_NAME)?;
        if removed > 0 {
            tracing::info!(removed, "activated: removed stale cache buckets");
        }
        let bucket = Arc::new(CacheBucket::open(&config.cache_dir, CACHE_NAME)?);
        let clients = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let gateway = Arc::clone(&gateway);
            let bucket = Arc::clone(&bucket);
            let assets = config.precache.clone();
            tokio::spawn(async move {
                install(gateway.as_ref(), &bucket, &assets).await;
            });
        }

        {
            let bucket = Arc::clone(&bucket);
            let clients = clients.clone();
            let api_marker = config.api_marker.clone();
            tokio::spawn(run_inbox(rx, move || {
                tokio::spawn(run_reminder_loop(
                    Arc::clone(&bucket),
                    clients.clone(),
                    Arc::clone(&notifier),
                    api_marker.clone(),
                ));
            }));
        }

        Ok((AgentHandle { tx, clients }, bucket))
    }
}

/// Precache the static asset list. Per-asset failures are logged and
/// skipped; install never blocks the rest of startup on an asset.
pub async fn install(gateway: &dyn HttpGateway, bucket: &CacheBucket, assets: &[String]) {
    for asset in assets {
        match gateway.get(asset).await {
            Ok(response) if response.is_success() => {
                if let Err(err) = bucket.put(asset, response) {
                    tracing::warn!(%asset, %err, "failed to store precached asset");
                }
            }
            Ok(response) => {
                tracing::debug!(%asset, status = response.status, "skipping precache asset");
            }
            Err(err) => {
                tracing::debug!(%asset, %err, "precache fetch failed");
            }
        }
    }
}

// Arms at most once no matter how many arm messages arrive.
async fn run_inbox(
    mut rx: mpsc::UnboundedReceiver<AgentMessage>,
    mut arm_reminders: impl FnMut(),
) {
    let mut armed = false;
    while let Some(message) = rx.recv().await {
        match message {
            AgentMessage::ScheduleNotifications => {
                if armed {
                    tracing::debug!("reminder timer already armed");
                    continue;
                }
                armed = true;
                arm_reminders();
            }
        }
    }
}

async fn run_reminder_loop(
    bucket: Arc<CacheBucket>,
    clients: ClientRegistry,
    notifier: Arc<dyn Notifier>,
    api_marker: String,
) {
    // First tick fires immediately, giving the check-on-arm behavior.
    let mut interval = tokio::time::interval(REMINDER_INTERVAL);
    loop {
        interval.tick().await;
        let now = Local::now().naive_local();
        if let Err(err) =
            reminder::run_check(now, &bucket, &clients, notifier.as_ref(), &api_marker)
        {
            tracing::debug!(%err, "reminder check failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use sopkoll_core::model::GatewayResponse;
    use sopkoll_core::ports::{HttpGateway, PortError};

    use super::{AgentMessage, install, run_inbox};
    use crate::bucket::{CACHE_NAME, CacheBucket};

    struct StaticGateway {
        status: u16,
    }

    #[async_trait]
    impl HttpGateway for StaticGateway {
        async fn get(&self, _url: &str) -> Result<GatewayResponse, PortError> {
            Ok(GatewayResponse {
                status: self.status,
                body: "innehåll".to_owned(),
            })
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<GatewayResponse, PortError> {
            Ok(GatewayResponse {
                status: self.status,
                body: String::new(),
            })
        }
    }

    fn temp_cache_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sopkoll-agent-{}-{name}", std::process::id()));
        let _ignored = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn install_stores_only_successful_assets() {
        let dir = temp_cache_dir("install");
        let bucket = CacheBucket::open(&dir, CACHE_NAME).expect("open bucket");
        let assets = vec!["https://edp.ale.se/".to_owned()];

        install(&StaticGateway { status: 503 }, &bucket, &assets).await;
        assert!(!bucket.contains("https://edp.ale.se/"));

        install(&StaticGateway { status: 200 }, &bucket, &assets).await;
        assert!(bucket.contains("https://edp.ale.se/"));

        let _ignored = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn arming_twice_starts_one_reminder_loop() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let arm_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&arm_count);

        let inbox = tokio::spawn(run_inbox(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        tx.send(AgentMessage::ScheduleNotifications).expect("send");
        tx.send(AgentMessage::ScheduleNotifications).expect("send");
        drop(tx);
        inbox.await.expect("inbox terminates");

        assert_eq!(arm_count.load(Ordering::SeqCst), 1);
    }
}
