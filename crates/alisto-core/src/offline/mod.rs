//! Offline support: a persistent queue of mutations replayed on reconnect,
//! form drafts, and connectivity tracking.
//!
//! `OfflineManager` ties these together. It owns the queue and the executor
//! registry and watches `Connectivity`; whenever the app comes back online
//! the queue is drained.

pub mod connectivity;
pub mod drafts;
pub mod queue;
pub mod registry;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub use connectivity::{Connectivity, ProbeHandle, DEFAULT_PROBE_INTERVAL};
pub use drafts::{DraftStore, FormDraft, DRAFT_PREFIX};
pub use queue::{DrainReport, OfflineQueue, PendingAction, MAX_RETRIES, PENDING_ACTIONS_KEY};
pub use registry::{ActionExecutor, ActionKind, ActionRegistry, ApiExecutor};

use crate::api::{ApiClient, ApiError};
use crate::cache::{durations, keys, TtlCache};
use crate::clock::{self, Clock};
use crate::store::KeyValueStore;

/// Outcome of `OfflineManager::submit_or_queue`.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Sent,
    Queued(PendingAction),
}

pub struct OfflineManager {
    queue: OfflineQueue,
    registry: ActionRegistry,
    connectivity: Connectivity,
    drafts: DraftStore,
    cache: TtlCache,
}

impl OfflineManager {
    /// Load the persisted queue and build the manager.
    pub async fn new(
        store: Arc<dyn KeyValueStore>,
        registry: ActionRegistry,
        connectivity: Connectivity,
    ) -> Result<Self> {
        Self::with_clock(store, registry, connectivity, clock::system()).await
    }

    pub async fn with_clock(
        store: Arc<dyn KeyValueStore>,
        registry: ActionRegistry,
        connectivity: Connectivity,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let queue = OfflineQueue::load_with_clock(Arc::clone(&store), Arc::clone(&clock)).await?;
        Ok(Self {
            queue,
            registry,
            connectivity,
            drafts: DraftStore::with_clock(Arc::clone(&store), Arc::clone(&clock)),
            cache: TtlCache::with_clock(store, clock),
        })
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.current()
    }

    // ===== Action queue =====

    pub async fn add_pending_action(&self, kind: &str, payload: Value) -> Result<PendingAction> {
        self.queue.add(kind, payload).await
    }

    /// Send a mutation now, or queue it for the next reconnect.
    ///
    /// Offline, the action is queued without trying. Online, it goes through
    /// the registered executor; if that fails for lack of network the action
    /// is queued and connectivity is marked offline. Any other failure (the
    /// server rejected it, bad payload) is returned and nothing is queued.
    pub async fn submit_or_queue(&self, kind: &str, payload: Value) -> Result<Submission> {
        if !self.is_online() {
            let action = self.queue.add(kind, payload).await?;
            return Ok(Submission::Queued(action));
        }

        let executor = self
            .registry
            .get(kind)
            .ok_or_else(|| anyhow!("No executor registered for {}", kind))?;
        match executor.execute(&payload).await {
            Ok(()) => Ok(Submission::Sent),
            Err(e) if ApiError::is_network_error(&e) => {
                warn!(kind, error = %e, "Network unavailable, queuing action");
                self.connectivity.set_online(false);
                let action = self.queue.add(kind, payload).await?;
                Ok(Submission::Queued(action))
            }
            Err(e) => Err(e),
        }
    }

    /// Replay the queue if online. Offline this is a no-op.
    pub async fn process_pending_actions(&self) -> Result<DrainReport> {
        if !self.is_online() {
            debug!("Offline, not draining pending actions");
            return Ok(DrainReport::default());
        }
        self.queue.drain(&self.registry).await
    }

    pub async fn pending_actions(&self) -> Vec<PendingAction> {
        self.queue.snapshot().await
    }

    /// Badge count. Does not wait on queue writes in progress.
    pub fn pending_actions_count(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_actions(&self) -> bool {
        !self.queue.is_empty()
    }

    pub async fn clear_all_pending_actions(&self) -> Result<()> {
        self.queue.clear().await
    }

    // ===== Drafts =====

    pub async fn save_form_draft<T: Serialize>(&self, form_id: &str, data: &T) -> Result<()> {
        self.drafts.save(form_id, data).await
    }

    pub async fn get_form_draft<T: DeserializeOwned>(&self, form_id: &str) -> Result<Option<T>> {
        Ok(self.drafts.get::<T>(form_id).await?.map(|draft| draft.data))
    }

    pub async fn clear_form_draft(&self, form_id: &str) -> Result<()> {
        self.drafts.clear(form_id).await
    }

    // ===== Offline data =====

    /// Prime the cache with data people need without a connection.
    /// Each list is fetched independently; failures are logged.
    pub async fn cache_data_for_offline(&self, api: &ApiClient) {
        if !self.is_online() {
            return;
        }

        match api.service_categories().await {
            Ok(categories) => {
                if let Err(e) = self.cache.set(keys::SERVICE_CATEGORIES, &categories, durations::DAY).await {
                    warn!(error = %e, "Failed to cache service categories");
                }
            }
            Err(e) => warn!(error = %e, "Failed to fetch service categories for offline use"),
        }

        match api.emergency_hotlines().await {
            Ok(hotlines) => {
                if let Err(e) = self.cache.set(keys::EMERGENCY_HOTLINES, &hotlines, durations::DAY).await {
                    warn!(error = %e, "Failed to cache emergency hotlines");
                }
            }
            Err(e) => warn!(error = %e, "Failed to fetch emergency hotlines for offline use"),
        }
    }

    pub async fn offline_data<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.cache.get(key).await
    }

    // ===== Reconnect =====

    /// Drain the queue every time connectivity comes back, sending each
    /// non-empty report to `reports`. Runs until the connectivity sender is
    /// gone or `reports` is closed.
    pub fn spawn_reconnect_drain(self: &Arc<Self>, reports: mpsc::Sender<DrainReport>) -> JoinHandle<()> {
        // Subscribe before spawning so no transition is missed.
        let mut rx = self.connectivity.subscribe();
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                // Only changes are broadcast, so any wake-up while online
                // follows an offline period.
                let online = *rx.borrow_and_update();
                if !online {
                    continue;
                }
                match manager.queue.drain(&manager.registry).await {
                    Ok(report) if report.is_empty() => {}
                    Ok(report) => {
                        if reports.send(report).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to drain pending actions after reconnect"),
                }
            }
            debug!("Reconnect listener stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    async fn manager(online: bool, registry: ActionRegistry) -> (Arc<OfflineManager>, MemoryStore) {
        let store = MemoryStore::new();
        let manager = OfflineManager::new(Arc::new(store.clone()), registry, Connectivity::new(online))
            .await
            .unwrap();
        (Arc::new(manager), store)
    }

    fn ok_registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register_fn("CREATE_X", |_payload| async { Ok(()) });
        registry
    }

    #[tokio::test]
    async fn test_reconnect_triggers_drain() {
        let (manager, _) = manager(false, ok_registry()).await;
        manager.add_pending_action("CREATE_X", json!({"id": 1})).await.unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let _listener = manager.spawn_reconnect_drain(tx);

        manager.connectivity().set_online(true);
        let report = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.completed.len(), 1);
        assert_eq!(manager.pending_actions_count(), 0);
        assert!(!manager.has_pending_actions());
    }

    #[tokio::test]
    async fn test_process_is_noop_while_offline() {
        let (manager, _) = manager(false, ok_registry()).await;
        manager.add_pending_action("CREATE_X", json!({})).await.unwrap();

        let report = manager.process_pending_actions().await.unwrap();
        assert!(report.is_empty());
        assert_eq!(manager.pending_actions_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_pending_actions() {
        let (manager, store) = manager(true, ok_registry()).await;
        manager.add_pending_action("CREATE_X", json!({})).await.unwrap();
        manager.clear_all_pending_actions().await.unwrap();
        assert_eq!(store.get(PENDING_ACTIONS_KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_form_drafts() {
        let (manager, _) = manager(true, ok_registry()).await;
        manager
            .save_form_draft("appointment", &json!({"serviceId": 3}))
            .await
            .unwrap();
        let draft: Option<Value> = manager.get_form_draft("appointment").await.unwrap();
        assert_eq!(draft, Some(json!({"serviceId": 3})));

        manager.clear_form_draft("appointment").await.unwrap();
        let draft: Option<Value> = manager.get_form_draft("appointment").await.unwrap();
        assert!(draft.is_none());
    }

    #[tokio::test]
    async fn test_submit_sends_when_online() {
        let (manager, _) = manager(true, ok_registry()).await;
        let outcome = manager.submit_or_queue("CREATE_X", json!({})).await.unwrap();
        assert_eq!(outcome, Submission::Sent);
        assert!(!manager.has_pending_actions());
    }

    #[tokio::test]
    async fn test_submit_queues_while_offline() {
        let (manager, store) = manager(false, ok_registry()).await;
        let outcome = manager.submit_or_queue("CREATE_X", json!({"id": 7})).await.unwrap();

        let Submission::Queued(action) = outcome else {
            panic!("expected the action to be queued");
        };
        assert_eq!(action.payload, json!({"id": 7}));
        assert_eq!(manager.pending_actions_count(), 1);
        assert!(store.get(PENDING_ACTIONS_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_queues_on_network_failure() {
        // Nothing listens on the discard port, so the connection is refused
        let api = ApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();
        let (manager, _) = manager(true, ActionRegistry::for_api(api)).await;
        let payload = json!({
            "category": "Sanitation",
            "urgencyLevel": "Medium",
            "description": "Uncollected garbage",
            "location": "Purok 3"
        });

        let outcome = manager.submit_or_queue("CREATE_ISSUE_REPORT", payload).await.unwrap();

        assert!(matches!(outcome, Submission::Queued(_)));
        assert_eq!(manager.pending_actions_count(), 1);
        assert!(!manager.is_online());
    }

    #[tokio::test]
    async fn test_submit_returns_rejections_without_queuing() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("CREATE_X", |_payload| async {
            Err(ApiError::Rejected("Selected date is fully booked".to_string()).into())
        });
        let (manager, _) = manager(true, registry).await;

        let err = manager.submit_or_queue("CREATE_X", json!({})).await.unwrap_err();

        assert_eq!(err.to_string(), "Selected date is fully booked");
        assert!(!manager.has_pending_actions());
        assert!(manager.is_online());
    }

    #[tokio::test]
    async fn test_cache_for_offline_skipped_while_offline() {
        let (manager, store) = manager(false, ok_registry()).await;
        let api = ApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(1)).unwrap();
        manager.cache_data_for_offline(&api).await;
        assert!(store.is_empty());
    }
}
