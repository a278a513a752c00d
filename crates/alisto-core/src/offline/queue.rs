use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::registry::ActionRegistry;
use crate::clock::{self, Clock};
use crate::store::{self, KeyValueStore};

/// Store key holding the whole queue as one JSON array.
pub const PENDING_ACTIONS_KEY: &str = "pending_actions";

/// Failed attempts after which an action is dropped.
pub const MAX_RETRIES: u32 = 3;

/// A mutation recorded while offline, replayed when connectivity returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub id: String,
    pub kind: String,
    pub payload: Value,
    pub created_at_epoch_ms: i64,
    pub retry_count: u32,
}

/// What one pass over the queue did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Replayed successfully and removed.
    pub completed: Vec<PendingAction>,
    /// Failed but still queued, with the incremented retry count.
    pub retrying: Vec<PendingAction>,
    /// Failed for the last time and removed.
    pub dropped: Vec<PendingAction>,
    /// No executor registered for the kind; left queued untouched.
    pub unhandled: Vec<PendingAction>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
            && self.retrying.is_empty()
            && self.dropped.is_empty()
            && self.unhandled.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} sent, {} will retry, {} dropped, {} unhandled",
            self.completed.len(),
            self.retrying.len(),
            self.dropped.len(),
            self.unhandled.len()
        )
    }
}

enum Outcome {
    Completed,
    Failed(String),
    Unhandled,
}

/// Persistent FIFO of pending actions.
///
/// Every mutation rewrites the full list under `pending_actions`, so a fresh
/// queue loaded from the same store sees exactly what was last written.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    actions: Mutex<Vec<PendingAction>>,
    /// Held for the whole of a drain so passes never overlap.
    draining: Mutex<()>,
    next_seq: AtomicU64,
    /// Mirrors `actions.len()`, updated under the lock, for lock-free reads.
    count: AtomicUsize,
    max_retries: u32,
}

impl OfflineQueue {
    /// Load the queue persisted in `store`.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::load_with_clock(store, clock::system()).await
    }

    pub async fn load_with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let actions = match store.get(PENDING_ACTIONS_KEY).await? {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<PendingAction>>(&raw) {
                Ok(actions) => actions,
                Err(e) => {
                    warn!(error = %e, "Unreadable pending action queue, starting empty");
                    Vec::new()
                }
            },
        };
        debug!(count = actions.len(), "Loaded pending actions");

        Ok(Self {
            store,
            clock,
            count: AtomicUsize::new(actions.len()),
            actions: Mutex::new(actions),
            draining: Mutex::new(()),
            next_seq: AtomicU64::new(0),
            max_retries: MAX_RETRIES,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn persist(&self, actions: &[PendingAction]) -> Result<()> {
        store::write_json(self.store.as_ref(), PENDING_ACTIONS_KEY, actions)
            .await
            .context("Failed to persist pending actions")
    }

    fn next_id(&self, now_ms: i64) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", now_ms, seq)
    }

    /// Append an action and persist the queue before returning.
    ///
    /// If the write fails the action is not kept in memory either.
    pub async fn add(&self, kind: &str, payload: Value) -> Result<PendingAction> {
        let now = self.clock.now_ms();
        let action = PendingAction {
            id: self.next_id(now),
            kind: kind.to_string(),
            payload,
            created_at_epoch_ms: now,
            retry_count: 0,
        };

        let mut actions = self.actions.lock().await;
        actions.push(action.clone());
        if let Err(e) = self.persist(&actions).await {
            actions.pop();
            return Err(e);
        }
        self.count.store(actions.len(), Ordering::SeqCst);
        info!(id = %action.id, kind = %action.kind, "Queued action for later");
        Ok(action)
    }

    pub async fn snapshot(&self) -> Vec<PendingAction> {
        self.actions.lock().await.clone()
    }

    /// Number of queued actions as of the last completed change. Never waits
    /// on a write in progress.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn clear(&self) -> Result<()> {
        let mut actions = self.actions.lock().await;
        self.persist(&[]).await?;
        actions.clear();
        self.count.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Replay every queued action once through `registry`.
    ///
    /// Works on a snapshot taken at the start; actions added meanwhile stay
    /// queued for the next pass. Successful actions are removed, failed ones
    /// have their retry count bumped and are dropped once it reaches the
    /// limit. Kinds without an executor are left alone. The queue is
    /// persisted once, after the whole pass.
    pub async fn drain(&self, registry: &ActionRegistry) -> Result<DrainReport> {
        let _pass = self.draining.lock().await;
        let snapshot = self.snapshot().await;
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }
        debug!(count = snapshot.len(), "Draining pending actions");

        let mut outcomes = Vec::with_capacity(snapshot.len());
        for action in snapshot {
            let outcome = match registry.get(&action.kind) {
                None => {
                    warn!(id = %action.id, kind = %action.kind, "No executor for action kind, leaving it queued");
                    Outcome::Unhandled
                }
                Some(executor) => match executor.execute(&action.payload).await {
                    Ok(()) => Outcome::Completed,
                    Err(e) => Outcome::Failed(format!("{:#}", e)),
                },
            };
            outcomes.push((action, outcome));
        }

        let mut report = DrainReport::default();
        let mut actions = self.actions.lock().await;
        for (action, outcome) in outcomes {
            let Some(index) = actions.iter().position(|a| a.id == action.id) else {
                // Cleared while we were replaying
                continue;
            };
            match outcome {
                Outcome::Completed => {
                    debug!(id = %action.id, kind = %action.kind, "Replayed action");
                    report.completed.push(actions.remove(index));
                }
                Outcome::Failed(error) => {
                    let entry = &mut actions[index];
                    entry.retry_count += 1;
                    if entry.retry_count >= self.max_retries {
                        warn!(
                            id = %entry.id,
                            kind = %entry.kind,
                            retries = entry.retry_count,
                            error = %error,
                            "Giving up on action"
                        );
                        report.dropped.push(actions.remove(index));
                    } else {
                        debug!(id = %entry.id, retries = entry.retry_count, error = %error, "Action failed, will retry");
                        report.retrying.push(entry.clone());
                    }
                }
                Outcome::Unhandled => report.unhandled.push(action),
            }
        }
        self.persist(&actions).await?;
        self.count.store(actions.len(), Ordering::SeqCst);

        info!(summary = %report.summary(), "Finished draining pending actions");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn queue_on(store: &MemoryStore) -> OfflineQueue {
        OfflineQueue::load_with_clock(Arc::new(store.clone()), Arc::new(ManualClock::new(1_000)))
            .await
            .unwrap()
    }

    fn failing_registry(kind: &str, calls: Arc<AtomicUsize>) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register_fn(kind, move |_payload| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("Network unreachable"))
            }
        });
        registry
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let store = MemoryStore::new();
        let payload = json!({"serviceId": 4, "appointmentDate": "2025-03-01"});
        {
            let queue = queue_on(&store).await;
            queue.add("CREATE_X", payload.clone()).await.unwrap();
        }

        let restarted = queue_on(&store).await;
        let actions = restarted.snapshot().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, "CREATE_X");
        assert_eq!(actions[0].payload, payload);
        assert_eq!(actions[0].retry_count, 0);
        assert_eq!(actions[0].created_at_epoch_ms, 1_000);
    }

    /// Memory store whose writes wait until released.
    struct GatedStore {
        inner: MemoryStore,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for GatedStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.release.notified().await;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            self.inner.list_keys().await
        }
    }

    #[tokio::test]
    async fn test_len_does_not_wait_for_pending_write() {
        let release = Arc::new(tokio::sync::Notify::new());
        let store = GatedStore {
            inner: MemoryStore::new(),
            release: Arc::clone(&release),
        };
        let queue = Arc::new(OfflineQueue::load(Arc::new(store)).await.unwrap());

        let adding = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.add("SUBMIT_FEEDBACK", json!({"rating": 5})).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // The add holds the lock while its write is blocked
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());

        release.notify_one();
        adding.await.unwrap().unwrap();
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_unique_within_same_millisecond() {
        let queue = queue_on(&MemoryStore::new()).await;
        let a = queue.add("SUBMIT_FEEDBACK", json!({})).await.unwrap();
        let b = queue.add("SUBMIT_FEEDBACK", json!({})).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_drops_action() {
        let store = MemoryStore::new();
        let queue = queue_on(&store).await;
        queue.add("CREATE_X", json!({"n": 1})).await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = failing_registry("CREATE_X", Arc::clone(&calls));

        let first = queue.drain(&registry).await.unwrap();
        assert_eq!(first.retrying[0].retry_count, 1);
        let second = queue.drain(&registry).await.unwrap();
        assert_eq!(second.retrying[0].retry_count, 2);

        let third = queue.drain(&registry).await.unwrap();
        assert_eq!(third.dropped.len(), 1);
        assert_eq!(third.dropped[0].retry_count, MAX_RETRIES);
        assert!(queue.is_empty());

        let fourth = queue.drain(&registry).await.unwrap();
        assert!(fourth.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(queue_on(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_successful_replay_removes_action() {
        let queue = queue_on(&MemoryStore::new()).await;
        queue.add("CREATE_X", json!({"n": 1})).await.unwrap();
        queue.add("CREATE_X", json!({"n": 2})).await.unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let mut registry = ActionRegistry::new();
        registry.register_fn("CREATE_X", move |payload| {
            seen_in.lock().unwrap().push(payload["n"].clone());
            async { Ok(()) }
        });

        let report = queue.drain(&registry).await.unwrap();
        assert_eq!(report.completed.len(), 2);
        assert!(queue.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_left_queued() {
        let queue = queue_on(&MemoryStore::new()).await;
        queue.add("LEGACY_KIND", json!({})).await.unwrap();

        let report = queue.drain(&ActionRegistry::new()).await.unwrap();
        assert_eq!(report.unhandled.len(), 1);
        let actions = queue.snapshot().await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_corrupt_queue_starts_empty() {
        let store = MemoryStore::new();
        store.set(PENDING_ACTIONS_KEY, "not json").await.unwrap();
        let queue = queue_on(&store).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_clear_persists() {
        let store = MemoryStore::new();
        let queue = queue_on(&store).await;
        queue.add("CREATE_X", json!({})).await.unwrap();
        queue.clear().await.unwrap();
        assert!(queue_on(&store).await.is_empty());
    }
}
