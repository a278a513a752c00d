//! Device-local key-value persistence.
//!
//! Every persisted piece of client state (cache envelopes, the pending action
//! queue, form drafts, history, session) is a JSON string stored under a key in
//! a `KeyValueStore`. Callers keep to their own key namespace:
//!
//! - `cache_*`: TTL cache envelopes
//! - `pending_actions`: the offline action queue
//! - `draft_*`: form drafts
//! - `recent_*`, `search_history`, `user_preferences`, `app_settings`
//! - `session`

pub mod file;
pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

pub use file::FileStore;
pub use memory::MemoryStore;

/// String-keyed, string-valued async storage.
///
/// Each call is independent; a `set` replaces the previous value entirely.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// Serialize `value` as JSON and store it under `key`.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for key: {}", key))?;
    store.set(key, &json).await
}

/// Read and parse the JSON stored under `key`.
///
/// A missing key is `Ok(None)`; unparseable contents are an error.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse stored value for key: {}", key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
