use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{self, Clock};
use crate::store::KeyValueStore;

/// Namespace for cache envelopes in the key-value store.
pub const CACHE_PREFIX: &str = "cache_";

const MS_PER_MINUTE: i64 = 60_000;

/// Timestamped envelope around a cached value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at_epoch_ms: i64,
    pub ttl_ms: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, stored_at_epoch_ms: i64, ttl: Duration) -> Self {
        Self {
            data,
            stored_at_epoch_ms,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// A TTL of zero is always expired; otherwise the entry expires once its
    /// age is strictly greater than the TTL.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        if self.ttl_ms == 0 {
            return true;
        }
        let age = now_ms.saturating_sub(self.stored_at_epoch_ms);
        age > 0 && age as u64 > self.ttl_ms
    }

    pub fn age_minutes_at(&self, now_ms: i64) -> i64 {
        (now_ms - self.stored_at_epoch_ms) / MS_PER_MINUTE
    }

    pub fn age_display_at(&self, now_ms: i64) -> String {
        let minutes = self.age_minutes_at(now_ms);
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Expiring cache stored in a shared `KeyValueStore`.
/// Clone is cheap - the store and clock are behind `Arc`.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, clock::system())
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn cache_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    /// Store `value` under `key` for `ttl`. Store failures are returned.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);
        let json = serde_json::to_string(&entry)
            .with_context(|| format!("Failed to serialize cache entry: {}", key))?;
        self.store.set(&Self::cache_key(key), &json).await
    }

    /// Read the envelope for `key`, evicting it if it has expired.
    ///
    /// Unparseable envelopes are reported as a miss.
    pub async fn get_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
        let cache_key = Self::cache_key(key);
        let Some(raw) = self.store.get(&cache_key).await? else {
            return Ok(None);
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache = key, error = %e, "Unreadable cache entry, treating as miss");
                return Ok(None);
            }
        };

        if entry.is_expired_at(self.clock.now_ms()) {
            debug!(cache = key, "Cache entry expired, evicting");
            self.store.remove(&cache_key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Read the value for `key`. Expired entries are never returned.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.data))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(&Self::cache_key(key)).await
    }

    /// Human-readable age of a live entry ("5m ago"), if any.
    pub async fn age_display(&self, key: &str) -> Option<String> {
        match self.get_entry::<serde_json::Value>(key).await {
            Ok(Some(entry)) => Some(entry.age_display_at(self.clock.now_ms())),
            Ok(None) => None,
            Err(e) => {
                debug!(cache = key, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    /// Delete every expired or unreadable envelope. Returns how many were removed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut removed = 0;

        for key in self.store.list_keys().await? {
            if !key.starts_with(CACHE_PREFIX) {
                continue;
            }
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let expired = match serde_json::from_str::<CacheEntry<serde_json::Value>>(&raw) {
                Ok(entry) => entry.is_expired_at(now),
                Err(_) => true,
            };
            if expired {
                self.store.remove(&key).await?;
                removed += 1;
            }
        }

        debug!(removed, "Swept expired cache entries");
        Ok(removed)
    }

    /// Cache-first read: return the live cached value, or call `fetch`, store
    /// its result for `ttl` and return it.
    ///
    /// A failure to write the fresh value back is logged, not returned; the
    /// caller still gets the data it asked for.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get(key).await? {
            debug!(cache = key, "Cache hit");
            return Ok(cached);
        }

        let fresh = fetch().await?;
        if let Err(e) = self.set(key, &fresh, ttl).await {
            warn!(cache = key, error = %e, "Failed to store fetched value in cache");
        }
        Ok(fresh)
    }
}

// ============================================================================
// Tests
// ============================================================================
