use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::KeyValueStore;

/// In-process store. Clones share the same map, which makes it usable for
/// "restart" tests: build a second service over a clone of the first store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> Result<R> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|e| e.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|e| {
            e.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|e| {
            e.remove(key);
        })
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.with_entries(|e| e.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("draft_report", "{}").await.unwrap();
        assert_eq!(other.list_keys().await.unwrap(), vec!["draft_report".to_string()]);
    }
}
