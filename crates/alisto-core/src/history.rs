//! Local, device-only history: recently viewed items, search history and
//! the free-form preference/settings blobs.
//!
//! Lists are kept most-recent-first and de-duplicated on insert.

use std::sync::Arc;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::store::{self, KeyValueStore};

const RECENT_PREFIX: &str = "recent_";
const SEARCH_HISTORY_KEY: &str = "search_history";
const USER_PREFERENCES_KEY: &str = "user_preferences";
const APP_SETTINGS_KEY: &str = "app_settings";

/// Recently viewed items kept per type.
pub const MAX_RECENT_ITEMS: usize = 10;

/// Search terms kept.
pub const MAX_SEARCH_HISTORY: usize = 20;

/// Items that can appear in a recently-viewed list.
pub trait Identified {
    fn item_id(&self) -> String;
}

impl Identified for crate::models::NewsArticle {
    fn item_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for crate::models::TouristSpot {
    fn item_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for crate::models::PublicProject {
    fn item_id(&self) -> String {
        self.id.to_string()
    }
}

impl Identified for crate::models::CityService {
    fn item_id(&self) -> String {
        self.id.to_string()
    }
}

/// Insert `item` at the front, dropping any earlier copy and trimming to `max`.
fn push_front_unique<T, F>(list: &mut Vec<T>, item: T, max: usize, same: F)
where
    F: Fn(&T, &T) -> bool,
{
    list.retain(|existing| !same(existing, &item));
    list.insert(0, item);
    list.truncate(max);
}

#[derive(Clone)]
pub struct History {
    store: Arc<dyn KeyValueStore>,
}

impl History {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read a list, treating unreadable contents as empty.
    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(key, error = %e, "Unreadable history list, starting over");
                Ok(Vec::new())
            }
        }
    }

    /// Record that `item` of `kind` (e.g. "news", "spots") was opened.
    pub async fn add_recently_viewed<T>(&self, kind: &str, item: &T) -> Result<()>
    where
        T: Identified + Serialize + DeserializeOwned + Clone,
    {
        let key = format!("{}{}", RECENT_PREFIX, kind);
        let mut items: Vec<T> = self.read_list(&key).await?;
        push_front_unique(&mut items, item.clone(), MAX_RECENT_ITEMS, |a, b| {
            a.item_id() == b.item_id()
        });
        store::write_json(self.store.as_ref(), &key, &items).await
    }

    pub async fn recently_viewed<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>> {
        self.read_list(&format!("{}{}", RECENT_PREFIX, kind)).await
    }

    pub async fn add_search(&self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        let mut history: Vec<String> = self.read_list(SEARCH_HISTORY_KEY).await?;
        push_front_unique(&mut history, query.to_string(), MAX_SEARCH_HISTORY, |a, b| a == b);
        store::write_json(self.store.as_ref(), SEARCH_HISTORY_KEY, &history).await
    }

    pub async fn search_history(&self) -> Result<Vec<String>> {
        self.read_list(SEARCH_HISTORY_KEY).await
    }

    pub async fn clear_search_history(&self) -> Result<()> {
        self.store.remove(SEARCH_HISTORY_KEY).await
    }

    pub async fn set_user_preferences(&self, preferences: &Value) -> Result<()> {
        store::write_json(self.store.as_ref(), USER_PREFERENCES_KEY, preferences).await
    }

    pub async fn user_preferences(&self) -> Result<Option<Value>> {
        store::read_json(self.store.as_ref(), USER_PREFERENCES_KEY).await
    }

    pub async fn set_app_settings(&self, settings: &Value) -> Result<()> {
        store::write_json(self.store.as_ref(), APP_SETTINGS_KEY, settings).await
    }

    pub async fn app_settings(&self) -> Result<Option<Value>> {
        store::read_json(self.store.as_ref(), APP_SETTINGS_KEY).await
    }
}
