use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::clock::{self, Clock};
use crate::store::{self, KeyValueStore};

/// Namespace for form drafts in the key-value store.
pub const DRAFT_PREFIX: &str = "draft_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft<T> {
    pub form_id: String,
    pub data: T,
    pub saved_at_epoch_ms: i64,
}

/// Unsent form contents keyed by a caller-chosen form id.
///
/// Last write wins; drafts never expire and are not retried.
#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, clock::system())
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn key(form_id: &str) -> String {
        format!("{}{}", DRAFT_PREFIX, form_id)
    }

    pub async fn save<T: Serialize>(&self, form_id: &str, data: &T) -> Result<()> {
        let draft = FormDraft {
            form_id: form_id.to_string(),
            data,
            saved_at_epoch_ms: self.clock.now_ms(),
        };
        store::write_json(self.store.as_ref(), &Self::key(form_id), &draft)
            .await
            .with_context(|| format!("Failed to save draft: {}", form_id))
    }

    pub async fn get<T: DeserializeOwned>(&self, form_id: &str) -> Result<Option<FormDraft<T>>> {
        store::read_json(self.store.as_ref(), &Self::key(form_id)).await
    }

    pub async fn clear(&self, form_id: &str) -> Result<()> {
        self.store.remove(&Self::key(form_id)).await
    }
}
