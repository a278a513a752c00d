use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{AuthResponse, User};
use crate::store::{self, KeyValueStore};

/// Key the session is stored under.
pub const SESSION_KEY: &str = "session";

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_auth(auth: AuthResponse) -> Result<Self> {
        let expires_at = parse_timestamp(&auth.expires_at)
            .with_context(|| format!("Unrecognized token expiry: {}", auth.expires_at))?;
        Ok(Self {
            token: auth.token,
            refresh_token: auth.refresh_token,
            expires_at,
            user: auth.user,
            created_at: Utc::now(),
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }
}

/// Backend timestamps come with or without an offset; bare ones are UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub struct Session {
    store: Arc<dyn KeyValueStore>,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, data: None }
    }

    /// Load the stored session. Returns whether one was found.
    ///
    /// An expired session is kept so its refresh token can still be used; an
    /// unreadable one is discarded.
    pub async fn load(&mut self) -> Result<bool> {
        self.data = None;
        let Some(raw) = self.store.get(SESSION_KEY).await? else {
            return Ok(false);
        };
        match serde_json::from_str::<SessionData>(&raw) {
            Ok(data) => {
                debug!(expired = data.is_expired(), "Loaded session");
                self.data = Some(data);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session");
                self.store.remove(SESSION_KEY).await?;
                Ok(false)
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            store::write_json(self.store.as_ref(), SESSION_KEY, data)
                .await
                .context("Failed to save session")?;
        }
        Ok(())
    }

    /// Replace the session with a fresh login/refresh result and persist it.
    pub async fn update(&mut self, data: SessionData) -> Result<()> {
        self.data = Some(data);
        self.save().await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.data = None;
        self.store.remove(SESSION_KEY).await
    }

    /// Get the bearer token if session is valid
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.data.as_ref().map(|d| &d.user)
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }
}
