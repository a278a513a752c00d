//! TTL cache over the key-value store.
//!
//! This module provides the `TtlCache` for keeping API responses on the device
//! so screens can render without a round trip. Each value is wrapped in a
//! timestamped envelope stored under `cache_<key>`; expired envelopes are
//! removed the next time they are read, or by an explicit `sweep_expired`.
//!
//! Standard keys and durations for the app's data sets live in `keys` and
//! `durations`.

pub mod manager;

pub use manager::{CacheEntry, TtlCache, CACHE_PREFIX};

/// Cache keys for the app's shared data sets.
pub mod keys {
    pub const NEWS: &str = "news";
    pub const SERVICES: &str = "services";
    pub const SERVICE_CATEGORIES: &str = "service_categories";
    pub const TOURIST_SPOTS: &str = "tourist_spots";
    pub const PUBLIC_PROJECTS: &str = "public_projects";
    pub const EMERGENCY_HOTLINES: &str = "emergency_hotlines";
    pub const USER_APPOINTMENTS: &str = "user_appointments";
    pub const USER_REPORTS: &str = "user_reports";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// How long each class of data stays fresh.
pub mod durations {
    use std::time::Duration;

    pub const SHORT: Duration = Duration::from_secs(2 * 60);
    pub const MEDIUM: Duration = Duration::from_secs(5 * 60);
    pub const LONG: Duration = Duration::from_secs(15 * 60);
    pub const VERY_LONG: Duration = Duration::from_secs(60 * 60);
    pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
}
