//! Alisto core - the client-side data layer for the Alisto city services app.
//!
//! This crate holds everything below the screens:
//!
//! - `api`: REST client for the Alisto backend (JSON envelope, bearer auth)
//! - `store`: device-local key-value persistence that everything else builds on
//! - `cache`: TTL cache over the key-value store with lazy eviction
//! - `fetch`: loading/error/data state holders for single and paged fetches
//! - `offline`: connectivity tracking, pending-action queue and form drafts
//! - `feeds`: domain wrappers that wire the API into fetch state holders
//! - `history`, `auth`, `config`, `models`, `utils`: supporting pieces
//!
//! Services are constructed once and passed to their consumers; there are no
//! global singletons.

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod feeds;
pub mod fetch;
pub mod history;
pub mod models;
pub mod offline;
pub mod store;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::Session;
pub use cache::TtlCache;
pub use config::Config;
pub use feeds::Feeds;
pub use fetch::{FetchState, Fetcher, PagedFetcher, PagedState};
pub use history::History;
pub use offline::{ActionRegistry, Connectivity, DrainReport, OfflineManager, OfflineQueue, Submission};
pub use store::{FileStore, KeyValueStore, MemoryStore};
