//! Loading/error/data state holders for async fetches.
//!
//! `Fetcher` wraps a single loader, `PagedFetcher` a page-parameterized loader
//! whose pages accumulate. Both:
//!
//! - start loading as soon as they are built
//! - never return errors to the caller; failures land in the state's `error`
//!   field and the last good data is kept
//! - tag every load with a sequence number so that only the most recently
//!   issued load can write its result
//! - stop writing state once disposed (or dropped), while in-flight requests
//!   are allowed to finish
//!
//! State is published through a `tokio::sync::watch` channel so UI code can
//! either take snapshots or await changes.

pub mod paged;
pub mod single;

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

pub use paged::{PageLoader, PagedFetcher, PagedState};
pub use single::{FetchState, Fetcher, Loader};

/// Boxed result of one loader invocation.
pub type LoadFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Wrap a closure returning a future as a shareable `Loader`.
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Wrap a closure taking a page request as a shareable `PageLoader`.
pub fn page_loader<T, Flt, F, Fut>(f: F) -> PageLoader<T, Flt>
where
    F: Fn(crate::models::PageRequest<Flt>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<crate::models::Page<T>>> + Send + 'static,
{
    Arc::new(move |request| f(request).boxed())
}
