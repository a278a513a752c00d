use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::LoadFuture;
use crate::models::{Page, PageInfo, PageRequest};

/// Async loader for one page of a collection.
pub type PageLoader<T, F> = Arc<dyn Fn(PageRequest<F>) -> LoadFuture<Page<T>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct PagedState<T> {
    /// Items of every page loaded since the last reset, in page order.
    pub items: Vec<T>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Metadata of the most recently loaded page.
    pub page: Option<PageInfo>,
}

impl<T> Default for PagedState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            error: None,
            page: None,
        }
    }
}

impl<T> PagedState<T> {
    pub fn has_next_page(&self) -> bool {
        self.page.map(|p| p.has_next_page).unwrap_or(false)
    }

    pub fn total_count(&self) -> Option<u64> {
        self.page.map(|p| p.total_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Replace,
    Append,
}

struct Shared<T, F> {
    loader: PageLoader<T, F>,
    filter: Mutex<F>,
    page_size: u32,
    state: watch::Sender<PagedState<T>>,
    issued: AtomicU64,
    alive: AtomicBool,
}

impl<T, F> Shared<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Clone + Send + Sync + 'static,
{
    fn current_filter(&self) -> F {
        match self.filter.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn begin_reset(&self) -> (u64, LoadFuture<Page<T>>) {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if self.alive.load(Ordering::SeqCst) {
            self.state.send_modify(|s| {
                s.is_loading = true;
                s.error = None;
            });
        }
        let request = PageRequest::first(self.page_size, self.current_filter());
        (seq, (self.loader)(request))
    }

    /// Claim the next page if one exists and nothing is in flight.
    fn begin_next(&self) -> Option<(u64, LoadFuture<Page<T>>)> {
        if !self.alive.load(Ordering::SeqCst) {
            return None;
        }
        let mut next_page = None;
        self.state.send_if_modified(|s| {
            if s.is_loading || !s.has_next_page() {
                return false;
            }
            next_page = s.page.map(|p| p.page_number + 1);
            s.is_loading = true;
            s.error = None;
            true
        });
        let page_number = next_page?;
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let request = PageRequest {
            page_number,
            page_size: self.page_size,
            filter: self.current_filter(),
        };
        Some((seq, (self.loader)(request)))
    }

    /// Clear the loading flag for a load whose task died without a result.
    fn abandon(&self, seq: u64) {
        if self.alive.load(Ordering::SeqCst) && self.issued.load(Ordering::SeqCst) == seq {
            self.state.send_modify(|s| s.is_loading = false);
        }
    }

    fn finish(&self, seq: u64, merge: Merge, result: anyhow::Result<Page<T>>) {
        if !self.alive.load(Ordering::SeqCst) {
            debug!(seq, "Paged fetcher disposed, discarding result");
            return;
        }
        let latest = self.issued.load(Ordering::SeqCst);
        if seq != latest {
            debug!(seq, latest, "Discarding stale page");
            return;
        }
        self.state.send_modify(|s| {
            s.is_loading = false;
            match result {
                Ok(page) => {
                    let (items, info) = page.into_parts();
                    debug!(page = info.page_number, count = items.len(), ?merge, "Page loaded");
                    match merge {
                        Merge::Replace => s.items = items,
                        Merge::Append => s.items.extend(items),
                    }
                    s.page = Some(info);
                    s.error = None;
                }
                Err(e) => {
                    debug!(error = %e, ?merge, "Page fetch failed");
                    s.error = Some(e.to_string());
                }
            }
        });
    }
}

/// State holder for a paginated collection.
///
/// Pages requested through `load_more` are appended; `refetch` and
/// `set_filter` start over from page 1. Building one spawns the first page
/// load on the current tokio runtime.
pub struct PagedFetcher<T, F> {
    shared: Arc<Shared<T, F>>,
}

impl<T, F> PagedFetcher<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Clone + Send + Sync + 'static,
{
    pub fn new(page_size: u32, filter: F, loader: PageLoader<T, F>) -> Self {
        let (state, _) = watch::channel(PagedState::default());
        let fetcher = Self {
            shared: Arc::new(Shared {
                loader,
                filter: Mutex::new(filter),
                page_size,
                state,
                issued: AtomicU64::new(0),
                alive: AtomicBool::new(true),
            }),
        };
        let (seq, fut) = fetcher.shared.begin_reset();
        fetcher.spawn(seq, fut, Merge::Replace);
        fetcher
    }

    /// Loads run on their own task so a caller that stops waiting cannot
    /// leave the state stuck in `is_loading`.
    fn spawn(&self, seq: u64, fut: LoadFuture<Page<T>>, merge: Merge) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = fut.await;
            shared.finish(seq, merge, result);
        })
    }

    async fn join(&self, seq: u64, handle: JoinHandle<()>) {
        if let Err(e) = handle.await {
            warn!(seq, error = %e, "Page task did not complete");
            self.shared.abandon(seq);
        }
    }

    pub fn state(&self) -> PagedState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PagedState<T>> {
        self.shared.state.subscribe()
    }

    pub fn filter(&self) -> F {
        self.shared.current_filter()
    }

    pub fn page_size(&self) -> u32 {
        self.shared.page_size
    }

    /// Reload page 1 and replace the accumulated items.
    pub async fn refetch(&self) {
        let (seq, fut) = self.shared.begin_reset();
        let handle = self.spawn(seq, fut, Merge::Replace);
        self.join(seq, handle).await;
    }

    /// Load the next page and append it.
    ///
    /// Does nothing (and returns `false`) while a load is in flight or when
    /// the last page has been reached. The cursor only moves forward when the
    /// page arrives, so a failed call can simply be retried. If the caller
    /// stops waiting, the page is still appended when it arrives.
    pub async fn load_more(&self) -> bool {
        let Some((seq, fut)) = self.shared.begin_next() else {
            return false;
        };
        let handle = self.spawn(seq, fut, Merge::Append);
        self.join(seq, handle).await;
        true
    }

    /// Replace the filter and start over from page 1.
    pub async fn set_filter(&self, filter: F) {
        match self.shared.filter.lock() {
            Ok(mut guard) => *guard = filter,
            Err(poisoned) => *poisoned.into_inner() = filter,
        }
        self.refetch().await;
    }

    /// Wait until no load is in flight and return that state.
    pub async fn settled(&self) -> PagedState<T> {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| !s.is_loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    pub fn dispose(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        !self.shared.alive.load(Ordering::SeqCst)
    }
}

impl<T, F> Drop for PagedFetcher<T, F> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }
}
