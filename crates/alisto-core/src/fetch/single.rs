use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::LoadFuture;

/// Zero-argument async loader.
pub type Loader<T> = Arc<dyn Fn() -> LoadFuture<T> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> FetchState<T> {
    /// Nothing has been loaded and nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.data.is_none() && !self.is_loading && self.error.is_none()
    }
}

struct Shared<T> {
    loader: Mutex<Loader<T>>,
    state: watch::Sender<FetchState<T>>,
    issued: AtomicU64,
    alive: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    /// Mark a new load as started and return its sequence number and future.
    fn begin(&self) -> (u64, LoadFuture<T>) {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let loader = match self.loader.lock() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        };
        if self.alive.load(Ordering::SeqCst) {
            self.state.send_modify(|s| {
                s.is_loading = true;
                s.error = None;
            });
        }
        (seq, loader())
    }

    /// Clear the loading flag after a load that never produced a result,
    /// unless a newer load has been issued since.
    fn abandon(&self, seq: u64) {
        if self.alive.load(Ordering::SeqCst) && self.issued.load(Ordering::SeqCst) == seq {
            self.state.send_modify(|s| s.is_loading = false);
        }
    }

    fn finish(&self, seq: u64, result: anyhow::Result<T>) {
        if !self.alive.load(Ordering::SeqCst) {
            debug!(seq, "Fetcher disposed, discarding result");
            return;
        }
        let latest = self.issued.load(Ordering::SeqCst);
        if seq != latest {
            debug!(seq, latest, "Discarding stale fetch result");
            return;
        }
        self.state.send_modify(|s| {
            s.is_loading = false;
            match result {
                Ok(data) => {
                    s.data = Some(data);
                    s.error = None;
                }
                Err(e) => {
                    debug!(error = %e, "Fetch failed");
                    s.error = Some(e.to_string());
                }
            }
        });
    }
}

/// State holder for one async read.
///
/// Building a `Fetcher` spawns the first load on the current tokio runtime.
/// Dropping it disposes it.
pub struct Fetcher<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + Sync + 'static> Fetcher<T> {
    /// Build from a closure and start loading.
    pub fn new<F, Fut>(load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::from_loader(super::loader(load))
    }

    /// Build from an existing `Loader` and start loading.
    pub fn from_loader(loader: Loader<T>) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        let fetcher = Self {
            shared: Arc::new(Shared {
                loader: Mutex::new(loader),
                state,
                issued: AtomicU64::new(0),
                alive: AtomicBool::new(true),
            }),
        };
        fetcher.spawn_load();
        fetcher
    }

    /// Run one load on its own task so that it reaches `finish` even if
    /// whoever awaits the handle goes away.
    fn spawn_load(&self) -> (u64, JoinHandle<()>) {
        let (seq, fut) = self.shared.begin();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let result = fut.await;
            shared.finish(seq, result);
        });
        (seq, handle)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    /// Run the loader again and wait for it.
    ///
    /// If another load is issued before this one resolves, this one's result
    /// is discarded. Dropping the returned future does not cancel the load;
    /// it still runs to completion and publishes its result.
    pub async fn refetch(&self) {
        let (seq, handle) = self.spawn_load();
        if let Err(e) = handle.await {
            warn!(seq, error = %e, "Fetch task did not complete");
            self.shared.abandon(seq);
        }
    }

    /// Swap the loader (its inputs changed) and reload in the background.
    pub fn set_loader(&self, loader: Loader<T>) {
        match self.shared.loader.lock() {
            Ok(mut guard) => *guard = loader,
            Err(poisoned) => *poisoned.into_inner() = loader,
        }
        self.spawn_load();
    }

    /// Wait until no load is in flight and return that state.
    pub async fn settled(&self) -> FetchState<T> {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| !s.is_loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Stop publishing state. Loads already in flight finish but are ignored.
    pub fn dispose(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        !self.shared.alive.load(Ordering::SeqCst)
    }
}

impl<T> Drop for Fetcher<T> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }
}
