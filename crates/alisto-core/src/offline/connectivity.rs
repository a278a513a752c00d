use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::ApiClient;

/// Default interval between reachability probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Online/offline status shared across the app.
///
/// Only real changes are broadcast: setting the current value again does not
/// wake subscribers.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Record the latest observation. Returns whether the status changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Poll the API server every `interval` and feed the result into this
    /// status. Probing stops when the returned handle is shut down or dropped.
    pub fn spawn_probe(&self, api: ApiClient, interval: Duration) -> ProbeHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let status = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let online = api.ping().await;
                        debug!(online, "Connectivity probe");
                        status.set_online(online);
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Connectivity probe stopped");
                        break;
                    }
                }
            }
        });

        ProbeHandle { shutdown_tx }
    }
}

/// Handle for a running connectivity probe.
pub struct ProbeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ProbeHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
