//! Online/offline state of the link to the endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::RemoteTransport;

/// Shared online flag. Clones observe and update the same state.
#[derive(Clone, Debug)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the flag. Returns `true` when the state actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Periodically probe the endpoint and publish the result.
///
/// The first probe runs immediately.
pub async fn run_probe(
    connectivity: Connectivity,
    transport: Arc<dyn RemoteTransport>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let reachable = tokio::select! {
            () = cancel.cancelled() => break,
            result = transport.probe() => match result {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "Endpoint probe failed");
                    false
                }
            },
        };

        if connectivity.set_online(reachable) {
            if reachable {
                info!("Endpoint reachable — back online");
            } else {
                warn!("Endpoint unreachable — offline, new submissions will be queued");
            }
        }
    }
    debug!("Connectivity probe stopped");
}
