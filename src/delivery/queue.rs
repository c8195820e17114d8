//! Retry Queue: durable queue of submissions awaiting remote delivery
//!
//! A single `QueueActor` task owns the in-memory queue and is the only code
//! that writes [`QUEUE_KEY`]. Everything else talks to it through a cloneable
//! [`QueueHandle`]: `mpsc` commands with `oneshot` replies.
//!
//! A drain is two messages: `take_all` moves the whole queue into an
//! in-flight set, `complete_drain` clears it and appends the entries that
//! still failed. While a drain is in flight the persisted blob is
//! `in_flight ++ queued`, so a crash mid-drain loses nothing, and pushes
//! arriving meanwhile are kept.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::defaults::QUEUE_CHANNEL_CAPACITY;
use crate::storage::{KeyValueStore, StorageError, QUEUE_KEY};
use crate::types::QueuedSubmission;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Retry queue actor is gone")]
    Closed,
    #[error("Could not load retry queue: {0}")]
    Storage(#[from] StorageError),
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug)]
enum QueueCommand {
    /// Append at the tail; replies with the pending count
    Push {
        entry: QueuedSubmission,
        reply: oneshot::Sender<usize>,
    },
    /// Move everything queued into the in-flight set
    TakeAll {
        reply: oneshot::Sender<Vec<QueuedSubmission>>,
    },
    /// Finish a drain, appending entries that still need delivery
    CompleteDrain {
        requeue: Vec<QueuedSubmission>,
        reply: oneshot::Sender<usize>,
    },
    /// In-flight and queued entries, in persisted order
    Snapshot {
        reply: oneshot::Sender<Vec<QueuedSubmission>>,
    },
    /// Remove everything queued (not in flight); replies with the number removed
    Purge { reply: oneshot::Sender<usize> },
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to the queue actor.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<QueueCommand>,
}

impl QueueHandle {
    /// Load the persisted queue from `store` and spawn its actor.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Result<Self, QueueError> {
        let (actor, handle) = QueueActor::load(store)?;
        tokio::spawn(actor.run());
        Ok(handle)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
    ) -> Result<T, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| QueueError::Closed)?;
        rx.await.map_err(|_| QueueError::Closed)
    }

    /// Append an entry and persist. Returns the new pending count.
    pub async fn push(&self, entry: QueuedSubmission) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::Push { entry, reply }).await
    }

    /// Take the current queue for a drain. Empty when another drain is in flight.
    pub async fn take_all(&self) -> Result<Vec<QueuedSubmission>, QueueError> {
        self.request(|reply| QueueCommand::TakeAll { reply }).await
    }

    /// End the drain started by [`take_all`](Self::take_all).
    pub async fn complete_drain(&self, requeue: Vec<QueuedSubmission>) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::CompleteDrain { requeue, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<Vec<QueuedSubmission>, QueueError> {
        self.request(|reply| QueueCommand::Snapshot { reply }).await
    }

    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.snapshot().await?.len())
    }

    pub async fn purge(&self) -> Result<usize, QueueError> {
        self.request(|reply| QueueCommand::Purge { reply }).await
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Owns the queue. Exits when every handle has been dropped.
pub struct QueueActor {
    store: Arc<dyn KeyValueStore>,
    rx: mpsc::Receiver<QueueCommand>,
    queued: Vec<QueuedSubmission>,
    in_flight: Vec<QueuedSubmission>,
}

impl QueueActor {
    /// Read the persisted queue and create the actor with its handle.
    ///
    /// A blob that no longer parses is discarded with a warning.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<(Self, QueueHandle), QueueError> {
        let queued: Vec<QueuedSubmission> = match store.get(QUEUE_KEY)? {
            None => Vec::new(),
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(error = %e, "Corrupted retry queue, starting empty");
                Vec::new()
            }),
        };

        if queued.is_empty() {
            debug!(backend = store.backend_name(), "Retry queue opened (empty)");
        } else {
            info!(pending = queued.len(), "Retry queue opened with pending submissions");
        }

        let (tx, rx) = mpsc::channel(QUEUE_CHANNEL_CAPACITY);
        let actor = Self {
            store,
            rx,
            queued,
            in_flight: Vec::new(),
        };
        Ok((actor, QueueHandle { tx }))
    }

    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }
        debug!("Retry queue actor stopped");
    }

    fn handle(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Push { entry, reply } => {
                debug!(name = entry.submission.name(), "Queued submission for retry");
                self.queued.push(entry);
                self.persist();
                let _ = reply.send(self.pending());
            }
            QueueCommand::TakeAll { reply } => {
                if self.in_flight.is_empty() {
                    self.in_flight = std::mem::take(&mut self.queued);
                    let _ = reply.send(self.in_flight.clone());
                } else {
                    // The running drain owns its entries until it completes
                    debug!(in_flight = self.in_flight.len(), "Drain already in flight");
                    let _ = reply.send(Vec::new());
                }
            }
            QueueCommand::CompleteDrain { requeue, reply } => {
                self.in_flight.clear();
                self.queued.extend(requeue);
                self.persist();
                let _ = reply.send(self.pending());
            }
            QueueCommand::Snapshot { reply } => {
                let _ = reply.send(self.persisted_view());
            }
            QueueCommand::Purge { reply } => {
                let removed = self.queued.len();
                self.queued.clear();
                self.persist();
                if removed > 0 {
                    info!(removed, "Retry queue purged");
                }
                let _ = reply.send(removed);
            }
        }
    }

    fn pending(&self) -> usize {
        self.in_flight.len() + self.queued.len()
    }

    fn persisted_view(&self) -> Vec<QueuedSubmission> {
        self.in_flight.iter().chain(&self.queued).cloned().collect()
    }

    /// Write the queue back. On failure the in-memory queue stays authoritative.
    fn persist(&self) {
        let result = serde_json::to_vec(&self.persisted_view())
            .map_err(StorageError::from)
            .and_then(|bytes| self.store.put(QUEUE_KEY, &bytes));
        if let Err(e) = result {
            warn!(error = %e, pending = self.pending(), "Failed to persist retry queue");
        }
    }
}
