//! Delivery Pipeline: fans each submission out to three sinks
//!
//! 1. Local submission log (durable, capped)
//! 2. Analytics (best effort)
//! 3. Remote endpoint, raced against a deadline, with one alternate-encoding
//!    attempt before the submission goes to the retry queue
//!
//! `submit` never fails: every sink is isolated, panics included, and its
//! outcome is reported in the returned [`SubmissionResult`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::analytics::{AnalyticsEvent, AnalyticsSink};
use super::connectivity::Connectivity;
use super::queue::{QueueError, QueueHandle};
use super::transport::{Encoding, RemoteTransport, TransportError};
use crate::builder::{Clock, SystemClock};
use crate::config::InviteConfig;
use crate::report::{self, Statistics};
use crate::storage::{KeyValueStore, StorageError, SubmissionLog};
use crate::types::{
    DeliveryOutcome, DrainReport, QueuedSubmission, RemoteStatus, Submission, SubmissionResult,
};

/// Pipeline tunables.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Deadline each remote attempt is raced against
    pub pipeline_timeout: Duration,
    pub max_entries: usize,
    /// Failed drain rounds before an entry is dropped (0 = never)
    pub max_retries: u32,
    pub queue_when_offline: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &InviteConfig) -> Self {
        Self {
            pipeline_timeout: config.endpoint.pipeline_timeout(),
            max_entries: config.storage.max_entries,
            max_retries: config.storage.max_retries,
            queue_when_offline: config.storage.queue_when_offline,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&InviteConfig::default())
    }
}

/// Errors from the read-side operations (statistics, export, queue admin).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct DeliveryPipeline {
    log: SubmissionLog,
    queue: QueueHandle,
    transport: Option<Arc<dyn RemoteTransport>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    clock: Arc<dyn Clock>,
    connectivity: Connectivity,
    shutdown: CancellationToken,
    settings: PipelineSettings,
}

impl DeliveryPipeline {
    /// Open the log and load the retry queue from `store`.
    ///
    /// Starts with no remote endpoint, no analytics, the system clock and an
    /// online link; use the `with_*` methods to inject the rest.
    /// Must be called inside a Tokio runtime (spawns the queue actor).
    pub fn new(store: Arc<dyn KeyValueStore>, settings: PipelineSettings) -> Result<Self, QueueError> {
        let queue = QueueHandle::spawn(store.clone())?;
        info!(
            backend = store.backend_name(),
            max_entries = settings.max_entries,
            max_retries = settings.max_retries,
            "Delivery pipeline ready"
        );
        Ok(Self {
            log: SubmissionLog::new(store, settings.max_entries),
            queue,
            transport: None,
            analytics: None,
            clock: Arc::new(SystemClock),
            connectivity: Connectivity::default(),
            shutdown: CancellationToken::new(),
            settings,
        })
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// In-flight remote attempts are cancelled when `token` fires.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn remote_enabled(&self) -> bool {
        self.transport.is_some()
    }

    fn remote(&self) -> Option<RemoteSink> {
        self.transport.clone().map(|transport| RemoteSink {
            transport,
            deadline: self.settings.pipeline_timeout,
            shutdown: self.shutdown.clone(),
        })
    }

    // ========================================================================
    // Submit
    // ========================================================================

    pub async fn submit(&self, submission: Submission) -> SubmissionResult {
        let local_ok = self.save_locally(&submission).await;
        let analytics_ok = self.emit_analytics(&submission);

        let Some(remote) = self.remote() else {
            debug!("No endpoint configured, skipping remote delivery");
            return SubmissionResult::new(local_ok, analytics_ok, RemoteStatus::Disabled, false);
        };

        if !self.connectivity.is_online() {
            let queued = self.settings.queue_when_offline && self.enqueue(&submission).await;
            debug!(queued, "Offline, remote delivery skipped");
            return SubmissionResult::new(local_ok, analytics_ok, RemoteStatus::Offline, queued);
        }

        match remote.deliver(&submission).await {
            Ok(outcome) => {
                debug!(?outcome, "Submission delivered");
                SubmissionResult::new(local_ok, analytics_ok, RemoteStatus::Delivered { outcome }, false)
            }
            Err(e) => {
                warn!(error = %e, "Remote delivery failed, queueing for retry");
                let queued = self.enqueue(&submission).await;
                SubmissionResult::new(
                    local_ok,
                    analytics_ok,
                    RemoteStatus::Failed {
                        reason: e.to_string(),
                    },
                    queued,
                )
            }
        }
    }

    async fn save_locally(&self, submission: &Submission) -> bool {
        let saved_at = self.clock.now();
        match AssertUnwindSafe(self.log.append(submission, saved_at))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to save submission locally");
                false
            }
            Err(_) => {
                error!("Local submission log panicked");
                false
            }
        }
    }

    fn emit_analytics(&self, submission: &Submission) -> bool {
        let Some(sink) = &self.analytics else {
            return true;
        };
        let event = AnalyticsEvent::form_submission(submission.user_type());
        match std::panic::catch_unwind(AssertUnwindSafe(|| sink.emit(&event))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Analytics event not sent");
                false
            }
            Err(_) => {
                error!("Analytics sink panicked");
                false
            }
        }
    }

    async fn enqueue(&self, submission: &Submission) -> bool {
        let entry = QueuedSubmission::new(submission.clone(), self.clock.now());
        match self.queue.push(entry).await {
            Ok(pending) => {
                debug!(pending, "Submission queued for retry");
                true
            }
            Err(e) => {
                error!(error = %e, "Could not queue submission");
                false
            }
        }
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Drain the retry queue against the remote sink.
    ///
    /// Entries are attempted one by one in queue order. Failures go back at
    /// the tail with their attempt counter bumped, unless the counter reached
    /// `max_retries`, in which case they are dropped.
    ///
    /// The drain runs on its own task: dropping this future (a client giving
    /// up on `POST /queue/drain`) leaves it running to completion.
    pub async fn on_reconnect(&self) -> DrainReport {
        let Some(remote) = self.remote() else {
            return DrainReport::default();
        };

        let drain = tokio::spawn(drain_queue(
            self.queue.clone(),
            remote,
            self.settings.max_retries,
        ));
        match drain.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Retry queue drain task failed");
                DrainReport::default()
            }
        }
    }

    // ========================================================================
    // Read side
    // ========================================================================

    pub async fn statistics(&self) -> Result<Statistics, PipelineError> {
        let entries = self.log.entries()?;
        let pending = self.queue.len().await?;
        Ok(Statistics::from_log(&entries, pending))
    }

    pub fn export_csv(&self) -> Result<String, PipelineError> {
        Ok(report::to_csv(&self.log.entries()?))
    }

    pub async fn pending(&self) -> Result<Vec<QueuedSubmission>, PipelineError> {
        Ok(self.queue.snapshot().await?)
    }

    /// Operator purge of the retry queue. Returns the number of entries removed.
    pub async fn purge_queue(&self) -> Result<usize, PipelineError> {
        Ok(self.queue.purge().await?)
    }
}

// ============================================================================
// Remote delivery
// ============================================================================

/// Owned view of the remote sink, so deliveries can outlive a borrowed pipeline.
#[derive(Clone)]
struct RemoteSink {
    transport: Arc<dyn RemoteTransport>,
    /// Deadline each attempt is raced against
    deadline: Duration,
    shutdown: CancellationToken,
}

impl RemoteSink {
    /// JSON attempt, then one form-field attempt. Each gets a fresh deadline.
    async fn deliver(&self, submission: &Submission) -> Result<DeliveryOutcome, TransportError> {
        match self.attempt(submission, Encoding::Json).await {
            Ok(outcome) => Ok(outcome),
            Err(first) => {
                debug!(error = %first, "JSON delivery failed, trying form encoding");
                self.attempt(submission, Encoding::FormField).await
            }
        }
    }

    async fn attempt(
        &self,
        submission: &Submission,
        encoding: Encoding,
    ) -> Result<DeliveryOutcome, TransportError> {
        let cancel = self.shutdown.child_token();
        let call = AssertUnwindSafe(self.transport.deliver(submission, encoding, cancel.clone()))
            .catch_unwind();

        tokio::select! {
            result = call => result.unwrap_or_else(|_| {
                error!(encoding = encoding.as_str(), "Remote transport panicked");
                Err(TransportError::Panicked)
            }),
            () = tokio::time::sleep(self.deadline) => {
                cancel.cancel();
                Err(TransportError::TimedOut(self.deadline))
            }
        }
    }
}

/// One reconciliation pass. Always ends the drain it started, so the queue
/// never keeps a stale in-flight set.
async fn drain_queue(queue: QueueHandle, remote: RemoteSink, max_retries: u32) -> DrainReport {
    let snapshot = match queue.take_all().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "Could not take retry queue");
            return DrainReport::default();
        }
    };
    if snapshot.is_empty() {
        return DrainReport::default();
    }

    let mut report = DrainReport {
        attempted: snapshot.len(),
        ..DrainReport::default()
    };
    let mut requeue = Vec::new();

    for mut entry in snapshot {
        match remote.deliver(&entry.submission).await {
            Ok(outcome) => {
                debug!(name = entry.submission.name(), ?outcome, "Queued submission delivered");
                report.delivered += 1;
            }
            Err(e) => {
                entry.attempts += 1;
                if max_retries > 0 && entry.attempts >= max_retries {
                    warn!(
                        name = entry.submission.name(),
                        attempts = entry.attempts,
                        error = %e,
                        "Dropping queued submission after max retries"
                    );
                    report.dropped += 1;
                } else {
                    debug!(attempts = entry.attempts, error = %e, "Queued submission still failing");
                    requeue.push(entry);
                    report.requeued += 1;
                }
            }
        }
    }

    if let Err(e) = queue.complete_drain(requeue).await {
        error!(error = %e, "Could not finish retry queue drain");
    }
    report
}
