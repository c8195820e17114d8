//! Outcome types reported by the delivery pipeline.

use serde::{Deserialize, Serialize};

/// What a remote delivery call that did not fail tells us.
///
/// The spreadsheet endpoint is normally called in opaque mode, where the
/// reply is never inspected: a call that completes is only *presumed* to
/// have landed. `Confirmed` is reserved for replies that were read and
/// reported success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Confirmed,
    Presumed,
}

/// Remote sink status for one `submit` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteStatus {
    /// No endpoint configured, nothing attempted
    Disabled,
    /// Client was offline, nothing attempted
    Offline,
    /// Endpoint accepted the call
    Delivered { outcome: DeliveryOutcome },
    /// Both encodings failed or timed out
    Failed { reason: String },
}

impl RemoteStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RemoteStatus::Delivered { .. })
    }
}

/// Aggregated per-sink result of `DeliveryPipeline::submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub local_ok: bool,
    pub analytics_ok: bool,
    pub remote_ok: bool,
    pub remote: RemoteStatus,
    pub queued_for_retry: bool,
}

impl SubmissionResult {
    pub fn new(local_ok: bool, analytics_ok: bool, remote: RemoteStatus, queued_for_retry: bool) -> Self {
        Self {
            local_ok,
            analytics_ok,
            remote_ok: remote.is_delivered(),
            remote,
            queued_for_retry,
        }
    }
}

/// Summary of one reconciliation pass over the retry queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Entries taken from the queue snapshot
    pub attempted: usize,
    pub delivered: usize,
    /// Failed entries put back at the tail of the queue
    pub requeued: usize,
    /// Failed entries that ran out of retry attempts
    pub dropped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_ok_derived_from_status() {
        let presumed = SubmissionResult::new(
            true,
            true,
            RemoteStatus::Delivered {
                outcome: DeliveryOutcome::Presumed,
            },
            false,
        );
        assert!(presumed.remote_ok);

        let failed = SubmissionResult::new(
            true,
            true,
            RemoteStatus::Failed {
                reason: "timed out".to_string(),
            },
            true,
        );
        assert!(!failed.remote_ok);
        assert!(!SubmissionResult::new(true, true, RemoteStatus::Offline, false).remote_ok);
    }

    #[test]
    fn test_remote_status_serializes_tagged() {
        let json = serde_json::to_value(RemoteStatus::Delivered {
            outcome: DeliveryOutcome::Presumed,
        })
        .unwrap();
        assert_eq!(json["status"], "delivered");
        assert_eq!(json["outcome"], "presumed");
    }
}
