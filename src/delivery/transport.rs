//! RemoteTransport: seam between the pipeline and the spreadsheet endpoint.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::{DeliveryOutcome, Submission};

/// How a submission is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// JSON document as the request body
    Json,
    /// The same JSON document as the single form field `data`
    FormField,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::FormField => "form",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Endpoint returned status {0}")]
    Status(u16),
    #[error("Endpoint rejected submission: {0}")]
    Rejected(String),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
    #[error("No endpoint configured")]
    NotConfigured,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Transport panicked")]
    Panicked,
}

/// One delivery attempt against the remote sink.
///
/// Implementations must return promptly with [`TransportError::Cancelled`]
/// once `cancel` fires.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn deliver(
        &self,
        submission: &Submission,
        encoding: Encoding,
        cancel: CancellationToken,
    ) -> Result<DeliveryOutcome, TransportError>;

    /// Cheap reachability check used by the connectivity probe.
    async fn probe(&self) -> Result<(), TransportError>;
}
