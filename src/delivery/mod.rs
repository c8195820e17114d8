//! Submission delivery
//!
//! - `pipeline`: fan-out of each submission to the local log, analytics and
//!   the remote endpoint
//! - `queue`: single-writer retry queue actor
//! - `transport` / `client`: remote sink seam and its reqwest implementation
//! - `connectivity` / `reconciler`: online flag, probe, and drain-on-reconnect

pub mod analytics;
pub mod client;
pub mod connectivity;
pub mod pipeline;
pub mod queue;
pub mod reconciler;
pub mod transport;

pub use analytics::{AnalyticsError, AnalyticsEvent, AnalyticsSink, TracingAnalytics};
pub use client::HttpTransport;
pub use connectivity::{run_probe, Connectivity};
pub use pipeline::{DeliveryPipeline, PipelineError, PipelineSettings};
pub use queue::{QueueActor, QueueError, QueueHandle};
pub use reconciler::run_reconciler;
pub use transport::{Encoding, RemoteTransport, TransportError};
