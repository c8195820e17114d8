//! Graduation Invite: submission relay for an animated invitation page
//!
//! A visitor enters a name and a guest type, and gets a personalized
//! thank-you and event invitation. Each submission is delivered best-effort
//! to a spreadsheet endpoint.
//!
//! ## Architecture
//!
//! - **Form / Builder**: validate input, assemble an immutable [`Submission`]
//! - **Delivery Pipeline**: local log, analytics, remote endpoint with a
//!   deadline and alternate encoding, retry queue on failure
//! - **Reconciler**: drains the retry queue whenever the endpoint comes back
//! - **API**: axum endpoints for the page and for operators

pub mod api;
pub mod builder;
pub mod config;
pub mod delivery;
pub mod form;
pub mod invitation;
pub mod report;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::InviteConfig;

// Re-export commonly used types
pub use types::{
    ClientSignature, DeliveryOutcome, DrainReport, LogEntry, QueuedSubmission, RemoteStatus,
    Submission, SubmissionResult, UserType,
};

pub use builder::{Clock, Environment, FixedClock, SubmissionBuilder, SystemClock};
pub use delivery::{Connectivity, DeliveryPipeline, PipelineSettings};
pub use form::{RawForm, ValidForm, ValidationError};
pub use invitation::Invitation;
pub use report::Statistics;
