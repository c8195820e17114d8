//! Shared data structures for the invitation submission relay
//!
//! - `Submission`: one visitor's name + guest type + client metadata
//! - `LogEntry`: a submission as kept in the local submission log
//! - `QueuedSubmission`: a submission awaiting remote delivery
//! - `SubmissionResult`: per-sink outcome of a single `submit` call

mod result;
mod submission;

pub use result::*;
pub use submission::*;
