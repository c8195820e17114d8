//! Durable local storage
//!
//! Two JSON blobs under fixed keys:
//! - [`LOG_KEY`]: the capped submission log
//! - [`QUEUE_KEY`]: the retry queue (owned by `delivery::queue`)
//!
//! Backed by sled in production, by an in-memory map in tests.

mod store;
mod submission_log;

pub use store::{InMemoryStore, KeyValueStore, SledStore, StorageError};
pub use submission_log::SubmissionLog;

/// Key of the local submission log.
pub const LOG_KEY: &str = "graduationFormSubmissions";

/// Key of the persisted retry queue.
pub const QUEUE_KEY: &str = "pendingSubmissions";
