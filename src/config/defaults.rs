//! System-wide default constants.
//!
//! Grouped by subsystem. Every tunable here has a matching config field;
//! these values are what an empty `invite_config.toml` resolves to.

// ============================================================================
// Remote Endpoint
// ============================================================================

/// Per-request deadline enforced inside the HTTP transport (milliseconds).
pub const REMOTE_REQUEST_TIMEOUT_MS: u64 = 3_000;

/// Deadline the pipeline races each remote attempt against (milliseconds).
///
/// Shorter than the transport deadline, so this one governs.
pub const PIPELINE_TIMEOUT_MS: u64 = 2_000;

/// How often the connectivity probe checks the endpoint (seconds). 0 disables.
pub const PROBE_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Local Storage
// ============================================================================

/// Maximum entries kept in the local submission log.
pub const LOG_MAX_ENTRIES: usize = 100;

/// Failed reconciliation rounds before a queued submission is dropped.
pub const MAX_RETRIES: u32 = 3;

/// Default data directory for the embedded database.
pub const DATA_DIR: &str = "./data";

/// Database directory name inside the data directory.
pub const DB_NAME: &str = "submissions.db";

/// Retry queue actor mailbox capacity.
pub const QUEUE_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Statistics
// ============================================================================

/// Number of log entries returned as `recent_submissions`.
pub const RECENT_SUBMISSIONS: usize = 10;

// ============================================================================
// Form
// ============================================================================

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;

// ============================================================================
// HTTP Server
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Largest accepted request body (bytes). A form post is a few hundred bytes.
pub const REQUEST_BODY_LIMIT_BYTES: usize = 16 * 1024;
