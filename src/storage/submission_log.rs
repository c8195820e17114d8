//! Local submission log: capped, append-only record of every submission
//! that reached the local sink.
//!
//! Stored as one JSON array under [`LOG_KEY`]. Appends are read-modify-write
//! of the whole array, serialized by an async mutex so two concurrent submits
//! cannot lose each other's entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{KeyValueStore, StorageError, LOG_KEY};
use crate::types::{LogEntry, Submission};

pub struct SubmissionLog {
    store: Arc<dyn KeyValueStore>,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl SubmissionLog {
    pub fn new(store: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self {
            store,
            max_entries: max_entries.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one entry, evicting the oldest entries beyond the cap.
    pub async fn append(
        &self,
        submission: &Submission,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load()?;
        entries.push(LogEntry {
            submission: submission.clone(),
            saved_at,
        });
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        let bytes = serde_json::to_vec(&entries)?;
        self.store.put(LOG_KEY, &bytes)?;
        debug!(total = entries.len(), "Submission logged locally");
        Ok(())
    }

    /// All entries, oldest first.
    ///
    /// A blob that no longer parses is reported and treated as an empty log.
    pub fn entries(&self) -> Result<Vec<LogEntry>, StorageError> {
        self.load()
    }

    fn load(&self) -> Result<Vec<LogEntry>, StorageError> {
        let Some(bytes) = self.store.get(LOG_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(error = %e, "Corrupted submission log, starting over");
                Ok(Vec::new())
            }
        }
    }
}
