//! Statistics and CSV export over the local submission log.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::defaults::RECENT_SUBMISSIONS;
use crate::types::{iso8601, LogEntry, UserType};

pub const CSV_HEADER: &str = "Timestamp,Name,User Type,User Agent,Screen Resolution,Timezone,Saved At";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_submissions: usize,
    /// Queue entries still awaiting remote delivery
    pub pending_submissions: usize,
    pub user_type_breakdown: BTreeMap<UserType, usize>,
    /// Last log entries, oldest first
    pub recent_submissions: Vec<LogEntry>,
}

impl Statistics {
    pub fn from_log(entries: &[LogEntry], pending_submissions: usize) -> Self {
        let mut user_type_breakdown: BTreeMap<UserType, usize> =
            UserType::ALL.iter().map(|t| (*t, 0)).collect();
        for entry in entries {
            *user_type_breakdown
                .entry(entry.submission.user_type())
                .or_default() += 1;
        }

        let skip = entries.len().saturating_sub(RECENT_SUBMISSIONS);
        Self {
            total_submissions: entries.len(),
            pending_submissions,
            user_type_breakdown,
            recent_submissions: entries[skip..].to_vec(),
        }
    }
}

/// Quote a CSV field, doubling embedded quotes.
fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render the log as CSV. An empty log renders as an empty string.
///
/// Every client-supplied column is quoted; only timestamps and the guest
/// type, which the server formats itself, are written bare.
pub fn to_csv(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for entry in entries {
        let s = &entry.submission;
        let sig = s.client_signature();
        lines.push(format!(
            "{},{},{},{},{},{},{}",
            s.timestamp_iso(),
            quoted(s.name()),
            s.user_type(),
            quoted(&sig.user_agent),
            quoted(&sig.screen_resolution),
            quoted(&sig.timezone),
            iso8601::format(&entry.saved_at),
        ));
    }
    lines.join("\n")
}

/// Download name for an export made on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("graduation_form_submissions_{}.csv", date.format("%Y-%m-%d"))
}
