//! Submission records and their persisted wrappers.
//!
//! The serialized shape of [`Submission`] is the wire document sent to the
//! spreadsheet endpoint, so field names follow the endpoint's camelCase keys:
//!
//! ```json
//! { "name": "An", "userType": "student", "timestamp": "2025-08-15T10:30:00.000Z",
//!   "userAgent": "...", "screenResolution": "1920x1080", "timezone": "Asia/Ho_Chi_Minh" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Guest category chosen on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Guest from outside the university (needs an entry QR code)
    Outsider,
    /// Student of the university (no QR code needed)
    Student,
}

impl UserType {
    pub const ALL: [UserType; 2] = [UserType::Outsider, UserType::Student];

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Outsider => "outsider",
            UserType::Student => "student",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown user type '{0}'")]
pub struct ParseUserTypeError(pub String);

impl FromStr for UserType {
    type Err = ParseUserTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outsider" => Ok(UserType::Outsider),
            "student" => Ok(UserType::Student),
            other => Err(ParseUserTypeError(other.to_string())),
        }
    }
}

/// Descriptive client metadata. Never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSignature {
    pub user_agent: String,
    /// `<W>x<H>`
    pub screen_resolution: String,
    /// IANA timezone name
    pub timezone: String,
}

/// One visitor's submission. Built once by the submission builder and never
/// mutated afterwards; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    name: String,
    user_type: UserType,
    #[serde(rename = "timestamp", with = "iso8601")]
    submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    client_signature: ClientSignature,
}

impl Submission {
    pub(crate) fn new(
        name: String,
        user_type: UserType,
        submitted_at: DateTime<Utc>,
        client_signature: ClientSignature,
    ) -> Self {
        Self {
            name,
            user_type,
            submitted_at,
            client_signature,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn client_signature(&self) -> &ClientSignature {
        &self.client_signature
    }

    /// ISO-8601 timestamp with millisecond precision, as sent on the wire.
    pub fn timestamp_iso(&self) -> String {
        iso8601::format(&self.submitted_at)
    }
}

/// A submission as stored in the local submission log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(flatten)]
    pub submission: Submission,
    #[serde(with = "iso8601")]
    pub saved_at: DateTime<Utc>,
}

/// A submission waiting in the retry queue.
///
/// `attempts` counts reconciliation rounds that already failed for this entry.
/// Entries written without the counter load with `attempts = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSubmission {
    #[serde(flatten)]
    pub submission: Submission,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "Utc::now", with = "iso8601")]
    pub queued_at: DateTime<Utc>,
}

impl QueuedSubmission {
    pub fn new(submission: Submission, queued_at: DateTime<Utc>) -> Self {
        Self {
            submission,
            attempts: 0,
            queued_at,
        }
    }
}

/// Millisecond-precision RFC 3339 timestamps (`2025-08-15T10:30:00.000Z`).
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Submission {
        Submission::new(
            "An".to_string(),
            UserType::Student,
            Utc.with_ymd_and_hms(2025, 8, 15, 3, 30, 0).unwrap(),
            ClientSignature {
                user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
                screen_resolution: "1920x1080".to_string(),
                timezone: "Asia/Ho_Chi_Minh".to_string(),
            },
        )
    }

    #[test]
    fn test_wire_format_uses_endpoint_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["name"], "An");
        assert_eq!(json["userType"], "student");
        assert_eq!(json["timestamp"], "2025-08-15T03:30:00.000Z");
        assert_eq!(json["userAgent"], "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(json["screenResolution"], "1920x1080");
        assert_eq!(json["timezone"], "Asia/Ho_Chi_Minh");
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_queued_entry_without_counter_loads() {
        // Shape written by older clients: bare submission, no attempts/queuedAt
        let raw = r#"{"name":"Binh","userType":"outsider","timestamp":"2025-08-01T00:00:00.000Z",
            "userAgent":"ua","screenResolution":"390x844","timezone":"UTC"}"#;
        let queued: QueuedSubmission = serde_json::from_str(raw).unwrap();
        assert_eq!(queued.attempts, 0);
        assert_eq!(queued.submission.name(), "Binh");
        assert_eq!(queued.submission.user_type(), UserType::Outsider);
    }

    #[test]
    fn test_log_entry_carries_saved_at() {
        let entry = LogEntry {
            submission: sample(),
            saved_at: Utc.with_ymd_and_hms(2025, 8, 15, 3, 30, 1).unwrap(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["savedAt"], "2025-08-15T03:30:01.000Z");
        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_user_type_parse() {
        assert_eq!("Student".parse::<UserType>(), Ok(UserType::Student));
        assert_eq!(" outsider ".parse::<UserType>(), Ok(UserType::Outsider));
        assert!("teacher".parse::<UserType>().is_err());
    }
}
