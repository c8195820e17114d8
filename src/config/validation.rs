//! Config validation: unknown-key detection with Levenshtein suggestions
//! and semantic checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Unknown keys never break a config.

use std::collections::HashSet;

use super::InviteConfig;

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `InviteConfig`.
///
/// Maintained by hand to match the structs in `invite_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [endpoint]
        "endpoint",
        "endpoint.enabled",
        "endpoint.url",
        "endpoint.request_timeout_ms",
        "endpoint.pipeline_timeout_ms",
        "endpoint.opaque_responses",
        "endpoint.probe_interval_secs",
        // [storage]
        "storage",
        "storage.max_entries",
        "storage.max_retries",
        "storage.queue_when_offline",
        "storage.data_dir",
        // [analytics]
        "analytics",
        "analytics.google_analytics_id",
        "analytics.facebook_pixel_id",
        // [form]
        "form",
        "form.name_min_len",
        "form.name_max_len",
        "form.user_types",
        // [invitation]
        "invitation",
        "invitation.wishes",
        "invitation.event_title",
        "invitation.host",
        "invitation.event_time",
        "invitation.venue",
        "invitation.closing",
        // [server]
        "server",
        "server.addr",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Semantic Validation
// ============================================================================

/// Values the service cannot run with. Empty when the config is usable.
pub fn validate_semantics(config: &InviteConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let endpoint = &config.endpoint;
    if endpoint.enabled && endpoint.url.trim().is_empty() {
        errors.push("endpoint.url is required when endpoint.enabled = true".to_string());
    }
    if endpoint.enabled
        && !endpoint.url.trim().is_empty()
        && !(endpoint.url.starts_with("https://") || endpoint.url.starts_with("http://"))
    {
        errors.push(format!("endpoint.url = '{}' must be an http(s) URL", endpoint.url));
    }
    if endpoint.request_timeout_ms == 0 {
        errors.push("endpoint.request_timeout_ms must be > 0".to_string());
    }
    if endpoint.pipeline_timeout_ms == 0 {
        errors.push("endpoint.pipeline_timeout_ms must be > 0".to_string());
    }

    let analytics = &config.analytics;
    if analytics
        .google_analytics_id
        .as_deref()
        .is_some_and(|id| id.trim().is_empty())
    {
        errors.push("analytics.google_analytics_id is set but empty".to_string());
    }
    if analytics
        .facebook_pixel_id
        .as_deref()
        .is_some_and(|id| id.trim().is_empty())
    {
        errors.push("analytics.facebook_pixel_id is set but empty".to_string());
    }

    if config.storage.max_entries == 0 {
        errors.push("storage.max_entries must be > 0".to_string());
    }

    let form = &config.form;
    if form.name_min_len == 0 {
        errors.push("form.name_min_len must be > 0".to_string());
    }
    if form.name_min_len > form.name_max_len {
        errors.push(format!(
            "form.name_min_len ({}) must not exceed form.name_max_len ({})",
            form.name_min_len, form.name_max_len
        ));
    }
    if form.user_types.is_empty() {
        errors.push("form.user_types must list at least one guest type".to_string());
    }
    for t in &form.user_types {
        if t.parse::<crate::types::UserType>().is_err() {
            errors.push(format!("form.user_types contains unknown guest type '{t}'"));
        }
    }

    if config.invitation.wishes.is_empty() {
        errors.push("invitation.wishes must contain at least one wish".to_string());
    }

    errors
}
