//! Invitation service configuration - every tunable as a TOML value
//!
//! Each section implements `Default` with the values in `config::defaults`,
//! so a missing file or a partial file behaves exactly like the built-in setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "INVITE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "invite_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `InviteConfig::load()` which searches:
/// 1. `$INVITE_CONFIG` env var
/// 2. `./invite_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InviteConfig {
    /// Remote spreadsheet endpoint
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Local log and retry queue
    #[serde(default)]
    pub storage: StorageConfig,

    /// Analytics providers
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Form validation bounds
    #[serde(default)]
    pub form: FormConfig,

    /// Thank-you wishes and event details
    #[serde(default)]
    pub invitation: InvitationConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl InviteConfig {
    /// Load configuration using the standard search order:
    /// 1. `$INVITE_CONFIG` environment variable
    /// 2. `./invite_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded invite config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded invite config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found — using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys only produce warnings; semantic errors fail the load.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Invite config saved");
        Ok(())
    }

    /// Check the config for values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = super::validation::validate_semantics(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {err}", path = .0.display(), err = .1)]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({path}): {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Endpoint
// ============================================================================

/// Remote spreadsheet endpoint (a deployed web-app script).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    /// Per-request deadline inside the HTTP transport
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Deadline the pipeline races each attempt against
    #[serde(default = "default_pipeline_timeout_ms")]
    pub pipeline_timeout_ms: u64,

    /// Never inspect endpoint replies; completed calls count as presumed success
    #[serde(default = "default_true")]
    pub opaque_responses: bool,

    /// Connectivity probe period in seconds (0 = no probe, assume online)
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl EndpointConfig {
    /// The endpoint URL when delivery is switched on.
    pub fn active_url(&self) -> Option<&str> {
        let url = self.url.trim();
        (self.enabled && !url.is_empty()).then_some(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            request_timeout_ms: defaults::REMOTE_REQUEST_TIMEOUT_MS,
            pipeline_timeout_ms: defaults::PIPELINE_TIMEOUT_MS,
            opaque_responses: true,
            probe_interval_secs: defaults::PROBE_INTERVAL_SECS,
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    defaults::REMOTE_REQUEST_TIMEOUT_MS
}
fn default_pipeline_timeout_ms() -> u64 {
    defaults::PIPELINE_TIMEOUT_MS
}
fn default_probe_interval_secs() -> u64 {
    defaults::PROBE_INTERVAL_SECS
}
fn default_true() -> bool {
    true
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local submission log cap (oldest entries evicted first)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Failed reconciliation rounds before a queued entry is dropped (0 = never drop)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Queue submissions made while offline instead of skipping remote delivery
    #[serde(default = "default_true")]
    pub queue_when_offline: bool,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::LOG_MAX_ENTRIES,
            max_retries: defaults::MAX_RETRIES,
            queue_when_offline: true,
            data_dir: PathBuf::from(defaults::DATA_DIR),
        }
    }
}

fn default_max_entries() -> usize {
    defaults::LOG_MAX_ENTRIES
}
fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}

// ============================================================================
// Analytics
// ============================================================================

/// Analytics providers. A provider is active when its id is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// GA4 measurement id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_analytics_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook_pixel_id: Option<String>,
}

// ============================================================================
// Form
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_name_min_len")]
    pub name_min_len: usize,

    #[serde(default = "default_name_max_len")]
    pub name_max_len: usize,

    /// Accepted guest types
    #[serde(default = "default_user_types")]
    pub user_types: Vec<String>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            name_min_len: defaults::NAME_MIN_LEN,
            name_max_len: defaults::NAME_MAX_LEN,
            user_types: default_user_types(),
        }
    }
}

fn default_name_min_len() -> usize {
    defaults::NAME_MIN_LEN
}
fn default_name_max_len() -> usize {
    defaults::NAME_MAX_LEN
}
fn default_user_types() -> Vec<String> {
    vec!["outsider".to_string(), "student".to_string()]
}

// ============================================================================
// Invitation
// ============================================================================

/// Thank-you wishes and event details. `{name}` is replaced with the guest's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationConfig {
    #[serde(default = "default_wishes")]
    pub wishes: Vec<String>,

    #[serde(default = "default_event_title")]
    pub event_title: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_event_time")]
    pub event_time: String,

    #[serde(default = "default_venue")]
    pub venue: String,

    #[serde(default = "default_closing")]
    pub closing: String,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            wishes: default_wishes(),
            event_title: default_event_title(),
            host: default_host(),
            event_time: default_event_time(),
            venue: default_venue(),
            closing: default_closing(),
        }
    }
}

fn default_wishes() -> Vec<String> {
    [
        "Thank you, {name}, for taking the time to come to my graduation. Having you there made the day mean so much more!",
        "My graduation would not have been complete without {name}. Thank you for coming and sharing that special moment with me.",
        "I was so happy to see {name} at my graduation. Thank you for being there and bringing such warm smiles!",
        "I know how busy you are, {name}, which makes your being there even more touching. Thank you so much!",
        "Thank you, {name}, for travelling all that way to celebrate my graduation with me. You are wonderful!",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}
fn default_event_title() -> String {
    "GRADUATION CEREMONY".to_string()
}
fn default_host() -> String {
    "the graduate".to_string()
}
fn default_event_time() -> String {
    "10:30 - 12:00, Friday, 15 August 2025".to_string()
}
fn default_venue() -> String {
    "Van Lang University, Campus 3".to_string()
}
fn default_closing() -> String {
    "Your presence, {name}, is an honour and the greatest gift to me!".to_string()
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}
