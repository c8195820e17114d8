//! Invitation Service Configuration
//!
//! Service configuration loaded from TOML files: endpoint, storage caps,
//! retry policy, form bounds, invitation text and server address.
//!
//! ## Loading Order
//!
//! 1. `INVITE_CONFIG` environment variable (path to TOML file)
//! 2. `invite_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! Library types take the config explicitly. The binary additionally
//! publishes it once through [`init`] / [`get`]:
//!
//! ```ignore
//! config::init(InviteConfig::load());
//! let cap = config::get().storage.max_entries;
//! ```

mod invite_config;
pub mod defaults;
pub mod validation;

pub use invite_config::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static INVITE_CONFIG: OnceLock<InviteConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: InviteConfig) {
    if INVITE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global configuration.
///
/// Falls back to built-in defaults (and locks them in) if `init()` was never
/// called.
pub fn get() -> &'static InviteConfig {
    INVITE_CONFIG.get_or_init(|| {
        tracing::warn!("config::get() called before config::init(), using defaults");
        InviteConfig::default()
    })
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    INVITE_CONFIG.get().is_some()
}
