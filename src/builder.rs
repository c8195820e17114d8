//! Submission builder: validated form + environment metadata -> [`Submission`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::form::ValidForm;
use crate::types::{ClientSignature, Submission};

/// Time source. Injected so tests can freeze time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Client environment reported alongside the form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Environment {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    /// IANA timezone name
    pub timezone: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            user_agent: "unknown".to_string(),
            screen_width: 0,
            screen_height: 0,
            timezone: "UTC".to_string(),
        }
    }
}

impl Environment {
    fn signature(&self) -> ClientSignature {
        ClientSignature {
            user_agent: self.user_agent.clone(),
            screen_resolution: format!("{}x{}", self.screen_width, self.screen_height),
            timezone: self.timezone.clone(),
        }
    }
}

/// Assembles submissions, stamping them with the injected clock.
#[derive(Clone)]
pub struct SubmissionBuilder {
    clock: Arc<dyn Clock>,
}

impl SubmissionBuilder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Never fails; the form is already validated.
    pub fn build(&self, form: &ValidForm, env: &Environment) -> Submission {
        Submission::new(
            form.name.clone(),
            form.user_type,
            self.clock.now(),
            env.signature(),
        )
    }
}
