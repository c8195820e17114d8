//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use graduation_invite::config::FormConfig;
use graduation_invite::delivery::{Encoding, RemoteTransport, TransportError};
use graduation_invite::{
    Clock, DeliveryOutcome, Environment, FixedClock, RawForm, Submission, SubmissionBuilder,
};

/// How the fake endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Never answers before `Duration` elapses (honours cancellation)
    Hang(Duration),
}

/// Remote transport that records every attempt.
pub struct FakeTransport {
    behavior: Mutex<Behavior>,
    calls: Mutex<Vec<(String, Encoding)>>,
    /// Names that fail whatever the behavior
    failing_names: Mutex<Vec<String>>,
    cancelled: AtomicBool,
}

impl FakeTransport {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
            failing_names: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn always_fail(&self, name: &str) {
        self.failing_names.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Encoding)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls().iter().filter(|(n, _)| n == name).count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteTransport for FakeTransport {
    async fn deliver(
        &self,
        submission: &Submission,
        encoding: Encoding,
        cancel: CancellationToken,
    ) -> Result<DeliveryOutcome, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((submission.name().to_string(), encoding));
        if self
            .failing_names
            .lock()
            .unwrap()
            .iter()
            .any(|n| n == submission.name())
        {
            return Err(TransportError::Status(500));
        }
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            Behavior::Succeed => Ok(DeliveryOutcome::Presumed),
            Behavior::Fail => Err(TransportError::Http("connection refused".to_string())),
            Behavior::Hang(delay) => {
                tokio::select! {
                    () = cancel.cancelled() => {
                        self.cancelled.store(true, Ordering::SeqCst);
                        Err(TransportError::Cancelled)
                    }
                    () = tokio::time::sleep(delay) => Ok(DeliveryOutcome::Presumed),
                }
            }
        }
    }

    async fn probe(&self) -> Result<(), TransportError> {
        match *self.behavior.lock().unwrap() {
            Behavior::Fail => Err(TransportError::Http("unreachable".to_string())),
            _ => Ok(()),
        }
    }
}

pub fn frozen_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 8, 15, 3, 30, 0).unwrap()))
}

/// Build a submission through the public form + builder path.
pub fn submission(name: &str, user_type: &str) -> Submission {
    let form = RawForm::new(name, Some(user_type))
        .validate(&FormConfig::default())
        .unwrap();
    let env = Environment {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".to_string(),
        screen_width: 390,
        screen_height: 844,
        timezone: "Asia/Ho_Chi_Minh".to_string(),
    };
    SubmissionBuilder::new(frozen_clock()).build(&form, &env)
}
