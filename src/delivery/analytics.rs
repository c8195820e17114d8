//! Analytics sink: best-effort event emission.
//!
//! Providers are tag-based in the page; here each configured provider gets a
//! structured `tracing` event under the `analytics` target, which a log
//! shipper can forward.

use tracing::info;

use crate::config::AnalyticsConfig;
use crate::types::UserType;

/// One analytics event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsEvent {
    pub action: &'static str,
    pub category: &'static str,
    pub label: String,
}

impl AnalyticsEvent {
    /// The event fired for every accepted form.
    pub fn form_submission(user_type: UserType) -> Self {
        Self {
            action: "form_submission",
            category: "graduation_invitation",
            label: user_type.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Analytics provider {provider} failed: {reason}")]
pub struct AnalyticsError {
    pub provider: &'static str,
    pub reason: String,
}

pub trait AnalyticsSink: Send + Sync {
    fn emit(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Emits events as `tracing` records, one per configured provider.
#[derive(Debug, Clone)]
pub struct TracingAnalytics {
    google_analytics_id: Option<String>,
    facebook_pixel_id: Option<String>,
}

impl TracingAnalytics {
    /// `None` when no provider is configured.
    pub fn from_config(config: &AnalyticsConfig) -> Option<Self> {
        let sink = Self {
            google_analytics_id: config.google_analytics_id.clone(),
            facebook_pixel_id: config.facebook_pixel_id.clone(),
        };
        (sink.google_analytics_id.is_some() || sink.facebook_pixel_id.is_some()).then_some(sink)
    }
}

impl AnalyticsSink for TracingAnalytics {
    fn emit(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        if let Some(id) = &self.google_analytics_id {
            info!(
                target: "analytics",
                provider = "google_analytics",
                measurement_id = %id,
                event = event.action,
                event_category = event.category,
                event_label = %event.label,
                "analytics event"
            );
        }
        if let Some(id) = &self.facebook_pixel_id {
            info!(
                target: "analytics",
                provider = "facebook_pixel",
                pixel_id = %id,
                event = "Lead",
                content_name = event.category,
                content_category = %event.label,
                "analytics event"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_provider_means_no_sink() {
        assert!(TracingAnalytics::from_config(&AnalyticsConfig::default()).is_none());
    }

    #[test]
    fn test_configured_provider_emits() {
        let config = AnalyticsConfig {
            google_analytics_id: Some("G-TEST".to_string()),
            facebook_pixel_id: None,
        };
        let sink = TracingAnalytics::from_config(&config).unwrap();
        let event = AnalyticsEvent::form_submission(UserType::Student);
        assert_eq!(event.label, "student");
        assert!(sink.emit(&event).is_ok());
    }
}
