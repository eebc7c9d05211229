//! Webhook alerts for failed runs and list changes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AlertsConfig;
use crate::error::SyncError;
use crate::reconciler::{Action, RunOutcome};
use crate::transport::{HttpRequest, Transport};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Error => "ERROR",
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    level: &'a str,
    title: &'a str,
    message: &'a str,
    timestamp: String,
    source: &'a str,
}

/// Alert manager
pub struct AlertManager {
    config: AlertsConfig,
    transport: Arc<dyn Transport>,
}

impl AlertManager {
    pub fn new(config: AlertsConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.webhook.enabled
    }

    /// Send an alert to the webhook, if enabled. Delivery failures are logged
    /// and never affect the caller.
    pub async fn send(&self, level: AlertLevel, title: &str, message: &str) {
        if !self.is_enabled() {
            return;
        }
        match self.send_webhook(level, title, message).await {
            Ok(()) => debug!("Webhook alert sent: {}", title),
            Err(e) => warn!("Webhook alert failed: {}", e),
        }
    }

    /// Alert on a run outcome: always on failure, on change when asked to
    pub async fn notify(&self, outcome: &RunOutcome) {
        let alert = match outcome {
            RunOutcome::Failed(failure) => Some(AlertTypes::run_failed(&failure.to_string())),
            RunOutcome::Success(report)
                if report.action == Action::Replaced && self.config.webhook.notify_on_change =>
            {
                Some(AlertTypes::list_replaced(
                    report.desired_count,
                    report.added,
                    report.removed,
                ))
            }
            RunOutcome::Success(_) => None,
        };

        if let Some((level, title, message)) = alert {
            self.send(level, &title, &message).await;
        }
    }

    async fn send_webhook(
        &self,
        level: AlertLevel,
        title: &str,
        message: &str,
    ) -> Result<(), SyncError> {
        let payload = WebhookPayload {
            level: level.as_str(),
            title,
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
            source: "relaysync",
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| SyncError::Format(format!("webhook payload: {}", e)))?;

        let mut request = HttpRequest::post(&self.config.webhook.url, body);
        // Headers were validated during config deserialization
        let headers: BTreeMap<_, _> = self.config.webhook.headers.iter().collect();
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        self.transport.execute(request).await.map(|_| ())
    }
}

/// Alert types for common events
pub struct AlertTypes;

impl AlertTypes {
    pub fn run_failed(error: &str) -> (AlertLevel, String, String) {
        (
            AlertLevel::Error,
            "List Sync Failed".to_string(),
            format!("Failed to synchronize the relay list:\n{}", error),
        )
    }

    pub fn list_replaced(entries: usize, added: usize, removed: usize) -> (AlertLevel, String, String) {
        (
            AlertLevel::Info,
            "List Updated".to_string(),
            format!(
                "Replaced the relay list.\n\
                 Entries: {}\n\
                 Added: {}\n\
                 Removed: {}",
                entries, added, removed
            ),
        )
    }
}
