//! Email notification for sync outcomes.
//!
//! Delivery is best-effort from the orchestrator's point of view: a failed
//! notification is logged by the caller, never unwinding a sync that already
//! succeeded remotely.

use std::path::Path;

use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{SyncClientError, SyncClientResult};

/// Subject line sent when a run succeeds.
pub const SUCCESS_SUBJECT: &str = "Success - Sync with TS";
/// Subject line sent when a run fails.
pub const FAILURE_SUBJECT: &str = "Failure - Sync with TS";

const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP configuration, typically loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Master switch; when false all sends become silent no-ops.
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_addresses: Vec<String>,
}

impl NotificationConfig {
    /// A configuration with notifications turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: None,
            from_address: None,
            to_addresses: Vec::new(),
        }
    }

    /// Load the configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> SyncClientResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SyncClientError::Configuration(format!(
                "invalid notification config {}: {e}",
                path.display()
            ))
        })
    }
}

/// Sends the fixed success/failure email signal over SMTP (STARTTLS).
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotificationConfig,
}

impl Notifier {
    /// Create a notifier from its configuration.
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Whether sends will actually go out.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send the success signal.
    pub async fn notify_success(&self, body: &str) -> SyncClientResult<()> {
        self.send(SUCCESS_SUBJECT, body).await
    }

    /// Send the failure signal.
    pub async fn notify_failure(&self, body: &str) -> SyncClientResult<()> {
        self.send(FAILURE_SUBJECT, body).await
    }

    async fn send(&self, subject: &str, body: &str) -> SyncClientResult<()> {
        if !self.config.enabled {
            debug!(subject, "Notifications disabled, skipping send");
            return Ok(());
        }
        let host = self.config.smtp_host.as_deref().ok_or_else(|| {
            SyncClientError::Configuration(
                "notifications enabled but smtp_host is not set".to_string(),
            )
        })?;
        let from = self.config.from_address.as_deref().ok_or_else(|| {
            SyncClientError::Configuration(
                "notifications enabled but from_address is not set".to_string(),
            )
        })?;
        if self.config.to_addresses.is_empty() {
            return Err(SyncClientError::Configuration(
                "notifications enabled but to_addresses is empty".to_string(),
            ));
        }

        let mut builder = Message::builder()
            .from(from.parse().map_err(|e| {
                SyncClientError::Notification(format!("invalid from address '{from}': {e}"))
            })?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for to in &self.config.to_addresses {
            builder = builder.to(to.parse().map_err(|e| {
                SyncClientError::Notification(format!("invalid recipient '{to}': {e}"))
            })?);
        }
        let message = builder
            .body(body.to_string())
            .map_err(|e| SyncClientError::Notification(e.to_string()))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| SyncClientError::Notification(e.to_string()))?
            .port(self.config.smtp_port.unwrap_or(DEFAULT_SMTP_PORT))
            .build();
        mailer
            .send(message)
            .await
            .map_err(|e| SyncClientError::Notification(e.to_string()))?;

        info!(subject, recipients = self.config.to_addresses.len(), "Sent notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_notifier_is_a_silent_no_op() {
        let notifier = Notifier::new(NotificationConfig::disabled());
        notifier.notify_success("done").await.unwrap();
        notifier.notify_failure("broke").await.unwrap();
    }

    #[tokio::test]
    async fn enabled_without_host_is_a_configuration_error() {
        let notifier = Notifier::new(NotificationConfig {
            enabled: true,
            smtp_host: None,
            smtp_port: None,
            from_address: Some("sync@example.com".to_string()),
            to_addresses: vec!["ops@example.com".to_string()],
        });
        let err = notifier.notify_failure("broke").await.unwrap_err();
        assert!(matches!(err, SyncClientError::Configuration(_)));
    }

    #[test]
    fn config_parses_from_json() {
        let config: NotificationConfig = serde_json::from_str(
            r#"{
                "enabled": true,
                "smtp_host": "smtp.example.com",
                "from_address": "sync@example.com",
                "to_addresses": ["ops@example.com"]
            }"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.smtp_port, None);
        assert_eq!(config.to_addresses.len(), 1);
    }

    #[test]
    fn subjects_are_fixed() {
        assert_eq!(SUCCESS_SUBJECT, "Success - Sync with TS");
        assert_eq!(FAILURE_SUBJECT, "Failure - Sync with TS");
    }
}
