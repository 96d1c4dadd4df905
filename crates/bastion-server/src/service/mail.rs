//! Outbound mail collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::BoxedError;

/// Tracing target for the logging mailer.
const TRACING_TARGET_MAIL: &str = "bastion_server::mail";

/// A templated message handed to the [`MailService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Name of the template rendered by the transport.
    pub template: String,
    /// Values substituted into the template.
    #[serde(default)]
    pub substitutions: Value,
}

impl MailMessage {
    /// Creates a message for a single recipient without substitutions.
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            recipients: vec![recipient.into()],
            subject: subject.into(),
            template: template.into(),
            substitutions: Value::Null,
        }
    }

    /// Sets the template substitutions.
    pub fn with_substitutions(mut self, substitutions: Value) -> Self {
        self.substitutions = substitutions;
        self
    }
}

/// Outbound mail transport shared with mounted routes.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Sends a message.
    async fn send(&self, message: MailMessage) -> Result<(), BoxedError>;

    /// Verifies the transport. A failure is logged but does not abort startup.
    async fn verify(&self) -> Result<(), BoxedError> {
        Ok(())
    }
}

/// [`MailService`] that writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl LogMailer {
    /// Creates a new logging mailer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailService for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), BoxedError> {
        tracing::info!(
            target: TRACING_TARGET_MAIL,
            recipients = ?message.recipients,
            subject = %message.subject,
            template = %message.template,
            "mail message logged instead of sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn log_mailer_accepts_messages() -> anyhow::Result<()> {
        let message = MailMessage::new("user@example.com", "Welcome", "welcome")
            .with_substitutions(json!({ "name": "Ada" }));

        LogMailer::new()
            .send(message)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }
}
