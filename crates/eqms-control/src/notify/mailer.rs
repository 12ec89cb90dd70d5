//! Outbound mail transports

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail relay rejected message with status {0}")]
    Rejected(u16),

    #[error("Message has no recipients")]
    NoRecipients,
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Delivers email
///
/// Implementations are called from spawned tasks; a failure is logged by the
/// caller and never retried.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Mail transport configuration
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// HTTP endpoint of the mail relay; `None` logs messages instead of sending
    pub relay_url: Option<String>,
    /// Bearer key for the relay
    pub relay_key: Option<String>,
    /// Sender address
    pub from: String,
    pub timeout: Duration,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            relay_key: None,
            from: "EQMS <noreply@eqms.local>".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl MailerConfig {
    /// Build the transport described by this config
    pub fn build(&self) -> Result<Arc<dyn Mailer>, MailError> {
        match &self.relay_url {
            Some(url) => {
                info!("Sending notification email through relay {}", url);
                Ok(Arc::new(RelayMailer::new(self)?))
            }
            None => {
                info!("No mail relay configured, notification email will only be logged");
                Ok(Arc::new(LogMailer))
            }
        }
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

/// Posts messages as JSON to an HTTP mail relay
pub struct RelayMailer {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    from: String,
}

impl RelayMailer {
    pub fn new(config: &MailerConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url: config.relay_url.clone().unwrap_or_default(),
            key: config.relay_key.clone(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        debug!(recipients = message.to.len(), subject = %message.subject, "Email accepted by relay");
        Ok(())
    }
}

/// Logs messages instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        info!(
            to = ?message.to,
            subject = %message.subject,
            "Email (log transport)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_requires_recipients() {
        let message = EmailMessage {
            to: vec![],
            subject: "hello".to_string(),
            html: "<p>hi</p>".to_string(),
        };

        assert!(matches!(
            LogMailer.send(&message).await,
            Err(MailError::NoRecipients)
        ));
    }

    #[tokio::test]
    async fn test_default_config_builds_log_transport() {
        let mailer = MailerConfig::default().build().unwrap();
        let message = EmailMessage {
            to: vec!["agent@example.com".to_string()],
            subject: "hello".to_string(),
            html: "<p>hi</p>".to_string(),
        };

        assert!(mailer.send(&message).await.is_ok());
    }
}
