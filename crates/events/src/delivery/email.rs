//! Email notification delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send plain-text
//! notification emails to the portal's recipient list. Configuration is loaded
//! from environment variables; if `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and no mailer should be
//! constructed.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::messages::EmailMessage;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    #[error("No email recipients configured")]
    NoRecipients,
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when neither `SMTP_FROM` nor `SMTP_USER` is set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@autobids.local";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Portal administrators notified of submissions and job results.
    pub recipients: Vec<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable          | Required | Default                   |
    /// |-------------------|----------|---------------------------|
    /// | `SMTP_HOST`       | yes      |                           |
    /// | `SMTP_PORT`       | no       | `587`                     |
    /// | `SMTP_FROM`       | no       | `SMTP_USER`, else `noreply@autobids.local` |
    /// | `SMTP_USER`       | no       |                           |
    /// | `SMTP_PASSWORD`   | no       |                           |
    /// | `MAIL_RECIPIENTS` | no       | empty (whitespace-separated list) |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        let smtp_user = std::env::var("SMTP_USER").ok();
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .ok()
                .or_else(|| smtp_user.clone())
                .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user,
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            recipients: parse_recipients(&std::env::var("MAIL_RECIPIENTS").unwrap_or_default()),
        })
    }
}

/// Split a whitespace-separated recipient list.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends notification emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    /// Create a new email delivery service with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Build the MIME message addressed to every configured recipient.
    pub fn build(&self, message: &EmailMessage) -> Result<Message, EmailError> {
        if self.config.recipients.is_empty() {
            return Err(EmailError::NoRecipients);
        }
        let mut builder = Message::builder()
            .from(self.config.from_address.parse::<Mailbox>()?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.config.recipients {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        builder
            .body(message.body.clone())
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    /// Send `message` to the configured recipients.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = self.build(message)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            recipients = self.config.recipients.len(),
            subject = %message.subject,
            "Notification email sent"
        );
        Ok(())
    }

    /// Send and log failures instead of returning them.
    ///
    /// Job bodies use this so a mail outage never changes a task's outcome.
    pub async fn send_logged(&self, message: &EmailMessage) {
        if let Err(e) = self.send(message).await {
            tracing::warn!(error = %e, subject = %message.subject, "Failed to send email");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
