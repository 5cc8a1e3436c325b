use super::credentials::MailCredentials;
use crate::core::error::QmError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// A fully composed HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl OutgoingMail {
    pub fn to_message(&self) -> Result<Message, QmError> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| QmError::Mail(format!("invalid sender '{}': {}", self.from, e)))?;
        let to: Mailbox = self
            .to
            .parse()
            .map_err(|e| QmError::Mail(format!("invalid recipient '{}': {}", self.to, e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(self.html_body.clone())
            .map_err(|e| QmError::Mail(format!("failed to build message: {}", e)))
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    async fn send(&self, mail: &OutgoingMail, credentials: &MailCredentials) -> Result<(), QmError>;
}

/// SMTP submission with STARTTLS and login authentication.
pub struct SmtpMailer {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        SmtpMailer {
            host: host.to_string(),
            port,
            timeout,
        }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail, credentials: &MailCredentials) -> Result<(), QmError> {
        let message = mail.to_message()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| QmError::Mail(format!("invalid SMTP relay {}: {}", self.host, e)))?
            .port(self.port)
            .timeout(Some(self.timeout))
            .credentials(Credentials::new(
                credentials.user.clone(),
                credentials.password.clone(),
            ))
            .build();

        let response = transport
            .send(message)
            .await
            .map_err(|e| QmError::Mail(e.to_string()))?;
        tracing::debug!(code = %response.code(), "SMTP server accepted message");
        Ok(())
    }
}
