use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::{Error, Result};

/// Port that expects TLS from the first byte instead of STARTTLS
const SMTPS_PORT: u16 = 465;

/// Sends HTML mail to one recipient
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;

    /// Connect and authenticate without sending anything
    async fn test_connection(&self) -> Result<()>;
}

/// SMTP sender using the configured relay and credentials
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let (Some(address), Some(password)) = (&config.address, &config.password) else {
            return Err(Error::Config(
                "Email credentials not configured (EMAIL_ADDRESS, EMAIL_PASSWORD)".to_string(),
            ));
        };

        let from: Mailbox = address
            .parse()
            .map_err(|e| Error::Config(format!("Invalid sender address '{}': {}", address, e)))?;

        let builder = if config.smtp_port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
        }
        .map_err(|e| Error::Config(format!("Invalid SMTP server '{}': {}", config.smtp_server, e)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(address.clone(), password.clone()))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait::async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::Notification(format!("Invalid recipient '{}': {}", to, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| Error::Notification(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Notification(format!("SMTP send to {} failed: {}", to, e)))?;

        tracing::info!("Email sent successfully to {}", to);
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let ok = self
            .transport
            .test_connection()
            .await
            .map_err(|e| Error::Notification(format!("SMTP connection failed: {}", e)))?;

        if ok {
            Ok(())
        } else {
            Err(Error::Notification("SMTP server did not accept the connection".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        let config = EmailConfig::default();
        assert!(matches!(SmtpMailer::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_sender() {
        let config = EmailConfig {
            address: Some("not an address".to_string()),
            password: Some("secret".to_string()),
            ..EmailConfig::default()
        };
        assert!(matches!(SmtpMailer::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_builds_with_credentials() {
        let config = EmailConfig {
            address: Some("alerts@corp.test".to_string()),
            password: Some("secret".to_string()),
            ..EmailConfig::default()
        };
        assert!(SmtpMailer::new(&config).is_ok());
    }
}
