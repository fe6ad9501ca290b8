use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::WhatsAppConfig;
use crate::{Error, Result};

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Sends a WhatsApp text to one number
#[async_trait::async_trait]
pub trait WhatsAppSender: Send + Sync {
    /// Returns the provider's message id
    async fn send(&self, to: &str, body: &str) -> Result<String>;

    /// Check that the account credentials are accepted
    async fn test_connection(&self) -> Result<()>;
}

#[derive(Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Twilio REST API client for the WhatsApp channel
pub struct TwilioClient {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let (Some(account_sid), Some(auth_token)) = (&config.account_sid, &config.auth_token)
        else {
            return Err(Error::Config(
                "Twilio credentials not configured (TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN)"
                    .to_string(),
            ));
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.clone(),
            auth_token: auth_token.clone(),
            from: whatsapp_address(&config.from_number),
        })
    }

    fn account_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}", self.base_url, self.account_sid)
    }

    async fn error_from(response: reqwest::Response) -> Error {
        let status = response.status();
        match response.json::<TwilioError>().await {
            Ok(err) => Error::Notification(format!(
                "Twilio error (HTTP {}, code {}): {}",
                status.as_u16(),
                err.code.map_or_else(|| "-".to_string(), |c| c.to_string()),
                err.message
            )),
            Err(_) => Error::Notification(format!("Twilio returned HTTP {}", status)),
        }
    }
}

#[async_trait::async_trait]
impl WhatsAppSender for TwilioClient {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        let to = whatsapp_address(to);

        let response = self
            .client
            .post(format!("{}/Messages.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from.as_str()), ("To", to.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Twilio request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let message: TwilioMessage = response
            .json()
            .await
            .map_err(|e| Error::Notification(format!("Unexpected Twilio response: {}", e)))?;

        tracing::info!("WhatsApp message sent to {}, SID: {}", to, message.sid);
        Ok(message.sid)
    }

    async fn test_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}.json", self.account_url()))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Twilio request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}

/// Prefix a phone number with `whatsapp:` unless already present
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, number)
    }
}
