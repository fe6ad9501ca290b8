use std::sync::Arc;

use super::email::{EmailSender, SmtpMailer};
use super::format;
use super::models::{Channel, Delivery, Recipient};
use super::whatsapp::{TwilioClient, WhatsAppSender};
use crate::config::AppConfig;
use crate::feed::Article;

/// How a channel is wired for this run
enum Route<T: ?Sized> {
    /// Turned off in the config; recipients are ignored
    Disabled,
    /// Enabled but unusable; each recipient gets a failed delivery with this reason
    Unavailable(String),
    Ready(Arc<T>),
}

/// Sends one digest per recipient over every enabled channel
pub struct Notifier {
    email: Route<dyn EmailSender>,
    whatsapp: Route<dyn WhatsAppSender>,
}

impl Notifier {
    pub fn new(config: &AppConfig) -> Self {
        let email: Route<dyn EmailSender> = if !config.email.enabled {
            Route::Disabled
        } else {
            match SmtpMailer::new(&config.email) {
                Ok(mailer) => Route::Ready(Arc::new(mailer)),
                Err(e) => {
                    tracing::warn!("Email channel unavailable: {}", e);
                    Route::Unavailable(e.to_string())
                }
            }
        };

        let whatsapp: Route<dyn WhatsAppSender> = if !config.whatsapp.enabled {
            Route::Disabled
        } else {
            match TwilioClient::new(&config.whatsapp) {
                Ok(client) => Route::Ready(Arc::new(client)),
                Err(e) => {
                    tracing::warn!("WhatsApp channel unavailable: {}", e);
                    Route::Unavailable(e.to_string())
                }
            }
        };

        Self { email, whatsapp }
    }

    /// Build a notifier around explicit senders; `None` disables the channel
    pub fn with_senders(
        email: Option<Arc<dyn EmailSender>>,
        whatsapp: Option<Arc<dyn WhatsAppSender>>,
    ) -> Self {
        Self {
            email: email.map_or(Route::Disabled, Route::Ready),
            whatsapp: whatsapp.map_or(Route::Disabled, Route::Ready),
        }
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => !matches!(self.email, Route::Disabled),
            Channel::WhatsApp => !matches!(self.whatsapp, Route::Disabled),
        }
    }

    /// Deliver the digest for `articles` to every recipient of an enabled
    /// channel. A failing recipient never stops the others.
    pub async fn deliver(&self, articles: &[Article], recipients: &[Recipient]) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        if articles.is_empty() {
            return deliveries;
        }

        let subject = format::email_subject(articles);
        let html = format::email_body(articles);
        let text = format::whatsapp_body(articles);

        for recipient in recipients.iter().filter(|r| r.active) {
            let result = match recipient.channel {
                Channel::Email => match &self.email {
                    Route::Disabled => continue,
                    Route::Unavailable(reason) => Err(reason.clone()),
                    Route::Ready(sender) => sender
                        .send(&recipient.address, &subject, &html)
                        .await
                        .map_err(|e| e.to_string()),
                },
                Channel::WhatsApp => match &self.whatsapp {
                    Route::Disabled => continue,
                    Route::Unavailable(reason) => Err(reason.clone()),
                    Route::Ready(sender) => sender
                        .send(&recipient.address, &text)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                },
            };

            if let Err(e) = &result {
                tracing::error!(
                    "Failed to send {} digest to {}: {}",
                    recipient.channel,
                    recipient.address,
                    e
                );
            }

            deliveries.push(Delivery {
                channel: recipient.channel,
                recipient: recipient.address.clone(),
                error: result.err(),
            });
        }

        deliveries
    }

    /// Check every enabled channel; one entry per channel
    pub async fn test_channels(&self) -> Vec<(Channel, std::result::Result<(), String>)> {
        let mut results = Vec::new();

        match &self.email {
            Route::Disabled => {}
            Route::Unavailable(reason) => results.push((Channel::Email, Err(reason.clone()))),
            Route::Ready(sender) => results.push((
                Channel::Email,
                sender.test_connection().await.map_err(|e| e.to_string()),
            )),
        }

        match &self.whatsapp {
            Route::Disabled => {}
            Route::Unavailable(reason) => results.push((Channel::WhatsApp, Err(reason.clone()))),
            Route::Ready(sender) => results.push((
                Channel::WhatsApp,
                sender.test_connection().await.map_err(|e| e.to_string()),
            )),
        }

        results
    }
}
