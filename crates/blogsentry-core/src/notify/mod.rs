mod email;
pub mod format;
mod models;
mod notifier;
mod whatsapp;

#[cfg(test)]
pub(crate) use notifier::testing;

pub use email::{EmailSender, SmtpMailer};
pub use models::{Channel, Delivery, NotifyReport, Recipient};
pub use notifier::Notifier;
pub use whatsapp::{whatsapp_address, TwilioClient, WhatsAppSender};
