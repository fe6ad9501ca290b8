use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Delivery channel for digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    WhatsApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::WhatsApp => "whatsapp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "whatsapp" => Ok(Channel::WhatsApp),
            other => Err(Error::Config(format!(
                "Unknown channel '{}', expected 'email' or 'whatsapp'",
                other
            ))),
        }
    }
}

/// An email address or phone number that receives digests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub channel: Channel,
    pub address: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Result of one send attempt
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: Channel,
    pub recipient: String,
    pub error: Option<String>,
}

impl Delivery {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Totals of one notification run
#[derive(Debug, Clone, Default)]
pub struct NotifyReport {
    pub articles: u32,
    pub sent: u32,
    pub failed: u32,
}

impl NotifyReport {
    pub fn add(&mut self, delivery: &Delivery) {
        if delivery.succeeded() {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
    }
}
