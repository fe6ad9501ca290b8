use anyhow::{bail, Result};

use blogsentry_core::{
    notify::{whatsapp_address, Channel},
    storage::{Database, RecipientRepository},
};

fn normalize(channel: Channel, address: &str) -> Result<String> {
    let address = address.trim();
    match channel {
        Channel::Email => {
            if !address.contains('@') {
                bail!("'{}' does not look like an email address", address);
            }
            Ok(address.to_string())
        }
        Channel::WhatsApp => {
            let number = whatsapp_address(address);
            let digits = number.trim_start_matches("whatsapp:");
            let valid = digits
                .strip_prefix('+')
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
            if !valid {
                bail!("WhatsApp numbers must be in international format, e.g. +15551234567");
            }
            Ok(digits.to_string())
        }
    }
}

pub async fn add(db: &Database, channel: &str, address: &str) -> Result<()> {
    let channel: Channel = channel.parse()?;
    let address = normalize(channel, address)?;

    match RecipientRepository::new(db).add(channel, &address).await? {
        Some(_) => println!("Added {} recipient: {}", channel, address),
        None => println!("{} recipient {} is already registered.", channel, address),
    }
    Ok(())
}

pub async fn remove(db: &Database, channel: &str, address: &str) -> Result<()> {
    let channel: Channel = channel.parse()?;
    let address = normalize(channel, address)?;

    if RecipientRepository::new(db).remove(channel, &address).await? {
        println!("Removed {} recipient: {}", channel, address);
    } else {
        println!("No {} recipient {}.", channel, address);
    }
    Ok(())
}

pub async fn list(db: &Database) -> Result<()> {
    let recipients = RecipientRepository::new(db).list_all().await?;

    if recipients.is_empty() {
        println!("No recipients yet.");
        println!("\nTo add one, run:");
        println!("  blogsentry recipient add email you@example.com");
        println!("  blogsentry recipient add whatsapp +15551234567");
        return Ok(());
    }

    println!("Recipients ({}):\n", recipients.len());
    for recipient in &recipients {
        let state = if recipient.active { "" } else { " (inactive)" };
        println!("  [{}] {}{}", recipient.channel, recipient.address, state);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Channel::Email, " soc@corp.test ").unwrap(), "soc@corp.test");
        assert!(normalize(Channel::Email, "nobody").is_err());
        assert_eq!(
            normalize(Channel::WhatsApp, "whatsapp:+15550001").unwrap(),
            "+15550001"
        );
        assert!(normalize(Channel::WhatsApp, "555-0001").is_err());
        assert!(normalize(Channel::WhatsApp, "+").is_err());
        assert!(normalize(Channel::WhatsApp, "whatsapp:+").is_err());
    }
}
