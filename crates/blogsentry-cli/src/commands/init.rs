use anyhow::Result;

use blogsentry_core::AppConfig;

pub fn run(force: bool) -> Result<()> {
    let path = AppConfig::config_path();

    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it with the defaults.");
        return Ok(());
    }

    AppConfig::default().save()?;

    println!("Wrote default configuration to {}", path.display());
    println!("\nSecrets can stay out of the file; these variables override it:");
    println!("  ANTHROPIC_API_KEY / OPENAI_API_KEY");
    println!("  EMAIL_ADDRESS, EMAIL_PASSWORD, SMTP_SERVER, SMTP_PORT");
    println!("  TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER");
    println!("  DATABASE_URL");
    Ok(())
}
