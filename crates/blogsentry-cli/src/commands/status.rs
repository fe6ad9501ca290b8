use std::sync::Arc;

use anyhow::Result;

use blogsentry_core::{
    notify::Channel,
    storage::{ArticleRepository, Database, RecipientRepository, ScrapeLogRepository, SourceRepository},
    AppConfig, Pipeline,
};

use super::daemon::running_pid;

fn on_off(enabled: bool, configured: bool) -> &'static str {
    match (enabled, configured) {
        (false, _) => "disabled",
        (true, false) => "enabled, not configured",
        (true, true) => "enabled",
    }
}

pub async fn run(db: Database, config: Arc<AppConfig>, check: bool) -> Result<()> {
    match running_pid() {
        Some(pid) => println!("Daemon:     running (PID: {})", pid),
        None => println!("Daemon:     not running"),
    }
    if config.sync.run_interval_secs == 0 {
        println!("Schedule:   disabled");
    } else {
        println!("Schedule:   every {} seconds", config.sync.run_interval_secs);
    }

    let ai_key = match config.ai.provider.as_str() {
        "openai" => config.ai.openai_api_key.is_some(),
        _ => config.ai.anthropic_api_key.is_some(),
    };
    println!(
        "AI:         {} ({})",
        on_off(config.ai.enabled, ai_key),
        config.ai.provider
    );
    println!(
        "Email:      {}",
        on_off(config.email.enabled, config.email.is_configured())
    );
    println!(
        "WhatsApp:   {}",
        on_off(config.whatsapp.enabled, config.whatsapp.is_configured())
    );

    let source_repo = SourceRepository::new(&db);
    let recipient_repo = RecipientRepository::new(&db);
    let stats = ArticleRepository::new(&db).stats().await?;

    println!(
        "\nSources:    {} active of {}",
        source_repo.count_active().await?,
        source_repo.count().await?
    );
    println!(
        "Recipients: {} email, {} WhatsApp",
        recipient_repo.list_active(Channel::Email).await?.len(),
        recipient_repo.list_active(Channel::WhatsApp).await?.len()
    );
    println!(
        "Articles:   {} total, {} pending, {} not yet notified",
        stats.total,
        stats.pending,
        stats.total.saturating_sub(stats.notified)
    );

    let failing: Vec<_> = source_repo
        .list_active()
        .await?
        .into_iter()
        .filter(|s| s.has_error())
        .collect();
    if !failing.is_empty() {
        println!("\nSources with errors:");
        for source in &failing {
            println!(
                "  {}: {}",
                source.name,
                source.last_error.as_deref().unwrap_or_default()
            );
        }
    }

    let logs = ScrapeLogRepository::new(&db).recent(10).await?;
    if !logs.is_empty() {
        println!("\nRecent activity:");
        for entry in &logs {
            println!(
                "  {} {:<16} {:<10} {} {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.source_name,
                entry.status,
                entry.articles_found,
                entry.message.as_deref().unwrap_or_default()
            );
        }
    }

    if check {
        println!("\nChecking connections...");
        db.ping().await?;
        println!("  Database:  ok");

        let pipeline = Pipeline::new(db, config)?;
        match pipeline.summarizer() {
            Some(summarizer) => match summarizer.ping().await {
                Ok(_) => println!("  AI ({}): ok", summarizer.provider_name()),
                Err(e) => println!("  AI ({}): {}", summarizer.provider_name(), e),
            },
            None => println!("  AI:        not available"),
        }

        for (channel, result) in pipeline.notifier().test_channels().await {
            match result {
                Ok(()) => println!("  {}: ok", channel),
                Err(e) => println!("  {}: {}", channel, e),
            }
        }
    }

    Ok(())
}
