use anyhow::{anyhow, bail, Result};

use blogsentry_core::{
    feed::{truncate_with_ellipsis, SummaryStatus},
    storage::{ArticleFilter, ArticleRepository, Database, NotificationRepository, SourceRepository},
};

use super::{resolve_article, short_id};

pub async fn list(
    db: &Database,
    source: Option<&str>,
    status: Option<&str>,
    search: Option<String>,
    limit: u32,
) -> Result<()> {
    let source_id = match source {
        Some(name) => Some(
            SourceRepository::new(db)
                .find_by_name(name)
                .await?
                .ok_or_else(|| anyhow!("Source not found: {}", name))?
                .id,
        ),
        None => None,
    };

    let status = match status {
        Some(s) => match SummaryStatus::parse(&s.to_lowercase()) {
            Some(status) => Some(status),
            None => bail!("Unknown status '{}', expected pending, done, failed or skipped", s),
        },
        None => None,
    };

    let articles = ArticleRepository::new(db)
        .list(&ArticleFilter {
            source_id,
            status,
            search,
            limit: limit.max(1),
        })
        .await?;

    if articles.is_empty() {
        println!("No articles found.");
        return Ok(());
    }

    for article in &articles {
        let date = article
            .published_at
            .unwrap_or(article.created_at)
            .format("%Y-%m-%d");
        let notified = if article.notified { "" } else { " *" };

        println!(
            "{}  {}  [{}]{}  {}",
            short_id(&article.id),
            date,
            article.summary_status,
            notified,
            truncate_with_ellipsis(&article.title, 70)
        );
        println!("          {} | {}", article.source_name, article.url);
    }

    println!("\n{} articles (* = not yet notified)", articles.len());
    Ok(())
}

pub async fn show(db: &Database, id: &str) -> Result<()> {
    let article = resolve_article(db, id).await?;

    println!("{}", article.title);
    println!("{}", "=".repeat(article.title.chars().count().min(80)));
    println!("ID:        {}", article.id);
    println!("Source:    {}", article.source_name);
    println!("URL:       {}", article.url);
    if let Some(published) = article.published_at {
        println!("Published: {}", published.format("%Y-%m-%d %H:%M"));
    }
    println!("Scraped:   {}", article.created_at.format("%Y-%m-%d %H:%M"));
    println!("Status:    {}", article.summary_status);
    if let Some(err) = &article.summary_error {
        println!("Reason:    {}", err);
    }

    match &article.summary {
        Some(summary) => println!("\nSUMMARY:\n{}", summary),
        None => println!("\nNo summary available."),
    }

    if let Some(key_points) = article.key_points.as_deref().filter(|k| !k.is_empty()) {
        println!("\n{}", key_points);
    }

    let deliveries = NotificationRepository::new(db)
        .list_for_article(article.id)
        .await?;
    if !deliveries.is_empty() {
        println!("\nNOTIFICATIONS:");
        for entry in &deliveries {
            let error = entry
                .error
                .as_deref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default();
            println!(
                "  {} {} -> {}: {}{}",
                entry.sent_at.format("%Y-%m-%d %H:%M"),
                entry.channel,
                entry.recipient,
                entry.status,
                error
            );
        }
    }

    Ok(())
}
