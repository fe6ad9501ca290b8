use anyhow::Result;

use blogsentry_core::storage::{
    ArticleRepository, Database, NotificationRepository, SourceRepository,
};

pub async fn run(db: &Database) -> Result<()> {
    let article_repo = ArticleRepository::new(db);
    let source_repo = SourceRepository::new(db);

    let stats = article_repo.stats().await?;
    let (sent, failed) = NotificationRepository::new(db).counts().await?;

    println!("Articles");
    println!("  Total:          {}", stats.total);
    println!("  Last 7 days:    {}", stats.recent);
    println!("  Summarized:     {}", stats.summarized);
    println!("  Pending:        {}", stats.pending);
    println!("  Failed:         {}", stats.failed);
    println!("  Skipped:        {}", stats.skipped);
    println!("  Notified:       {}", stats.notified);

    println!("\nSources");
    println!(
        "  Active:         {} of {}",
        source_repo.count_active().await?,
        source_repo.count().await?
    );

    let per_source = article_repo.count_by_source().await?;
    if !per_source.is_empty() {
        println!("\nArticles per source");
        for (name, count) in &per_source {
            println!("  {:<32} {}", name, count);
        }
    }

    println!("\nNotifications");
    println!("  Sent:           {}", sent);
    println!("  Failed:         {}", failed);

    Ok(())
}
