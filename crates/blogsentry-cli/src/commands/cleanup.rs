use anyhow::Result;

use blogsentry_core::{scheduler::cleanup_old_logs, storage::Database, AppConfig};

pub async fn run(db: &Database, config: &AppConfig) -> Result<()> {
    println!(
        "Removing scrape log entries older than {} days...",
        config.general.log_retention_days
    );

    let deleted = cleanup_old_logs(db, config).await?;

    if deleted > 0 {
        println!("Deleted {} log entries.", deleted);
    } else {
        println!("Nothing to clean up.");
    }

    Ok(())
}
