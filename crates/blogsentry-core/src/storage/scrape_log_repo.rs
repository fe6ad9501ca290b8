use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;

use super::Database;
use crate::feed::{ScrapeLogEntry, ScrapeStatus};
use crate::Result;

#[derive(FromRow)]
struct ScrapeLogRow {
    id: i64,
    source_name: String,
    status: String,
    message: Option<String>,
    articles_found: i64,
    created_at: DateTime<Utc>,
}

impl From<ScrapeLogRow> for ScrapeLogEntry {
    fn from(row: ScrapeLogRow) -> Self {
        ScrapeLogEntry {
            id: row.id,
            source_name: row.source_name,
            status: row.status,
            message: row.message,
            articles_found: row.articles_found.max(0) as u32,
            created_at: row.created_at,
        }
    }
}

/// Scrape history, one row per source per run
pub struct ScrapeLogRepository<'a> {
    db: &'a Database,
}

impl<'a> ScrapeLogRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        source_name: &str,
        status: ScrapeStatus,
        message: Option<&str>,
        articles_found: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scrape_log (source_name, status, message, articles_found, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(source_name)
        .bind(status.as_str())
        .bind(message)
        .bind(articles_found)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Most recent entries first
    pub async fn recent(&self, limit: u32) -> Result<Vec<ScrapeLogEntry>> {
        let rows: Vec<ScrapeLogRow> = sqlx::query_as(
            r#"
            SELECT id, source_name, status, message, articles_found, created_at
            FROM scrape_log
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(ScrapeLogEntry::from).collect())
    }

    /// Delete entries older than `retention_days`, returning how many were removed
    pub async fn cleanup(&self, retention_days: u32) -> Result<u32> {
        self.delete_before(Utc::now() - Duration::days(retention_days as i64))
            .await
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u32> {
        let result = sqlx::query("DELETE FROM scrape_log WHERE created_at < ?")
            .bind(cutoff)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_recent_and_cleanup() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ScrapeLogRepository::new(&db);

        repo.record("Detect FYI", ScrapeStatus::Success, Some("Found 2 new articles"), 2)
            .await
            .unwrap();
        repo.record("Detect FYI", ScrapeStatus::Error, Some("HTTP 503"), 0)
            .await
            .unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].status, "error");
        assert_eq!(recent[1].articles_found, 2);

        assert_eq!(repo.cleanup(30).await.unwrap(), 0);
        assert_eq!(
            repo.delete_before(Utc::now() + Duration::minutes(1)).await.unwrap(),
            2
        );
        assert!(repo.recent(10).await.unwrap().is_empty());
    }
}
