use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::Result;

/// One delivery attempt of one article to one recipient
#[derive(Debug, Clone, Serialize)]
pub struct NotificationLogEntry {
    pub id: i64,
    pub article_id: Uuid,
    pub channel: String,
    pub recipient: String,
    /// `sent` or `failed`
    pub status: String,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationLogEntry {
    pub fn is_sent(&self) -> bool {
        self.status == "sent"
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: i64,
    article_id: String,
    channel: String,
    recipient: String,
    status: String,
    error: Option<String>,
    sent_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationLogEntry {
    fn from(row: NotificationRow) -> Self {
        NotificationLogEntry {
            id: row.id,
            article_id: Uuid::parse_str(&row.article_id).unwrap_or_default(),
            channel: row.channel,
            recipient: row.recipient,
            status: row.status,
            error: row.error,
            sent_at: row.sent_at,
        }
    }
}

pub struct NotificationRepository<'a> {
    db: &'a Database,
}

impl<'a> NotificationRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record the outcome of one delivery attempt; `error` of `None` means sent
    pub async fn record(
        &self,
        article_id: Uuid,
        channel: &str,
        recipient: &str,
        error: Option<&str>,
    ) -> Result<()> {
        let status = if error.is_some() { "failed" } else { "sent" };

        sqlx::query(
            r#"
            INSERT INTO notification_log (article_id, channel, recipient, status, error, sent_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article_id.to_string())
        .bind(channel)
        .bind(recipient)
        .bind(status)
        .bind(error)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    pub async fn list_for_article(&self, article_id: Uuid) -> Result<Vec<NotificationLogEntry>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, article_id, channel, recipient, status, error, sent_at
            FROM notification_log
            WHERE article_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(article_id.to_string())
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(NotificationLogEntry::from).collect())
    }

    /// Count attempts by status: (sent, failed)
    pub async fn counts(&self) -> Result<(u32, u32)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'sent' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
            FROM notification_log
            "#,
        )
        .fetch_one(self.db.pool())
        .await?;

        Ok((row.0 as u32, row.1 as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{NewArticle, NewSource};
    use crate::storage::{ArticleRepository, SourceRepository};

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::new_in_memory().await.unwrap();
        let source = SourceRepository::new(&db)
            .create(&NewSource {
                name: "Blog".to_string(),
                url: "https://blog.test/".to_string(),
                is_rss: false,
                feed_url: None,
            })
            .await
            .unwrap();
        let article = ArticleRepository::new(&db)
            .create(&NewArticle {
                source_id: source.id,
                title: "Post".to_string(),
                url: "https://blog.test/post".to_string(),
                published_at: None,
                raw_text: None,
            })
            .await
            .unwrap()
            .unwrap();

        let repo = NotificationRepository::new(&db);
        repo.record(article.id, "email", "soc@corp.test", None).await.unwrap();
        repo.record(article.id, "whatsapp", "+15550001", Some("invalid number"))
            .await
            .unwrap();

        let entries = repo.list_for_article(article.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_sent());
        assert_eq!(entries[1].status, "failed");
        assert_eq!(entries[1].error.as_deref(), Some("invalid number"));
        assert_eq!(repo.counts().await.unwrap(), (1, 1));
    }
}
