use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{Article, NewArticle, SummaryStatus};
use crate::Result;

/// Repository for article CRUD operations
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: String,
    source_id: String,
    source_name: String,
    title: String,
    url: String,
    published_at: Option<DateTime<Utc>>,
    raw_text: Option<String>,
    summary: Option<String>,
    key_points: Option<String>,
    summary_status: String,
    summary_error: Option<String>,
    summarized_at: Option<DateTime<Utc>>,
    notified: i32,
    notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            source_id: Uuid::parse_str(&row.source_id).unwrap_or_default(),
            source_name: row.source_name,
            title: row.title,
            url: row.url,
            published_at: row.published_at,
            raw_text: row.raw_text,
            summary: row.summary,
            key_points: row.key_points,
            summary_status: SummaryStatus::parse(&row.summary_status)
                .unwrap_or(SummaryStatus::Pending),
            summary_error: row.summary_error,
            summarized_at: row.summarized_at,
            notified: row.notified != 0,
            notified_at: row.notified_at,
            created_at: row.created_at,
        }
    }
}

const SELECT_ARTICLE: &str = r#"
    SELECT a.id, a.source_id, s.name AS source_name, a.title, a.url, a.published_at,
           a.raw_text, a.summary, a.key_points, a.summary_status, a.summary_error,
           a.summarized_at, a.notified, a.notified_at, a.created_at
    FROM articles a
    JOIN sources s ON s.id = a.source_id
"#;

/// Filters for the article listing; unset fields match everything
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub source_id: Option<Uuid>,
    pub status: Option<SummaryStatus>,
    /// Matched against title, summary and raw text
    pub search: Option<String>,
    pub limit: u32,
}

impl Default for ArticleFilter {
    fn default() -> Self {
        Self {
            source_id: None,
            status: None,
            search: None,
            limit: 50,
        }
    }
}

/// Aggregate counts shown by the stats and status commands
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArticleStats {
    pub total: u32,
    pub summarized: u32,
    pub pending: u32,
    pub failed: u32,
    pub skipped: u32,
    pub notified: u32,
    /// Articles stored in the last 7 days
    pub recent: u32,
}

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new article; returns `None` when the URL is already stored
    pub async fn create(&self, new_article: &NewArticle) -> Result<Option<Article>> {
        let id = Uuid::new_v4();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
            (id, source_id, title, url, published_at, raw_text, summary_status, notified, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(new_article.source_id.to_string())
        .bind(&new_article.title)
        .bind(&new_article.url)
        .bind(new_article.published_at)
        .bind(&new_article.raw_text)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            self.find_by_id(id).await
        } else {
            tracing::debug!("Article already stored: {}", new_article.url);
            Ok(None)
        }
    }

    /// Check whether an article with this URL is already stored
    pub async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM articles WHERE url = ? LIMIT 1")
            .bind(url)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.is_some())
    }

    /// Find an article by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!("{SELECT_ARTICLE} WHERE a.id = ?"))
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(Article::from))
    }

    /// Articles whose ID starts with `prefix`, so short IDs can be typed on the command line.
    /// Anything but a non-empty run of hex digits and dashes matches nothing.
    pub async fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<Article>> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(Vec::new());
        }

        let pattern = format!("{}%", prefix);
        let rows: Vec<ArticleRow> =
            sqlx::query_as(&format!("{SELECT_ARTICLE} WHERE a.id LIKE ? LIMIT 2"))
                .bind(pattern)
                .fetch_all(self.db.pool())
                .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// List articles newest first
    pub async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let source_id = filter.source_id.map(|id| id.to_string());
        let status = filter.status.map(|s| s.as_str());
        let pattern = filter.search.as_ref().map(|q| format!("%{}%", q));

        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"{SELECT_ARTICLE}
            WHERE (? IS NULL OR a.source_id = ?)
              AND (? IS NULL OR a.summary_status = ?)
              AND (? IS NULL OR a.title LIKE ? OR a.summary LIKE ? OR a.raw_text LIKE ?)
            ORDER BY a.created_at DESC
            LIMIT ?
            "#
        ))
        .bind(&source_id)
        .bind(&source_id)
        .bind(status)
        .bind(status)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles in a given summary state, oldest first
    pub async fn list_by_status(&self, status: SummaryStatus, limit: u32) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"{SELECT_ARTICLE}
            WHERE a.summary_status = ?
            ORDER BY a.created_at ASC
            LIMIT ?
            "#
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles past summarization that no notification has covered yet
    pub async fn list_pending_notification(&self) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            r#"{SELECT_ARTICLE}
            WHERE a.notified = 0 AND a.summary_status != 'pending'
            ORDER BY a.created_at ASC
            "#
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Store a generated summary
    pub async fn mark_summarized(&self, id: Uuid, summary: &str, key_points: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET summary = ?, key_points = ?, summary_status = 'done',
                summary_error = NULL, summarized_at = ?
            WHERE id = ?
            "#,
        )
        .bind(summary)
        .bind(key_points)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Keep the article without a summary and remember why
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET summary = NULL, key_points = NULL, summary_status = 'failed',
                summary_error = ?, summarized_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    pub async fn mark_skipped(&self, id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET summary_status = 'skipped', summary_error = ?, summarized_at = ?
            WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Put failed articles back in the queue; returns how many were reset
    pub async fn reset_failed(&self) -> Result<u32> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET summary_status = 'pending', summary_error = NULL
            WHERE summary_status = 'failed'
            "#,
        )
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() as u32)
    }

    /// Mark an article as covered by a notification run
    pub async fn mark_notified(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET notified = 1, notified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    pub async fn stats(&self) -> Result<ArticleStats> {
        let week_ago = Utc::now() - Duration::days(7);

        let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN summary_status = 'done' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN summary_status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN summary_status = 'failed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN summary_status = 'skipped' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(notified), 0),
                COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0)
            FROM articles
            "#,
        )
        .bind(week_ago)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ArticleStats {
            total: row.0 as u32,
            summarized: row.1 as u32,
            pending: row.2 as u32,
            failed: row.3 as u32,
            skipped: row.4 as u32,
            notified: row.5 as u32,
            recent: row.6 as u32,
        })
    }

    /// Article count per source name, largest first
    pub async fn count_by_source(&self) -> Result<Vec<(String, u32)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT s.name, COUNT(a.id)
            FROM sources s
            LEFT JOIN articles a ON a.source_id = s.id
            GROUP BY s.id
            ORDER BY COUNT(a.id) DESC, s.name ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(|(name, n)| (name, n as u32)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NewSource;
    use crate::storage::SourceRepository;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let source = SourceRepository::new(&db)
            .create(&NewSource {
                name: "Example".to_string(),
                url: "https://example-blog.test/".to_string(),
                is_rss: true,
                feed_url: Some("https://example-blog.test/feed.xml".to_string()),
            })
            .await
            .unwrap();
        (db, source.id)
    }

    fn new_article(source_id: Uuid, url: &str, text: &str) -> NewArticle {
        NewArticle {
            source_id,
            title: format!("Post at {}", url),
            url: url.to_string(),
            published_at: None,
            raw_text: Some(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_ignores_duplicate_url() {
        let (db, source_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let first = repo
            .create(&new_article(source_id, "https://example-blog.test/a", "text"))
            .await
            .unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().source_name, "Example");

        let second = repo
            .create(&new_article(source_id, "https://example-blog.test/a", "other"))
            .await
            .unwrap();
        assert!(second.is_none());

        assert!(repo.exists_by_url("https://example-blog.test/a").await.unwrap());
        assert!(!repo.exists_by_url("https://example-blog.test/b").await.unwrap());
        assert_eq!(repo.stats().await.unwrap().total, 1);

        let stored = repo.list(&ArticleFilter::default()).await.unwrap().remove(0);
        let short_id = &stored.id.to_string()[..8];
        let found = repo.find_by_id_prefix(short_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stored.id);
    }

    #[tokio::test]
    async fn test_id_prefix_rejects_wildcards() {
        let (db, source_id) = setup().await;
        let repo = ArticleRepository::new(&db);
        let article = repo
            .create(&new_article(source_id, "https://example-blog.test/only", "text"))
            .await
            .unwrap()
            .unwrap();

        for input in ["%", "", "  ", "_", "a%", "x"] {
            assert!(
                repo.find_by_id_prefix(input).await.unwrap().is_empty(),
                "{input:?} should not match"
            );
        }

        let upper = article.id.to_string()[..6].to_uppercase();
        assert_eq!(repo.find_by_id_prefix(&upper).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summary_lifecycle() {
        let (db, source_id) = setup().await;
        let repo = ArticleRepository::new(&db);
        let article = repo
            .create(&new_article(source_id, "https://example-blog.test/a", "text"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.summary_status, SummaryStatus::Pending);

        repo.mark_failed(article.id, "rate limited").await.unwrap();
        let failed = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(failed.summary_status, SummaryStatus::Failed);
        assert!(failed.summary.is_none());
        assert_eq!(failed.summary_error.as_deref(), Some("rate limited"));

        assert_eq!(repo.reset_failed().await.unwrap(), 1);
        let pending = repo.list_by_status(SummaryStatus::Pending, 10).await.unwrap();
        assert_eq!(pending.len(), 1);

        repo.mark_summarized(article.id, "Short summary", "- point").await.unwrap();
        let done = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert!(done.is_summarized());
        assert!(done.summary_error.is_none());
        assert_eq!(done.key_points.as_deref(), Some("- point"));
    }

    #[tokio::test]
    async fn test_pending_notification_excludes_unsummarized() {
        let (db, source_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let a = repo
            .create(&new_article(source_id, "https://example-blog.test/a", "text"))
            .await
            .unwrap()
            .unwrap();
        let b = repo
            .create(&new_article(source_id, "https://example-blog.test/b", "text"))
            .await
            .unwrap()
            .unwrap();
        repo.create(&new_article(source_id, "https://example-blog.test/c", "text"))
            .await
            .unwrap();

        repo.mark_summarized(a.id, "s", "").await.unwrap();
        repo.mark_failed(b.id, "boom").await.unwrap();

        let pending = repo.list_pending_notification().await.unwrap();
        assert_eq!(pending.len(), 2);

        repo.mark_notified(a.id).await.unwrap();
        let pending = repo.list_pending_notification().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.summarized, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.notified, 1);
        assert_eq!(stats.recent, 3);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (db, source_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        let a = repo
            .create(&new_article(source_id, "https://example-blog.test/a", "kerberoasting"))
            .await
            .unwrap()
            .unwrap();
        repo.create(&new_article(source_id, "https://example-blog.test/b", "sigma rules"))
            .await
            .unwrap();
        repo.mark_summarized(a.id, "s", "").await.unwrap();

        let all = repo.list(&ArticleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let done = repo
            .list(&ArticleFilter {
                status: Some(SummaryStatus::Done),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(done.len(), 1);

        let found = repo
            .list(&ArticleFilter {
                search: Some("sigma".to_string()),
                source_id: Some(source_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://example-blog.test/b");

        let other = repo
            .list(&ArticleFilter {
                source_id: Some(Uuid::new_v4()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(other.is_empty());

        assert_eq!(repo.count_by_source().await.unwrap(), vec![("Example".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_deleting_source_cascades() {
        let (db, source_id) = setup().await;
        let repo = ArticleRepository::new(&db);
        repo.create(&new_article(source_id, "https://example-blog.test/a", "text"))
            .await
            .unwrap();

        SourceRepository::new(&db).delete(source_id).await.unwrap();
        assert_eq!(repo.stats().await.unwrap().total, 0);
    }
}
