use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{NewSource, Source};
use crate::{Error, Result};

/// Blogs monitored out of the box
const DEFAULT_SOURCES: &[(&str, &str, Option<&str>)] = &[
    ("Detection Engineering", "https://www.detectionengineering.net/", None),
    (
        "Rohit Tamma Substack",
        "https://rohittamma.substack.com/",
        Some("https://rohittamma.substack.com/feed"),
    ),
    ("Cybersec Automation", "https://www.cybersec-automation.com/", None),
    (
        "Anton on Security",
        "https://medium.com/@anton.on.security",
        Some("https://medium.com/feed/@anton.on.security"),
    ),
    (
        "Google Cloud Security Blog",
        "https://www.googlecloudcommunity.com/gc/Community-Blog/bg-p/security-blog",
        None,
    ),
    ("Detect FYI", "https://detect.fyi/", None),
    (
        "Dylan H Williams Medium",
        "https://medium.com/@dylanhwilliams",
        Some("https://medium.com/feed/@dylanhwilliams"),
    ),
];

/// Repository for source CRUD operations
pub struct SourceRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct SourceRow {
    id: String,
    name: String,
    url: String,
    is_rss: i32,
    feed_url: Option<String>,
    active: i32,
    last_scraped_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            url: row.url,
            is_rss: row.is_rss != 0,
            feed_url: row.feed_url,
            active: row.active != 0,
            last_scraped_at: row.last_scraped_at,
            last_error: row.last_error,
            created_at: row.created_at,
        }
    }
}

const SELECT_SOURCE: &str = r#"
    SELECT id, name, url, is_rss, feed_url, active, last_scraped_at, last_error, created_at
    FROM sources
"#;

impl<'a> SourceRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new source
    pub async fn create(&self, new_source: &NewSource) -> Result<Source> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sources (id, name, url, is_rss, feed_url, active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_source.name)
        .bind(&new_source.url)
        .bind(new_source.is_rss as i32)
        .bind(&new_source.feed_url)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::SourceNotFound(id.to_string()))
    }

    /// Find a source by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Source>> {
        let row: Option<SourceRow> = sqlx::query_as(&format!("{SELECT_SOURCE} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(Source::from))
    }

    /// Find a source by its unique name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Source>> {
        let row: Option<SourceRow> = sqlx::query_as(&format!("{SELECT_SOURCE} WHERE name = ?"))
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(Source::from))
    }

    /// Find a source by site or feed URL
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Source>> {
        let row: Option<SourceRow> =
            sqlx::query_as(&format!("{SELECT_SOURCE} WHERE url = ? OR feed_url = ? LIMIT 1"))
                .bind(url)
                .bind(url)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Source::from))
    }

    /// Get all sources ordered by name
    pub async fn list_all(&self) -> Result<Vec<Source>> {
        let rows: Vec<SourceRow> = sqlx::query_as(&format!("{SELECT_SOURCE} ORDER BY name ASC"))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Get sources that should be scraped
    pub async fn list_active(&self) -> Result<Vec<Source>> {
        let rows: Vec<SourceRow> =
            sqlx::query_as(&format!("{SELECT_SOURCE} WHERE active = 1 ORDER BY name ASC"))
                .fetch_all(self.db.pool())
                .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Edit name, URL and kind of an existing source
    pub async fn update(&self, id: Uuid, source: &NewSource) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET name = ?, url = ?, is_rss = ?, feed_url = ?
            WHERE id = ?
            "#,
        )
        .bind(&source.name)
        .bind(&source.url)
        .bind(source.is_rss as i32)
        .bind(&source.feed_url)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable scraping for a source
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE sources SET active = ? WHERE id = ?")
            .bind(active as i32)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a completed scrape and clear any previous error
    pub async fn mark_scraped(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources
            SET last_scraped_at = ?, last_error = NULL
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Update source scrape error
    pub async fn update_error(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources
            SET last_error = ?, last_scraped_at = ?
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

    /// Delete a source and all its articles
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get total source count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }

    pub async fn count_active(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources WHERE active = 1")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }

    /// Insert the built-in source list if no source exists yet; returns how many were added
    pub async fn seed_defaults(&self) -> Result<u32> {
        if self.count().await? > 0 {
            return Ok(0);
        }

        tracing::info!("Initializing default blog sources...");

        for (name, url, feed_url) in DEFAULT_SOURCES {
            self.create(&NewSource {
                name: name.to_string(),
                url: url.to_string(),
                is_rss: feed_url.is_some(),
                feed_url: feed_url.map(str::to_string),
            })
            .await?;
        }

        tracing::info!("Added {} default blog sources", DEFAULT_SOURCES.len());
        Ok(DEFAULT_SOURCES.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_source(name: &str, url: &str, is_rss: bool) -> NewSource {
        NewSource {
            name: name.to_string(),
            url: url.to_string(),
            is_rss,
            feed_url: None,
        }
    }

    #[tokio::test]
    async fn test_source_crud() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SourceRepository::new(&db);

        let created = repo
            .create(&new_source("Detect FYI", "https://detect.fyi/", false))
            .await
            .unwrap();
        assert!(created.active);
        assert!(!created.is_rss);

        let by_name = repo.find_by_name("Detect FYI").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        assert!(repo.set_active(created.id, false).await.unwrap());
        assert!(repo.list_active().await.unwrap().is_empty());
        assert_eq!(repo.list_all().await.unwrap().len(), 1);

        let mut edited = new_source("Detect FYI", "https://detect.fyi/feed", true);
        edited.feed_url = Some("https://detect.fyi/feed".to_string());
        assert!(repo.update(created.id, &edited).await.unwrap());
        let found = repo.find_by_url("https://detect.fyi/feed").await.unwrap().unwrap();
        assert!(found.is_rss);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SourceRepository::new(&db);

        repo.create(&new_source("Blog", "https://a.test/", false)).await.unwrap();
        let err = repo.create(&new_source("Blog", "https://b.test/", false)).await;
        assert!(matches!(err, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_error_then_success_clears_error() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SourceRepository::new(&db);
        let source = repo.create(&new_source("Blog", "https://a.test/", false)).await.unwrap();

        repo.update_error(source.id, "HTTP 500").await.unwrap();
        let failed = repo.find_by_id(source.id).await.unwrap().unwrap();
        assert_eq!(failed.last_error.as_deref(), Some("HTTP 500"));

        repo.mark_scraped(source.id).await.unwrap();
        let ok = repo.find_by_id(source.id).await.unwrap().unwrap();
        assert!(ok.last_error.is_none());
        assert!(ok.last_scraped_at.is_some());
    }

    #[tokio::test]
    async fn test_seed_defaults_only_when_empty() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = SourceRepository::new(&db);

        assert_eq!(repo.seed_defaults().await.unwrap(), 7);
        assert_eq!(repo.seed_defaults().await.unwrap(), 0);

        let anton = repo.find_by_name("Anton on Security").await.unwrap().unwrap();
        assert!(anton.is_rss);
        assert_eq!(anton.fetch_url(), "https://medium.com/feed/@anton.on.security");
        assert_eq!(repo.count_active().await.unwrap(), 7);
    }
}
