use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::notify::{Channel, Recipient};
use crate::{Error, Result};

#[derive(FromRow)]
struct RecipientRow {
    id: String,
    channel: String,
    address: String,
    active: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<RecipientRow> for Recipient {
    type Error = Error;

    fn try_from(row: RecipientRow) -> Result<Self> {
        Ok(Recipient {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            channel: row.channel.parse()?,
            address: row.address,
            active: row.active != 0,
            created_at: row.created_at,
        })
    }
}

/// Repository for notification recipients
pub struct RecipientRepository<'a> {
    db: &'a Database,
}

impl<'a> RecipientRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a recipient; returns `None` if the address is already registered on that channel
    pub async fn add(&self, channel: Channel, address: &str) -> Result<Option<Recipient>> {
        let id = Uuid::new_v4();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO recipients (id, channel, address, active, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(channel.as_str())
        .bind(address.trim())
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(self.list_all().await?.into_iter().find(|r| r.id == id))
    }

    pub async fn remove(&self, channel: Channel, address: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipients WHERE channel = ? AND address = ?")
            .bind(channel.as_str())
            .bind(address.trim())
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_all(&self) -> Result<Vec<Recipient>> {
        let rows: Vec<RecipientRow> = sqlx::query_as(
            r#"
            SELECT id, channel, address, active, created_at
            FROM recipients
            ORDER BY channel ASC, address ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Recipient::try_from).collect()
    }

    /// Active recipients of one channel
    pub async fn list_active(&self, channel: Channel) -> Result<Vec<Recipient>> {
        let rows: Vec<RecipientRow> = sqlx::query_as(
            r#"
            SELECT id, channel, address, active, created_at
            FROM recipients
            WHERE channel = ? AND active = 1
            ORDER BY address ASC
            "#,
        )
        .bind(channel.as_str())
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Recipient::try_from).collect()
    }
}
