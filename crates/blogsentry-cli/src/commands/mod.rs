pub mod articles;
pub mod cleanup;
pub mod daemon;
pub mod init;
pub mod pipeline;
pub mod recipient;
pub mod source;
pub mod stats;
pub mod status;

use anyhow::{bail, Result};
use blogsentry_core::feed::Article;
use blogsentry_core::storage::{ArticleRepository, Database};

/// Resolve a full or shortened article ID
pub(crate) async fn resolve_article(db: &Database, id: &str) -> Result<Article> {
    let mut matches = ArticleRepository::new(db).find_by_id_prefix(id).await?;

    match matches.len() {
        0 => bail!("No article with ID '{}'", id),
        1 => Ok(matches.remove(0)),
        _ => bail!("ID prefix '{}' matches several articles, use more characters", id),
    }
}

/// First 8 characters of an ID, enough to pass back to `show` or `reprocess`
pub(crate) fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}
