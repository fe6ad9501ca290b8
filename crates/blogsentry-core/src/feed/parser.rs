use chrono::{DateTime, Utc};
use feed_rs::parser;
use url::Url;

use super::html::html_to_text;
use super::models::ArticleCandidate;
use crate::{Error, Result};

/// Parse RSS/Atom content into article candidates, newest-first as the feed lists them.
/// Entries without a link are dropped since articles are keyed by URL. Relative
/// links are resolved against `feed_url`.
pub fn parse_feed(content: &[u8], feed_url: &str, limit: usize) -> Result<Vec<ArticleCandidate>> {
    let base = Url::parse(feed_url)?;
    let feed = parser::parse(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    tracing::debug!("Parsed feed with {} entries", feed.entries.len());

    let candidates = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
                .or_else(|| entry.links.first())
                .map(|l| l.href.trim())
                .filter(|href| !href.is_empty())
                .and_then(|href| resolve_link(&base, href))?;

            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty());

            let body = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content));

            let text = body
                .as_deref()
                .map(html_to_text)
                .filter(|t| !t.is_empty());

            let published_at = entry
                .published
                .or(entry.updated)
                .map(DateTime::<Utc>::from);

            Some(ArticleCandidate {
                url,
                title,
                published_at,
                text,
            })
        })
        .take(limit)
        .collect();

    Ok(candidates)
}

fn resolve_link(base: &Url, href: &str) -> Option<String> {
    match base.join(href) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.to_string()),
        Ok(url) => {
            tracing::debug!("Skipping non-http feed link: {}", url);
            None
        }
        Err(e) => {
            tracing::debug!("Skipping invalid feed link {}: {}", href, e);
            None
        }
    }
}
