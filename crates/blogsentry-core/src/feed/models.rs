use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored blog or RSS feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub is_rss: bool,
    /// Feed endpoint when it differs from the site URL
    pub feed_url: Option<String>,
    pub active: bool,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// URL the scraper should request for this source
    pub fn fetch_url(&self) -> &str {
        if self.is_rss {
            self.feed_url.as_deref().unwrap_or(&self.url)
        } else {
            &self.url
        }
    }

    pub fn kind(&self) -> &'static str {
        if self.is_rss {
            "rss"
        } else {
            "html"
        }
    }

    /// Check if the last scrape of this source failed
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Data required to create a new source
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub is_rss: bool,
    pub feed_url: Option<String>,
}

/// Summarization state of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    /// Stored, not yet sent to the model
    Pending,
    Done,
    /// Model call failed; summary stays empty until reprocessed
    Failed,
    /// Too little text to summarize
    Skipped,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Pending => "pending",
            SummaryStatus::Done => "done",
            SummaryStatus::Failed => "failed",
            SummaryStatus::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SummaryStatus::Pending),
            "done" => Some(SummaryStatus::Done),
            "failed" => Some(SummaryStatus::Failed),
            "skipped" => Some(SummaryStatus::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scraped article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub source_id: Uuid,
    /// Joined from the source table for display
    pub source_name: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_text: Option<String>,
    pub summary: Option<String>,
    pub key_points: Option<String>,
    pub summary_status: SummaryStatus,
    pub summary_error: Option<String>,
    pub summarized_at: Option<DateTime<Utc>>,
    pub notified: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Check if the article has been summarized
    pub fn is_summarized(&self) -> bool {
        self.summary.is_some()
    }
}

/// Data required to create a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub raw_text: Option<String>,
}

/// An article discovered on a source page or feed, before its body is fetched
#[derive(Debug, Clone)]
pub struct ArticleCandidate {
    pub url: String,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Text carried by the feed entry itself, if any
    pub text: Option<String>,
}

/// Outcome of scraping one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Success,
    NoNewArticles,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::NoNewArticles => "no_new_articles",
            ScrapeStatus::Error => "error",
        }
    }
}

/// One row of scrape history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeLogEntry {
    pub id: i64,
    pub source_name: String,
    pub status: String,
    pub message: Option<String>,
    pub articles_found: u32,
    pub created_at: DateTime<Utc>,
}

/// Cut `text` to at most `max_len` bytes on a char boundary, appending "..." when cut
pub fn truncate_with_ellipsis(text: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }

    if text.len() <= max_len {
        text.to_string()
    } else {
        let mut end = 0;
        for (idx, ch) in text.char_indices() {
            let next = idx + ch.len_utf8();
            if next > max_len {
                break;
            }
            end = next;
        }
        format!("{}...", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(is_rss: bool, feed_url: Option<&str>) -> Source {
        Source {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            url: "https://blog.example.test/".to_string(),
            is_rss,
            feed_url: feed_url.map(str::to_string),
            active: true,
            last_scraped_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fetch_url_prefers_feed_for_rss() {
        assert_eq!(
            source(true, Some("https://blog.example.test/feed")).fetch_url(),
            "https://blog.example.test/feed"
        );
        assert_eq!(source(true, None).fetch_url(), "https://blog.example.test/");
        assert_eq!(
            source(false, Some("https://blog.example.test/feed")).fetch_url(),
            "https://blog.example.test/"
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("héllo wörld", 3), "hé...");
        assert_eq!(truncate_with_ellipsis("abc", 0), "");
    }

    #[test]
    fn test_summary_status_roundtrip_names() {
        for status in [
            SummaryStatus::Pending,
            SummaryStatus::Done,
            SummaryStatus::Failed,
            SummaryStatus::Skipped,
        ] {
            assert_eq!(SummaryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SummaryStatus::parse("unknown"), None);
    }
}
