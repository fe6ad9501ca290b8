use std::sync::Arc;
use std::time::Duration;

use super::fetcher::PageFetcher;
use super::html::{extract_article_links, extract_text, extract_title, title_from_text, title_from_url};
use super::models::{ArticleCandidate, NewArticle, Source};
use super::parser::parse_feed;
use crate::config::AppConfig;
use crate::Result;

/// HTML articles with less text than this are treated as index or stub pages
const MIN_HTML_TEXT_CHARS: usize = 100;

/// Turns a source into new articles in two steps: `discover` lists candidates
/// from the feed or index page, `fetch_article` pulls the body of one candidate.
/// Callers drop already-stored URLs in between so known articles are never re-fetched.
pub struct Scraper {
    fetcher: Arc<dyn PageFetcher>,
    max_articles: usize,
    fetch_full_content: bool,
    delay: Duration,
}

impl Scraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &AppConfig) -> Self {
        Self {
            fetcher,
            max_articles: config.sync.max_articles_per_source.max(1),
            fetch_full_content: config.sync.fetch_full_content,
            delay: Duration::from_millis(config.sync.rate_limit_ms),
        }
    }

    /// Delay applied between page requests
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_articles(&self) -> usize {
        self.max_articles
    }

    /// List article candidates for a source
    pub async fn discover(&self, source: &Source) -> Result<Vec<ArticleCandidate>> {
        let url = source.fetch_url();
        let body = self.fetcher.fetch(url).await?;

        if source.is_rss {
            let candidates = parse_feed(&body, url, self.max_articles)?;
            tracing::info!("Parsed feed for {}: {} entries", source.name, candidates.len());
            Ok(candidates)
        } else {
            let html = String::from_utf8_lossy(&body);
            let links = extract_article_links(&html, url)?;
            tracing::info!("Found {} potential articles for {}", links.len(), source.name);

            Ok(links
                .into_iter()
                .map(|url| ArticleCandidate {
                    url,
                    title: None,
                    published_at: None,
                    text: None,
                })
                .collect())
        }
    }

    /// Fetch the body of one candidate; `None` when the page has no usable article
    pub async fn fetch_article(
        &self,
        source: &Source,
        candidate: ArticleCandidate,
    ) -> Result<Option<NewArticle>> {
        if source.is_rss {
            Ok(Some(self.complete_feed_entry(source, candidate).await))
        } else {
            self.complete_html_link(source, candidate).await
        }
    }

    async fn complete_feed_entry(&self, source: &Source, candidate: ArticleCandidate) -> NewArticle {
        let mut text = candidate.text;

        if self.fetch_full_content {
            match self.fetcher.fetch(&candidate.url).await {
                Ok(body) => {
                    let html = String::from_utf8_lossy(&body);
                    match extract_text(&html) {
                        Some(full) if full.len() > text.as_ref().map_or(0, |t| t.len()) => {
                            text = Some(full);
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not fetch full text of {}, keeping feed content: {}",
                        candidate.url,
                        e
                    );
                }
            }
        }

        let title = candidate
            .title
            .unwrap_or_else(|| title_from_url(&candidate.url));

        NewArticle {
            source_id: source.id,
            title,
            url: candidate.url,
            published_at: candidate.published_at,
            raw_text: text,
        }
    }

    async fn complete_html_link(
        &self,
        source: &Source,
        candidate: ArticleCandidate,
    ) -> Result<Option<NewArticle>> {
        let body = self.fetcher.fetch(&candidate.url).await?;
        let html = String::from_utf8_lossy(&body);

        let Some(text) = extract_text(&html) else {
            tracing::debug!("No content extracted from {}", candidate.url);
            return Ok(None);
        };

        if text.trim().chars().count() < MIN_HTML_TEXT_CHARS {
            tracing::debug!("Skipping {}: too little text", candidate.url);
            return Ok(None);
        }

        let title = candidate
            .title
            .or_else(|| extract_title(&html))
            .or_else(|| title_from_text(&text))
            .unwrap_or_else(|| title_from_url(&candidate.url));

        Ok(Some(NewArticle {
            source_id: source.id,
            title,
            url: candidate.url,
            published_at: candidate.published_at,
            raw_text: Some(text),
        }))
    }
}
