use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::ai::Summarizer;
use crate::config::AppConfig;
use crate::feed::{Article, HttpFetcher, ScrapeStatus, Scraper, Source, SummaryStatus};
use crate::notify::{Notifier, NotifyReport};
use crate::storage::{
    ArticleRepository, Database, NotificationRepository, RecipientRepository,
    ScrapeLogRepository, SourceRepository,
};
use crate::{Error, Result};

/// Upper bound of pending articles handled in one summarization pass
const SUMMARIZE_BATCH: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub sources: u32,
    pub failed_sources: u32,
    pub new_articles: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SummarizeReport {
    pub summarized: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub scrape: ScrapeReport,
    pub summarize: SummarizeReport,
    pub notify: NotifyReport,
}

/// Scrape one source and store its new articles, returning how many were added.
/// Errors from the source listing itself are returned; a failing article page is
/// logged and skipped.
pub async fn scrape_source(db: &Database, scraper: &Scraper, source: &Source) -> Result<u32> {
    let article_repo = ArticleRepository::new(db);

    let candidates = scraper.discover(source).await?;
    let mut new_articles = 0;
    let mut first_fetch = true;

    for candidate in candidates.into_iter().take(scraper.max_articles()) {
        if article_repo.exists_by_url(&candidate.url).await? {
            tracing::debug!("Already stored, skipping: {}", candidate.url);
            continue;
        }

        if !first_fetch {
            tokio::time::sleep(scraper.delay()).await;
        }
        first_fetch = false;

        let url = candidate.url.clone();
        match scraper.fetch_article(source, candidate).await {
            Ok(Some(article)) => {
                if article_repo.create(&article).await?.is_some() {
                    tracing::info!("New article from {}: {}", source.name, article.title);
                    new_articles += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to fetch article {}: {}", url, e);
            }
        }
    }

    Ok(new_articles)
}

/// Scrape every active source. A failing source is recorded on the source and
/// in the scrape log, then skipped.
pub async fn scrape_all_sources(db: &Database, scraper: &Scraper) -> Result<ScrapeReport> {
    let source_repo = SourceRepository::new(db);
    let log_repo = ScrapeLogRepository::new(db);

    let sources = source_repo.list_active().await?;
    let mut report = ScrapeReport::default();

    tracing::info!("Scraping {} active sources", sources.len());

    for (i, source) in sources.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(scraper.delay()).await;
        }
        report.sources += 1;

        tracing::info!("Scraping source: {}", source.name);

        match scrape_source(db, scraper, source).await {
            Ok(found) => {
                source_repo.mark_scraped(source.id).await?;
                let (status, message) = if found > 0 {
                    (ScrapeStatus::Success, format!("Found {} new articles", found))
                } else {
                    (ScrapeStatus::NoNewArticles, "No new articles found".to_string())
                };
                log_repo.record(&source.name, status, Some(&message), found).await?;
                report.new_articles += found;
                tracing::info!("Source '{}': {} new articles", source.name, found);
            }
            Err(e) => {
                tracing::error!("Failed to scrape source '{}': {}", source.name, e);
                let message = e.to_string();
                source_repo.update_error(source.id, &message).await?;
                log_repo
                    .record(&source.name, ScrapeStatus::Error, Some(&message), 0)
                    .await?;
                report.failed_sources += 1;
            }
        }
    }

    tracing::info!(
        "Scraping complete: {} new articles, {} of {} sources failed",
        report.new_articles,
        report.failed_sources,
        report.sources
    );

    Ok(report)
}

/// Summarize one article and persist the outcome. A model failure is stored on
/// the article and reported through the returned status, not as an error.
pub async fn summarize_article(
    db: &Database,
    summarizer: &Summarizer,
    article: &Article,
) -> Result<SummaryStatus> {
    let article_repo = ArticleRepository::new(db);

    if !summarizer.is_summarizable(article.raw_text.as_deref()) {
        tracing::warn!("Skipping article with insufficient content: {}", article.title);
        article_repo
            .mark_skipped(
                article.id,
                &format!(
                    "Less than {} characters of text",
                    summarizer.min_content_length()
                ),
            )
            .await?;
        return Ok(SummaryStatus::Skipped);
    }

    tracing::info!("Summarizing article: {}", article.title);
    let content = article.raw_text.as_deref().unwrap_or_default();

    match summarizer.summarize(&article.title, content).await {
        Ok(result) => {
            article_repo
                .mark_summarized(article.id, &result.summary, &result.key_points)
                .await?;
            tracing::info!("Successfully summarized: {}", article.title);
            Ok(SummaryStatus::Done)
        }
        Err(e) => {
            if e.is_rate_limited() {
                tracing::warn!("Rate limited while summarizing '{}': {}", article.title, e);
            } else {
                tracing::error!("Failed to summarize '{}': {}", article.title, e);
            }
            article_repo.mark_failed(article.id, &e.to_string()).await?;
            Ok(SummaryStatus::Failed)
        }
    }
}

/// Summarize every pending article, one at a time with `delay` between model calls
pub async fn summarize_pending_articles(
    db: &Database,
    summarizer: &Summarizer,
    delay: Duration,
) -> Result<SummarizeReport> {
    let articles = ArticleRepository::new(db)
        .list_by_status(SummaryStatus::Pending, SUMMARIZE_BATCH)
        .await?;

    if articles.is_empty() {
        tracing::info!("No new articles to summarize");
        return Ok(SummarizeReport::default());
    }

    let mut report = SummarizeReport::default();
    let mut called_model = false;

    for article in &articles {
        if called_model {
            tokio::time::sleep(delay).await;
        }

        match summarize_article(db, summarizer, article).await? {
            SummaryStatus::Done => {
                report.summarized += 1;
                called_model = true;
            }
            SummaryStatus::Failed => {
                report.failed += 1;
                called_model = true;
            }
            SummaryStatus::Skipped => {
                report.skipped += 1;
                called_model = false;
            }
            SummaryStatus::Pending => {}
        }
    }

    tracing::info!(
        "Summarization complete: {} done, {} failed, {} skipped",
        report.summarized,
        report.failed,
        report.skipped
    );

    Ok(report)
}

/// With summarization turned off, release pending articles for notification
pub async fn skip_pending_articles(db: &Database) -> Result<u32> {
    let article_repo = ArticleRepository::new(db);
    let articles = article_repo
        .list_by_status(SummaryStatus::Pending, SUMMARIZE_BATCH)
        .await?;

    for article in &articles {
        article_repo
            .mark_skipped(article.id, "AI summarization disabled")
            .await?;
    }

    Ok(articles.len() as u32)
}

/// Send one digest of all unnotified articles to every active recipient.
/// Articles are marked notified once every attempt was made, whatever the
/// outcome; with nobody to send to they stay queued.
pub async fn send_pending_notifications(db: &Database, notifier: &Notifier) -> Result<NotifyReport> {
    let article_repo = ArticleRepository::new(db);
    let notification_repo = NotificationRepository::new(db);

    let articles = article_repo.list_pending_notification().await?;
    if articles.is_empty() {
        tracing::info!("No new articles to notify");
        return Ok(NotifyReport::default());
    }

    let recipients = RecipientRepository::new(db).list_all().await?;
    let deliveries = notifier.deliver(&articles, &recipients).await;

    if deliveries.is_empty() {
        tracing::warn!(
            "{} articles waiting but no active recipients on an enabled channel",
            articles.len()
        );
        return Ok(NotifyReport::default());
    }

    let mut report = NotifyReport {
        articles: articles.len() as u32,
        ..Default::default()
    };

    for delivery in &deliveries {
        report.add(delivery);
        for article in &articles {
            notification_repo
                .record(
                    article.id,
                    delivery.channel.as_str(),
                    &delivery.recipient,
                    delivery.error.as_deref(),
                )
                .await?;
        }
    }

    for article in &articles {
        article_repo.mark_notified(article.id).await?;
    }

    tracing::info!(
        "Notified {} articles: {} deliveries sent, {} failed",
        report.articles,
        report.sent,
        report.failed
    );

    Ok(report)
}

/// Delete scrape log entries past the retention period
pub async fn cleanup_old_logs(db: &Database, config: &AppConfig) -> Result<u32> {
    let deleted = ScrapeLogRepository::new(db)
        .cleanup(config.general.log_retention_days)
        .await?;

    if deleted > 0 {
        tracing::info!("Cleanup completed. Removed {} old log entries", deleted);
    }

    Ok(deleted)
}

/// Everything one scrape, summarize and notify pass needs
pub struct Pipeline {
    db: Database,
    config: Arc<AppConfig>,
    scraper: Scraper,
    summarizer: Option<Summarizer>,
    notifier: Notifier,
}

impl Pipeline {
    /// Wire the pipeline from configuration. A misconfigured AI provider is
    /// logged and leaves articles pending until it is fixed.
    pub fn new(db: Database, config: Arc<AppConfig>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        let scraper = Scraper::new(fetcher, &config);

        let summarizer = if config.ai.enabled {
            match Summarizer::new(&config) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("AI summarization unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let notifier = Notifier::new(&config);

        Ok(Self::from_parts(db, config, scraper, summarizer, notifier))
    }

    pub fn from_parts(
        db: Database,
        config: Arc<AppConfig>,
        scraper: Scraper,
        summarizer: Option<Summarizer>,
        notifier: Notifier,
    ) -> Self {
        Self {
            db,
            config,
            scraper,
            summarizer,
            notifier,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn summarizer(&self) -> Option<&Summarizer> {
        self.summarizer.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Full pass: scrape, summarize, notify
    pub async fn run(&self) -> Result<PipelineReport> {
        tracing::info!("Starting pipeline run");

        let scrape = self.scrape().await?;
        let summarize = self.summarize().await?;
        let notify = self.notify().await?;

        tracing::info!(
            "Pipeline run finished: {} new, {} summarized, {} deliveries",
            scrape.new_articles,
            summarize.summarized,
            notify.sent + notify.failed
        );

        Ok(PipelineReport {
            scrape,
            summarize,
            notify,
        })
    }

    pub async fn scrape(&self) -> Result<ScrapeReport> {
        scrape_all_sources(&self.db, &self.scraper).await
    }

    pub async fn summarize(&self) -> Result<SummarizeReport> {
        if !self.config.ai.enabled {
            let skipped = skip_pending_articles(&self.db).await?;
            return Ok(SummarizeReport {
                skipped,
                ..Default::default()
            });
        }

        match &self.summarizer {
            Some(summarizer) => {
                let delay = Duration::from_millis(self.config.ai.request_delay_ms);
                summarize_pending_articles(&self.db, summarizer, delay).await
            }
            None => {
                tracing::warn!("No AI provider configured, articles stay pending");
                Ok(SummarizeReport::default())
            }
        }
    }

    /// Requeue failed articles, then summarize
    pub async fn retry_failed(&self) -> Result<SummarizeReport> {
        let reset = ArticleRepository::new(&self.db).reset_failed().await?;
        tracing::info!("Requeued {} failed articles", reset);
        self.summarize().await
    }

    /// Summarize one article again regardless of its current state
    pub async fn reprocess(&self, id: Uuid) -> Result<Article> {
        let summarizer = self.summarizer.as_ref().ok_or_else(|| {
            Error::Config("AI summarization is disabled or not configured".to_string())
        })?;

        let article_repo = ArticleRepository::new(&self.db);
        let article = article_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::ArticleNotFound(id.to_string()))?;

        summarize_article(&self.db, summarizer, &article).await?;

        article_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::ArticleNotFound(id.to_string()))
    }

    pub async fn notify(&self) -> Result<NotifyReport> {
        send_pending_notifications(&self.db, &self.notifier).await
    }

    pub async fn cleanup(&self) -> Result<u32> {
        cleanup_old_logs(&self.db, &self.config).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::pipeline;
    use super::*;
    use crate::ai::testing::{analysis_reply, ScriptedProvider};
    use crate::feed::testing::{rss, StaticFetcher};
    use crate::feed::{NewArticle, NewSource};
    use crate::notify::testing::RecordingSender;
    use crate::notify::Channel;

    const FEED: &str = "https://example-blog.test/feed.xml";
    const URL_A: &str = "https://example-blog.test/posts/a";
    const URL_B: &str = "https://example-blog.test/posts/b";

    fn long_page(topic: &str) -> String {
        format!(
            "<html><body><article><p>{}</p></article></body></html>",
            format!("In-depth write-up about {} for detection engineers. ", topic).repeat(8)
        )
    }

    async fn add_rss_source(db: &Database, name: &str, feed: &str) -> Source {
        SourceRepository::new(db)
            .create(&NewSource {
                name: name.to_string(),
                url: feed.to_string(),
                is_rss: true,
                feed_url: None,
            })
            .await
            .unwrap()
    }

    fn scripted_ok() -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(vec![Ok(analysis_reply("Summary."))]))
    }

    #[tokio::test]
    async fn test_only_unseen_entry_is_inserted() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("A", URL_A), ("B", URL_B)]))
                .with_page(URL_A, &long_page("A"))
                .with_page(URL_B, &long_page("B")),
        );
        let p = pipeline(fetcher.clone(), scripted_ok(), Arc::new(RecordingSender::default())).await;
        let source = add_rss_source(p.db(), "Example", FEED).await;

        ArticleRepository::new(p.db())
            .create(&NewArticle {
                source_id: source.id,
                title: "A".to_string(),
                url: URL_A.to_string(),
                published_at: None,
                raw_text: Some("stored earlier".to_string()),
            })
            .await
            .unwrap();

        let report = p.scrape().await.unwrap();
        assert_eq!(report.new_articles, 1);

        let stats = ArticleRepository::new(p.db()).stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert!(ArticleRepository::new(p.db()).exists_by_url(URL_B).await.unwrap());
        assert!(!fetcher.requested(URL_A));
        assert!(fetcher.requested(URL_B));
    }

    #[tokio::test]
    async fn test_rescrape_creates_no_duplicates() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("A", URL_A), ("B", URL_B)]))
                .with_page(URL_A, &long_page("A"))
                .with_page(URL_B, &long_page("B")),
        );
        let p = pipeline(fetcher, scripted_ok(), Arc::new(RecordingSender::default())).await;
        add_rss_source(p.db(), "Example", FEED).await;

        assert_eq!(p.scrape().await.unwrap().new_articles, 2);
        assert_eq!(p.scrape().await.unwrap().new_articles, 0);
        assert_eq!(ArticleRepository::new(p.db()).stats().await.unwrap().total, 2);

        let logs = ScrapeLogRepository::new(p.db()).recent(10).await.unwrap();
        assert_eq!(logs[0].status, ScrapeStatus::NoNewArticles.as_str());
        assert_eq!(logs[1].status, ScrapeStatus::Success.as_str());
    }

    #[tokio::test]
    async fn test_failing_source_does_not_block_others() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("B", URL_B)]))
                .with_page(URL_B, &long_page("B")),
        );
        let p = pipeline(fetcher, scripted_ok(), Arc::new(RecordingSender::default())).await;
        // "Broken" sorts first, so it is scraped before the healthy source
        let broken = add_rss_source(p.db(), "Broken", "https://down.test/feed").await;
        add_rss_source(p.db(), "Example", FEED).await;

        let report = p.scrape().await.unwrap();
        assert_eq!(report.sources, 2);
        assert_eq!(report.failed_sources, 1);
        assert_eq!(report.new_articles, 1);

        let broken = SourceRepository::new(p.db()).find_by_id(broken.id).await.unwrap().unwrap();
        assert!(broken.has_error());

        let logs = ScrapeLogRepository::new(p.db()).recent(10).await.unwrap();
        assert!(logs
            .iter()
            .any(|l| l.source_name == "Broken" && l.status == ScrapeStatus::Error.as_str()));
    }

    #[tokio::test]
    async fn test_summarization_failure_keeps_article() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("B", URL_B)]))
                .with_page(URL_B, &long_page("B")),
        );
        let provider = Arc::new(ScriptedProvider::new(vec![Err("529 overloaded".to_string())]));
        let p = pipeline(fetcher, provider, Arc::new(RecordingSender::default())).await;
        add_rss_source(p.db(), "Example", FEED).await;

        p.scrape().await.unwrap();
        let report = p.summarize().await.unwrap();
        assert_eq!(report.failed, 1);

        let articles = ArticleRepository::new(p.db())
            .list_by_status(SummaryStatus::Failed, 10)
            .await
            .unwrap();
        assert_eq!(articles.len(), 1);
        assert!(articles[0].summary.is_none());
        assert!(articles[0].summary_error.as_deref().unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_retry_failed_and_reprocess() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("B", URL_B)]))
                .with_page(URL_B, &long_page("B")),
        );
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("timeout".to_string()),
            Ok(analysis_reply("Recovered.")),
            Ok(analysis_reply("Fresh take.")),
        ]));
        let p = pipeline(fetcher, provider, Arc::new(RecordingSender::default())).await;
        add_rss_source(p.db(), "Example", FEED).await;

        p.scrape().await.unwrap();
        assert_eq!(p.summarize().await.unwrap().failed, 1);
        assert_eq!(p.retry_failed().await.unwrap().summarized, 1);

        let article = ArticleRepository::new(p.db())
            .list_by_status(SummaryStatus::Done, 1)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(article.summary.as_deref(), Some("Recovered."));

        let again = p.reprocess(article.id).await.unwrap();
        assert_eq!(again.summary.as_deref(), Some("Fresh take."));

        assert!(matches!(
            p.reprocess(Uuid::new_v4()).await,
            Err(Error::ArticleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_short_article_is_skipped_without_model_call() {
        let fetcher = Arc::new(StaticFetcher::default().with_page(FEED, &rss(&[("B", URL_B)])));
        let provider = scripted_ok();
        let p = pipeline(fetcher, provider.clone(), Arc::new(RecordingSender::default())).await;
        add_rss_source(p.db(), "Example", FEED).await;

        // page fetch fails, so only the short feed description is stored
        p.scrape().await.unwrap();
        let report = p.summarize().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_full_run_notifies_each_recipient() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("A", URL_A), ("B", URL_B)]))
                .with_page(URL_A, &long_page("A"))
                .with_page(URL_B, &long_page("B")),
        );
        let email = Arc::new(RecordingSender::failing_for(&["broken@corp.test"]));
        let p = pipeline(fetcher, scripted_ok(), email.clone()).await;
        add_rss_source(p.db(), "Example", FEED).await;

        let recipients = RecipientRepository::new(p.db());
        recipients.add(Channel::Email, "broken@corp.test").await.unwrap();
        recipients.add(Channel::Email, "soc@corp.test").await.unwrap();

        let report = p.run().await.unwrap();
        assert_eq!(report.scrape.new_articles, 2);
        assert_eq!(report.summarize.summarized, 2);
        assert_eq!(report.notify.articles, 2);
        assert_eq!(report.notify.sent, 1);
        assert_eq!(report.notify.failed, 1);
        assert_eq!(email.recipients(), vec!["soc@corp.test"]);

        let article_repo = ArticleRepository::new(p.db());
        assert!(article_repo.list_pending_notification().await.unwrap().is_empty());

        let article = article_repo.list(&Default::default()).await.unwrap().remove(0);
        let log = NotificationRepository::new(p.db())
            .list_for_article(article.id)
            .await
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.iter().filter(|l| l.is_sent()).count(), 1);

        // nothing left for the next run
        assert_eq!(p.notify().await.unwrap().articles, 0);
    }

    #[tokio::test]
    async fn test_no_recipients_keeps_articles_queued() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("B", URL_B)]))
                .with_page(URL_B, &long_page("B")),
        );
        let p = pipeline(fetcher, scripted_ok(), Arc::new(RecordingSender::default())).await;
        add_rss_source(p.db(), "Example", FEED).await;

        p.run().await.unwrap();
        let pending = ArticleRepository::new(p.db())
            .list_pending_notification()
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_ai_disabled_releases_pending_articles() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page(FEED, &rss(&[("B", URL_B)]))
                .with_page(URL_B, &long_page("B")),
        );
        let db = Database::new_in_memory().await.unwrap();
        let mut config = super::testing::test_config();
        config.ai.enabled = false;
        let config = Arc::new(config);
        let scraper = Scraper::new(fetcher, &config);
        let p = Pipeline::from_parts(db, config, scraper, None, Notifier::with_senders(None, None));
        add_rss_source(p.db(), "Example", FEED).await;

        p.scrape().await.unwrap();
        assert_eq!(p.summarize().await.unwrap().skipped, 1);
        assert_eq!(
            ArticleRepository::new(p.db())
                .list_pending_notification()
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
