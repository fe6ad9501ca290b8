use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::tasks::Pipeline;

/// Background scheduler that runs the pipeline and the log cleanup on fixed intervals
pub struct SchedulerService {
    pipeline: Arc<Pipeline>,
}

impl SchedulerService {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Run background tasks in a loop until shutdown signal. A run in progress is
    /// always finished before the signal is looked at, so runs never overlap and
    /// never stop halfway.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let config = self.pipeline.config();
        let run_secs = config.sync.run_interval_secs;
        let cleanup_secs = config.sync.cleanup_interval_secs;
        let run_on_startup = config.sync.run_on_startup;

        // Skip if scheduling is disabled (0)
        if run_secs == 0 {
            info!("Background scheduler disabled (run_interval_secs = 0)");
            let _ = shutdown.changed().await;
            return;
        }

        info!(
            "Scheduler started: run every {}s, cleanup every {}s, run on startup: {}",
            run_secs, cleanup_secs, run_on_startup
        );

        let mut run_interval = tokio::time::interval(Duration::from_secs(run_secs));
        run_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup_interval = tokio::time::interval(Duration::from_secs(cleanup_secs.max(1)));
        cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick fires immediately
        if !run_on_startup {
            run_interval.tick().await;
        }
        cleanup_interval.tick().await;

        loop {
            tokio::select! {
                biased;

                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = run_interval.tick() => {
                    debug!("Running scheduled pipeline");
                    match self.pipeline.run().await {
                        Ok(report) => {
                            info!(
                                "Scheduled run: {} new articles, {} summarized, {} notifications sent",
                                report.scrape.new_articles,
                                report.summarize.summarized,
                                report.notify.sent
                            );
                        }
                        Err(e) => error!("Scheduled run failed: {}", e),
                    }
                }

                _ = cleanup_interval.tick() => {
                    debug!("Running scheduled log cleanup");
                    if let Err(e) = self.pipeline.cleanup().await {
                        error!("Scheduled cleanup failed: {}", e);
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{analysis_reply, ScriptedProvider};
    use crate::feed::testing::{rss, StaticFetcher};
    use crate::feed::NewSource;
    use crate::notify::testing::RecordingSender;
    use crate::scheduler::tasks::testing::pipeline;
    use crate::storage::{ScrapeLogRepository, SourceRepository};
    use tokio::time::timeout;

    const FEED: &str = "https://example-blog.test/feed.xml";

    async fn scheduled_pipeline() -> Arc<Pipeline> {
        let fetcher = Arc::new(
            StaticFetcher::default().with_page(FEED, &rss(&[("A", "https://example-blog.test/a")])),
        );
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(analysis_reply("s"))]));
        let p = pipeline(fetcher, provider, Arc::new(RecordingSender::default())).await;
        SourceRepository::new(p.db())
            .create(&NewSource {
                name: "Example".to_string(),
                url: FEED.to_string(),
                is_rss: true,
                feed_url: None,
            })
            .await
            .unwrap();
        Arc::new(p)
    }

    async fn scrape_runs(p: &Pipeline) -> usize {
        ScrapeLogRepository::new(p.db()).recent(100).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_runs_on_startup_then_stops() {
        let p = scheduled_pipeline().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(SchedulerService::new(p.clone()).run(shutdown_rx));

        let first_run = timeout(Duration::from_secs(5), async {
            while scrape_runs(&p).await == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(first_run.is_ok());

        shutdown_tx.send(true).unwrap();
        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
        assert_eq!(scrape_runs(&p).await, 1);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_waits_for_shutdown() {
        let fetcher = Arc::new(StaticFetcher::default());
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let p = pipeline(fetcher.clone(), provider, Arc::new(RecordingSender::default())).await;

        let mut config = p.config().clone();
        config.sync.run_interval_secs = 0;
        let p = Arc::new(Pipeline::from_parts(
            p.db().clone(),
            Arc::new(config.clone()),
            crate::feed::Scraper::new(fetcher.clone(), &config),
            None,
            crate::notify::Notifier::with_senders(None, None),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(SchedulerService::new(p).run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        shutdown_tx.send(true).unwrap();
        assert!(timeout(Duration::from_secs(1), handle).await.is_ok());
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_startup_run_when_disabled() {
        let fetcher = Arc::new(StaticFetcher::default());
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let p = pipeline(fetcher.clone(), provider, Arc::new(RecordingSender::default())).await;

        let mut config = p.config().clone();
        config.sync.run_on_startup = false;
        let p = Arc::new(Pipeline::from_parts(
            p.db().clone(),
            Arc::new(config.clone()),
            crate::feed::Scraper::new(fetcher.clone(), &config),
            None,
            crate::notify::Notifier::with_senders(None, None),
        ));
        SourceRepository::new(p.db())
            .create(&NewSource {
                name: "Example".to_string(),
                url: FEED.to_string(),
                is_rss: true,
                feed_url: None,
            })
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(SchedulerService::new(p.clone()).run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        assert!(timeout(Duration::from_secs(1), handle).await.is_ok());
        assert_eq!(scrape_runs(&p).await, 0);
    }
}
