use std::sync::Arc;

use anyhow::Result;

use blogsentry_core::{
    scheduler::{ScrapeReport, SummarizeReport},
    storage::Database,
    AppConfig, Pipeline,
};

use super::resolve_article;

fn print_scrape(report: &ScrapeReport) {
    println!(
        "Scraped {} sources: {} new articles, {} sources failed.",
        report.sources, report.new_articles, report.failed_sources
    );
}

fn print_summarize(report: &SummarizeReport) {
    println!(
        "Summarized {} articles ({} failed, {} skipped).",
        report.summarized, report.failed, report.skipped
    );
}

pub async fn run(db: Database, config: Arc<AppConfig>) -> Result<()> {
    let pipeline = Pipeline::new(db, config)?;

    println!("Running pipeline...");
    let report = pipeline.run().await?;

    print_scrape(&report.scrape);
    print_summarize(&report.summarize);
    println!(
        "Notified {} articles: {} deliveries sent, {} failed.",
        report.notify.articles, report.notify.sent, report.notify.failed
    );

    Ok(())
}

pub async fn scrape(db: Database, config: Arc<AppConfig>) -> Result<()> {
    let pipeline = Pipeline::new(db, config)?;

    println!("Scraping all active sources...");
    let report = pipeline.scrape().await?;
    print_scrape(&report);

    Ok(())
}

pub async fn summarize(db: Database, config: Arc<AppConfig>, retry_failed: bool) -> Result<()> {
    let pipeline = Pipeline::new(db, config)?;

    let report = if retry_failed {
        println!("Retrying failed summaries...");
        pipeline.retry_failed().await?
    } else {
        println!("Summarizing pending articles...");
        pipeline.summarize().await?
    };
    print_summarize(&report);

    Ok(())
}

pub async fn reprocess(db: Database, config: Arc<AppConfig>, id: &str) -> Result<()> {
    let article = resolve_article(&db, id).await?;
    let pipeline = Pipeline::new(db, config)?;

    println!("Reprocessing: {}", article.title);
    let article = pipeline.reprocess(article.id).await?;

    match (&article.summary, &article.summary_error) {
        (Some(summary), _) => println!("\n{}", summary),
        (None, Some(err)) => println!("Summarization failed: {}", err),
        (None, None) => println!("No summary produced."),
    }

    Ok(())
}

pub async fn notify(db: Database, config: Arc<AppConfig>) -> Result<()> {
    let pipeline = Pipeline::new(db, config)?;

    let report = pipeline.notify().await?;
    if report.articles == 0 {
        println!("Nothing sent: no new articles or no active recipients.");
    } else {
        println!(
            "Notified {} articles: {} deliveries sent, {} failed.",
            report.articles, report.sent, report.failed
        );
    }

    Ok(())
}
