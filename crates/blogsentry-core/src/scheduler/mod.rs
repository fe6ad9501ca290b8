mod service;
pub mod tasks;

pub use service::SchedulerService;
pub use tasks::{
    cleanup_old_logs, scrape_all_sources, send_pending_notifications, summarize_pending_articles,
    Pipeline, PipelineReport, ScrapeReport, SummarizeReport,
};
