mod article_repo;
mod database;
mod notification_repo;
mod recipient_repo;
mod scrape_log_repo;
mod source_repo;

pub use article_repo::{ArticleFilter, ArticleRepository, ArticleStats};
pub use database::Database;
pub use notification_repo::{NotificationLogEntry, NotificationRepository};
pub use recipient_repo::RecipientRepository;
pub use scrape_log_repo::ScrapeLogRepository;
pub use source_repo::SourceRepository;
