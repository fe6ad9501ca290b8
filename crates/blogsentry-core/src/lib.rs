pub mod ai;
pub mod config;
pub mod error;
pub mod feed;
pub mod notify;
pub mod scheduler;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use scheduler::{Pipeline, SchedulerService};
pub use storage::Database;
