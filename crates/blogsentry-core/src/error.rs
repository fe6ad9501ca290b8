use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Rate limiting from a hosted API; worth surfacing differently in logs
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::Http(e) => e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS),
            Error::AiProvider(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("rate limit") || lower.contains("429")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
