mod fetcher;
pub mod html;
mod models;
pub mod opml;
mod parser;
mod scrape;

#[cfg(test)]
pub(crate) use scrape::testing;

pub use fetcher::{HttpFetcher, PageFetcher};
pub use models::{
    truncate_with_ellipsis, Article, ArticleCandidate, NewArticle, NewSource, ScrapeLogEntry,
    ScrapeStatus, Source, SummaryStatus,
};
pub use parser::parse_feed;
pub use scrape::Scraper;
