pub mod providers;
mod summarizer;

#[cfg(test)]
pub(crate) use summarizer::testing;

pub use providers::{AiProvider, Completion};
pub use summarizer::{ArticleSummary, Summarizer};
