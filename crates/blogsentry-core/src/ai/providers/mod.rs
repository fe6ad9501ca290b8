mod claude_api;
mod openai;

pub use claude_api::ClaudeApiProvider;
pub use openai::OpenAiProvider;

use crate::Result;

/// A single completion request
#[derive(Debug, Clone)]
pub struct Completion<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait for hosted LLM providers
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Short provider name for logs and status output
    fn name(&self) -> &str;

    /// Run one completion and return the text of the reply
    async fn complete(&self, request: Completion<'_>) -> Result<String>;

    /// Verify credentials and reachability with a minimal request
    async fn ping(&self) -> Result<String> {
        self.complete(Completion {
            system: "You are a connectivity check.",
            prompt: "Reply with the single word OK.",
            max_tokens: 10,
            temperature: 0.0,
        })
        .await
    }
}
