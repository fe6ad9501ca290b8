use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::providers::{AiProvider, ClaudeApiProvider, Completion, OpenAiProvider};
use crate::config::AppConfig;
use crate::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a senior cybersecurity consultant who specializes in analyzing \
technical articles and extracting actionable insights for cybersecurity analysts. \
Always answer with a single valid JSON object.";

const TRUNCATION_MARKER: &str = "\n\n[Article content truncated for processing]";

/// Summary text plus formatted key points for one article
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSummary {
    pub summary: String,
    pub key_points: String,
}

/// Shape of the model's JSON answer. Models are loose with types, so list-like
/// fields are taken as raw JSON and rendered leniently.
#[derive(Debug, Default, Deserialize)]
struct Analysis {
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    key_takeaways: Value,
    #[serde(default)]
    technical_details: Value,
    #[serde(default)]
    actionable_items: Value,
    #[serde(default)]
    threat_intelligence: Value,
    #[serde(default)]
    tools_and_resources: Value,
    #[serde(default)]
    relevance_score: Value,
}

/// AI summarizer that wraps the configured provider
pub struct Summarizer {
    provider: Arc<dyn AiProvider>,
    max_tokens: u32,
    temperature: f32,
    summary_sentences: u32,
    min_content_length: usize,
    max_content_length: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Summarizer {
    /// Create a new summarizer based on configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let ai = &config.ai;

        let provider: Arc<dyn AiProvider> = match ai.provider.as_str() {
            "openai" => {
                let api_key = ai.openai_api_key.as_ref().ok_or_else(|| {
                    Error::Config("OpenAI API key not configured (OPENAI_API_KEY)".to_string())
                })?;
                Arc::new(OpenAiProvider::new(api_key, &ai.openai_model))
            }
            "claude_api" => {
                let api_key = ai.anthropic_api_key.as_ref().ok_or_else(|| {
                    Error::Config("Anthropic API key not configured (ANTHROPIC_API_KEY)".to_string())
                })?;
                Arc::new(ClaudeApiProvider::new(
                    api_key,
                    &ai.claude_model,
                    ai.request_timeout_secs,
                )?)
            }
            other => {
                return Err(Error::Config(format!(
                    "Unknown AI provider '{}', expected 'claude_api' or 'openai'",
                    other
                )))
            }
        };

        Ok(Self::with_provider(provider, config))
    }

    /// Build a summarizer around an already constructed provider
    pub fn with_provider(provider: Arc<dyn AiProvider>, config: &AppConfig) -> Self {
        let ai = &config.ai;
        Self {
            provider,
            max_tokens: ai.max_tokens.max(1),
            temperature: ai.temperature,
            summary_sentences: ai.summary_sentences.max(1),
            min_content_length: ai.min_content_length,
            max_content_length: ai.max_content_length.max(1),
            max_retries: ai.max_retries,
            retry_backoff: Duration::from_millis(ai.retry_backoff_ms),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Get minimum content length for summarization
    pub fn min_content_length(&self) -> usize {
        self.min_content_length
    }

    /// Whether `text` carries enough content to be worth a model call
    pub fn is_summarizable(&self, text: Option<&str>) -> bool {
        text.map_or(0, |t| t.trim().chars().count()) >= self.min_content_length
    }

    /// Analyze one article. Retries failed calls `max_retries` times with
    /// doubling backoff; the last error is returned if every attempt fails.
    pub async fn summarize(&self, title: &str, content: &str) -> Result<ArticleSummary> {
        let content = truncate_content(content, self.max_content_length);
        let prompt = build_prompt(title, &content, self.summary_sentences);

        let mut attempt = 0;
        loop {
            match self.analyze(&prompt).await {
                Ok(summary) => return Ok(summary),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Summarization failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn analyze(&self, prompt: &str) -> Result<ArticleSummary> {
        let reply = self
            .provider
            .complete(Completion {
                system: SYSTEM_PROMPT,
                prompt,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .await?;

        let analysis = parse_analysis(&reply)?;
        let summary = analysis.executive_summary.trim().to_string();
        if summary.is_empty() {
            return Err(Error::AiProvider(
                "Model reply has no executive_summary".to_string(),
            ));
        }

        Ok(ArticleSummary {
            summary,
            key_points: format_key_points(&analysis),
        })
    }

    /// Minimal request against the configured provider
    pub async fn ping(&self) -> Result<String> {
        self.provider.ping().await
    }
}

fn build_prompt(title: &str, content: &str, sentences: u32) -> String {
    format!(
        r#"As a cybersecurity expert, analyze this article for a cybersecurity analyst. Provide insights that are valuable for their daily work and strategic understanding.

Article Title: {title}

Article Content:
{content}

Answer in JSON with exactly this structure:

{{
    "executive_summary": "A {sentences}-sentence summary of the essence, methodology and implications of the article",
    "key_takeaways": ["Specific takeaway a security analyst can apply", "..."],
    "technical_details": "Technical concepts, tools, methodologies or frameworks discussed",
    "actionable_items": ["Concrete action, e.g. 'Implement X tool for Y purpose'", "..."],
    "threat_intelligence": "Threat actors, attack techniques, vulnerabilities or risks mentioned",
    "tools_and_resources": "Tools, frameworks and references mentioned",
    "relevance_score": "Score from 1-10 for a cybersecurity analyst, with a brief explanation"
}}

Focus on practical insights. Include specific methodologies, tools and techniques."#
    )
}

/// Cut content to `max_chars` characters and mark the cut
fn truncate_content(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}{}", &content[..idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(content),
    }
}

/// Parse the reply as JSON, falling back to the outermost `{...}` block
fn parse_analysis(reply: &str) -> Result<Analysis> {
    if let Ok(analysis) = serde_json::from_str::<Analysis>(reply.trim()) {
        return Ok(analysis);
    }

    let re = Regex::new(r"(?s)\{.*\}").map_err(|e| Error::Other(e.to_string()))?;
    let block = re.find(reply).ok_or_else(|| {
        Error::AiProvider(format!(
            "No JSON object in model reply: {}",
            crate::feed::truncate_with_ellipsis(reply.trim(), 200)
        ))
    })?;

    serde_json::from_str(block.as_str())
        .map_err(|e| Error::AiProvider(format!("Invalid JSON in model reply: {}", e)))
}

fn format_key_points(analysis: &Analysis) -> String {
    let mut sections: Vec<String> = Vec::new();

    let mut list_section = |heading: &str, value: &Value| {
        let items = value_items(value);
        if !items.is_empty() {
            let bullets: Vec<String> = items.iter().map(|i| format!("• {}", i)).collect();
            sections.push(format!("{}:\n{}", heading, bullets.join("\n")));
        }
    };
    list_section("KEY TAKEAWAYS", &analysis.key_takeaways);
    list_section("ACTIONABLE ITEMS", &analysis.actionable_items);

    for (heading, value) in [
        ("TECHNICAL DETAILS", &analysis.technical_details),
        ("THREAT INTELLIGENCE", &analysis.threat_intelligence),
        ("TOOLS & RESOURCES", &analysis.tools_and_resources),
    ] {
        if let Some(text) = value_text(value) {
            sections.push(format!("{}:\n{}", heading, text));
        }
    }

    if let Some(score) = value_text(&analysis.relevance_score) {
        sections.push(format!("RELEVANCE SCORE: {}", score));
    }

    sections.join("\n\n")
}

/// Render a JSON value as a list of non-empty strings
fn value_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

/// Render a JSON value as one line of text
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| value_text(v).map(|t| format!("{}: {}", k, t)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };

    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{AiProvider, Completion};
    use crate::{Error, Result};

    /// Replays scripted replies in order; an `Err` entry becomes a provider error.
    /// Once the script runs out the last entry repeats.
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        last: Mutex<Option<std::result::Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    /// A well-formed analysis reply
    pub fn analysis_reply(summary: &str) -> String {
        serde_json::json!({
            "executive_summary": summary,
            "key_takeaways": ["Hunt for unusual Kerberos ticket requests"],
            "technical_details": "Detection built on event ID 4769",
            "actionable_items": ["Deploy the Sigma rule"],
            "threat_intelligence": "",
            "tools_and_resources": ["Sigma", "Splunk"],
            "relevance_score": 8
        })
        .to_string()
    }

    #[async_trait::async_trait]
    impl AiProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: Completion<'_>) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());

            let next = self.replies.lock().unwrap().pop_front();
            let reply = match next {
                Some(reply) => {
                    *self.last.lock().unwrap() = Some(reply.clone());
                    reply
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Err("no scripted reply".to_string())),
            };

            reply.map_err(Error::AiProvider)
        }
    }
}
