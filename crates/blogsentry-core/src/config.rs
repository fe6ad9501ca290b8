use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Explicit SQLite URL (e.g. "sqlite:///var/lib/blogsentry.db"); overrides data_dir
    #[serde(default)]
    pub database_url: Option<String>,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Scrape log retention in days
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
    /// Insert the built-in source list when the source table is empty
    #[serde(default = "default_true")]
    pub seed_default_sources: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_url: None,
            log_level: default_log_level(),
            log_retention_days: default_log_retention_days(),
            seed_default_sources: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pipeline interval in seconds (0 = scheduler disabled)
    #[serde(default = "default_run_interval")]
    pub run_interval_secs: u64,
    /// Run the pipeline as soon as the daemon starts
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// Cleanup interval in seconds (remove old scrape logs)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Delay between article page fetches and between sources, in milliseconds
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,
    /// Newest entries considered per source and run
    #[serde(default = "default_max_articles")]
    pub max_articles_per_source: usize,
    /// Fetch the linked page of RSS entries to get the full article text
    #[serde(default = "default_true")]
    pub fetch_full_content: bool,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: default_run_interval(),
            run_on_startup: default_true(),
            cleanup_interval_secs: default_cleanup_interval(),
            request_timeout_secs: default_timeout(),
            rate_limit_ms: default_rate_limit(),
            max_articles_per_source: default_max_articles(),
            fetch_full_content: default_true(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Enable AI summarization
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// AI provider: "claude_api" or "openai"
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    /// Anthropic API key (for claude_api provider)
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    /// Claude model name
    #[serde(default = "default_claude_model")]
    pub claude_model: String,
    /// OpenAI API key (for openai provider)
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// OpenAI model name
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Max tokens for the analysis response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Length of the executive summary, in sentences
    #[serde(default = "default_summary_sentences")]
    pub summary_sentences: u32,
    /// Articles with less text than this (chars) are not sent to the model
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
    /// Article text is truncated to this many chars before prompting
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Extra attempts after a failed API call (0 = no retry)
    #[serde(default)]
    pub max_retries: u32,
    /// Initial delay between retries, doubled on each attempt
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Delay between two summarization calls in milliseconds
    #[serde(default = "default_ai_delay")]
    pub request_delay_ms: u64,
    /// API request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            provider: default_ai_provider(),
            anthropic_api_key: None,
            claude_model: default_claude_model(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            summary_sentences: default_summary_sentences(),
            min_content_length: default_min_content_length(),
            max_content_length: default_max_content_length(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff(),
            request_delay_ms: default_ai_delay(),
            request_timeout_secs: default_ai_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Sender address, also used as SMTP login
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            address: None,
            password: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.address.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Twilio sender number; defaults to the Twilio sandbox
    #[serde(default = "default_whatsapp_from")]
    pub from_number: String,
    #[serde(default = "default_twilio_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            account_sid: None,
            auth_token: None,
            from_number: default_whatsapp_from(),
            api_base_url: default_twilio_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blogsentry")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_retention_days() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

fn default_run_interval() -> u64 {
    7200 // 2 hours
}

fn default_cleanup_interval() -> u64 {
    86400 // daily
}

fn default_timeout() -> u64 {
    10
}

fn default_rate_limit() -> u64 {
    1000
}

fn default_max_articles() -> usize {
    5
}

fn default_ai_provider() -> String {
    "claude_api".to_string()
}

fn default_claude_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_summary_sentences() -> u32 {
    4
}

fn default_min_content_length() -> usize {
    200
}

fn default_max_content_length() -> usize {
    15000
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_ai_delay() -> u64 {
    2000
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_whatsapp_from() -> String {
    "+14155238886".to_string()
}

fn default_twilio_base_url() -> String {
    "https://api.twilio.com".to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Override secrets and endpoints from environment-style variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            self.general.database_url = Some(url);
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.ai.anthropic_api_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(key);
        }
        if let Some(server) = get("SMTP_SERVER") {
            self.email.smtp_server = server;
        }
        if let Some(port) = get("SMTP_PORT") {
            match port.trim().parse() {
                Ok(port) => self.email.smtp_port = port,
                Err(_) => tracing::warn!("Ignoring invalid SMTP_PORT: {}", port),
            }
        }
        if let Some(address) = get("EMAIL_ADDRESS") {
            self.email.address = Some(address);
        }
        if let Some(password) = get("EMAIL_PASSWORD") {
            self.email.password = Some(password);
        }
        if let Some(sid) = get("TWILIO_ACCOUNT_SID") {
            self.whatsapp.account_sid = Some(sid);
        }
        if let Some(token) = get("TWILIO_AUTH_TOKEN") {
            self.whatsapp.auth_token = Some(token);
        }
        if let Some(number) = get("TWILIO_PHONE_NUMBER") {
            self.whatsapp.from_number = number;
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/blogsentry/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("blogsentry")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("blogsentry.db")
    }

    /// SQLite connection URL, explicit `database_url` first
    pub fn database_url(&self) -> String {
        match &self.general.database_url {
            Some(url) => url.clone(),
            None => format!("sqlite:{}", self.database_path().display()),
        }
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.sync.run_interval_secs, 7200);
        assert_eq!(config.sync.max_articles_per_source, 5);
        assert_eq!(config.ai.provider, "claude_api");
        assert_eq!(config.ai.max_retries, 0);
        assert_eq!(config.email.smtp_port, 587);
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [sync]
            run_interval_secs = 600

            [ai]
            provider = "openai"
            max_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.run_interval_secs, 600);
        assert_eq!(config.sync.rate_limit_ms, 1000);
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.max_retries, 2);
        assert_eq!(config.ai.min_content_length, 200);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[sync\nrun_interval_secs = ").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("SMTP_PORT", "2525"),
            ("EMAIL_ADDRESS", "alerts@example.test"),
            ("EMAIL_PASSWORD", "secret"),
            ("TWILIO_PHONE_NUMBER", "+15550001111"),
            ("OPENAI_API_KEY", "   "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.ai.anthropic_api_key.as_deref(), Some("sk-ant"));
        assert_eq!(config.ai.openai_api_key, None);
        assert_eq!(config.email.smtp_port, 2525);
        assert!(config.email.is_configured());
        assert_eq!(config.whatsapp.from_number, "+15550001111");
        assert!(!config.whatsapp.is_configured());
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == "SMTP_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn test_database_url_from_data_dir() {
        let mut config = AppConfig::default();
        config.general.data_dir = PathBuf::from("/tmp/blogsentry-test");
        assert_eq!(config.database_url(), "sqlite:/tmp/blogsentry-test/blogsentry.db");
    }
}
