//! Configuration management

use anyhow::{Context, Result};
use std::time::Duration;

use crate::facts::DEFAULT_LANGUAGE;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ENV: &str = "development";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_FACT_INTERVAL_SECS: u64 = 600;

/// Bot configuration
#[derive(Clone)]
pub struct Config {
    /// Telegram bot token (without it only the health endpoint runs)
    pub telegram_bot_token: Option<String>,

    /// OpenAI API key (without it only the health endpoint runs)
    pub openai_api_key: Option<String>,

    /// Chat model used for facts
    pub openai_model: String,

    /// OpenAI-compatible API base URL
    pub openai_base_url: String,

    /// Language the model writes facts in (default: English)
    pub fact_language: String,

    /// Health check HTTP port
    pub port: u16,

    /// Environment name (development, production, ...)
    pub environment: String,

    /// Interval between live-location refreshes
    pub fact_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", v))?,
            None => DEFAULT_PORT,
        };

        let fact_interval_secs = match non_empty("FACT_INTERVAL_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .with_context(|| format!("FACT_INTERVAL_SECS must be a positive integer, got {:?}", v))?,
            None => DEFAULT_FACT_INTERVAL_SECS,
        };

        Ok(Self {
            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: non_empty("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            fact_language: non_empty("FACT_LANGUAGE")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            port,
            environment: non_empty("APP_ENV")
                .or_else(|| non_empty("NODE_ENV"))
                .unwrap_or_else(|| DEFAULT_ENV.to_string()),
            fact_interval: Duration::from_secs(fact_interval_secs),
        })
    }

    /// Both credentials present, so the bot itself can run
    pub fn bot_enabled(&self) -> bool {
        self.telegram_bot_token.is_some() && self.openai_api_key.is_some()
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Log which settings are present without revealing secrets
    pub fn log_summary(&self) {
        let status = |set: bool| if set { "set" } else { "missing" };
        tracing::info!("TELEGRAM_BOT_TOKEN: {}", status(self.telegram_bot_token.is_some()));
        tracing::info!("OPENAI_API_KEY: {}", status(self.openai_api_key.is_some()));
        tracing::info!("Model: {}", self.openai_model);
        tracing::info!("Fact language: {}", self.fact_language);
        tracing::info!("Port: {}", self.port);
        tracing::info!("Environment: {}", self.environment);

        if self.telegram_bot_token.is_none() {
            tracing::warn!("TELEGRAM_BOT_TOKEN missing - running in healthcheck-only mode");
        }
        if self.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY missing - running in healthcheck-only mode");
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &self.telegram_bot_token.as_ref().map(|_| "***"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("fact_language", &self.fact_language)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("fact_interval", &self.fact_interval)
            .finish()
    }
}
