//! Fact Provider
//!
//! Asks a chat-completion model for one short trivia fact about the area
//! around a coordinate. Failures are returned as data, never raised, so
//! callers branch on `success` instead of handling errors.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Search radius used for regular lookups
pub const DEFAULT_RADIUS_METERS: u32 = 500;

/// Search radius used when the first lookup repeated the previous fact
pub const RETRY_RADIUS_METERS: u32 = 1000;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Language facts are written in unless configured otherwise
pub const DEFAULT_LANGUAGE: &str = "English";
const MAX_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str =
    "You are an expert in geography and history who knows interesting facts about any place on Earth.";

/// Why a fact could not be produced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    #[error("Fact service rate limit exceeded")]
    RateLimited,

    #[error("Invalid request to fact service")]
    InvalidRequest,

    #[error("Fact service error: {0}")]
    Provider(String),

    #[error("Fact service returned no fact")]
    Empty,
}

impl FactError {
    /// Classify a failure by HTTP status (if any) and error text
    pub fn classify(status: Option<StatusCode>, message: &str) -> Self {
        match status {
            Some(StatusCode::TOO_MANY_REQUESTS) => return Self::RateLimited,
            Some(StatusCode::BAD_REQUEST) | Some(StatusCode::UNPROCESSABLE_ENTITY) => {
                return Self::InvalidRequest
            }
            _ => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("rate limit") {
            Self::RateLimited
        } else if lower.contains("invalid") {
            Self::InvalidRequest
        } else {
            Self::Provider("error calling the fact service".to_string())
        }
    }
}

/// Lookup parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in meters
    pub radius: u32,
}

impl FactRequest {
    /// Request with the default 500 m radius
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius: DEFAULT_RADIUS_METERS,
        }
    }

    pub fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }
}

/// Lookup outcome
#[derive(Debug, Clone, PartialEq)]
pub struct FactResponse {
    /// Trimmed fact text; empty on failure
    pub fact: String,
    pub success: bool,
    pub error: Option<FactError>,
}

impl FactResponse {
    pub fn found(fact: impl Into<String>) -> Self {
        Self {
            fact: fact.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(error: FactError) -> Self {
        Self {
            fact: String::new(),
            success: false,
            error: Some(error),
        }
    }

    /// The fact, if the lookup succeeded
    pub fn fact(&self) -> Option<&str> {
        self.success.then_some(self.fact.as_str())
    }
}

/// Source of location facts
#[async_trait]
pub trait FactProvider: Send + Sync {
    async fn get_fact(&self, request: FactRequest) -> FactResponse;
}

/// Build the user instruction for one lookup
pub fn build_prompt(request: &FactRequest, language: &str) -> String {
    format!(
        "Find ONE little-known fact about a place within {radius} meters of the coordinates {lat}, {lon}.\n\
        \n\
        Requirements:\n\
        - At most 300 characters\n\
        - No links or sources\n\
        - Interesting and verified\n\
        - Written in {language}\n\
        - If it is a natural place, describe its features\n\
        - If it is a city or settlement, tell about its history or a landmark\n\
        - If there is nothing interesting nearby, look in a wider radius\n\
        \n\
        Reply with the fact only, no extra text.",
        radius = request.radius,
        lat = request.latitude,
        lon = request.longitude,
        language = language,
    )
}

/// Chat message in a completion request
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Completion request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

/// Completion response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionResponse {
    /// First choice's trimmed, non-empty content
    fn first_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// OpenAI chat-completions fact provider
#[derive(Clone)]
pub struct OpenAiFacts {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    language: String,
}

impl OpenAiFacts {
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.map(|s| s.to_string()),
            base_url: OPENAI_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(config.openai_api_key.as_deref())
            .with_base_url(&config.openai_base_url)
            .with_model(&config.openai_model)
            .with_language(&config.fact_language)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Check if API key is configured
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<Option<String>, FactError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| FactError::Provider("OPENAI_API_KEY not set".to_string()))?;

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!("Calling fact service: model={}, prompt_len={}", self.model, prompt.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FactError::classify(e.status(), &e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Prefer the API's own error message over the raw body
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            error!("Fact service error {}: {}", status, message);
            return Err(FactError::classify(Some(status), &message));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| FactError::classify(None, &e.to_string()))?;

        Ok(body.first_text())
    }
}

#[async_trait]
impl FactProvider for OpenAiFacts {
    async fn get_fact(&self, request: FactRequest) -> FactResponse {
        let prompt = build_prompt(&request, &self.language);

        match self.complete(&prompt).await {
            Ok(Some(fact)) => {
                info!(
                    "Fact found: lat={}, lon={}, radius={}, len={}",
                    request.latitude,
                    request.longitude,
                    request.radius,
                    fact.chars().count()
                );
                FactResponse::found(fact)
            }
            Ok(None) => FactResponse::failed(FactError::Empty),
            Err(e) => {
                error!("Fact service call failed: {}", e);
                FactResponse::failed(e)
            }
        }
    }
}
