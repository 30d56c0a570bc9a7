use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{EffectiveConfig, DEFAULT_BASE_URL};
use crate::error::RequestError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl CompletionRequest {
    /// The user message, which carries the rendered prompt.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, RequestError>;
}

#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &EffectiveConfig) -> Result<Self, RequestError> {
        let provider = Self::new(config.api_key().to_string())
            .with_base_url(config.base_url.clone());
        match config.timeout {
            Some(timeout) => provider.with_timeout(timeout),
            None => Ok(provider),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, RequestError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Network(e.to_string()))?;
        Ok(self)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, RequestError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let body = response.text().await?;
        let result: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| malformed(format!("undecodable body: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| malformed("no choices in response"))?
            .message
            .content
            .ok_or_else(|| malformed("choice has no content"))
    }
}

fn malformed(detail: impl Into<String>) -> RequestError {
    RequestError::MalformedResponse(detail.into())
}

/// Maps a non-success status and its body onto a [`RequestError`].
pub fn classify_failure(status: u16, body: &str) -> RequestError {
    let detail = serde_json::from_str::<OpenAIErrorBody>(body)
        .ok()
        .map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    let code = detail.and_then(|d| d.code);

    match status {
        401 | 403 => RequestError::Authentication { status, message },
        429 if code.as_deref() == Some("insufficient_quota") => {
            RequestError::QuotaExceeded { message }
        }
        429 => RequestError::RateLimited { message },
        _ => RequestError::Api { status, message },
    }
}

const MOCK_RESPONSE: &str = r#"{"company_name": "Mock", "main_twitter_handle": "@mock"}"#;

/// Returns a fixed response and counts calls.
pub struct MockLLMProvider {
    response: String,
    calls: AtomicUsize,
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self::with_response(MOCK_RESPONSE.to_string())
    }

    pub fn with_response(response: String) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}
