use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::EffectiveConfig;
use crate::error::RequestError;
use crate::prompt::{PromptTemplate, DEFAULT_SYSTEM_PROMPT};
use crate::providers::{CompletionRequest, LLMProvider, Message};

/// Outcome of analysing one company. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub company: String,
    pub text: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn success(company: impl Into<String>, text: String) -> Self {
        Self {
            company: company.into(),
            text: Some(text),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(company: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            company: company.into(),
            text: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The generated text as JSON when it parses, otherwise as a string.
    pub fn analysis(&self) -> Option<Value> {
        self.text.as_deref().map(parse_analysis)
    }
}

pub fn parse_analysis(text: &str) -> Value {
    serde_json::from_str(text)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Pretty-prints JSON output; anything else is returned as-is.
pub fn format_analysis(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| text.to_string())
}

/// Issues one completion call per prompt with a resolved configuration.
#[derive(Clone)]
pub struct AnalysisClient {
    provider: Arc<dyn LLMProvider>,
    config: EffectiveConfig,
    system_prompt: String,
}

impl AnalysisClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: EffectiveConfig) -> Self {
        Self {
            provider,
            config,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn build_request(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message::system(self.system_prompt.clone()),
                Message::user(prompt),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    pub async fn analyze(&self, prompt: &str) -> Result<String, RequestError> {
        log::debug!(
            "Requesting completion from model {} ({} prompt chars)",
            self.config.model,
            prompt.len()
        );
        let result = self.provider.complete(self.build_request(prompt)).await;
        if let Err(e) = &result {
            log::warn!("Completion failed [{}]: {}", e.kind(), e);
        }
        result
    }

    /// Single-run mode: render the template for one company and analyse it.
    pub async fn analyze_company(
        &self,
        template: &PromptTemplate,
        company: &str,
    ) -> Result<AnalysisResult, RequestError> {
        let text = self.analyze(&template.render(company)).await?;
        log::info!("Analysis generated for {}", company);
        Ok(AnalysisResult::success(company, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSources;
    use crate::providers::MockLLMProvider;

    fn client(provider: Arc<MockLLMProvider>) -> AnalysisClient {
        let config = ConfigSources::new()
            .with_direct_key("sk-test")
            .with_env_block("OPENAI_MODEL=gpt-4o\nMAX_TOKENS=256\nTEMPERATURE=0.1")
            .resolve()
            .unwrap();
        AnalysisClient::new(provider, config)
    }

    #[test]
    fn test_build_request_uses_config() {
        let client = client(Arc::new(MockLLMProvider::new()));
        let request = client.build_request("Analyze Acme");

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.messages[0], Message::system(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(request.prompt(), Some("Analyze Acme"));
    }

    #[tokio::test]
    async fn test_analyze_company() {
        let provider = Arc::new(MockLLMProvider::with_response("fine".to_string()));
        let client = client(provider.clone());
        let result = client
            .analyze_company(&PromptTemplate::new("About {company_name}"), "Acme")
            .await
            .unwrap();

        assert_eq!(result.company, "Acme");
        assert_eq!(result.text.as_deref(), Some("fine"));
        assert!(result.is_success());
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_parse_analysis() {
        assert_eq!(
            parse_analysis(r#"{"main_twitter_handle": "@acme"}"#)["main_twitter_handle"],
            "@acme"
        );
        assert_eq!(
            parse_analysis("plain words"),
            Value::String("plain words".to_string())
        );
    }

    #[test]
    fn test_format_analysis() {
        assert_eq!(format_analysis(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
        assert_eq!(format_analysis("not json"), "not json");
    }

    #[test]
    fn test_failure_result_has_no_text() {
        let result = AnalysisResult::failure("Globex", RequestError::Timeout("30s".to_string()));
        assert!(!result.is_success());
        assert!(result.text.is_none());
        assert!(result.analysis().is_none());
        assert!(result.error.unwrap().contains("timed out"));
    }
}
