pub mod llm;

pub use llm::{CompletionRequest, LLMProvider, Message, MockLLMProvider, OpenAIProvider};

use std::sync::Arc;

use crate::config::EffectiveConfig;
use crate::error::RequestError;

/// Builds a provider for a freshly resolved configuration.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &EffectiveConfig) -> Result<Arc<dyn LLMProvider>, RequestError>;
}

pub struct OpenAIProviderFactory;

impl ProviderFactory for OpenAIProviderFactory {
    fn create(&self, config: &EffectiveConfig) -> Result<Arc<dyn LLMProvider>, RequestError> {
        Ok(Arc::new(OpenAIProvider::from_config(config)?))
    }
}
