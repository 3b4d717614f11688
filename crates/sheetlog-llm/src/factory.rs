//! Factory for creating LLM providers.

use std::sync::Arc;

use sheetlog_core::config::{LlmProvider, LlmProviderConfig};
use sheetlog_core::error::SheetlogResult;
use sheetlog_core::summary::LlmSummarizer;
use sheetlog_core::traits::{Llm, LlmConfig};

use crate::anthropic::AnthropicLlm;
use crate::openai::OpenAIProvider;

/// Factory for creating LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an LLM provider from the given configuration.
    pub fn create(provider: &LlmProviderConfig) -> SheetlogResult<Arc<dyn Llm>> {
        let config = provider.config.clone();
        match provider.provider {
            LlmProvider::OpenAI => Ok(Arc::new(OpenAIProvider::new(config)?)),
            LlmProvider::Anthropic => Ok(Arc::new(AnthropicLlm::new(config)?)),
        }
    }

    /// Create a release note summarizer backed by the configured provider.
    pub fn summarizer(provider: &LlmProviderConfig) -> SheetlogResult<Arc<LlmSummarizer>> {
        Ok(Arc::new(LlmSummarizer::new(Self::create(provider)?)))
    }

    /// Create an OpenAI LLM provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> SheetlogResult<Arc<dyn Llm>> {
        Self::create(&LlmProviderConfig {
            provider: LlmProvider::OpenAI,
            config: LlmConfig {
                model: model.into(),
                ..Default::default()
            },
        })
    }

    /// Create an Anthropic LLM provider with a specific model.
    pub fn anthropic_with_model(model: impl Into<String>) -> SheetlogResult<Arc<dyn Llm>> {
        Self::create(&LlmProviderConfig {
            provider: LlmProvider::Anthropic,
            config: LlmConfig {
                model: model.into(),
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key(provider: LlmProvider, model: &str) -> LlmProviderConfig {
        LlmProviderConfig {
            provider,
            config: LlmConfig {
                model: model.to_string(),
                api_key: Some("test-key".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_create_each_provider() {
        let openai = LlmFactory::create(&with_key(LlmProvider::OpenAI, "gpt-4o-mini")).unwrap();
        assert_eq!(openai.model_name(), "gpt-4o-mini");

        let anthropic =
            LlmFactory::create(&with_key(LlmProvider::Anthropic, "claude-3-5-haiku-latest"))
                .unwrap();
        assert_eq!(anthropic.model_name(), "claude-3-5-haiku-latest");
        assert!(!anthropic.supports_json_mode());
    }

    #[test]
    fn test_empty_model_gets_default() {
        let llm = LlmFactory::create(&with_key(LlmProvider::Anthropic, "")).unwrap();
        assert!(!llm.model_name().is_empty());
    }
}
