//! OpenAI LLM provider implementation.

use async_trait::async_trait;
use tracing::debug;

use sheetlog_core::error::{SheetlogError, SheetlogResult};
use sheetlog_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse};
use sheetlog_core::types::Message;

#[cfg(feature = "openai")]
use sheetlog_core::traits::{ResponseFormat, TokenUsage};
#[cfg(feature = "openai")]
use sheetlog_core::types::MessageRole;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};

const DEFAULT_MODEL: &str = "gpt-4.1-nano-2025-04-14";

/// OpenAI LLM provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> SheetlogResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                SheetlogError::Configuration("OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        #[cfg(feature = "openai")]
        let client = {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(ref base_url) = config.base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Client::with_config(openai_config)
        };
        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Reasoning models reject sampling parameters.
    fn is_reasoning_model(&self) -> bool {
        let model = self.config.model.to_lowercase();
        ["o1", "o3", "o4", "gpt-5"]
            .iter()
            .any(|m| model.starts_with(m))
    }

    #[cfg(feature = "openai")]
    fn message_to_openai(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::User => {
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    ..Default::default()
                })
            }
        }
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> SheetlogResult<LlmResponse> {
        let options = options.unwrap_or_default();

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(Self::message_to_openai).collect(),
            ..Default::default()
        };

        if !self.is_reasoning_model() {
            request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
            request.top_p = Some(options.top_p.unwrap_or(self.config.top_p));
            request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        }
        if options.response_format == Some(ResponseFormat::Json) {
            request.response_format = Some(OpenAIResponseFormat::JsonObject);
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SheetlogError::llm(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| SheetlogError::llm("No response choices returned"))?;

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        debug!(model = %self.config.model, ?usage, "OpenAI response received");

        Ok(LlmResponse {
            content: choice.message.content.clone(),
            usage,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> SheetlogResult<LlmResponse> {
        Err(SheetlogError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        cfg!(feature = "openai")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> OpenAIProvider {
        OpenAIProvider::new(LlmConfig {
            model: model.to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_reasoning_model_detection() {
        assert!(provider("o3-mini").is_reasoning_model());
        assert!(provider("gpt-5-nano").is_reasoning_model());
        assert!(!provider("gpt-4o-mini").is_reasoning_model());
    }

    #[test]
    fn test_default_model() {
        assert_eq!(provider("").model_name(), DEFAULT_MODEL);
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_message_conversion() {
        let converted = OpenAIProvider::message_to_openai(&Message::system("Write notes"));
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
        let converted = OpenAIProvider::message_to_openai(&Message::assistant("ok"));
        assert!(matches!(converted, ChatCompletionRequestMessage::Assistant(_)));
    }
}
