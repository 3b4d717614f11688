//! Anthropic (Claude) LLM provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sheetlog_core::error::{SheetlogError, SheetlogResult};
use sheetlog_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, TokenUsage};
use sheetlog_core::types::{Message, MessageRole};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// Anthropic LLM provider.
pub struct AnthropicLlm {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, PartialEq)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl AnthropicLlm {
    /// Create a new Anthropic LLM provider.
    pub fn new(config: LlmConfig) -> SheetlogResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                SheetlogError::Configuration("Anthropic API key not found. Set ANTHROPIC_API_KEY environment variable or provide api_key in config.".to_string())
            })?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            api_key
                .parse()
                .map_err(|_| SheetlogError::Configuration("Invalid API key format".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            reqwest::header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                SheetlogError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Split system prompts from the conversation; the messages API takes
    /// them as a separate field.
    fn split_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let conversation = messages
            .iter()
            .filter_map(|m| match m.role {
                MessageRole::System => None,
                MessageRole::User => Some(AnthropicMessage {
                    role: "user",
                    content: m.content.clone(),
                }),
                MessageRole::Assistant => Some(AnthropicMessage {
                    role: "assistant",
                    content: m.content.clone(),
                }),
            })
            .collect();

        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, conversation)
    }
}

#[async_trait]
impl Llm for AnthropicLlm {
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> SheetlogResult<LlmResponse> {
        let options = options.unwrap_or_default();
        let (system, messages) = Self::split_messages(messages);

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            system,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| SheetlogError::api(format!("Anthropic API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SheetlogError::api(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(SheetlogError::llm(format!(
                "Anthropic API error ({}): {}",
                status, message
            )));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| SheetlogError::llm(format!("Failed to parse response: {}", e)))?;

        let content = response
            .content
            .iter()
            .find(|c| c.content_type == "text")
            .and_then(|c| c.text.clone());

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });
        debug!(model = %self.config.model, ?usage, "Anthropic response received");

        Ok(LlmResponse { content, usage })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        false // No native JSON mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_messages() {
        let (system, conversation) = AnthropicLlm::split_messages(&[
            Message::system("Write release notes."),
            Message::user("Dataset: members"),
            Message::assistant("ok"),
        ]);

        assert_eq!(system.as_deref(), Some("Write release notes."));
        assert_eq!(
            conversation,
            vec![
                AnthropicMessage {
                    role: "user",
                    content: "Dataset: members".to_string()
                },
                AnthropicMessage {
                    role: "assistant",
                    content: "ok".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "content": [{"type": "text", "text": "English: Two rows added"}],
            "usage": {"input_tokens": 40, "output_tokens": 12}
        }"#;
        let response: AnthropicResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            response.content[0].text.as_deref(),
            Some("English: Two rows added")
        );
        assert_eq!(response.usage.unwrap().output_tokens, 12);
    }

    #[test]
    fn test_base_url_override() {
        let llm = AnthropicLlm::new(LlmConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some("http://localhost:9000/v1".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(llm.base_url, "http://localhost:9000/v1");
        assert_eq!(llm.model_name(), DEFAULT_MODEL);
    }
}
