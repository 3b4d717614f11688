//! sheetlog-llm - LLM providers for sheetlog release notes.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - chat completions with JSON mode
//! - **Anthropic** - messages API over `reqwest`
//!
//! # Example
//!
//! ```ignore
//! use sheetlog_core::{ImportConfig, LlmSummarizer};
//! use sheetlog_llm::LlmFactory;
//!
//! let config = ImportConfig::from_env()?;
//! if let Some(provider) = &config.summarizer {
//!     let summarizer = LlmSummarizer::new(LlmFactory::create(provider)?);
//! }
//! ```

mod anthropic;
mod factory;
mod openai;

pub use anthropic::AnthropicLlm;
pub use factory::LlmFactory;
pub use openai::OpenAIProvider;

// Re-export core types for convenience
pub use sheetlog_core::config::{LlmProvider, LlmProviderConfig};
pub use sheetlog_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
