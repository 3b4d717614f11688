//! LLM-backed bilingual release notes.

mod notes;
mod prompts;

pub use notes::{extract_json, parse_release_notes, remove_code_blocks};
pub use prompts::{release_notes_prompt, RELEASE_NOTES_SYSTEM_PROMPT};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{SheetlogError, SheetlogResult};
use crate::traits::{GenerationOptions, Llm, ResponseFormat, Summarizer, SummaryRequest};
use crate::types::Message;
use crate::versioning::ReleaseNotes;

/// Summarizer that asks an LLM for English and Marathi release notes.
pub struct LlmSummarizer {
    llm: Arc<dyn Llm>,
}

impl LlmSummarizer {
    /// Wrap an LLM provider.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> SheetlogResult<ReleaseNotes> {
        let messages = vec![
            Message::system(RELEASE_NOTES_SYSTEM_PROMPT),
            Message::user(release_notes_prompt(request)),
        ];

        let options = GenerationOptions {
            temperature: Some(0.2),
            response_format: self
                .llm
                .supports_json_mode()
                .then_some(ResponseFormat::Json),
            ..Default::default()
        };

        let response = self.llm.generate(&messages, Some(options)).await?;
        let notes = parse_release_notes(response.content_or_empty());
        if notes.is_empty() {
            return Err(SheetlogError::SummarizationUnavailable(format!(
                "{} returned an empty response",
                self.llm.model_name()
            )));
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LlmResponse;
    use crate::versioning::ChangeCounts;
    use std::sync::Mutex;

    struct CannedLlm {
        reply: &'static str,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Llm for CannedLlm {
        async fn generate(
            &self,
            messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> SheetlogResult<LlmResponse> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            Ok(LlmResponse {
                content: Some(self.reply.to_string()),
                usage: None,
            })
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn request() -> SummaryRequest {
        SummaryRequest {
            dataset_name: "members".to_string(),
            previous_version_no: 1,
            new_version_no: 2,
            counts: ChangeCounts {
                inserted: 1,
                updated: 1,
                deleted: 1,
            },
            unchanged: 0,
        }
    }

    #[tokio::test]
    async fn test_llm_summarizer_parses_json() {
        let llm = Arc::new(CannedLlm {
            reply: r#"{"en": "One row of each kind changed", "mr": "प्रत्येकी एक बदल"}"#,
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = LlmSummarizer::new(llm.clone());

        let notes = summarizer.summarize(&request()).await.unwrap();
        assert_eq!(notes.en.as_deref(), Some("One row of each kind changed"));
        assert_eq!(notes.mr.as_deref(), Some("प्रत्येकी एक बदल"));

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].content.contains("Dataset: members"));
    }

    #[tokio::test]
    async fn test_llm_summarizer_empty_reply_is_unavailable() {
        let summarizer = LlmSummarizer::new(Arc::new(CannedLlm {
            reply: "  ",
            seen: Mutex::new(Vec::new()),
        }));
        let err = summarizer.summarize(&request()).await.unwrap_err();
        assert!(matches!(err, SheetlogError::SummarizationUnavailable(_)));
    }
}
