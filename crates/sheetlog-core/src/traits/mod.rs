//! Core traits for sheetlog providers.

mod llm;
mod summarizer;

pub use llm::*;
pub use summarizer::*;
