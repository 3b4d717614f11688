//! sheetlog-core - Versioned dataset import and comparison.
//!
//! This crate provides the import engine, the append-only record store,
//! release note summarization and configuration for sheetlog.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sheetlog_core::{ImportEngine, ImportRequest, SqliteRecordStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(SqliteRecordStore::new("sheetlog.db")?);
//! let engine = ImportEngine::new(store);
//!
//! let file = tokio::fs::File::open("members.csv").await?;
//! let outcome = engine
//!     .import_and_compare(&ImportRequest::new("members"), file, &CancellationToken::new())
//!     .await?;
//!
//! let history = engine.history("members").await?;
//! ```

pub mod config;
pub mod error;
pub mod import;
pub mod summary;
pub mod traits;
pub mod types;
pub mod versioning;

// Re-export commonly used types
pub use config::{ImportConfig, LlmProvider, LlmProviderConfig};
pub use error::{ErrorCode, SheetlogError, SheetlogResult};
pub use import::{
    DuplicatePolicy, EngineConfig, ImportEngine, ImportOutcome, ImportPhase, ImportRequest,
};
pub use summary::LlmSummarizer;
pub use traits::{Llm, LlmConfig, NoopSummarizer, Summarizer, SummaryRequest};
pub use types::{Message, MessageRole};
pub use versioning::{
    ChangeCounts, ChangeType, DatasetRecord, DatasetSummary, ImportSession, RecordStore,
    ReleaseNotes, SqliteRecordStore,
};

pub use sheetlog_extractors::{DatasetSchema, SheetFormat};
