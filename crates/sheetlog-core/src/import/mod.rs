//! Spreadsheet import and version comparison.
//!
//! # Example
//!
//! ```ignore
//! use sheetlog_core::import::{ImportEngine, ImportRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = ImportEngine::new(store);
//! let file = tokio::fs::File::open("members.xlsx").await?;
//! let outcome = engine
//!     .import_and_compare(&ImportRequest::new("members"), file, &CancellationToken::new())
//!     .await?;
//! println!("v{}: +{} ~{} -{}", outcome.new_version_no, outcome.inserted, outcome.updated, outcome.deleted);
//! ```

mod diff;
mod engine;

pub use diff::{compute_delta, Delta};
pub use engine::ImportEngine;

use serde::{Deserialize, Serialize};
use sheetlog_extractors::{DatasetSchema, SheetFormat};
use std::time::Duration;
use uuid::Uuid;

/// Longest accepted dataset name.
pub const MAX_DATASET_NAME_LEN: usize = 128;

/// What to do when one upload repeats a business key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Any repeated key fails the import.
    #[default]
    Reject,
    /// Fail only when a repeat differs from the first occurrence.
    RejectConflicting,
    /// Keep the first occurrence and continue.
    KeepFirst,
}

/// Tunables for [`ImportEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Upper bound on keys listed in a duplicate key error.
    pub max_reported_duplicates: usize,
    /// Time allowed for release note generation.
    pub summary_timeout: Duration,
    /// Largest upload read from the source, in bytes.
    pub max_upload_bytes: usize,
    /// Compare-and-commit retries after a version conflict.
    pub conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Reject,
            max_reported_duplicates: 10,
            summary_timeout: Duration::from_secs(20),
            max_upload_bytes: 50 * 1024 * 1024,
            conflict_retries: 1,
        }
    }
}

/// Parameters of one import call.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub dataset: String,
    pub schema: DatasetSchema,
    /// Container format; sniffed from the content when absent.
    pub format: Option<SheetFormat>,
}

impl ImportRequest {
    /// Import into `dataset` with the generic schema.
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            schema: DatasetSchema::generic(),
            format: None,
        }
    }

    /// Builder: set the schema.
    pub fn with_schema(mut self, schema: DatasetSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Builder: set the container format.
    pub fn with_format(mut self, format: SheetFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub dataset_name: String,
    pub new_version_no: u32,
    pub previous_version_no: u32,
    pub inserted: u32,
    pub updated: u32,
    pub deleted: u32,
    pub unchanged: usize,
    /// Data rows skipped for an empty or invalid key or an empty gate field.
    pub skipped_rows: usize,
    /// Repeated keys left out under [`DuplicatePolicy::KeepFirst`].
    pub duplicate_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_mr: Option<String>,
    pub session_id: Uuid,
}

/// Progress of a single import call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Started,
    Extracted,
    Compared,
    Committed,
}

impl ImportPhase {
    /// Lowercase phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Extracted => "extracted",
            Self::Compared => "compared",
            Self::Committed => "committed",
        }
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
