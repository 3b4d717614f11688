//! Release note summarizer trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SheetlogResult;
use crate::versioning::{ChangeCounts, ReleaseNotes};

/// What a summarizer is told about a version about to be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub dataset_name: String,
    pub previous_version_no: u32,
    pub new_version_no: u32,
    pub counts: ChangeCounts,
    /// Rows present in both snapshots with identical content.
    pub unchanged: usize,
}

/// Produces bilingual release notes for an import.
///
/// Called with no store lock held and under the engine's own timeout. An
/// error never fails the import; the notes are simply left empty.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Write release notes for the given change counts.
    async fn summarize(&self, request: &SummaryRequest) -> SheetlogResult<ReleaseNotes>;

    /// Whether the engine should call this summarizer at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Summarizer used when no text generation capability is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _request: &SummaryRequest) -> SheetlogResult<ReleaseNotes> {
        Ok(ReleaseNotes::default())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
