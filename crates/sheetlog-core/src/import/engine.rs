//! The import-and-compare engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use sheetlog_extractors::{DecoderPipeline, ExtractedRow, ExtractionReport, RowExtractor};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::diff::compute_delta;
use super::{
    DuplicatePolicy, EngineConfig, ImportOutcome, ImportPhase, ImportRequest,
    MAX_DATASET_NAME_LEN,
};
use crate::error::{ErrorCode, SheetlogError, SheetlogResult};
use crate::traits::{NoopSummarizer, Summarizer, SummaryRequest};
use crate::versioning::{
    DatasetRecord, DatasetSummary, ImportSession, RecordStore, ReleaseNotes, VersionCommit,
};

/// Imports spreadsheets into versioned datasets.
///
/// One call reads the upload once, extracts keyed rows, compares them with
/// the latest stored snapshot and commits the delta as the next version.
/// Nothing is written unless the whole call succeeds.
pub struct ImportEngine {
    store: Arc<dyn RecordStore>,
    summarizer: Arc<dyn Summarizer>,
    decoders: DecoderPipeline,
    config: EngineConfig,
}

impl ImportEngine {
    /// Create an engine over a record store, without release notes.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            summarizer: Arc::new(NoopSummarizer),
            decoders: DecoderPipeline::with_defaults(),
            config: EngineConfig::default(),
        }
    }

    /// Builder: set the release note summarizer.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Builder: replace the decoder pipeline.
    pub fn with_decoders(mut self, decoders: DecoderPipeline) -> Self {
        self.decoders = decoders;
        self
    }

    /// Builder: set engine tunables.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Engine tunables.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read an upload from `source` and commit it as the next version of
    /// `request.dataset`.
    ///
    /// Cancellation is honored until the commit starts.
    pub async fn import_and_compare<R>(
        &self,
        request: &ImportRequest,
        source: R,
        cancel: &CancellationToken,
    ) -> SheetlogResult<ImportOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_dataset_name(&request.dataset)?;
        info!(dataset = %request.dataset, phase = %ImportPhase::Started, "Import started");

        let limit = self.config.max_upload_bytes;
        let mut content = Vec::new();
        let mut limited = source.take(limit as u64 + 1);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SheetlogError::cancelled(ImportPhase::Started.as_str())),
            read = limited.read_to_end(&mut content) => { read?; }
        }
        if content.len() > limit {
            return Err(SheetlogError::invalid_input(format!(
                "Upload exceeds the {} byte limit",
                limit
            )));
        }

        self.import_content(request, &content, cancel).await
    }

    /// Commit an upload already held in memory.
    pub async fn import_bytes(
        &self,
        request: &ImportRequest,
        content: &[u8],
        cancel: &CancellationToken,
    ) -> SheetlogResult<ImportOutcome> {
        self.import_and_compare(request, content, cancel).await
    }

    async fn import_content(
        &self,
        request: &ImportRequest,
        content: &[u8],
        cancel: &CancellationToken,
    ) -> SheetlogResult<ImportOutcome> {
        let dataset = request.dataset.as_str();

        let sheet = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SheetlogError::cancelled(ImportPhase::Started.as_str())),
            sheet = self.decoders.decode(content, request.format) => sheet?,
        };

        let mut extractor = RowExtractor::open(sheet, &request.schema)?;
        let rows: Vec<ExtractedRow> = extractor.by_ref().collect();
        let report = extractor.into_report();
        debug!(
            dataset,
            data_rows = report.data_rows,
            extracted = report.extracted,
            skipped = report.skipped.len(),
            duplicates = report.duplicates.len(),
            "Extracted rows"
        );

        if rows.is_empty() {
            return Err(SheetlogError::no_data(
                format!(
                    "None of the {} data rows has a usable business key",
                    report.data_rows
                ),
                ErrorCode::ImpNoSurvivingRows,
            ));
        }
        self.check_duplicates(dataset, &report)?;
        info!(dataset, phase = %ImportPhase::Extracted, rows = rows.len(), "Rows extracted");

        let mut attempt = 0;
        loop {
            match self.compare_and_commit(dataset, &rows, &report, cancel).await {
                Err(SheetlogError::ConflictingVersion { message })
                    if attempt < self.config.conflict_retries =>
                {
                    attempt += 1;
                    warn!(dataset, attempt, %message, "Version conflict, comparing again");
                }
                result => return result,
            }
        }
    }

    fn check_duplicates(&self, dataset: &str, report: &ExtractionReport) -> SheetlogResult<()> {
        if !report.has_duplicates() {
            return Ok(());
        }
        let limit = self.config.max_reported_duplicates;
        match self.config.duplicate_policy {
            DuplicatePolicy::Reject => Err(SheetlogError::duplicate_key(
                report.duplicate_key_sample(limit, false),
                report.duplicates.len(),
            )),
            DuplicatePolicy::RejectConflicting if report.has_conflicting_duplicates() => {
                Err(SheetlogError::duplicate_key(
                    report.duplicate_key_sample(limit, true),
                    report.duplicates.iter().filter(|d| !d.identical).count(),
                ))
            }
            _ => {
                warn!(
                    dataset,
                    duplicates = report.duplicates.len(),
                    "Keeping first occurrence of repeated business keys"
                );
                Ok(())
            }
        }
    }

    async fn compare_and_commit(
        &self,
        dataset: &str,
        rows: &[ExtractedRow],
        report: &ExtractionReport,
        cancel: &CancellationToken,
    ) -> SheetlogResult<ImportOutcome> {
        ensure_active(cancel, ImportPhase::Extracted)?;

        let name = dataset.to_string();
        let previous = self.with_store(move |store| store.max_version(&name)).await?;
        let name = dataset.to_string();
        let prior = self
            .with_store(move |store| store.load_snapshot(&name, previous))
            .await?;

        let delta = compute_delta(&prior, rows);
        if delta.is_empty() && previous == 0 {
            return Err(SheetlogError::no_data(
                "Upload contains no changes and the dataset has no prior version",
                ErrorCode::ImpNothingToImport,
            ));
        }
        let new_version = previous + 1;
        info!(
            dataset,
            phase = %ImportPhase::Compared,
            previous_version = previous,
            new_version,
            inserted = delta.counts.inserted,
            updated = delta.counts.updated,
            deleted = delta.counts.deleted,
            unchanged = delta.unchanged,
            "Snapshot compared"
        );

        let request = SummaryRequest {
            dataset_name: dataset.to_string(),
            previous_version_no: previous,
            new_version_no: new_version,
            counts: delta.counts,
            unchanged: delta.unchanged,
        };
        let notes = self.release_notes(request, cancel).await?;

        ensure_active(cancel, ImportPhase::Compared)?;

        let commit = VersionCommit {
            dataset_name: dataset.to_string(),
            previous_version_no: previous,
            new_version_no: new_version,
            changes: delta.changes,
            counts: delta.counts,
            notes,
        };
        let session = self.with_store(move |store| store.commit(&commit)).await?;
        info!(
            dataset,
            phase = %ImportPhase::Committed,
            version = session.new_version_no,
            session_id = %session.id,
            "Import committed"
        );

        Ok(ImportOutcome {
            dataset_name: session.dataset_name,
            new_version_no: session.new_version_no,
            previous_version_no: session.previous_version_no,
            inserted: session.inserted_count,
            updated: session.updated_count,
            deleted: session.deleted_count,
            unchanged: delta.unchanged,
            skipped_rows: report.skipped.len(),
            duplicate_rows: report.duplicates.len(),
            summary_en: session.summary_en,
            summary_mr: session.summary_mr,
            session_id: session.id,
        })
    }

    /// Ask the summarizer for notes; never fails.
    async fn release_notes(
        &self,
        request: SummaryRequest,
        cancel: &CancellationToken,
    ) -> SheetlogResult<ReleaseNotes> {
        if !self.summarizer.is_enabled() {
            return Ok(ReleaseNotes::default());
        }

        let timeout = self.config.summary_timeout;
        let summarized = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SheetlogError::cancelled(ImportPhase::Compared.as_str())),
            summarized = tokio::time::timeout(timeout, self.summarizer.summarize(&request)) => summarized,
        };
        let error = match summarized {
            Ok(Ok(notes)) => return Ok(notes),
            Ok(Err(e @ SheetlogError::SummarizationUnavailable(_))) => e,
            Ok(Err(e)) => SheetlogError::SummarizationUnavailable(e.to_string()),
            Err(_) => SheetlogError::SummarizationUnavailable(format!(
                "no response within {:?}",
                timeout
            )),
        };
        warn!(dataset = %request.dataset_name, error = %error, "Committing without release notes");
        Ok(ReleaseNotes::default())
    }

    /// Run a store operation off the async runtime.
    async fn with_store<T, F>(&self, op: F) -> SheetlogResult<T>
    where
        F: FnOnce(&dyn RecordStore) -> SheetlogResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| SheetlogError::Internal(format!("Store task failed: {}", e)))?
    }

    /// Sessions of a dataset, newest first.
    pub async fn history(&self, dataset: &str) -> SheetlogResult<Vec<ImportSession>> {
        validate_dataset_name(dataset)?;
        let name = dataset.to_string();
        self.with_store(move |store| store.sessions(&name)).await
    }

    /// Records written for one version, ordered by business key.
    pub async fn changes(
        &self,
        dataset: &str,
        version_no: u32,
    ) -> SheetlogResult<Vec<DatasetRecord>> {
        validate_dataset_name(dataset)?;
        let name = dataset.to_string();
        self.with_store(move |store| store.changes(&name, version_no))
            .await
    }

    /// State of a dataset at a version, or at its latest version.
    pub async fn snapshot(
        &self,
        dataset: &str,
        version_no: Option<u32>,
    ) -> SheetlogResult<BTreeMap<String, String>> {
        validate_dataset_name(dataset)?;
        let name = dataset.to_string();
        self.with_store(move |store| {
            let version = match version_no {
                Some(v) => v,
                None => store.max_version(&name)?,
            };
            store.load_snapshot(&name, version)
        })
        .await
    }

    /// Aggregate statistics for a dataset.
    pub async fn dataset_summary(&self, dataset: &str) -> SheetlogResult<Option<DatasetSummary>> {
        validate_dataset_name(dataset)?;
        let name = dataset.to_string();
        self.with_store(move |store| store.dataset_summary(&name))
            .await
    }

    /// Latest version of a dataset, 0 if never imported.
    pub async fn latest_version(&self, dataset: &str) -> SheetlogResult<u32> {
        validate_dataset_name(dataset)?;
        let name = dataset.to_string();
        self.with_store(move |store| store.max_version(&name)).await
    }

    /// Names of all imported datasets.
    pub async fn datasets(&self) -> SheetlogResult<Vec<String>> {
        self.with_store(|store| store.datasets()).await
    }
}

fn validate_dataset_name(dataset: &str) -> SheetlogResult<()> {
    if dataset.trim().is_empty() {
        return Err(SheetlogError::invalid_input("Dataset name is required"));
    }
    if dataset.chars().count() > MAX_DATASET_NAME_LEN {
        return Err(SheetlogError::invalid_input(format!(
            "Dataset name is longer than {} characters",
            MAX_DATASET_NAME_LEN
        )));
    }
    Ok(())
}

fn ensure_active(cancel: &CancellationToken, phase: ImportPhase) -> SheetlogResult<()> {
    if cancel.is_cancelled() {
        info!(phase = %phase, "Import cancelled");
        return Err(SheetlogError::cancelled(phase.as_str()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::SqliteRecordStore;

    fn engine() -> ImportEngine {
        ImportEngine::new(Arc::new(SqliteRecordStore::in_memory().unwrap()))
    }

    #[test]
    fn test_dataset_name_validation() {
        assert!(validate_dataset_name("members").is_ok());
        assert!(validate_dataset_name("  ").is_err());
        assert!(validate_dataset_name(&"x".repeat(129)).is_err());
        assert!(validate_dataset_name(&"झ".repeat(128)).is_ok());
    }

    #[tokio::test]
    async fn test_import_csv_bytes() {
        let engine = engine();
        let outcome = engine
            .import_bytes(
                &ImportRequest::new("members"),
                b"BusinessKey,Name\na,Asha\nb,Bala\n",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.new_version_no, 1);
        assert_eq!(outcome.inserted, 2);
        assert!(outcome.summary_en.is_none());
        assert_eq!(engine.latest_version("members").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_size_limit() {
        let engine = engine().with_config(EngineConfig {
            max_upload_bytes: 8,
            ..EngineConfig::default()
        });
        let err = engine
            .import_bytes(
                &ImportRequest::new("members"),
                b"BusinessKey,Name\na,Asha\n",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SheetlogError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_empty_upload_is_invalid_input() {
        let err = engine()
            .import_bytes(&ImportRequest::new("members"), b"", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InEmptyFile);
    }
}
