//! Error types for sheetlog operations.
//!
//! Every failure carries a stable error code and, where one helps, a
//! suggestion for the person who uploaded the file.

use sheetlog_extractors::{ExtractError, ExtractErrorKind};
use thiserror::Error;

/// Result type alias for sheetlog operations.
pub type SheetlogResult<T> = Result<T, SheetlogError>;

/// Main error type for all sheetlog operations.
#[derive(Error, Debug)]
pub enum SheetlogError {
    /// The upload or a request parameter is unusable.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String, code: ErrorCode },

    /// The header row does not satisfy the dataset schema.
    #[error("Schema error: {message}")]
    Schema { message: String, code: ErrorCode },

    /// Nothing to import.
    #[error("No data: {message}")]
    NoData { message: String, code: ErrorCode },

    /// The same business key appears more than once in one upload.
    #[error("Duplicate business keys in upload ({total} rows): {}", .keys.join(", "))]
    DuplicateKey {
        /// Bounded sample of offending keys.
        keys: Vec<String>,
        /// Number of duplicate rows found.
        total: usize,
    },

    /// Another writer committed a version of the same dataset first.
    #[error("Conflicting version: {message}")]
    ConflictingVersion { message: String },

    /// The transactional write failed and was rolled back.
    #[error("Persistence failure: {message}")]
    PersistenceFailure {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Release notes could not be produced. Never fails an import.
    #[error("Summarization unavailable: {0}")]
    SummarizationUnavailable(String),

    /// The caller cancelled the import before commit.
    #[error("Import cancelled after phase '{phase}'")]
    Cancelled { phase: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// LLM operation failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Input (IN_xxx)
    InEmptyFile,
    InUnsupportedFormat,
    InInvalidParameter,

    // Schema (SCH_xxx)
    SchMissingColumns,
    SchTooFewColumns,
    SchNoHeader,

    // Import (IMP_xxx)
    ImpNoDataRows,
    ImpNoSurvivingRows,
    ImpNothingToImport,
    ImpDuplicateKey,
    ImpConflictingVersion,
    ImpCancelled,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,
    LlmTimeout,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseInvalidTimestamp,

    // Configuration
    Configuration,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InEmptyFile => "IN_001",
            ErrorCode::InUnsupportedFormat => "IN_002",
            ErrorCode::InInvalidParameter => "IN_003",
            ErrorCode::SchMissingColumns => "SCH_001",
            ErrorCode::SchTooFewColumns => "SCH_002",
            ErrorCode::SchNoHeader => "SCH_003",
            ErrorCode::ImpNoDataRows => "IMP_001",
            ErrorCode::ImpNoSurvivingRows => "IMP_002",
            ErrorCode::ImpNothingToImport => "IMP_003",
            ErrorCode::ImpDuplicateKey => "IMP_004",
            ErrorCode::ImpConflictingVersion => "IMP_005",
            ErrorCode::ImpCancelled => "IMP_006",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::LlmTimeout => "LLM_004",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseInvalidTimestamp => "PARSE_002",
            ErrorCode::Configuration => "CFG_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SheetlogError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            code: ErrorCode::InInvalidParameter,
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            code: ErrorCode::SchMissingColumns,
        }
    }

    /// Create a no-data error with a specific code.
    pub fn no_data(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::NoData {
            message: message.into(),
            code,
        }
    }

    /// Create a duplicate key error.
    pub fn duplicate_key(keys: Vec<String>, total: usize) -> Self {
        Self::DuplicateKey { keys, total }
    }

    /// Create a conflicting version error.
    pub fn conflicting_version(message: impl Into<String>) -> Self {
        Self::ConflictingVersion {
            message: message.into(),
        }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceFailure {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a cancellation error for the given phase.
    pub fn cancelled(phase: impl Into<String>) -> Self {
        Self::Cancelled {
            phase: phase.into(),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an API error from an LLM provider.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmConnectionFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput { code, .. } => *code,
            Self::Schema { code, .. } => *code,
            Self::NoData { code, .. } => *code,
            Self::DuplicateKey { .. } => ErrorCode::ImpDuplicateKey,
            Self::ConflictingVersion { .. } => ErrorCode::ImpConflictingVersion,
            Self::PersistenceFailure { code, .. } => *code,
            Self::SummarizationUnavailable(_) => ErrorCode::LlmGenerationFailed,
            Self::Cancelled { .. } => ErrorCode::ImpCancelled,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Llm { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            Self::Io(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { .. } => Some("Upload a non-empty xlsx, xls, xlsb, ods or csv file"),
            Self::Schema { .. } => Some("Check that the header row contains every required column"),
            Self::NoData { .. } => Some("Add at least one data row with a valid business key"),
            Self::DuplicateKey { .. } => Some("Remove repeated business keys and upload again"),
            Self::ConflictingVersion { .. } => {
                Some("Another import of this dataset finished first; retry the upload")
            }
            Self::PersistenceFailure { .. } => {
                Some("No version was consumed; the same upload can be retried")
            }
            Self::Llm { .. } => Some("Please check your LLM provider configuration"),
            _ => None,
        }
    }

    /// Whether retrying the identical request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConflictingVersion { .. } | Self::PersistenceFailure { .. }
        )
    }

    /// Whether the caller must fix the upload before trying again.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::Schema { .. }
                | Self::NoData { .. }
                | Self::DuplicateKey { .. }
        )
    }
}

impl From<rusqlite::Error> for SheetlogError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
            if ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return Self::ConflictingVersion {
                    message: err.to_string(),
                };
            }
        }
        Self::PersistenceFailure {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

impl From<ExtractError> for SheetlogError {
    fn from(err: ExtractError) -> Self {
        let message = err.to_string();
        match (&err, err.kind()) {
            (ExtractError::InvalidInput(_), _) => Self::InvalidInput {
                message,
                code: ErrorCode::InEmptyFile,
            },
            (_, ExtractErrorKind::InvalidInput) => Self::InvalidInput {
                message,
                code: ErrorCode::InUnsupportedFormat,
            },
            (ExtractError::TooFewColumns { .. }, _) => Self::Schema {
                message,
                code: ErrorCode::SchTooFewColumns,
            },
            (ExtractError::NoHeader, _) => Self::Schema {
                message,
                code: ErrorCode::SchNoHeader,
            },
            (_, ExtractErrorKind::Schema) => Self::Schema {
                message,
                code: ErrorCode::SchMissingColumns,
            },
            (_, ExtractErrorKind::NoData) => Self::NoData {
                message,
                code: ErrorCode::ImpNoDataRows,
            },
            (_, ExtractErrorKind::Internal) => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ImpNoDataRows.as_str(), "IMP_001");
        assert_eq!(ErrorCode::ImpConflictingVersion.as_str(), "IMP_005");
        assert_eq!(ErrorCode::SchMissingColumns.to_string(), "SCH_001");
    }

    #[test]
    fn test_duplicate_key_message() {
        let err = SheetlogError::duplicate_key(vec!["a".into(), "b".into()], 3);
        assert_eq!(err.code(), ErrorCode::ImpDuplicateKey);
        assert!(err.to_string().contains("a, b"));
        assert!(err.is_rejection());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_extract_error() {
        let err: SheetlogError = ExtractError::MissingColumns(vec!["ApplicantName".into()]).into();
        assert!(matches!(err, SheetlogError::Schema { .. }));
        assert!(err.to_string().contains("ApplicantName"));

        let err: SheetlogError = ExtractError::TooFewColumns {
            found: 2,
            required: 6,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::SchTooFewColumns);

        let err: SheetlogError = ExtractError::NoDataRows.into();
        assert_eq!(err.code(), ErrorCode::ImpNoDataRows);

        let err: SheetlogError = ExtractError::InvalidInput("empty".into()).into();
        assert_eq!(err.code(), ErrorCode::InEmptyFile);

        let err: SheetlogError = ExtractError::UnsupportedFormat("pdf".into()).into();
        assert_eq!(err.code(), ErrorCode::InUnsupportedFormat);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER UNIQUE); INSERT INTO t VALUES (1);")
            .unwrap();
        let err: SheetlogError = conn
            .execute("INSERT INTO t VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, SheetlogError::ConflictingVersion { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_sqlite_errors_are_persistence_failures() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: SheetlogError = conn
            .execute("INSERT INTO missing_table VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, SheetlogError::PersistenceFailure { .. }));
        assert!(err.suggestion().is_some());
    }
}
