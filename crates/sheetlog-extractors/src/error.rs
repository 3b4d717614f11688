//! Extraction error types.

use thiserror::Error;

/// Errors that can occur while decoding a sheet or extracting rows from it.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The upload was empty or missing.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No decoder is registered for the format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container could not be decoded.
    #[error("Failed to decode sheet: {0}")]
    Decode(String),

    /// The sheet has no non-empty row to use as header.
    #[error("Sheet has no header row")]
    NoHeader,

    /// The header row has fewer populated cells than the schema requires.
    #[error("Header has {found} columns, at least {required} required")]
    TooFewColumns { found: usize, required: usize },

    /// Required columns were not found in the header row.
    #[error("Required columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Neither the key header nor a fallback key column is available.
    #[error("Business key column '{0}' not found and no fallback column configured")]
    MissingKeyColumn(String),

    /// Header row present but no data rows follow it.
    #[error("Sheet has a header row but no data rows")]
    NoDataRows,

    /// IO error during decoding.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Task join error from spawn_blocking.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Coarse classification used by callers to map extraction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// The file itself is unusable.
    InvalidInput,
    /// The header row does not satisfy the schema.
    Schema,
    /// There is nothing to import.
    NoData,
    /// Runtime failure unrelated to the content.
    Internal,
}

impl ExtractError {
    /// Classify this error.
    pub fn kind(&self) -> ExtractErrorKind {
        match self {
            Self::InvalidInput(_) | Self::UnsupportedFormat(_) | Self::Decode(_) => {
                ExtractErrorKind::InvalidInput
            }
            Self::NoHeader
            | Self::TooFewColumns { .. }
            | Self::MissingColumns(_)
            | Self::MissingKeyColumn(_) => ExtractErrorKind::Schema,
            Self::NoDataRows => ExtractErrorKind::NoData,
            Self::Io(_) | Self::TaskJoin(_) => ExtractErrorKind::Internal,
        }
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
