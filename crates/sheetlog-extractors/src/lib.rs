//! sheetlog-extractors - Spreadsheet decoding and row extraction.
//!
//! Turns an uploaded workbook or delimited file into keyed rows whose content
//! is serialized as canonical JSON, ready for comparison against a stored
//! snapshot.
//!
//! # Features
//!
//! - `workbook` (default) - xlsx, xlsm, xlsb, xls and ods via calamine
//! - `delimited` (default) - CSV via the csv crate
//!
//! # Example
//!
//! ```ignore
//! use sheetlog_extractors::{DatasetSchema, DecoderPipeline, RowExtractor};
//!
//! let pipeline = DecoderPipeline::with_defaults();
//! let sheet = pipeline.decode(&upload_bytes, None).await?;
//!
//! let mut rows = RowExtractor::open(sheet, &DatasetSchema::generic())?;
//! for row in rows.by_ref() {
//!     println!("{} => {}", row.business_key, row.data_json);
//! }
//! let report = rows.into_report();
//! ```

pub mod canonical;
mod error;
mod factory;
mod pipeline;
mod rows;
pub mod schema;
mod types;

#[cfg(feature = "workbook")]
mod workbook;

#[cfg(feature = "delimited")]
mod delimited;

pub use canonical::CanonicalRow;
pub use error::{ExtractError, ExtractErrorKind, ExtractResult};
pub use factory::DecoderFactory;
pub use pipeline::DecoderPipeline;
pub use rows::RowExtractor;
pub use schema::{ColumnMap, DatasetSchema, FieldSpec, KeyFormat, KeySpec, MatchStrength};
pub use types::{
    DecodedSheet, DuplicateRow, ExtractedRow, ExtractionReport, SheetFormat, SheetRow,
    SkipReason, SkippedRow,
};

#[cfg(feature = "workbook")]
pub use workbook::WorkbookDecoder;

#[cfg(feature = "delimited")]
pub use delimited::CsvDecoder;

use async_trait::async_trait;

/// Core decoder trait - every sheet container format implements this.
#[async_trait]
pub trait SheetDecoder: Send + Sync {
    /// Decode the first worksheet of an upload.
    async fn decode(&self, content: &[u8]) -> ExtractResult<DecodedSheet>;

    /// Formats this decoder reads.
    fn supported_formats(&self) -> &[SheetFormat];

    /// Check if this decoder handles the given format.
    fn supports(&self, format: SheetFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Human-readable name for this decoder.
    fn name(&self) -> &str;
}
