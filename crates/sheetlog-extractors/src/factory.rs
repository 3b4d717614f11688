//! Factory for creating sheet decoders.

use std::sync::Arc;

use crate::error::{ExtractError, ExtractResult};
use crate::types::SheetFormat;
use crate::SheetDecoder;

#[cfg(feature = "workbook")]
use crate::WorkbookDecoder;

#[cfg(feature = "delimited")]
use crate::CsvDecoder;

/// Factory for creating sheet decoders.
pub struct DecoderFactory;

impl DecoderFactory {
    /// Create a workbook decoder.
    #[cfg(feature = "workbook")]
    pub fn workbook() -> Arc<dyn SheetDecoder> {
        Arc::new(WorkbookDecoder::new())
    }

    /// Create a comma-separated decoder.
    #[cfg(feature = "delimited")]
    pub fn csv() -> Arc<dyn SheetDecoder> {
        Arc::new(CsvDecoder::new())
    }

    /// Create a delimited decoder with a custom delimiter.
    #[cfg(feature = "delimited")]
    pub fn csv_with_delimiter(delimiter: u8) -> Arc<dyn SheetDecoder> {
        Arc::new(CsvDecoder::new().with_delimiter(delimiter))
    }

    /// Create decoder for a given format.
    pub fn for_format(format: SheetFormat) -> ExtractResult<Arc<dyn SheetDecoder>> {
        match format {
            #[cfg(feature = "workbook")]
            SheetFormat::Xlsx
            | SheetFormat::Xlsm
            | SheetFormat::Xlsb
            | SheetFormat::Xls
            | SheetFormat::Ods => Ok(Self::workbook()),

            #[cfg(feature = "delimited")]
            SheetFormat::Csv => Ok(Self::csv()),

            #[allow(unreachable_patterns)]
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Get all available decoders.
    #[allow(clippy::vec_init_then_push)]
    pub fn all() -> Vec<Arc<dyn SheetDecoder>> {
        let mut decoders: Vec<Arc<dyn SheetDecoder>> = Vec::new();

        #[cfg(feature = "workbook")]
        decoders.push(Self::workbook());

        #[cfg(feature = "delimited")]
        decoders.push(Self::csv());

        decoders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_all_decoders() {
        let decoders = DecoderFactory::all();

        #[cfg(all(feature = "workbook", feature = "delimited"))]
        assert_eq!(decoders.len(), 2);

        #[cfg(all(feature = "workbook", not(feature = "delimited")))]
        assert_eq!(decoders.len(), 1);
    }

    #[cfg(feature = "workbook")]
    #[test]
    fn test_factory_workbook_formats() {
        let decoder = DecoderFactory::for_format(SheetFormat::Ods).unwrap();
        assert!(decoder.supports(SheetFormat::Xlsx));
        assert!(!decoder.supports(SheetFormat::Csv));
    }

    #[cfg(feature = "delimited")]
    #[test]
    fn test_factory_csv() {
        let decoder = DecoderFactory::for_format(SheetFormat::Csv).unwrap();
        assert_eq!(decoder.name(), "csv");
    }
}
