//! Core types for sheet decoding and row extraction.

use serde::{Deserialize, Serialize};

/// Container format of an uploaded sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    /// Office Open XML workbook.
    Xlsx,
    /// Macro-enabled Office Open XML workbook.
    Xlsm,
    /// Binary workbook.
    Xlsb,
    /// Legacy BIFF workbook.
    Xls,
    /// OpenDocument spreadsheet.
    Ods,
    /// Comma-separated values.
    Csv,
}

impl SheetFormat {
    /// Lowercase name, matching the file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xlsm => "xlsm",
            Self::Xlsb => "xlsb",
            Self::Xls => "xls",
            Self::Ods => "ods",
            Self::Csv => "csv",
        }
    }

    /// Parse from a file extension or format name (leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "xlsx" => Some(Self::Xlsx),
            "xlsm" => Some(Self::Xlsm),
            "xlsb" => Some(Self::Xlsb),
            "xls" => Some(Self::Xls),
            "ods" => Some(Self::Ods),
            "csv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Parse from a MIME type.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or("").trim();
        match essence {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(Self::Xlsx),
            "application/vnd.ms-excel.sheet.macroenabled.12" => Some(Self::Xlsm),
            "application/vnd.ms-excel.sheet.binary.macroenabled.12" => Some(Self::Xlsb),
            "application/vnd.ms-excel" => Some(Self::Xls),
            "application/vnd.oasis.opendocument.spreadsheet" => Some(Self::Ods),
            "text/csv" | "application/csv" | "text/plain" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Guess the format from leading magic bytes.
    ///
    /// Zip containers are reported as xlsx; the workbook decoder detects the
    /// precise flavour itself.
    pub fn sniff(content: &[u8]) -> Option<Self> {
        const ZIP: &[u8] = b"PK\x03\x04";
        const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

        if content.starts_with(ZIP) {
            Some(Self::Xlsx)
        } else if content.starts_with(OLE) {
            Some(Self::Xls)
        } else if std::str::from_utf8(content).is_ok() {
            Some(Self::Csv)
        } else {
            None
        }
    }

    /// Whether this is a binary workbook container rather than delimited text.
    pub fn is_workbook(&self) -> bool {
        !matches!(self, Self::Csv)
    }
}

impl std::fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-empty row of a decoded sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number in the source sheet.
    pub number: usize,
    /// Cell text indexed by absolute 0-based column position.
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Create a row.
    pub fn new(number: usize, cells: Vec<String>) -> Self {
        Self { number, cells }
    }

    /// Cell text at a column, empty when out of range.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// Whether every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// First worksheet of an upload, reduced to its non-empty rows.
///
/// The first row is the header row; everything after it is data.
#[derive(Debug, Clone, Default)]
pub struct DecodedSheet {
    /// Name of the worksheet the rows came from, if the container has names.
    pub sheet_name: Option<String>,
    /// Non-empty rows in sheet order.
    pub rows: Vec<SheetRow>,
}

impl DecodedSheet {
    /// Build a sheet, dropping blank rows.
    pub fn from_rows(sheet_name: Option<String>, rows: impl IntoIterator<Item = SheetRow>) -> Self {
        Self {
            sheet_name,
            rows: rows.into_iter().filter(|r| !r.is_blank()).collect(),
        }
    }

    /// Whether the sheet has no non-empty rows at all.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows after the header.
    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// A validated row ready for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRow {
    /// 1-based row number in the source sheet.
    pub row_number: usize,
    /// Business key identifying the row within its dataset.
    pub business_key: String,
    /// Canonical JSON of the recognized fields.
    pub data_json: String,
}

/// Why a data row was left out of the extraction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The business key cell was empty.
    EmptyKey,
    /// The business key could not be parsed in the configured format.
    InvalidKey { value: String },
    /// A gate field was empty.
    EmptyGate { field: String },
}

/// A data row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A later occurrence of a business key already seen in the same upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub business_key: String,
    pub row_number: usize,
    /// Row number of the occurrence that was kept.
    pub first_row_number: usize,
    /// Whether the duplicate carries exactly the same canonical content.
    pub identical: bool,
}

/// Counters collected during a single extraction pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Data rows examined (header excluded).
    pub data_rows: usize,
    /// Rows emitted.
    pub extracted: usize,
    /// Rows skipped for key or gate reasons.
    pub skipped: Vec<SkippedRow>,
    /// Later occurrences of repeated keys.
    pub duplicates: Vec<DuplicateRow>,
}

impl ExtractionReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any duplicate keys were found.
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// Whether any duplicate differs from the occurrence that was kept.
    pub fn has_conflicting_duplicates(&self) -> bool {
        self.duplicates.iter().any(|d| !d.identical)
    }

    /// Distinct duplicated keys in first-seen order, at most `limit` of them.
    pub fn duplicate_key_sample(&self, limit: usize, conflicting_only: bool) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for dup in &self.duplicates {
            if conflicting_only && dup.identical {
                continue;
            }
            if keys.len() >= limit {
                break;
            }
            if !keys.contains(&dup.business_key) {
                keys.push(dup.business_key.clone());
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SheetFormat::from_extension("XLSX"), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::from_extension(".csv"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_extension("pdf"), None);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(
            SheetFormat::from_mime(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some(SheetFormat::Xlsx)
        );
        assert_eq!(
            SheetFormat::from_mime("text/csv; charset=utf-8"),
            Some(SheetFormat::Csv)
        );
        assert_eq!(SheetFormat::from_mime("image/png"), None);
    }

    #[test]
    fn test_format_sniff() {
        assert_eq!(SheetFormat::sniff(b"PK\x03\x04rest"), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::sniff(b"a,b\n1,2\n"), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::sniff(&[0xff, 0xfe, 0x00, 0x9f]), None);
    }

    #[test]
    fn test_decoded_sheet_drops_blank_rows() {
        let sheet = DecodedSheet::from_rows(
            None,
            vec![
                SheetRow::new(1, vec!["A".into(), "B".into()]),
                SheetRow::new(2, vec!["".into(), "  ".into()]),
                SheetRow::new(3, vec!["1".into(), "2".into()]),
            ],
        );
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.data_row_count(), 1);
        assert_eq!(sheet.rows[1].number, 3);
    }

    #[test]
    fn test_duplicate_key_sample_is_bounded_and_distinct() {
        let mut report = ExtractionReport::new();
        for (i, key) in ["a", "a", "b", "c", "d"].iter().enumerate() {
            report.duplicates.push(DuplicateRow {
                business_key: key.to_string(),
                row_number: i + 10,
                first_row_number: 2,
                identical: *key == "b",
            });
        }
        assert_eq!(report.duplicate_key_sample(2, false), vec!["a", "b"]);
        assert_eq!(report.duplicate_key_sample(10, true), vec!["a", "c", "d"]);
        assert!(report.has_conflicting_duplicates());
    }
}
