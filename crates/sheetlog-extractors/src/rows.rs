//! Row extraction: turns a decoded sheet into keyed canonical rows.

use std::collections::HashMap;

use crate::canonical::{parse_integer_key, normalize_cell, CanonicalRow};
use crate::error::{ExtractError, ExtractResult};
use crate::schema::{ColumnMap, DatasetSchema, KeyFormat, KeySpec};
use crate::types::{
    DecodedSheet, DuplicateRow, ExtractedRow, ExtractionReport, SheetRow, SkipReason, SkippedRow,
};

/// Lazily yields one [`ExtractedRow`] per valid data row.
///
/// The header row is mapped when the extractor is opened, so schema errors
/// surface before any row is produced. Rows with an empty or invalid key, or
/// an empty gate field, are skipped and recorded. Repeated keys keep their
/// first occurrence; later ones are recorded as duplicates and not yielded.
#[derive(Debug)]
pub struct RowExtractor {
    rows: std::vec::IntoIter<SheetRow>,
    columns: ColumnMap,
    key: KeySpec,
    key_column: usize,
    gates: Vec<(String, usize)>,
    seen: HashMap<String, (usize, String)>,
    report: ExtractionReport,
}

impl RowExtractor {
    /// Map the header row and prepare to iterate the data rows.
    pub fn open(sheet: DecodedSheet, schema: &DatasetSchema) -> ExtractResult<Self> {
        let mut rows = sheet.rows.into_iter();
        let header = rows.next().ok_or(ExtractError::NoHeader)?;
        let columns = schema.map_headers(&header.cells)?;

        if rows.len() == 0 {
            return Err(ExtractError::NoDataRows);
        }

        let key_column = columns
            .position(&schema.key.field)
            .or(schema.key.fallback_column)
            .ok_or_else(|| ExtractError::MissingKeyColumn(schema.key.field.clone()))?;

        let gates = schema
            .skip_when_empty
            .iter()
            .filter_map(|field| columns.position(field).map(|col| (field.clone(), col)))
            .collect();

        let report = ExtractionReport {
            data_rows: rows.len(),
            ..ExtractionReport::new()
        };

        tracing::debug!(
            fields = columns.len(),
            data_rows = report.data_rows,
            key_column,
            "Mapped sheet header"
        );

        Ok(Self {
            rows,
            columns,
            key: schema.key.clone(),
            key_column,
            gates,
            seen: HashMap::new(),
            report,
        })
    }

    /// Field-to-column mapping resolved from the header row.
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Counters collected so far.
    pub fn report(&self) -> &ExtractionReport {
        &self.report
    }

    /// Consume the extractor, returning its report.
    pub fn into_report(self) -> ExtractionReport {
        self.report
    }

    fn business_key(&self, row: &SheetRow) -> Result<String, SkipReason> {
        let raw = normalize_cell(row.cell(self.key_column)).ok_or(SkipReason::EmptyKey)?;
        match self.key.format {
            KeyFormat::Text => Ok(raw),
            KeyFormat::Integer => parse_integer_key(&raw)
                .map(|n| n.to_string())
                .ok_or(SkipReason::InvalidKey { value: raw }),
        }
    }

    fn canonicalize(&self, row: &SheetRow, key: &str) -> String {
        let mut canonical = CanonicalRow::new();
        let mut key_mapped = false;
        for (field, column) in self.columns.iter() {
            if column == self.key_column && field.eq_ignore_ascii_case(&self.key.field) {
                canonical.set(field, key);
                key_mapped = true;
            } else {
                canonical.set(field, row.cell(column));
            }
        }
        if !key_mapped {
            canonical.set(self.key.field.clone(), key);
        }
        canonical.to_json()
    }

    fn skip(&mut self, row_number: usize, reason: SkipReason) {
        tracing::trace!(row = row_number, ?reason, "Skipping row");
        self.report.skipped.push(SkippedRow { row_number, reason });
    }
}

impl Iterator for RowExtractor {
    type Item = ExtractedRow;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(row) = self.rows.next() {
            let business_key = match self.business_key(&row) {
                Ok(key) => key,
                Err(reason) => {
                    self.skip(row.number, reason);
                    continue;
                }
            };

            let empty_gate = self
                .gates
                .iter()
                .find(|(_, column)| normalize_cell(row.cell(*column)).is_none())
                .map(|(field, _)| field.clone());
            if let Some(field) = empty_gate {
                self.skip(row.number, SkipReason::EmptyGate { field });
                continue;
            }

            let data_json = self.canonicalize(&row, &business_key);

            if let Some((first_row_number, first_json)) = self.seen.get(&business_key) {
                self.report.duplicates.push(DuplicateRow {
                    identical: *first_json == data_json,
                    first_row_number: *first_row_number,
                    row_number: row.number,
                    business_key,
                });
                continue;
            }

            self.seen
                .insert(business_key.clone(), (row.number, data_json.clone()));
            self.report.extracted += 1;
            return Some(ExtractedRow {
                row_number: row.number,
                business_key,
                data_json,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    fn sheet(rows: &[&[&str]]) -> DecodedSheet {
        DecodedSheet::from_rows(
            None,
            rows.iter().enumerate().map(|(i, cells)| {
                SheetRow::new(i + 1, cells.iter().map(|c| c.to_string()).collect())
            }),
        )
    }

    #[test]
    fn test_generic_extraction() {
        let mut extractor = RowExtractor::open(
            sheet(&[
                &["BusinessKey", "Name", "Area"],
                &["k1", "  Asha   Patil ", "120"],
                &["k2", "Bala", ""],
            ]),
            &DatasetSchema::generic(),
        )
        .unwrap();

        let first = extractor.next().unwrap();
        assert_eq!(first.business_key, "k1");
        assert_eq!(first.row_number, 2);
        assert_eq!(
            first.data_json,
            r#"{"Area":"120","BusinessKey":"k1","Name":"Asha Patil"}"#
        );

        let second = extractor.next().unwrap();
        assert_eq!(second.data_json, r#"{"Area":null,"BusinessKey":"k2","Name":"Bala"}"#);
        assert!(extractor.next().is_none());
        assert_eq!(extractor.report().extracted, 2);
    }

    #[test]
    fn test_skips_empty_keys() {
        let mut extractor = RowExtractor::open(
            sheet(&[&["BusinessKey", "Name"], &["", "Ghost"], &["k1", "Asha"]]),
            &DatasetSchema::generic(),
        )
        .unwrap();

        let rows: Vec<_> = extractor.by_ref().collect();
        assert_eq!(rows.len(), 1);
        let report = extractor.into_report();
        assert_eq!(report.data_rows, 2);
        assert_eq!(
            report.skipped,
            vec![SkippedRow {
                row_number: 2,
                reason: SkipReason::EmptyKey
            }]
        );
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let mut extractor = RowExtractor::open(
            sheet(&[
                &["BusinessKey", "Name"],
                &["k1", "Asha"],
                &["k1", "Asha"],
                &["k1", "Other"],
                &["k2", "Bala"],
            ]),
            &DatasetSchema::generic(),
        )
        .unwrap();

        let keys: Vec<_> = extractor.by_ref().map(|r| r.business_key).collect();
        assert_eq!(keys, vec!["k1", "k2"]);

        let report = extractor.report();
        assert_eq!(report.duplicates.len(), 2);
        assert!(report.duplicates[0].identical);
        assert!(!report.duplicates[1].identical);
        assert_eq!(report.duplicates[1].first_row_number, 2);
        assert_eq!(report.duplicates[1].row_number, 4);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let extractor = RowExtractor::open(
            sheet(&[&["BusinessKey", "Name"], &["abc", "x"], &["ABC", "y"]]),
            &DatasetSchema::generic(),
        )
        .unwrap();
        assert_eq!(extractor.count(), 2);
    }

    #[test]
    fn test_header_only_sheet() {
        let err = RowExtractor::open(sheet(&[&["BusinessKey", "Name"]]), &DatasetSchema::generic())
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoDataRows));
    }

    #[test]
    fn test_empty_sheet() {
        let err = RowExtractor::open(DecodedSheet::default(), &DatasetSchema::generic()).unwrap_err();
        assert!(matches!(err, ExtractError::NoHeader));
    }

    #[test]
    fn test_integer_key_with_fallback_column_and_gate() {
        let schema = DatasetSchema {
            fields: vec![
                FieldSpec::required("ApplicantName", ["Applicant"]),
                FieldSpec::required("EligibilityStatus", ["Status"]),
            ],
            keep_unmapped: false,
            key: KeySpec::field("OriginalSlumNumber")
                .with_fallback_column(1)
                .with_format(KeyFormat::Integer),
            min_columns: 2,
            skip_when_empty: vec!["EligibilityStatus".to_string()],
        };

        let mut extractor = RowExtractor::open(
            sheet(&[
                &["Sr", "Hut", "Applicant", "Status"],
                &["1", "101.0", "Sunita", "पात्र"],
                &["2", "abc", "Ravi", "पात्र"],
                &["3", "103", "Meena", ""],
                &["4", "104", "Kiran", "अपात्र"],
            ]),
            &schema,
        )
        .unwrap();

        let rows: Vec<_> = extractor.by_ref().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].business_key, "101");
        assert_eq!(
            rows[0].data_json,
            r#"{"ApplicantName":"Sunita","EligibilityStatus":"पात्र","OriginalSlumNumber":"101"}"#
        );
        assert_eq!(rows[1].business_key, "104");

        let report = extractor.report();
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::InvalidKey {
                value: "abc".to_string()
            }
        );
        assert_eq!(
            report.skipped[1].reason,
            SkipReason::EmptyGate {
                field: "EligibilityStatus".to_string()
            }
        );
    }
}
