//! Workbook decoding using calamine.
//!
//! Reads the first worksheet of any container calamine can detect (xlsx,
//! xlsm, xlsb, xls, ods). Cell values are rendered as text the way they
//! would be typed into the sheet.

use std::io::Cursor;

use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader};

use crate::canonical::format_number;
use crate::error::{ExtractError, ExtractResult};
use crate::types::{DecodedSheet, SheetFormat, SheetRow};
use crate::SheetDecoder;

/// Workbook decoder backed by calamine.
///
/// Parsing is synchronous, so it runs inside spawn_blocking.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookDecoder;

impl WorkbookDecoder {
    /// Create a new workbook decoder.
    pub fn new() -> Self {
        Self
    }

    fn decode_sync(content: Vec<u8>) -> ExtractResult<DecodedSheet> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(content))
            .map_err(|e| ExtractError::Decode(format!("Failed to open workbook: {}", e)))?;

        let sheet_name = workbook.sheet_names().first().cloned();
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ExtractError::InvalidInput("Workbook has no worksheets".to_string()))?
            .map_err(|e| ExtractError::Decode(format!("Failed to read first worksheet: {}", e)))?;

        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let rows = range.rows().enumerate().map(|(offset, cells)| {
            let mut text = vec![String::new(); start_col as usize];
            text.extend(cells.iter().map(cell_text));
            SheetRow::new(start_row as usize + offset + 1, text)
        });

        Ok(DecodedSheet::from_rows(sheet_name, rows))
    }
}

/// Render a calamine cell as text.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => date_text(dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// ISO date, or ISO datetime when the serial carries a time of day.
/// Durations keep their serial value.
fn date_text(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return format_number(dt.as_f64());
    }
    match dt.as_datetime() {
        Some(datetime) if dt.as_f64().fract() == 0.0 => datetime.format("%Y-%m-%d").to_string(),
        Some(datetime) => datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => format_number(dt.as_f64()),
    }
}

#[async_trait]
impl SheetDecoder for WorkbookDecoder {
    async fn decode(&self, content: &[u8]) -> ExtractResult<DecodedSheet> {
        let content = content.to_vec();
        let sheet = tokio::task::spawn_blocking(move || Self::decode_sync(content)).await??;
        tracing::debug!(
            sheet = sheet.sheet_name.as_deref().unwrap_or(""),
            rows = sheet.rows.len(),
            "Decoded workbook"
        );
        Ok(sheet)
    }

    fn supported_formats(&self) -> &[SheetFormat] {
        &[
            SheetFormat::Xlsx,
            SheetFormat::Xlsm,
            SheetFormat::Xlsb,
            SheetFormat::Xls,
            SheetFormat::Ods,
        ]
    }

    fn name(&self) -> &str {
        "workbook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn xlsx(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_date_cell_text() {
        use calamine::ExcelDateTimeType;

        let date = ExcelDateTime::new(45366.0, ExcelDateTimeType::DateTime, false);
        assert_eq!(cell_text(&Data::DateTime(date)), "2024-03-15");
        let datetime = ExcelDateTime::new(45366.5, ExcelDateTimeType::DateTime, false);
        assert_eq!(cell_text(&Data::DateTime(datetime)), "2024-03-15T12:00:00");
    }

    #[tokio::test]
    async fn test_decode_formatted_date() {
        use rust_xlsxwriter::{ExcelDateTime as XlsxDate, Format};

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "BusinessKey").unwrap();
        sheet.write_string(0, 1, "Submitted").unwrap();
        sheet.write_string(1, 0, "a").unwrap();
        let date = XlsxDate::from_ymd(2024, 3, 15).unwrap();
        sheet
            .write_datetime_with_format(1, 1, &date, &Format::new().set_num_format("yyyy-mm-dd"))
            .unwrap();
        let content = workbook.save_to_buffer().unwrap();

        let decoded = WorkbookDecoder::new().decode(&content).await.unwrap();
        assert_eq!(decoded.rows[1].cell(1), "2024-03-15");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Float(7.0)), "7");
        assert_eq!(cell_text(&Data::Float(7.25)), "7.25");
        assert_eq!(cell_text(&Data::Int(-4)), "-4");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
        assert_eq!(cell_text(&Data::String("x".into())), "x");
    }

    #[tokio::test]
    async fn test_decode_xlsx() {
        let content = xlsx(&[&["BusinessKey", "Name"], &["a", "Asha"], &["", ""], &["b", "Bala"]]);
        let sheet = WorkbookDecoder::new().decode(&content).await.unwrap();

        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].cells, vec!["BusinessKey", "Name"]);
        assert_eq!(sheet.rows[2].number, 4);
        assert_eq!(sheet.rows[2].cell(1), "Bala");
    }

    #[tokio::test]
    async fn test_decode_keeps_absolute_columns() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 1, "BusinessKey").unwrap();
        sheet.write_string(2, 2, "Area").unwrap();
        sheet.write_string(3, 1, "k1").unwrap();
        sheet.write_number(3, 2, 120.0).unwrap();
        let content = workbook.save_to_buffer().unwrap();

        let decoded = WorkbookDecoder::new().decode(&content).await.unwrap();
        assert_eq!(decoded.rows[0].number, 3);
        assert_eq!(decoded.rows[0].cell(0), "");
        assert_eq!(decoded.rows[0].cell(1), "BusinessKey");
        assert_eq!(decoded.rows[1].cell(2), "120");
    }

    #[tokio::test]
    async fn test_decode_garbage_fails() {
        let result = WorkbookDecoder::new().decode(b"PK\x03\x04not a zip").await;
        assert!(matches!(result, Err(ExtractError::Decode(_))));
    }
}
