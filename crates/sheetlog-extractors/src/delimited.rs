//! Delimited text decoding using the csv crate.

use async_trait::async_trait;

use crate::error::{ExtractError, ExtractResult};
use crate::types::{DecodedSheet, SheetFormat, SheetRow};
use crate::SheetDecoder;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// CSV decoder. Rows may have differing lengths.
#[derive(Debug, Clone, Copy)]
pub struct CsvDecoder {
    delimiter: u8,
}

impl Default for CsvDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvDecoder {
    /// Comma-separated decoder.
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Configure the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn decode_sync(&self, content: &[u8]) -> ExtractResult<DecodedSheet> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(content);

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| ExtractError::Decode(format!("Malformed CSV at record {}: {}", index + 1, e)))?;
            rows.push(SheetRow::new(
                index + 1,
                record.iter().map(str::to_string).collect(),
            ));
        }

        Ok(DecodedSheet::from_rows(None, rows))
    }
}

#[async_trait]
impl SheetDecoder for CsvDecoder {
    async fn decode(&self, content: &[u8]) -> ExtractResult<DecodedSheet> {
        self.decode_sync(content)
    }

    fn supported_formats(&self) -> &[SheetFormat] {
        &[SheetFormat::Csv]
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decode_csv() {
        let content = "\u{feff}BusinessKey,Name\na,Asha\n,\nb,\"Bala, Jr\"\n";
        let sheet = CsvDecoder::new().decode(content.as_bytes()).await.unwrap();

        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].cells, vec!["BusinessKey", "Name"]);
        assert_eq!(sheet.rows[2].number, 4);
        assert_eq!(sheet.rows[2].cell(1), "Bala, Jr");
    }

    #[tokio::test]
    async fn test_decode_semicolon() {
        let sheet = CsvDecoder::new()
            .with_delimiter(b';')
            .decode(b"k;v\n1;2\n")
            .await
            .unwrap();
        assert_eq!(sheet.rows[1].cells, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_decode_ragged_rows() {
        let sheet = CsvDecoder::new()
            .decode(b"a,b,c\n1\n2,3,4,5\n")
            .await
            .unwrap();
        assert_eq!(sheet.rows[1].cells.len(), 1);
        assert_eq!(sheet.rows[2].cell(3), "5");
    }
}
