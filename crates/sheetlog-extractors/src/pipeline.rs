//! Decoder pipeline routing uploads to the decoder for their format.

use std::sync::Arc;

use crate::error::{ExtractError, ExtractResult};
use crate::types::{DecodedSheet, SheetFormat};
use crate::SheetDecoder;

/// Pipeline of registered decoders.
///
/// When the caller does not name a format, it is sniffed from the content.
#[derive(Clone)]
pub struct DecoderPipeline {
    decoders: Vec<Arc<dyn SheetDecoder>>,
}

impl DecoderPipeline {
    /// Create new empty pipeline.
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Create pipeline with all available decoders.
    pub fn with_defaults() -> Self {
        Self {
            decoders: crate::DecoderFactory::all(),
        }
    }

    /// Add a decoder to the pipeline.
    pub fn add_decoder(mut self, decoder: Arc<dyn SheetDecoder>) -> Self {
        self.decoders.push(decoder);
        self
    }

    /// Decode an upload.
    pub async fn decode(
        &self,
        content: &[u8],
        format: Option<SheetFormat>,
    ) -> ExtractResult<DecodedSheet> {
        if content.is_empty() {
            return Err(ExtractError::InvalidInput("Uploaded file is empty".to_string()));
        }

        let format = format
            .or_else(|| SheetFormat::sniff(content))
            .ok_or_else(|| {
                ExtractError::UnsupportedFormat("Unrecognized file content".to_string())
            })?;

        for decoder in &self.decoders {
            if decoder.supports(format) {
                tracing::debug!(decoder = decoder.name(), format = %format, "Decoding upload");
                return decoder.decode(content).await;
            }
        }

        Err(ExtractError::UnsupportedFormat(format.to_string()))
    }

    /// Check if pipeline can handle a given format.
    pub fn supports(&self, format: SheetFormat) -> bool {
        self.decoders.iter().any(|d| d.supports(format))
    }

    /// List all supported formats.
    pub fn supported_formats(&self) -> Vec<SheetFormat> {
        self.decoders
            .iter()
            .flat_map(|d| d.supported_formats().iter().copied())
            .collect()
    }

    /// Get the number of registered decoders.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if the pipeline has no registered decoders.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for DecoderPipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for DecoderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderPipeline")
            .field(
                "decoders",
                &self.decoders.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_empty() {
        let pipeline = DecoderPipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.len(), 0);
        assert!(!pipeline.supports(SheetFormat::Csv));
    }

    #[test]
    fn test_pipeline_with_defaults() {
        let pipeline = DecoderPipeline::with_defaults();

        #[cfg(all(feature = "workbook", feature = "delimited"))]
        {
            assert_eq!(pipeline.len(), 2);
            assert!(pipeline.supports(SheetFormat::Xlsx));
            assert!(pipeline.supports(SheetFormat::Csv));
        }
    }

    #[tokio::test]
    async fn test_pipeline_rejects_empty_upload() {
        let result = DecoderPipeline::with_defaults().decode(b"", None).await;
        assert!(matches!(result, Err(ExtractError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_pipeline_unsupported_format_error() {
        let pipeline = DecoderPipeline::new();
        let result = pipeline.decode(b"a,b\n", Some(SheetFormat::Csv)).await;
        assert!(matches!(result, Err(ExtractError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_pipeline_unrecognized_binary() {
        let result = DecoderPipeline::with_defaults()
            .decode(&[0xff, 0x00, 0xfe, 0x9f], None)
            .await;
        assert!(matches!(result, Err(ExtractError::UnsupportedFormat(_))));
    }

    #[cfg(feature = "delimited")]
    #[tokio::test]
    async fn test_pipeline_sniffs_csv() {
        let sheet = DecoderPipeline::with_defaults()
            .decode(b"BusinessKey,Name\na,Asha\n", None)
            .await
            .unwrap();
        assert_eq!(sheet.rows.len(), 2);
    }
}
