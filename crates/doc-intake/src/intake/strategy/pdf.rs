use async_trait::async_trait;

use super::{ExtractionError, ExtractionInput, TextExtractor};
use crate::intake::upload::DocumentKind;

/// Reads the embedded text layer of a PDF with `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<String, ExtractionError> {
        if input.kind != DocumentKind::Pdf {
            return Err(ExtractionError::MalformedDocument(format!(
                "expected a PDF, received {}",
                input.kind.mime_type()
            )));
        }

        let bytes = input.bytes;
        // pdf-extract panics on some malformed streams; the join error covers that.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|err| {
                ExtractionError::MalformedDocument(format!("PDF parser aborted: {err}"))
            })?
            .map_err(|err| ExtractionError::MalformedDocument(err.to_string()))?;

        Ok(text.trim().to_string())
    }
}
