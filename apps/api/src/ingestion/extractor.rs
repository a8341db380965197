use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ingestion::fetcher::RawDocument;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// How far into the file the header may start; some generators prepend junk.
const MAGIC_SEARCH_WINDOW: usize = 1024;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Document is not a PDF")]
    NotPdf,

    #[error("Malformed PDF: {0}")]
    Malformed(String),

    #[error("PDF parsing timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("PDF parser crashed: {0}")]
    EngineCrashed(String),
}

/// Unnormalized text straight out of the document, pages in order. May be empty
/// for image-only PDFs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(pub String);

impl ExtractedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: RawDocument) -> Result<ExtractedText, ExtractionError>;
}

/// `pdf-extract` on the blocking pool, bounded by a parse timeout.
///
/// The parser owns its document inside the blocking task, so everything it
/// allocated is released when the task ends, whether it succeeded, failed or
/// panicked. A timed-out parse runs to completion in the background and its
/// result is dropped.
pub struct PdfTextExtractor {
    timeout: Duration,
}

impl PdfTextExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, document: RawDocument) -> Result<ExtractedText, ExtractionError> {
        if !looks_like_pdf(&document.bytes) {
            return Err(ExtractionError::NotPdf);
        }

        let RawDocument { source_url, bytes } = document;
        let task = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes));

        let text = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!(url = %source_url, "PDF parse exceeded {}s", self.timeout.as_secs_f64());
                return Err(ExtractionError::Timeout(self.timeout));
            }
            Ok(Err(join_error)) => {
                return Err(ExtractionError::EngineCrashed(join_error.to_string()));
            }
            Ok(Ok(Err(e))) => return Err(ExtractionError::Malformed(e.to_string())),
            Ok(Ok(Ok(text))) => text,
        };

        let text = text.replace('\0', "");
        debug!(url = %source_url, chars = text.chars().count(), "PDF text extracted");
        Ok(ExtractedText(text))
    }
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
}


#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn document(bytes: Vec<u8>) -> RawDocument {
        RawDocument {
            source_url: "https://upcdn.io/resume.pdf".to_string(),
            bytes: Bytes::from(bytes),
        }
    }

    fn extractor() -> PdfTextExtractor {
        PdfTextExtractor::new(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_bytes() {
        let err = extractor()
            .extract(document(b"<html>not a resume</html>".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NotPdf));
    }

    #[tokio::test]
    async fn test_truncated_pdf_is_malformed() {
        let err = extractor()
            .extract(document(b"%PDF-1.4\n1 0 obj\n<< /Type".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Malformed(_) | ExtractionError::EngineCrashed(_)
        ));
    }

    #[tokio::test]
    async fn test_text_free_pdf_yields_empty_text() {
        let pdf = test_pdf::single_page("");
        let text = extractor().extract(document(pdf)).await.unwrap();
        assert!(text.as_str().trim().is_empty());
    }

    #[tokio::test]
    async fn test_extracts_page_text() {
        let pdf = test_pdf::single_page("BT /F1 12 Tf 72 720 Td (Senior Rust Engineer) Tj ET");
        let text = extractor().extract(document(pdf)).await.unwrap();
        assert!(text.as_str().contains("Senior Rust Engineer"));
    }

    #[test]
    fn test_magic_may_follow_leading_junk() {
        assert!(looks_like_pdf(b"\xEF\xBB\xBF%PDF-1.7"));
        assert!(!looks_like_pdf(b""));
    }
}
