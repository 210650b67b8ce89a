//! A canned OCR engine for offline runs and tests.
//!
//! The "image" files handed to this engine contain a captured
//! [`ExtractedDocument`] in JSON form instead of pixels, so a batch can be
//! replayed without ever contacting the real OCR service.

use crate::prelude::*;

use super::{ExtractedDocument, OcrEngine, OcrError};

/// OCR engine that parses the image bytes as a captured OCR response.
#[derive(Debug)]
pub struct FixtureOcrEngine;

#[async_trait]
impl OcrEngine for FixtureOcrEngine {
    async fn extract(&self, image: &[u8]) -> Result<ExtractedDocument, OcrError> {
        let document: ExtractedDocument = serde_json::from_slice(image)
            .map_err(|err| OcrError::Service(anyhow!("bad fixture file: {err}")))?;
        // Mirror the real engine: a capture with no text behaves like a
        // service response with no annotations.
        if document.full_text.is_empty() && document.tokens.is_empty() {
            return Err(OcrError::EmptyResult);
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_captured_document() {
        let capture = br#"{"full_text": "Name: Asha Verma", "tokens": []}"#;
        let document = FixtureOcrEngine.extract(capture).await.unwrap();
        assert_eq!(document.full_text, "Name: Asha Verma");
        assert!(document.tokens.is_empty());
    }

    #[tokio::test]
    async fn empty_capture_reports_empty_result() {
        let capture = br#"{"full_text": ""}"#;
        let err = FixtureOcrEngine.extract(capture).await.unwrap_err();
        assert!(matches!(err, OcrError::EmptyResult));
    }

    #[tokio::test]
    async fn garbage_bytes_are_a_service_error() {
        let err = FixtureOcrEngine.extract(b"\x89PNG...").await.unwrap_err();
        assert!(matches!(err, OcrError::Service(_)));
    }
}
