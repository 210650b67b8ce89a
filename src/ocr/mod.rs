//! Talking to OCR services.
//!
//! The OCR service is an external collaborator: we hand it raw image bytes and
//! get back the recognized text, plus (when the service supports it) one
//! bounding polygon per recognized token. Everything downstream works from the
//! [`ExtractedDocument`] produced here, so the rest of the program never needs
//! to know which service was called.

pub mod fixture;
pub mod vision;

use std::sync::Arc;

use clap::ValueEnum;
use schemars::JsonSchema;
use thiserror::Error;

use crate::{prelude::*, rate_limit::RateLimit};

use self::{fixture::FixtureOcrEngine, vision::VisionOcrEngine};

/// Errors reported by the OCR layer.
#[derive(Debug, Error)]
pub enum OcrError {
    /// We have a bad or missing credential. This is fatal: every image in the
    /// batch would fail the same way, so the whole run aborts.
    #[error("could not authenticate with the OCR service: {0}")]
    Authentication(String),

    /// The service was unreachable or rejected the request. Callers should
    /// record this against the file being processed and keep going.
    #[error("OCR service request failed: {0:#}")]
    Service(#[source] anyhow::Error),

    /// The service found no text at all in the image. Recoverable: callers
    /// should treat this as "no text found", not abort.
    #[error("OCR service found no text in the image")]
    EmptyResult,
}

impl From<reqwest::Error> for OcrError {
    fn from(error: reqwest::Error) -> Self {
        OcrError::Service(anyhow::Error::new(error))
    }
}

/// A point in the OCR service's pixel coordinate system.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// One OCR-detected text region.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct Token {
    /// The recognized text of this region.
    pub text: String,

    /// The four corners of the region, in the service's order: top-left,
    /// top-right, bottom-right, bottom-left.
    pub bounding_box: Vec<Point>,
}

impl Token {
    /// The height of this token's bounding box: the vertical distance between
    /// the top-left and bottom-left corners. Returns `None` when the geometry
    /// is malformed (fewer than 4 points, or a non-positive height), so that
    /// callers can skip the token rather than fail.
    pub fn height(&self) -> Option<i64> {
        if self.bounding_box.len() != 4 {
            return None;
        }
        let height = self.bounding_box[3].y - self.bounding_box[0].y;
        (height > 0).then_some(height)
    }

    /// The y coordinate of this token's top edge, or `None` when the geometry
    /// is malformed.
    pub fn top(&self) -> Option<i64> {
        if self.bounding_box.len() != 4 {
            return None;
        }
        Some(self.bounding_box[0].y)
    }
}

/// Everything the OCR service recognized in one image.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct ExtractedDocument {
    /// The full recognized text of the image.
    pub full_text: String,

    /// Individual tokens with geometry. Empty when the service did not return
    /// per-token bounding boxes.
    #[serde(default)]
    pub tokens: Vec<Token>,
}

/// Interface to an OCR engine.
///
/// Engines are constructed once per run and passed explicitly, so tests can
/// substitute [`FixtureOcrEngine`] for the real service.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize the text in one image.
    async fn extract(&self, image: &[u8]) -> Result<ExtractedDocument, OcrError>;
}

/// The OCR engines we can call.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EngineKind {
    /// Google Cloud Vision text detection.
    Vision,
    /// Canned responses stored in place of the image bytes, for offline runs
    /// and tests.
    Fixture,
}

/// Construct the OCR engine for the requested kind.
pub async fn ocr_engine_for_kind(
    kind: EngineKind,
    credentials: Option<&Path>,
    concurrency_limit: usize,
    rate_limit: Option<RateLimit>,
) -> Result<Arc<dyn OcrEngine>> {
    match kind {
        EngineKind::Vision => Ok(VisionOcrEngine::new(
            credentials,
            concurrency_limit,
            rate_limit,
        )
        .await?),
        EngineKind::Fixture => Ok(Arc::new(FixtureOcrEngine)),
    }
}
