//! OCR using the Google Cloud Vision API.
//!
//! We call the synchronous `images:annotate` REST endpoint with a
//! `TEXT_DETECTION` feature. The first annotation in the response is the
//! whole-image text; every later annotation is a single token with a 4-point
//! bounding polygon.

use std::{env, sync::Arc};

use base64::{Engine as _, prelude::BASE64_STANDARD};
use keen_retry::{ExponentialJitter, ResolvedResult};
use leaky_bucket::RateLimiter;
use reqwest::StatusCode;

use crate::{
    prelude::*,
    rate_limit::{RateLimit, RateLimitPeriod},
    retry::{
        IsKnownTransient as _, OcrRetryResult, retry_result_fatal, retry_result_ok,
        retry_result_transient,
    },
};

use super::{ExtractedDocument, OcrEngine, OcrError, Point, Token};

/// Endpoint for synchronous image annotation.
static ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Environment variable checked when no credential file is given.
static API_KEY_VAR: &str = "VISION_API_KEY";

/// OCR engine wrapping the Google Cloud Vision API.
pub struct VisionOcrEngine {
    /// HTTP client, shared across requests.
    client: reqwest::Client,

    /// Our API key.
    api_key: String,

    /// A rate limiter to avoid hitting API limits.
    rate_limiter: RateLimiter,
}

impl VisionOcrEngine {
    /// Create a new Vision engine.
    ///
    /// The credential file should contain nothing but the API key. When no
    /// file is given, we fall back to the `VISION_API_KEY` environment
    /// variable.
    #[allow(clippy::new_ret_no_self)]
    pub async fn new(
        credentials: Option<&Path>,
        concurrency_limit: usize,
        rate_limit: Option<RateLimit>,
    ) -> Result<Arc<dyn OcrEngine>, OcrError> {
        let api_key = match credentials {
            Some(path) => tokio::fs::read_to_string(path).await.map_err(|err| {
                OcrError::Authentication(format!(
                    "could not read credential file {}: {err}",
                    path.display()
                ))
            })?,
            None => env::var(API_KEY_VAR).map_err(|_| {
                OcrError::Authentication(format!(
                    "no credential file given and {API_KEY_VAR} is not set"
                ))
            })?,
        };
        let api_key = api_key.trim().to_owned();
        if api_key.is_empty() {
            return Err(OcrError::Authentication("credential is empty".to_owned()));
        }

        // If the user didn't specify a rate limit, derive one from the
        // concurrency limit.
        let rate_limit = rate_limit
            .unwrap_or_else(|| RateLimit::new(concurrency_limit, RateLimitPeriod::Second));
        let rate_limiter = rate_limit.to_rate_limiter();

        Ok(Arc::new(Self {
            client: reqwest::Client::new(),
            api_key,
            rate_limiter,
        }))
    }

    /// Make a single `images:annotate` request, classifying failures as
    /// transient or fatal for the retry loop.
    async fn annotate_once(
        &self,
        body: &AnnotateRequests,
    ) -> OcrRetryResult<ExtractedDocument> {
        let response = match self
            .client
            .post(ANNOTATE_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) if error.is_known_transient() => {
                debug!("Potentially transient error: {:?}", error);
                return retry_result_transient(OcrError::from(error));
            }
            Err(error) => return retry_result_fatal(OcrError::from(error)),
        };

        // A rejected key will fail the same way for every image in the batch,
        // so report it as an authentication failure rather than a service one.
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return retry_result_fatal(OcrError::Authentication(format!(
                "OCR service rejected our API key (HTTP {status})"
            )));
        }
        if !status.is_success() {
            let error = OcrError::Service(anyhow!("OCR service returned HTTP {status}"));
            if status.is_known_transient() {
                return retry_result_transient(error);
            }
            return retry_result_fatal(error);
        }

        let parsed = match response.json::<AnnotateResponses>().await {
            Ok(parsed) => parsed,
            Err(error) => return retry_result_fatal(OcrError::from(error)),
        };
        let annotated = match parsed.responses.into_iter().next() {
            Some(annotated) => annotated,
            None => {
                return retry_result_fatal(OcrError::Service(anyhow!(
                    "OCR service returned no response entries"
                )));
            }
        };
        if let Some(error) = annotated.error {
            return retry_result_fatal(OcrError::Service(anyhow!(
                "OCR service reported an error: {} (code {})",
                error.message,
                error.code
            )));
        }

        match document_from_annotations(annotated.text_annotations) {
            Some(document) => retry_result_ok(document),
            None => retry_result_fatal(OcrError::EmptyResult),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcrEngine {
    #[instrument(level = "debug", skip_all)]
    async fn extract(&self, image: &[u8]) -> Result<ExtractedDocument, OcrError> {
        // Rate limit the request.
        self.rate_limiter.acquire_one().await;

        // Build our request body.
        let body = AnnotateRequests {
            requests: vec![AnnotateRequest {
                image: ImageContent {
                    content: BASE64_STANDARD.encode(image),
                },
                features: vec![Feature {
                    r#type: "TEXT_DETECTION",
                }],
            }],
        };

        // If we have a transient failure, back off exponentially.
        let jitter = ExponentialJitter::FromBackoffRange {
            backoff_range_millis: 1..=30_000,
            re_attempts: 5,
            jitter_ratio: 0.2,
        };

        // Do our real work, retrying as specified.
        let result = self
            .annotate_once(&body)
            .await
            .retry_with_async(|_| self.annotate_once(&body))
            .with_exponential_jitter(|| jitter)
            .await;
        match result {
            ResolvedResult::Ok { output, .. } => Ok(output),
            ResolvedResult::Recovered {
                output,
                retry_errors,
                ..
            } => {
                warn!(
                    "OCR call succeeded after retrying {} times (failed attempts: [{}])",
                    retry_errors.len(),
                    keen_retry::loggable_retry_errors(&retry_errors),
                );
                Ok(output)
            }
            ResolvedResult::Fatal { error, .. } => Err(error),
            ResolvedResult::GivenUp {
                retry_errors,
                fatal_error,
                ..
            }
            | ResolvedResult::Unrecoverable {
                retry_errors,
                fatal_error,
                ..
            } => {
                error!(
                    "OCR call failed after {} retrying attempts: {fatal_error}",
                    retry_errors.len(),
                );
                Err(fatal_error)
            }
        }
    }
}

/// Convert the service's annotation list into an [`ExtractedDocument`].
///
/// Annotation 0 is the whole-image text; everything after it is one token.
/// Returns `None` when the service found no text at all.
fn document_from_annotations(
    annotations: Vec<TextAnnotation>,
) -> Option<ExtractedDocument> {
    let mut annotations = annotations.into_iter();
    let first = annotations.next()?;
    let tokens = annotations
        .map(|annotation| Token {
            text: annotation.description,
            bounding_box: annotation
                .bounding_poly
                .map(|poly| {
                    poly.vertices
                        .into_iter()
                        .map(|v| Point { x: v.x, y: v.y })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect();
    Some(ExtractedDocument {
        full_text: first.description,
        tokens,
    })
}

/// Request body for `images:annotate`.
#[derive(Debug, Serialize)]
struct AnnotateRequests {
    requests: Vec<AnnotateRequest>,
}

/// One image to annotate, and how.
#[derive(Debug, Serialize)]
struct AnnotateRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

/// Base64-encoded image bytes.
#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

/// An annotation feature to request.
#[derive(Debug, Serialize)]
struct Feature {
    r#type: &'static str,
}

/// Response body for `images:annotate`.
#[derive(Debug, Deserialize)]
struct AnnotateResponses {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

/// The annotation results for one image.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiStatus>,
}

/// One recognized piece of text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextAnnotation {
    #[serde(default)]
    description: String,
    bounding_poly: Option<BoundingPoly>,
}

/// A bounding polygon. The service omits zero-valued coordinates.
#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

/// An error status reported inside an otherwise-successful HTTP response.
#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// A vertex of a bounding polygon.
#[derive(Debug, Deserialize)]
struct Vertex {
    #[serde(default)]
    x: i64,
    #[serde(default)]
    y: i64,
}
