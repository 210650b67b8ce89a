//! Batch extraction over a directory of scanned images.
//!
//! Each image is read fully into memory, sent to the OCR engine, and parsed
//! into a [`FieldRecord`]. Per-image service failures are recorded in the
//! output record and the batch keeps going; only authentication failures
//! abort the run, since every remaining image would fail the same way.

use std::sync::{Arc, Mutex};

use futures::StreamExt as _;
use schemars::JsonSchema;

use crate::{
    async_utils::BoxedStream,
    fields::{FieldRecord, ParserOpts},
    ocr::{OcrEngine, OcrError},
    prelude::*,
    ui::Ui,
};

/// File extensions we treat as scanned images.
static IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// How did processing one image go?
#[derive(Clone, Copy, Debug, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// The image was OCRed and parsed.
    Ok,

    /// The OCR service found no text, so every field is unresolved.
    Incomplete,

    /// The OCR call failed; see `errors`.
    Failed,
}

/// Output record for one processed image.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileOutput {
    /// The image file this record describes.
    pub path: PathBuf,

    /// What happened to this image?
    pub status: FileStatus,

    /// Any errors that occurred during processing.
    pub errors: Vec<String>,

    /// The extracted fields. Every key is present; unresolved fields are
    /// null.
    pub fields: FieldRecord,
}

/// List the image files in `dir`, filtered by extension (case-insensitive).
///
/// The host platform does not guarantee a stable directory iteration order,
/// so we sort by filename to keep output order deterministic.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut files = vec![];
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Extract fields from one image file.
///
/// Returns `Err` only for failures that should abort the whole batch.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn extract_file(
    engine: Arc<dyn OcrEngine>,
    path: PathBuf,
    parser_opts: &ParserOpts,
) -> Result<FileOutput> {
    let image = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    match engine.extract(&image).await {
        Ok(document) => {
            let fields =
                FieldRecord::parse(&document.full_text, &document.tokens, parser_opts);
            debug!(?fields, "Extracted fields");
            Ok(FileOutput {
                path,
                status: FileStatus::Ok,
                errors: vec![],
                fields,
            })
        }
        Err(OcrError::EmptyResult) => {
            debug!("No text found in image");
            Ok(FileOutput {
                path,
                status: FileStatus::Incomplete,
                errors: vec![],
                fields: FieldRecord::default(),
            })
        }
        Err(err @ OcrError::Authentication(_)) => Err(err.into()),
        Err(err @ OcrError::Service(_)) => {
            error!("{err}");
            Ok(FileOutput {
                path,
                status: FileStatus::Failed,
                errors: vec![err.to_string()],
                fields: FieldRecord::default(),
            })
        }
    }
}

/// Counters summarizing a batch run.
#[derive(Clone, Debug, Default)]
pub struct BatchCounters {
    /// How many images did we process?
    pub total_count: usize,

    /// How many images failed outright?
    pub failed_count: usize,

    /// How many images contained no text?
    pub incomplete_count: usize,
}

impl BatchCounters {
    /// Wrap a stream with counters.
    pub fn wrap_stream(
        stream: BoxedStream<Result<FileOutput>>,
    ) -> (BoxedStream<Result<FileOutput>>, Arc<Mutex<BatchCounters>>) {
        let counters = Arc::new(Mutex::new(Self::default()));
        let counters_clone = counters.clone();
        let stream = stream
            .map(move |value| {
                let value = value?;
                counters_clone.update(&value);
                Ok(value)
            })
            .boxed();
        (stream, counters)
    }
}

/// We actually want to put methods on `Mutex<BatchCounters>`, because that's
/// the type we work with. To do that, we define an extension trait.
pub trait BatchCounterExt {
    /// Update counters for one output record.
    fn update(&self, output: &FileOutput);

    /// Display counter values to the user, and decide whether the run as a
    /// whole counts as a failure.
    fn finish(self: Arc<Self>, ui: &Ui, allowed_failure_rate: f32) -> Result<()>;
}

impl BatchCounterExt for Mutex<BatchCounters> {
    fn update(&self, output: &FileOutput) {
        // Hold a sync lock, but just for an instant to update counters.
        let mut counters = self.lock().expect("lock poisoned");
        counters.total_count += 1;
        match output.status {
            FileStatus::Ok => {}
            FileStatus::Incomplete => counters.incomplete_count += 1,
            FileStatus::Failed => counters.failed_count += 1,
        }
    }

    fn finish(self: Arc<Self>, ui: &Ui, allowed_failure_rate: f32) -> Result<()> {
        let counters = self.lock().expect("lock poisoned").to_owned();
        if counters.incomplete_count > 0 {
            ui.display_message(
                "⚠️",
                &format!("{} images contained no text", counters.incomplete_count),
            );
        }
        let failure_rate = counters.failed_count as f32 / counters.total_count as f32;
        if failure_rate > allowed_failure_rate {
            Err(anyhow!(
                "{}/{} ({:.2}%) of images could not be OCRed, but only {:.2}% were allowed",
                counters.failed_count,
                counters.total_count,
                failure_rate * 100.0,
                allowed_failure_rate * 100.0
            ))
        } else {
            if counters.failed_count > 0 {
                ui.display_message(
                    "❌",
                    &format!("{} images could not be OCRed", counters.failed_count),
                );
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::ocr::fixture::FixtureOcrEngine;

    #[test]
    fn listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "notes.txt", "c.jpeg", "d.tiff"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let files = list_image_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.PNG", "b.jpg", "c.jpeg"]);
    }

    #[tokio::test]
    async fn empty_ocr_result_yields_an_incomplete_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        fs::write(&path, br#"{"full_text": ""}"#).unwrap();

        let engine = Arc::new(FixtureOcrEngine);
        let output = extract_file(engine, path, &ParserOpts::default())
            .await
            .unwrap();
        assert_eq!(output.status, FileStatus::Incomplete);
        assert_eq!(output.fields, FieldRecord::default());
        assert!(output.errors.is_empty());
    }

    #[tokio::test]
    async fn service_failure_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbled.png");
        fs::write(&path, b"not json at all").unwrap();

        let engine = Arc::new(FixtureOcrEngine);
        let output = extract_file(engine, path, &ParserOpts::default())
            .await
            .unwrap();
        assert_eq!(output.status, FileStatus::Failed);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.fields, FieldRecord::default());
    }
}
