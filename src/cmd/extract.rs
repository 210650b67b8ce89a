//! The `extract` subcommand.

use clap::Args;
use futures::{FutureExt as _, StreamExt as _};

use crate::{
    async_utils::write_output_jsonl,
    batch::{BatchCounterExt as _, BatchCounters, extract_file, list_image_files},
    fields::ParserOpts,
    ocr::{EngineKind, ocr_engine_for_kind},
    prelude::*,
    rate_limit::RateLimit,
    ui::{ProgressConfig, Ui},
};

use super::BatchOpts;

/// Extract command-line arguments.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// Directory containing scanned identity documents
    /// (`.png`, `.jpg`, `.jpeg`).
    pub directory: PathBuf,

    /// Path to a file containing the OCR service API key. Defaults to the
    /// VISION_API_KEY environment variable.
    #[clap(short = 'c', long = "credentials")]
    pub credentials: Option<PathBuf>,

    /// Which OCR engine to use.
    #[clap(long, value_enum, default_value = "vision")]
    pub engine: EngineKind,

    /// A rate limit for OCR requests, like "10/s" or "300/m". Defaults to one
    /// request per second per job.
    #[clap(long)]
    pub rate_limit: Option<RateLimit>,

    /// The output path for JSON Lines records. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// Batch processing options.
    #[clap(flatten)]
    pub batch: BatchOpts,

    /// Field parser options.
    #[clap(flatten)]
    pub parser: ParserOpts,
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(ui: Ui, opts: &ExtractOpts) -> Result<()> {
    // Find our input images up front, so the progress bar knows its length.
    let files = list_image_files(&opts.directory)?;
    if files.is_empty() {
        ui.display_message(
            "🪪",
            &format!("No image files found in {}", opts.directory.display()),
        );
        return Ok(());
    }

    // Build our OCR engine. Authentication problems surface here, before we
    // touch any image.
    let engine = ocr_engine_for_kind(
        opts.engine,
        opts.credentials.as_deref(),
        opts.batch.job_count,
        opts.rate_limit.clone(),
    )
    .await?;

    // Configure our progress bar.
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "🪪",
            msg: "Extracting fields",
            done_msg: "Extracted fields",
        },
        files.len() as u64,
    );

    // Process the images as a stream of futures, a few at a time.
    let parser_opts = opts.parser.clone();
    let stream = futures::stream::iter(files)
        .map(move |path| {
            let engine = engine.clone();
            let parser_opts = parser_opts.clone();
            async move { extract_file(engine, path, &parser_opts).await }.boxed()
        })
        .boxed();
    let output = pb.wrap_stream(stream.buffered(opts.batch.job_count)).boxed();

    // Write one JSON record per image, counting as we go.
    let (output, counters) = BatchCounters::wrap_stream(output);
    let json = output
        .map(|result| {
            let record = result?;
            serde_json::to_value(&record).context("failed to serialize output record")
        })
        .boxed();
    write_output_jsonl(opts.output_path.as_deref(), json).await?;

    counters.finish(&ui, opts.batch.allowed_failure_rate)
}
