//! Command-line entry points.

use clap::Args;

pub mod extract;
pub mod schema;

/// Common options for subcommands that process batches of images.
#[derive(Debug, Clone, Args)]
pub struct BatchOpts {
    /// Max number of images to process at a time.
    #[clap(short = 'j', long = "jobs", default_value = "4")]
    pub job_count: usize,

    /// What portion of images may fail to OCR before the whole run is
    /// reported as a failure? Specified as a number between 0.0 and 1.0.
    #[clap(long, default_value = "0.01")]
    pub allowed_failure_rate: f32,
}
