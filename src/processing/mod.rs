//! Read → transform → write pipeline

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::parallel::{ConcurrencyLimit, ProgressReporter};

pub mod codec;
pub mod formats;
pub mod reader;
pub mod transform;
pub mod writer;

pub use codec::{ImageCodec, ImageCrateCodec};
pub use formats::{get_ext, is_supported_ext, SourceFormat};
pub use reader::{read_entry, read_entry_list, EntryFiles, SourceFile};
pub use transform::{CodecOperation, EntryOutputs, TransformPlan, TransformResult, Transformer};
pub use writer::{ensure_dir, write_all, write_entry_outputs};

/// Totals for a finished run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub entries: usize,
    pub files: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub written: Vec<PathBuf>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunSummary {
    /// Size reduction in percent (negative when outputs grew)
    pub fn size_reduction(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        (self.input_bytes as f64 - self.output_bytes as f64) / self.input_bytes as f64 * 100.0
    }
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// One file a dry run would produce
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlannedOutput {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub operation: String,
}

/// Batch compression pipeline for one configuration
pub struct Pipeline {
    config: Config,
    transformer: Transformer,
    progress: ProgressReporter,
}

impl Pipeline {
    /// Pipeline using the stock codec
    pub fn new(config: Config) -> Self {
        Self::with_codec(config, Arc::new(ImageCrateCodec::new()))
    }

    /// Pipeline using a caller-supplied codec
    pub fn with_codec(config: Config, codec: Arc<dyn ImageCodec>) -> Self {
        let transformer = Transformer::new(codec, config.compression, config.quality, config.mode);
        Self {
            config,
            transformer,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Attach a progress reporter for the transform phase
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run all phases. Each phase finishes completely before the next starts.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;

        if self.config.entry.is_empty() {
            debug!("No entries given, nothing to do");
            return Ok(RunSummary::default());
        }

        let start = Instant::now();
        let limit = ConcurrencyLimit::new(self.config.concurrency);

        info!("Reading {} entries from {:?}", self.config.entry.len(), self.config.base_dir);
        let entries = read_entry_list(&self.config.base_dir, &self.config.entry, &limit).await?;

        let transformed = self
            .transformer
            .transform_entry_list(entries, &limit, &self.progress)
            .await?;

        let out_root = self.config.output_root();
        info!("Writing outputs to {:?}", out_root);
        let written = write_all(&out_root, &transformed, &limit).await?;

        let outputs = transformed.iter().flat_map(|e| e.outputs.iter());
        let (input_bytes, output_bytes) = outputs.fold((0u64, 0u64), |(i, o), r| {
            (i + r.original_size, o + r.output.len() as u64)
        });

        let summary = RunSummary {
            entries: transformed.len(),
            files: written.len(),
            input_bytes,
            output_bytes,
            written,
            elapsed: start.elapsed(),
        };

        info!(
            "Compressed {} files in {:.2}s ({} -> {} bytes)",
            summary.files,
            summary.elapsed.as_secs_f64(),
            summary.input_bytes,
            summary.output_bytes
        );

        Ok(summary)
    }

    /// List what `run` would write without reading image data or writing anything
    pub async fn plan(&self) -> Result<Vec<PlannedOutput>> {
        self.config.validate()?;

        let out_root = self.config.output_root();
        let mut planned = Vec::new();

        for entry in &self.config.entry {
            let dir = self.config.entry_path(entry);
            let filenames = reader::list_supported_files(&dir, entry).await?;
            let plans = self
                .transformer
                .plan_entry(entry, filenames.iter().map(String::as_str))?;

            for (filename, plan) in filenames.iter().zip(plans) {
                planned.push(PlannedOutput {
                    source: dir.join(filename),
                    destination: out_root.join(entry).join(&plan.filename),
                    operation: format!("{:?}", plan.operation),
                });
            }
        }

        Ok(planned)
    }
}
