//! Configuration management for imgpress

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::error::{Result, ImgpressError};

/// Default output directory, relative to the base directory
pub const DEFAULT_OUT_DIR: &str = "dist/assets";

/// Default encoder quality
pub const DEFAULT_QUALITY: u8 = 75;

/// Run configuration, built once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source directories, relative to `base_dir`
    pub entry: Vec<String>,

    /// Output root, relative to `base_dir`
    pub out_dir: PathBuf,

    /// Lossless or lossy compression
    #[serde(rename = "type")]
    pub compression: CompressionType,

    /// Encoder quality handed to the codec as-is
    pub quality: u8,

    /// Output format policy
    pub mode: OutputMode,

    /// Directory that entries and `out_dir` resolve against
    pub base_dir: PathBuf,

    /// Maximum in-flight per-file tasks (None = unbounded)
    pub concurrency: Option<usize>,
}

/// Compression strategy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    Lossless,
    Lossy,
}

/// Output format policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Transcode everything to JPEG for browsers without AVIF support
    Compat,
    /// Transcode everything to AVIF
    Modern,
    /// Keep each file's own format
    #[default]
    Lazy,
}

impl CompressionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lossless => "lossless",
            Self::Lossy => "lossy",
        }
    }
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compat => "compat",
            Self::Modern => "modern",
            Self::Lazy => "lazy",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            compression: CompressionType::default(),
            quality: DEFAULT_QUALITY,
            mode: OutputMode::default(),
            base_dir: PathBuf::from("."),
            concurrency: None,
        }
    }
}

impl Config {
    /// Create a configuration with defaults for every field
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source entry directories
    pub fn entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Set the output directory
    pub fn out_dir<P: Into<PathBuf>>(mut self, out_dir: P) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    /// Set compression type
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Set quality
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set output mode
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the base directory
    pub fn base_dir<P: Into<PathBuf>>(mut self, base_dir: P) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Bound the number of in-flight per-file tasks
    pub fn concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit;
        self
    }

    /// Absolute-ish path of a source entry directory
    pub fn entry_path(&self, entry: &str) -> PathBuf {
        self.base_dir.join(entry)
    }

    /// Output root resolved against the base directory
    pub fn output_root(&self) -> PathBuf {
        self.base_dir.join(&self.out_dir)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == Some(0) {
            return Err(ImgpressError::config(
                "Concurrency limit must be greater than 0",
            ));
        }

        for entry in &self.entry {
            if entry.trim().is_empty() {
                return Err(ImgpressError::config("Entry directory name must not be empty"));
            }
        }

        if self.out_dir.as_os_str().is_empty() {
            return Err(ImgpressError::config("Output directory must not be empty"));
        }

        Ok(())
    }
}
