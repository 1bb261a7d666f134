//! imgpress - Batch Image Compressor
//!
//! Reads every JPEG, PNG, WebP and AVIF image directly inside one or more
//! entry directories, recompresses them, and writes the results to a
//! mirrored tree under an output directory (`dist/assets/<entry>/...` by
//! default).
//!
//! # Output modes
//!
//! - **lazy** (default): keep each file's format
//! - **compat**: transcode everything to JPEG
//! - **modern**: transcode everything to AVIF
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use imgpress::{CompressionType, Config, OutputMode, Pipeline};
//!
//! # async fn run() -> imgpress::Result<()> {
//! let config = Config::new()
//!     .entries(["photos"])
//!     .compression(CompressionType::Lossy)
//!     .quality(70)
//!     .mode(OutputMode::Modern);
//!
//! let summary = Pipeline::new(config).run().await?;
//! println!("wrote {} files", summary.files);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{CompressionType, Config, OutputMode};
pub use error::{ImgpressError, Result};
pub use processing::{ImageCodec, ImageCrateCodec, Pipeline, RunSummary};

use tracing::info;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set. Calling this
/// more than once is harmless; only the first call installs a subscriber.
pub fn init(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        info!("imgpress v{} initialized", VERSION);
    }
}
