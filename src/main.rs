//! imgpress CLI - batch image compressor
//!
//! Compresses the images of each entry directory into a mirrored output tree.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use console::style;
use tracing::debug;

use imgpress::config::{DEFAULT_OUT_DIR, DEFAULT_QUALITY};
use imgpress::parallel::ProgressReporter;
use imgpress::{init, CompressionType, Config, OutputMode, Pipeline, RunSummary};

/// imgpress - Batch Image Compressor
#[derive(Parser, Debug)]
#[command(
    name = "imgpress",
    version,
    about = "Compress every image in the given directories into a mirrored output tree",
    long_about = "imgpress reads the jpg, jpeg, png, avif and webp files directly inside each \
                  ENTRY directory, recompresses them, and writes the results to \
                  OUT_DIR/ENTRY/. Formats are kept by default; --mode compat turns everything \
                  into JPEG and --mode modern turns everything into AVIF."
)]
struct Cli {
    /// Source directories, relative to --cwd
    #[arg(value_name = "ENTRY")]
    entry: Vec<String>,

    /// Output directory, relative to --cwd
    #[arg(long, env = "IMGPRESS_OUT_DIR", default_value = DEFAULT_OUT_DIR, value_name = "PATH")]
    out_dir: PathBuf,

    /// Compression type
    #[arg(long = "type", env = "IMGPRESS_TYPE", value_enum, default_value_t = CliCompression::Lossless)]
    compression: CliCompression,

    /// Encoder quality (0-255), passed to the codec unchanged. Each encoder
    /// applies its own range, so e.g. WebP fails above 100.
    #[arg(long, env = "IMGPRESS_QUALITY", default_value_t = DEFAULT_QUALITY, value_name = "QUALITY")]
    quality: u8,

    /// Output format mode
    #[arg(long, env = "IMGPRESS_MODE", value_enum, default_value_t = CliMode::Lazy)]
    mode: CliMode,

    /// Base directory for entries and the output directory (default: current directory)
    #[arg(long, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Maximum number of files processed at once (default: unbounded)
    #[arg(long, value_name = "COUNT")]
    concurrency: Option<usize>,

    /// Show what would be written without reading images or writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// CLI-compatible compression type
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliCompression {
    Lossless,
    Lossy,
}

/// CLI-compatible output mode
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    Compat,
    Modern,
    Lazy,
}

impl From<CliCompression> for CompressionType {
    fn from(value: CliCompression) -> Self {
        match value {
            CliCompression::Lossless => CompressionType::Lossless,
            CliCompression::Lossy => CompressionType::Lossy,
        }
    }
}

impl From<CliMode> for OutputMode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Compat => OutputMode::Compat,
            CliMode::Modern => OutputMode::Modern,
            CliMode::Lazy => OutputMode::Lazy,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    init(log_level);

    if let Err(e) = run(cli).await {
        eprintln!("{}: {:#}", style("Error").red().bold(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    debug!("Configuration: {:?}", config);

    let progress = if cli.json || cli.quiet || cli.dry_run {
        ProgressReporter::disabled()
    } else {
        ProgressReporter::terminal()
    };
    let pipeline = Pipeline::new(config).with_progress(progress);

    if cli.dry_run {
        let planned = pipeline.plan().await.context("Dry run failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&planned)?);
        } else {
            println!("{} files would be written:", style(planned.len()).bold());
            for item in &planned {
                println!("  {} -> {}", item.source.display(), item.destination.display());
            }
        }
        return Ok(());
    }

    let summary = pipeline.run().await.context("Processing failed")?;
    print_summary(&summary, cli.json, cli.quiet)?;
    Ok(())
}

/// Create the run configuration from CLI arguments
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let base_dir = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Cannot determine current directory")?,
    };

    let config = Config::new()
        .entries(cli.entry.iter().cloned())
        .out_dir(cli.out_dir.clone())
        .compression(cli.compression.into())
        .quality(cli.quality)
        .mode(cli.mode.into())
        .base_dir(base_dir)
        .concurrency(cli.concurrency);

    config.validate()?;
    Ok(config)
}

/// Print processing summary
fn print_summary(summary: &RunSummary, json_output: bool, quiet: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    if quiet || summary.files == 0 {
        return Ok(());
    }

    println!("{}", style("Compression Summary:").bold());
    println!("  {}: {}", style("Entries").green(), summary.entries);
    println!("  {}: {}", style("Files").green(), summary.files);
    println!(
        "  {}: {:.2}MB → {:.2}MB ({:.1}% reduction)",
        style("Size").cyan(),
        summary.input_bytes as f64 / 1024.0 / 1024.0,
        summary.output_bytes as f64 / 1024.0 / 1024.0,
        summary.size_reduction()
    );
    println!(
        "  {}: {:.2}s",
        style("Duration").blue(),
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}
