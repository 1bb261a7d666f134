//! Format dispatch: picks the codec operation for each source file

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::{CompressionType, OutputMode};
use crate::error::{ErrorContext, ImgpressError, Result};
use crate::parallel::{ConcurrencyLimit, ProgressReporter};
use crate::processing::codec::ImageCodec;
use crate::processing::formats::{get_ext, replace_ext, SourceFormat};
use crate::processing::reader::{EntryFiles, SourceFile};

/// Fixed JPEG quality for lossless transcodes
pub const LOSSLESS_TRANSCODE_JPEG_QUALITY: u8 = 87;

/// AVIF has no lossless path here; lossless means maximum quality
pub const LOSSLESS_AVIF_QUALITY: u8 = 100;

/// One cell of the dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecOperation {
    TransformJpeg { quality: u8 },
    CompressJpeg { quality: Option<u8> },
    LosslessCompressPng,
    PngQuantize { max_quality: u8 },
    TransformWebp { quality: u8 },
    TransformWebpLossless,
    TransformAvif { quality: u8 },
}

impl CodecOperation {
    /// Look up the operation for a target format.
    ///
    /// `needs_transcode` selects the generic decode-and-encode path for
    /// JPEG; the other formats ignore it.
    pub fn select(
        format: SourceFormat,
        compression: CompressionType,
        quality: u8,
        needs_transcode: bool,
    ) -> Self {
        use CompressionType::{Lossless, Lossy};

        match (format, compression) {
            (SourceFormat::Jpeg, Lossless) if needs_transcode => Self::TransformJpeg {
                quality: LOSSLESS_TRANSCODE_JPEG_QUALITY,
            },
            (SourceFormat::Jpeg, Lossy) if needs_transcode => Self::TransformJpeg { quality },
            (SourceFormat::Jpeg, Lossless) => Self::CompressJpeg { quality: None },
            (SourceFormat::Jpeg, Lossy) => Self::CompressJpeg {
                quality: Some(quality),
            },
            (SourceFormat::Png, Lossless) => Self::LosslessCompressPng,
            (SourceFormat::Png, Lossy) => Self::PngQuantize {
                max_quality: quality,
            },
            (SourceFormat::WebP, Lossless) => Self::TransformWebpLossless,
            (SourceFormat::WebP, Lossy) => Self::TransformWebp { quality },
            (SourceFormat::Avif, Lossless) => Self::TransformAvif {
                quality: LOSSLESS_AVIF_QUALITY,
            },
            (SourceFormat::Avif, Lossy) => Self::TransformAvif { quality },
        }
    }

    /// Run this operation against a codec
    pub fn apply(self, codec: &dyn ImageCodec, source: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::TransformJpeg { quality } => codec.transform_jpeg(source, quality),
            Self::CompressJpeg { quality } => codec.compress_jpeg(source, quality),
            Self::LosslessCompressPng => codec.lossless_compress_png(source),
            Self::PngQuantize { max_quality } => codec.png_quantize(source, max_quality),
            Self::TransformWebp { quality } => codec.transform_webp(source, quality),
            Self::TransformWebpLossless => codec.transform_webp_lossless(source),
            Self::TransformAvif { quality } => codec.transform_avif(source, quality),
        }
    }
}

/// Output filename plus the operation that produces its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformPlan {
    pub filename: String,
    pub operation: CodecOperation,
}

impl TransformPlan {
    /// Decide the output name and codec operation for a file
    pub fn for_file(
        filename: &str,
        compression: CompressionType,
        quality: u8,
        mode: OutputMode,
    ) -> Result<Self> {
        let plan = match mode {
            OutputMode::Compat => Self {
                filename: replace_ext(filename, SourceFormat::Jpeg.extension()),
                operation: CodecOperation::select(SourceFormat::Jpeg, compression, quality, true),
            },
            OutputMode::Modern => Self {
                filename: replace_ext(filename, SourceFormat::Avif.extension()),
                operation: CodecOperation::select(SourceFormat::Avif, compression, quality, false),
            },
            OutputMode::Lazy => {
                let format = SourceFormat::from_ext(get_ext(filename))?;
                Self {
                    filename: filename.to_string(),
                    operation: CodecOperation::select(format, compression, quality, false),
                }
            }
        };

        Ok(plan)
    }
}

/// Encoded output for one source file
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub filename: String,
    pub output: Vec<u8>,
    pub original_path: PathBuf,
    pub original_entry: String,
    pub original_size: u64,
}

/// All outputs for one entry directory
#[derive(Debug, Clone)]
pub struct EntryOutputs {
    pub entry: String,
    pub outputs: Vec<TransformResult>,
}

/// Settings shared by every transform in a run
#[derive(Clone)]
pub struct Transformer {
    codec: Arc<dyn ImageCodec>,
    compression: CompressionType,
    quality: u8,
    mode: OutputMode,
}

impl Transformer {
    pub fn new(
        codec: Arc<dyn ImageCodec>,
        compression: CompressionType,
        quality: u8,
        mode: OutputMode,
    ) -> Self {
        Self {
            codec,
            compression,
            quality,
            mode,
        }
    }

    /// Plan for a filename under this transformer's settings.
    ///
    /// Fails when the codec cannot decode the source format.
    pub fn plan(&self, filename: &str) -> Result<TransformPlan> {
        let plan = TransformPlan::for_file(filename, self.compression, self.quality, self.mode)?;

        if let Ok(format) = SourceFormat::from_filename(filename) {
            if !self.codec.can_decode(format) {
                return Err(ImgpressError::unsupported_format(
                    format!("{format} source (build with the avif-decode feature)"),
                    None,
                ));
            }
        }

        Ok(plan)
    }

    /// Plan every file of one entry.
    ///
    /// Two sources that would produce the same output name (`a.png` and
    /// `a.jpg` in compat mode) fail the entry.
    pub fn plan_entry<'a, I>(&self, entry: &str, filenames: I) -> Result<Vec<TransformPlan>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        filenames
            .into_iter()
            .map(|filename| {
                let plan = self
                    .plan(filename)
                    .with_file_context(Path::new(entry).join(filename))?;
                if !seen.insert(plan.filename.clone()) {
                    return Err(ImgpressError::duplicate_output(entry, plan.filename));
                }
                Ok(plan)
            })
            .collect()
    }

    /// Transform one file on the blocking pool
    pub async fn transform_image(&self, file: SourceFile) -> Result<TransformResult> {
        let plan = self
            .plan(&file.filename)
            .with_file_context(file.origin_path.clone())?;

        debug!(
            "Transforming {:?} -> {} via {:?}",
            file.origin_path, plan.filename, plan.operation
        );

        let codec = Arc::clone(&self.codec);
        let operation = plan.operation;
        let SourceFile {
            origin_entry,
            origin_path,
            source,
            ..
        } = file;
        let original_size = source.len() as u64;

        let output =
            tokio::task::spawn_blocking(move || operation.apply(codec.as_ref(), &source)).await??;

        debug!(
            "Transformed {:?}: {} -> {} bytes",
            origin_path,
            original_size,
            output.len()
        );

        Ok(TransformResult {
            filename: plan.filename,
            output,
            original_path: origin_path,
            original_entry: origin_entry,
            original_size,
        })
    }

    /// Transform every file of every entry, failing on the first error
    pub async fn transform_entry_list(
        &self,
        entries: Vec<EntryFiles>,
        limit: &ConcurrencyLimit,
        progress: &ProgressReporter,
    ) -> Result<Vec<EntryOutputs>> {
        for entry in &entries {
            self.plan_entry(&entry.entry, entry.files.iter().map(|f| f.filename.as_str()))?;
        }

        let total: usize = entries.iter().map(|e| e.files.len()).sum();
        info!(
            "Transforming {} files ({}, {}, quality {})",
            total,
            self.mode.as_str(),
            self.compression.as_str(),
            self.quality
        );
        progress.start(total as u64);

        let result = try_join_all(entries.into_iter().map(|entry| async move {
            let outputs = try_join_all(entry.files.into_iter().map(|file| async move {
                let _permit = limit.acquire().await?;
                progress.set_message(&file.filename);
                let result = self.transform_image(file).await?;
                progress.inc();
                Ok::<_, ImgpressError>(result)
            }))
            .await?;

            Ok::<_, ImgpressError>(EntryOutputs {
                entry: entry.entry,
                outputs,
            })
        }))
        .await;

        progress.finish();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::codec::ImageCrateCodec;
    use CompressionType::{Lossless, Lossy};

    #[test]
    fn test_lazy_mode_keeps_filename_and_format() {
        let cases = [
            ("a.png", Lossless, CodecOperation::LosslessCompressPng),
            ("a.png", Lossy, CodecOperation::PngQuantize { max_quality: 75 }),
            ("b.jpg", Lossless, CodecOperation::CompressJpeg { quality: None }),
            ("b.jpeg", Lossy, CodecOperation::CompressJpeg { quality: Some(75) }),
            ("c.webp", Lossless, CodecOperation::TransformWebpLossless),
            ("c.webp", Lossy, CodecOperation::TransformWebp { quality: 75 }),
            ("d.avif", Lossless, CodecOperation::TransformAvif { quality: 100 }),
            ("d.avif", Lossy, CodecOperation::TransformAvif { quality: 75 }),
        ];

        for (name, compression, expected) in cases {
            let plan = TransformPlan::for_file(name, compression, 75, OutputMode::Lazy).unwrap();
            assert_eq!(plan.filename, name);
            assert_eq!(plan.operation, expected, "{name} {compression:?}");
        }
    }

    #[test]
    fn test_compat_mode_renames_to_jpg() {
        for name in ["a.png", "b.jpg", "c.jpeg", "d.webp", "e.avif"] {
            let plan = TransformPlan::for_file(name, Lossy, 60, OutputMode::Compat).unwrap();
            assert!(plan.filename.ends_with(".jpg"), "{}", plan.filename);
            assert_eq!(plan.operation, CodecOperation::TransformJpeg { quality: 60 });
        }
        let plan = TransformPlan::for_file("c.jpeg", Lossy, 60, OutputMode::Compat).unwrap();
        assert_eq!(plan.filename, "c.jpg");
    }

    #[test]
    fn test_compat_lossless_uses_fixed_quality() {
        for quality in [1, 50, 75, 100] {
            let plan = TransformPlan::for_file("a.png", Lossless, quality, OutputMode::Compat).unwrap();
            assert_eq!(plan.operation, CodecOperation::TransformJpeg { quality: 87 });
        }
    }

    #[test]
    fn test_modern_mode_renames_to_avif() {
        let plan = TransformPlan::for_file("a.png", Lossless, 40, OutputMode::Modern).unwrap();
        assert_eq!(plan.filename, "a.avif");
        assert_eq!(plan.operation, CodecOperation::TransformAvif { quality: 100 });

        let plan = TransformPlan::for_file("b.jpg", Lossy, 40, OutputMode::Modern).unwrap();
        assert_eq!(plan.filename, "b.avif");
        assert_eq!(plan.operation, CodecOperation::TransformAvif { quality: 40 });
    }

    #[test]
    fn test_lazy_mode_rejects_unknown_extension() {
        assert!(TransformPlan::for_file("notes_png", Lossless, 75, OutputMode::Lazy).is_err());
    }

    fn transformer(mode: OutputMode) -> Transformer {
        Transformer::new(Arc::new(ImageCrateCodec::new()), Lossless, 75, mode)
    }

    #[test]
    fn test_plan_entry_rejects_colliding_outputs() {
        let err = transformer(OutputMode::Compat)
            .plan_entry("photos", ["a.jpg", "a.png"])
            .unwrap_err();
        assert!(matches!(
            err,
            ImgpressError::DuplicateOutput { ref entry, ref filename }
                if entry == "photos" && filename == "a.jpg"
        ));

        let err = transformer(OutputMode::Modern)
            .plan_entry("photos", ["a.png", "a.webp"])
            .unwrap_err();
        assert!(matches!(err, ImgpressError::DuplicateOutput { .. }));
    }

    #[test]
    fn test_plan_entry_allows_same_stem_in_lazy_mode() {
        let plans = transformer(OutputMode::Lazy)
            .plan_entry("photos", ["a.jpg", "a.png"])
            .unwrap();
        assert_eq!(plans.len(), 2);
    }

    #[cfg(not(feature = "avif-decode"))]
    #[test]
    fn test_plan_rejects_undecodable_avif_source() {
        let err = transformer(OutputMode::Compat)
            .plan_entry("photos", ["hero.avif"])
            .unwrap_err();
        assert!(matches!(err, ImgpressError::UnsupportedFormat { .. }));
        assert_eq!(err.file_path(), Some(&PathBuf::from("photos/hero.avif")));
    }

    #[test]
    fn test_forced_modes_accept_any_name() {
        assert!(TransformPlan::for_file("notes_png", Lossless, 75, OutputMode::Compat).is_ok());
        assert!(TransformPlan::for_file("notes_png", Lossless, 75, OutputMode::Modern).is_ok());
    }
}
