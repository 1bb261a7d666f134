//! Extension classification for source images

use std::fmt;
use serde::Serialize;
use crate::error::{Result, ImgpressError};

/// Filename suffixes picked up from entry directories
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "avif", "webp"];

/// Formats the dispatch table knows how to compress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl SourceFormat {
    /// Map a logical extension (as returned by [`get_ext`]) to a format
    pub fn from_ext(ext: &str) -> Result<Self> {
        match ext {
            "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "avif" => Ok(Self::Avif),
            other => Err(ImgpressError::unsupported_format(other, None)),
        }
    }

    /// Classify a filename
    pub fn from_filename(filename: &str) -> Result<Self> {
        Self::from_ext(get_ext(filename))
    }

    /// Canonical file extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Check whether a filename ends with a supported image suffix.
///
/// This is a plain suffix test on the name, so `photo.JPG` is rejected and
/// a file literally named `png` is accepted.
pub fn is_supported_ext(name: &str) -> bool {
    SUPPORTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Text after the last `.`, with `jpeg` normalized to `jpg`.
///
/// Anything else is passed through untouched; callers filter with
/// [`is_supported_ext`] first.
pub fn get_ext(filename: &str) -> &str {
    let ext = filename.rsplit('.').next().unwrap_or(filename);
    if ext == "jpeg" {
        "jpg"
    } else {
        ext
    }
}

/// Replace the final extension of `filename` with `ext`.
///
/// A name without a `.` gets `.ext` appended.
pub fn replace_ext(filename: &str, ext: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => format!("{}.{}", &filename[..idx], ext),
        None => format!("{}.{}", filename, ext),
    }
}
