//! Error types and handling for imgpress

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgpress operations
pub type Result<T> = std::result::Result<T, ImgpressError>;

/// Main error type for imgpress operations
#[derive(Debug, Error)]
pub enum ImgpressError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image decode/encode errors raised by the `image` crate
    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    /// A codec operation failed outside the `image` crate
    #[error("Codec error in {operation}: {message}")]
    CodecError {
        operation: &'static str,
        message: String,
    },

    /// Extension has no entry in the dispatch table
    #[error("Unsupported image format: {format} (file: {file:?})")]
    UnsupportedFormat {
        format: String,
        file: Option<PathBuf>,
    },

    /// Listing or reading a source entry directory failed
    #[error("Failed to read entry '{entry}': {source}")]
    ReadEntry {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a source file failed
    #[error("Failed to read {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an output file or creating an output directory failed
    #[error("Failed to write {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two sources of one entry would be written to the same output file
    #[error("Entry '{entry}': more than one source maps to output '{filename}'")]
    DuplicateOutput { entry: String, filename: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A spawned task panicked or was aborted
    #[error("Task join error: {message}")]
    TaskError { message: String },
}

impl ImgpressError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new codec error
    pub fn codec<S: Into<String>>(operation: &'static str, message: S) -> Self {
        Self::CodecError {
            operation,
            message: message.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S, file: Option<PathBuf>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            file,
        }
    }

    /// Create a new entry read error
    pub fn read_entry<S: Into<String>>(entry: S, source: std::io::Error) -> Self {
        Self::ReadEntry {
            entry: entry.into(),
            source,
        }
    }

    /// Create a new file read error
    pub fn read(path: PathBuf, source: std::io::Error) -> Self {
        Self::ReadError { path, source }
    }

    /// Create a new write error
    pub fn write(path: PathBuf, source: std::io::Error) -> Self {
        Self::WriteError { path, source }
    }

    /// Create a new duplicate output error
    pub fn duplicate_output(entry: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::DuplicateOutput {
            entry: entry.into(),
            filename: filename.into(),
        }
    }

    /// Create a new task error
    pub fn task<S: Into<String>>(message: S) -> Self {
        Self::TaskError {
            message: message.into(),
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::UnsupportedFormat { file, .. } => file.as_ref(),
            Self::ReadError { path, .. } | Self::WriteError { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for ImgpressError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::task(err.to_string())
    }
}

/// Error context extension for adding file path information
pub trait ErrorContext<T> {
    /// Add file context to an error
    fn with_file_context(self, file: PathBuf) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ImgpressError>,
{
    fn with_file_context(self, file: PathBuf) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();

            if let ImgpressError::UnsupportedFormat { file: ref mut f, .. } = error {
                if f.is_none() {
                    *f = Some(file);
                }
            }

            error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ImgpressError::config("test message");
        assert!(matches!(err, ImgpressError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_codec_error_names_operation() {
        let err = ImgpressError::codec("png_quantize", "empty image");
        assert_eq!(err.to_string(), "Codec error in png_quantize: empty image");
    }

    #[test]
    fn test_file_context() {
        let result: Result<()> = Err(ImgpressError::unsupported_format("gif", None));
        let err = result
            .with_file_context(PathBuf::from("photos/a.gif"))
            .unwrap_err();

        assert_eq!(err.file_path(), Some(&PathBuf::from("photos/a.gif")));
    }

    #[test]
    fn test_file_context_keeps_existing_path() {
        let result: Result<()> = Err(ImgpressError::unsupported_format(
            "gif",
            Some(PathBuf::from("first.gif")),
        ));
        let err = result
            .with_file_context(PathBuf::from("second.gif"))
            .unwrap_err();

        assert_eq!(err.file_path(), Some(&PathBuf::from("first.gif")));
    }

    #[test]
    fn test_duplicate_output_message() {
        let err = ImgpressError::duplicate_output("photos", "a.jpg");
        assert_eq!(
            err.to_string(),
            "Entry 'photos': more than one source maps to output 'a.jpg'"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ImgpressError = io.into();
        assert!(matches!(err, ImgpressError::IoError(_)));
    }
}
