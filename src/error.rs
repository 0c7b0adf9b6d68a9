//! Error types for the img2table library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Img2TableError`] - **Caller-level**: the extraction could not even be
//!   attempted (input file missing, download failed, bad configuration).
//!   Returned as `Err(Img2TableError)` from the file/URL entry points.
//!
//! * [`StageError`] - **Pipeline-level**: a stage ran and failed (corrupt
//!   image, engine missing, engine reported an error). Never returned to the
//!   caller directly; the classifier turns it into
//!   [`crate::output::ExtractionResult::Failure`] so the caller always gets a
//!   structured result instead of a crash.

use crate::output::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// All caller-level errors returned by the img2table library.
///
/// Stage failures use [`StageError`] and end up inside
/// [`crate::output::ExtractionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Img2TableError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is empty or otherwise not usable as a path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the rendered output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. the blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure raised by one pipeline stage.
///
/// Each variant corresponds to one [`FailureKind`]. `category` is the
/// fine-grained error type name (e.g. `LanguageDataMissing`), `trace` is
/// whatever low-level diagnostic text the stage had (decoder message, engine
/// stderr). Both are carried verbatim into the final result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    /// The input bytes could not be decoded as an image.
    #[error("Invalid image: {message}")]
    InvalidImage {
        category: String,
        message: String,
        trace: String,
    },

    /// The recognition engine could not be invoked at all.
    #[error("OCR engine unavailable: {message}")]
    EngineUnavailable {
        category: String,
        message: String,
        trace: String,
    },

    /// The engine ran but reported a failure.
    #[error("Recognition failed: {message}")]
    Recognition {
        category: String,
        message: String,
        trace: String,
    },

    /// The engine succeeded but its output is not usable text.
    #[error("Malformed engine output: {message}")]
    MalformedOutput {
        category: String,
        message: String,
        trace: String,
    },
}

impl StageError {
    /// Map the stage error onto the public failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::InvalidImage { .. } => FailureKind::InvalidImage,
            StageError::EngineUnavailable { .. } => FailureKind::EngineUnavailable,
            StageError::Recognition { .. } => FailureKind::RecognitionError,
            StageError::MalformedOutput { .. } => FailureKind::MalformedOutput,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            StageError::InvalidImage { category, .. }
            | StageError::EngineUnavailable { category, .. }
            | StageError::Recognition { category, .. }
            | StageError::MalformedOutput { category, .. } => category,
        }
    }

    /// Human-readable message, without the variant prefix added by `Display`.
    pub fn message(&self) -> &str {
        match self {
            StageError::InvalidImage { message, .. }
            | StageError::EngineUnavailable { message, .. }
            | StageError::Recognition { message, .. }
            | StageError::MalformedOutput { message, .. } => message,
        }
    }

    pub fn trace(&self) -> &str {
        match self {
            StageError::InvalidImage { trace, .. }
            | StageError::EngineUnavailable { trace, .. }
            | StageError::Recognition { trace, .. }
            | StageError::MalformedOutput { trace, .. } => trace,
        }
    }

    /// Build an [`StageError::InvalidImage`] from an `image` crate error.
    pub(crate) fn from_image_error(err: &image::ImageError) -> Self {
        let category = match err {
            image::ImageError::Decoding(_) => "DecodingError",
            image::ImageError::Unsupported(_) => "UnsupportedFormat",
            image::ImageError::Limits(_) => "LimitsExceeded",
            image::ImageError::IoError(_) => "IoError",
            image::ImageError::Parameter(_) | image::ImageError::Encoding(_) => "ImageError",
        };
        StageError::InvalidImage {
            category: category.to_string(),
            message: err.to_string(),
            trace: format!("{err:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_timeout_display() {
        let e = Img2TableError::DownloadTimeout {
            url: "https://example.com/sheet.png".into(),
            secs: 30,
        };
        let msg = e.to_string();
        assert!(msg.contains("30s"), "got: {msg}");
        assert!(msg.contains("sheet.png"));
    }

    #[test]
    fn file_not_found_display() {
        let e = Img2TableError::FileNotFound {
            path: PathBuf::from("/tmp/missing.png"),
        };
        assert!(e.to_string().contains("missing.png"));
    }

    #[test]
    fn stage_error_kind_mapping() {
        let e = StageError::Recognition {
            category: "LanguageDataMissing".into(),
            message: "Failed loading language 'kor'".into(),
            trace: "Error opening data file ...".into(),
        };
        assert_eq!(e.kind(), FailureKind::RecognitionError);
        assert_eq!(e.category(), "LanguageDataMissing");
        assert_eq!(e.message(), "Failed loading language 'kor'");
        assert!(e.trace().starts_with("Error opening"));
        assert!(e.to_string().starts_with("Recognition failed:"));
    }

    #[test]
    fn image_error_becomes_invalid_image() {
        let err = image::load_from_memory(b"definitely not an image").unwrap_err();
        let stage = StageError::from_image_error(&err);
        assert_eq!(stage.kind(), FailureKind::InvalidImage);
        assert!(!stage.message().is_empty());
    }
}
