//! Error handling for instrument file ingestion.
//!
//! Provides error types with file context for format detection,
//! header structure, row decoding and FITS header failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Unrecognized file format: {path} - leading content {leading:?}")]
    UnrecognizedFormat { path: PathBuf, leading: String },

    #[error("File is not valid UTF-8 text: {path} - {reason}")]
    InvalidEncoding { path: PathBuf, reason: String },

    #[error("Malformed header in file: {path} - {reason}")]
    HeaderMalformed { path: PathBuf, reason: String },

    #[error("Malformed row at line {line} in file: {path} - {reason} (content: {content:?})")]
    RowMalformed {
        path: PathBuf,
        line: usize,
        content: String,
        reason: String,
    },

    #[error("Invalid sample cadence in file: {path} - {reason}")]
    CadenceInvalid { path: PathBuf, reason: String },

    #[error("Malformed FITS data in file: {path} - {reason}")]
    FitsMalformed { path: PathBuf, reason: String },

    #[error("No source matches hint {hint:?}")]
    UnknownSource { hint: String },

    #[error("Source hint {hint:?} does not match detected source {detected} for file: {path}")]
    SourceMismatch {
        path: PathBuf,
        hint: String,
        detected: String,
    },

    #[error("Invalid record structure: {reason}")]
    RecordInvalid { reason: String },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl HelioError {
    /// Attach a file path to an error raised before the path was known.
    ///
    /// Parsers work on in-memory text and report with an empty path; the
    /// file-level entry points call this once the origin is known.
    pub fn with_path(self, origin: impl Into<PathBuf>) -> Self {
        let origin = origin.into();
        match self {
            HelioError::UnrecognizedFormat { leading, .. } => HelioError::UnrecognizedFormat {
                path: origin,
                leading,
            },
            HelioError::InvalidEncoding { reason, .. } => HelioError::InvalidEncoding {
                path: origin,
                reason,
            },
            HelioError::HeaderMalformed { reason, .. } => HelioError::HeaderMalformed {
                path: origin,
                reason,
            },
            HelioError::RowMalformed {
                line,
                content,
                reason,
                ..
            } => HelioError::RowMalformed {
                path: origin,
                line,
                content,
                reason,
            },
            HelioError::CadenceInvalid { reason, .. } => HelioError::CadenceInvalid {
                path: origin,
                reason,
            },
            HelioError::FitsMalformed { reason, .. } => HelioError::FitsMalformed {
                path: origin,
                reason,
            },
            HelioError::SourceMismatch { hint, detected, .. } => HelioError::SourceMismatch {
                path: origin,
                hint,
                detected,
            },
            other => other,
        }
    }

    pub(crate) fn header(reason: impl Into<String>) -> Self {
        HelioError::HeaderMalformed {
            path: PathBuf::new(),
            reason: reason.into(),
        }
    }

    pub(crate) fn row(line: usize, content: &str, reason: impl Into<String>) -> Self {
        HelioError::RowMalformed {
            path: PathBuf::new(),
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn cadence(reason: impl Into<String>) -> Self {
        HelioError::CadenceInvalid {
            path: PathBuf::new(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fits(reason: impl Into<String>) -> Self {
        HelioError::FitsMalformed {
            path: PathBuf::new(),
            reason: reason.into(),
        }
    }
}

impl From<fitsio::errors::Error> for HelioError {
    fn from(error: fitsio::errors::Error) -> Self {
        HelioError::fits(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HelioError>;
