//! Error types for docverter.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while converting a single document.
///
/// Converters turn these into a failed [`ConversionResult`](crate::ConversionResult)
/// carrying the error's display string.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported file type: extension '{extension}' ({mime_type})")]
    UnsupportedType { extension: String, mime_type: String },

    #[error("no PDF backend available/succeeded: {0}")]
    NoPdfBackend(String),

    #[error("no office backend available/succeeded: {0}")]
    NoOfficeBackend(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("converter not initialized: {0}")]
    NotInitialized(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversion failed: {0}")]
    Failed(String),
}

/// Provider resolution errors.
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("no usable converter for '{requested}' (tried: {})", .tried.join(", "))]
    NoUsableConverter {
        requested: String,
        tried: Vec<String>,
    },
}
