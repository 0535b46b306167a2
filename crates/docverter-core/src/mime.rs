//! File type detection and base file metadata.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::types::Metadata;

/// MIME type reported when nothing else matches.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Broad document family used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Pdf,
    Office,
    Text,
    Html,
    Image,
}

impl FileCategory {
    /// Extensions handled by each category.
    pub const PDF_EXTENSIONS: &'static [&'static str] = &["pdf"];
    pub const OFFICE_EXTENSIONS: &'static [&'static str] = &["docx"];
    pub const TEXT_EXTENSIONS: &'static [&'static str] =
        &["txt", "text", "md", "markdown", "csv", "tsv", "log", "rst"];
    pub const HTML_EXTENSIONS: &'static [&'static str] = &["html", "htm", "xhtml"];
    pub const IMAGE_EXTENSIONS: &'static [&'static str] =
        &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"];

    /// Category for a lowercase or mixed-case extension, without the dot.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        [
            Self::Pdf,
            Self::Office,
            Self::Text,
            Self::Html,
            Self::Image,
        ]
        .into_iter()
        .find(|category| category.extensions().contains(&ext.as_str()))
    }

    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Pdf => Self::PDF_EXTENSIONS,
            Self::Office => Self::OFFICE_EXTENSIONS,
            Self::Text => Self::TEXT_EXTENSIONS,
            Self::Html => Self::HTML_EXTENSIONS,
            Self::Image => Self::IMAGE_EXTENSIONS,
        }
    }
}

/// Lowercase extension of a path without the dot, or an empty string.
#[must_use]
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Detect the MIME type of a file.
///
/// Looks at the extension first, then sniffs the leading bytes. Never fails;
/// unknown content is `application/octet-stream`.
#[must_use]
pub fn detect_file_type(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.essence_str().to_string();
    }

    match infer::get_from_path(path) {
        Ok(Some(kind)) => kind.mime_type().to_string(),
        Ok(None) => OCTET_STREAM.to_string(),
        Err(e) => {
            debug!("Content sniffing failed for {:?}: {}", path, e);
            OCTET_STREAM.to_string()
        }
    }
}

/// File extension used when materializing content of the given type.
///
/// Accepts a MIME type (`application/pdf`) or a bare extension (`pdf`, `.pdf`).
/// Unknown types map to `bin`.
#[must_use]
pub fn extension_for_mime(file_type: &str) -> String {
    let hint = file_type.trim().to_ascii_lowercase();
    let known = match hint.as_str() {
        "application/pdf" => Some("pdf"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "text/plain" => Some("txt"),
        "text/markdown" => Some("md"),
        "text/csv" => Some("csv"),
        "text/html" | "application/xhtml+xml" => Some("html"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/tiff" => Some("tiff"),
        "image/bmp" => Some("bmp"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    let bare = hint.trim_start_matches('.');
    if !bare.is_empty() && !bare.contains('/') && FileCategory::from_extension(bare).is_some() {
        return bare.to_string();
    }

    "bin".to_string()
}

/// Facts about a file every converter reports.
///
/// Always contains `filename`, `extension`, `size`, `modified` and
/// `mime_type`. Size and modification time fall back to `0` and `null` when
/// the file cannot be inspected.
#[must_use]
pub fn base_metadata(path: &Path) -> Metadata {
    let mut metadata = Metadata::new();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    metadata.insert("filename".to_string(), Value::from(filename));
    metadata.insert("extension".to_string(), Value::from(file_extension(path)));

    match std::fs::metadata(path) {
        Ok(meta) => {
            metadata.insert("size".to_string(), Value::from(meta.len()));
            let modified = meta
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339());
            metadata.insert("modified".to_string(), modified.map_or(Value::Null, Value::from));
        }
        Err(e) => {
            debug!("Cannot stat {:?}: {}", path, e);
            metadata.insert("size".to_string(), Value::from(0));
            metadata.insert("modified".to_string(), Value::Null);
        }
    }

    metadata.insert("mime_type".to_string(), Value::from(detect_file_type(path)));
    metadata
}
