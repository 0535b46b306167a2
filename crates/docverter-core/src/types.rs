//! Core types for docverter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Free-form metadata attached to a conversion.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Conversion options
// ============================================================================

/// Output rendering of the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text
    #[default]
    Text,
    /// Markdown, tables rendered as pipe tables
    Markdown,
}

/// Per-call conversion options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub output_format: OutputFormat,
    /// Allow the OCR path for documents without a text layer
    pub ocr: bool,
    /// Run table detection on PDFs
    pub detect_tables: bool,
    /// Clean up images before OCR
    pub preprocess_images: bool,
    /// OCR language (tesseract code)
    pub lang: String,
    /// Resolution assumed for rasterized input
    pub dpi: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Text,
            ocr: true,
            detect_tables: true,
            preprocess_images: true,
            lang: "fra".to_string(),
            dpi: 300,
        }
    }
}

/// Options handed to an OCR collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    pub lang: String,
    pub dpi: u32,
    /// Rasterize and OCR every page even if it already has text
    pub force: bool,
}

impl From<&ConvertOptions> for OcrOptions {
    fn from(options: &ConvertOptions) -> Self {
        Self {
            lang: options.lang.clone(),
            dpi: options.dpi,
            force: false,
        }
    }
}

/// What an OCR collaborator reports after processing a document.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutcome {
    pub success: bool,
    /// Searchable PDF produced by the OCR run
    pub output_path: Option<PathBuf>,
    /// Seconds spent in the OCR engine
    pub processing_time: f64,
    pub error_message: Option<String>,
}

impl OcrOutcome {
    #[must_use]
    pub fn completed(output_path: PathBuf, processing_time: f64) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            processing_time,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, processing_time: f64) -> Self {
        Self {
            success: false,
            output_path: None,
            processing_time,
            error_message: Some(message.into()),
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

/// A table detected in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    /// 1-based position in the document
    pub index: usize,
    /// 1-based page number
    pub page: u32,
    pub rows: usize,
    pub columns: usize,
    /// Detection confidence in `[0, 1]`
    pub confidence: f64,
    /// Cell values, row-major
    pub cells: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Rows rendered as `cell | cell` lines.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.cells
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Markdown pipe table, first row as header.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        render_markdown_table(&self.cells)
    }

    /// Metrics recorded in conversion metadata.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "index": self.index,
            "page": self.page,
            "rows": self.rows,
            "columns": self.columns,
            "confidence": self.confidence,
        })
    }
}

/// Render rows as a Markdown table, padding short rows.
#[must_use]
pub fn render_markdown_table(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first() else {
        return String::new();
    };
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let line = |row: &Vec<String>| {
        let mut cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        cells.resize(width, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut out = vec![line(header), format!("|{}", " --- |".repeat(width))];
    out.extend(rows.iter().skip(1).map(line));
    out.join("\n")
}

// ============================================================================
// Capabilities
// ============================================================================

/// Backends a converter found usable during initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeMap<String, bool>);

impl Capabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, available: bool) {
        self.0.insert(key.into(), available);
    }

    /// Whether the capability was probed and found usable.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    /// Whether any capability with the given prefix (e.g. `pdf:`) is usable.
    #[must_use]
    pub fn any_with_prefix(&self, prefix: &str) -> bool {
        self.0
            .iter()
            .any(|(key, available)| *available && key.starts_with(prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Converter configuration
// ============================================================================

/// Provider-wide configuration, loaded from the `[converter]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Provider used when none is requested
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Scratch directory location (system temp dir when unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub enable_ocr: bool,

    /// OCR collaborator name; `"none"` disables OCR
    #[serde(default = "default_ocr_provider")]
    pub ocr_provider: String,

    /// Keep a standard converter as delegate for the advanced one
    #[serde(default = "default_true")]
    pub fallback_to_standard: bool,

    #[serde(default = "default_true")]
    pub cleanup_temp_files: bool,

    /// Preferred PDF backend
    #[serde(default)]
    pub pdf_parser: Option<String>,

    /// Preferred office backend
    #[serde(default)]
    pub office_parser: Option<String>,

    #[serde(default = "default_true")]
    pub detect_tables: bool,

    #[serde(default = "default_true")]
    pub preprocess_images: bool,
}

fn default_provider() -> String {
    "standard".to_string()
}

fn default_ocr_provider() -> String {
    "ocrmypdf".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            temp_dir: None,
            enable_ocr: true,
            ocr_provider: default_ocr_provider(),
            fallback_to_standard: true,
            cleanup_temp_files: true,
            pdf_parser: None,
            office_parser: None,
            detect_tables: true,
            preprocess_images: true,
        }
    }
}
