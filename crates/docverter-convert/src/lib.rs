//! # docverter-convert
//!
//! Conversion providers for docverter.
//!
//! This crate turns files into [`ConversionResult`](docverter_core::ConversionResult)s.
//! Two providers are built in, both implementing
//! [`DocumentConverter`](docverter_core::DocumentConverter):
//!
//! | Provider | Type | Description |
//! |----------|------|-------------|
//! | `standard` | [`StandardConverter`] | Dispatch by file type to probed format backends |
//! | `advanced` | [`AdvancedConverter`] | OCR for scanned input, table detection, fallback to `standard` |
//!
//! ## Supported Formats
//!
//! | Family | Extensions | Backends |
//! |--------|------------|----------|
//! | PDF | `.pdf` | pdf-extract, lopdf, pdf_oxide (feature `pdf_oxide`) |
//! | Office | `.docx` | docx-rs (feature `office`) |
//! | Text | `.txt`, `.md`, `.csv`, `.log`, ... | UTF-8 / UTF-16 / legacy encodings via encoding_rs |
//! | HTML | `.html`, `.htm`, `.xhtml` | scraper (feature `html`) |
//! | Image | `.png`, `.jpg`, `.tiff`, ... | tesseract, or ocrmypdf through the advanced provider |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docverter_convert::ConverterRegistry;
//! use docverter_core::ConvertOptions;
//! use std::path::Path;
//!
//! let registry = ConverterRegistry::default();
//! let converter = registry
//!     .get_document_converter(Some("advanced"), None, true)
//!     .await?;
//!
//! let result = converter
//!     .convert_file(Path::new("scan.pdf"), &ConvertOptions::default())
//!     .await;
//! println!("{}", result.text_preview(200));
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConverterRegistry`] | Provider name to constructor map with fallback selection |
//! | [`PdfBackend`] | PDF text extraction library |
//! | [`OfficeBackend`] | Office document parser |
//! | [`HtmlBackend`] | HTML to text |
//! | [`ImageRecognizer`] | Image OCR used by the standard provider |
//! | [`OcrMyPdfProcessor`] | OCR collaborator used by the advanced provider |
//! | [`TextLayoutTableExtractor`] | Table detection from page text |

pub mod advanced;
pub mod html;
pub mod image;
pub mod ocr;
pub mod office;
pub mod pdf;
pub mod preprocess;
pub mod registry;
pub mod standard;
pub mod tables;
pub mod text;

pub use advanced::{AdvancedConverter, ADVANCED};
#[cfg(feature = "html")]
pub use html::ScraperHtml;
pub use html::HtmlBackend;
pub use ocr::{ocr_processor_for, ImageRecognizer, OcrMyPdfProcessor, TesseractRecognizer};
#[cfg(feature = "office")]
pub use office::DocxBackend;
pub use office::{OfficeBackend, OfficeDocument};
#[cfg(feature = "pdf_oxide")]
pub use pdf::PdfOxideBackend;
pub use pdf::{LopdfBackend, PdfBackend, PdfExtractBackend, PdfText};
pub use registry::{ConverterConstructor, ConverterRegistry};
pub use standard::{StandardConverter, STANDARD};
pub use tables::TextLayoutTableExtractor;
pub use text::{decode_text, DecodedText};
