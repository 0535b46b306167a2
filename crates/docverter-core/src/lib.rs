//! # docverter-core
//!
//! Core types and traits for the docverter document conversion engine.
//!
//! This crate holds what every conversion provider shares:
//!
//! - **Result model**: [`ConversionResult`] with derived text statistics
//! - **Provider contract**: the [`DocumentConverter`] trait
//! - **Collaborators**: [`OcrProcessor`] and [`TableExtractor`]
//! - **Errors**: [`ConversionError`] and [`FactoryError`]
//! - **File helpers**: MIME detection, base metadata and [`ScratchDir`]
//!
//! ## Architecture
//!
//! ```text
//! caller → ConverterRegistry → DocumentConverter → ConversionResult
//!                                   ↓
//!                       OcrProcessor / TableExtractor
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConversionResult`] | Text, metadata and page counts of one conversion |
//! | [`ConvertOptions`] | Per-call options (output format, OCR language, tables) |
//! | [`ConverterConfig`] | Provider configuration with serde defaults |
//! | [`Capabilities`] | Backends found usable at initialization |
//! | [`ExtractedTable`] | A table found by a [`TableExtractor`] |
//! | [`FileCategory`] | Dispatch family of a file extension |
//!
//! ## Example
//!
//! ```rust,ignore
//! use docverter_core::{ConvertOptions, DocumentConverter};
//!
//! async fn convert(converter: &dyn DocumentConverter, path: &Path) {
//!     if !converter.initialize().await {
//!         return;
//!     }
//!     let result = converter.convert_file(path, &ConvertOptions::default()).await;
//!     println!("{}", result.text_preview(200));
//! }
//! ```
//!
//! ## Related Crates
//!
//! - `docverter-convert`: standard and advanced converters, provider registry
//! - `docverter`: command-line interface

pub mod error;
pub mod mime;
pub mod result;
pub mod scratch;
pub mod traits;
pub mod types;

pub use error::{ConversionError, FactoryError};
pub use mime::{base_metadata, detect_file_type, extension_for_mime, file_extension, FileCategory};
pub use result::{ConversionResult, ConversionSummary};
pub use scratch::ScratchDir;
pub use traits::*;
pub use types::*;
