//! Core traits for docverter components.
//!
//! - [`DocumentConverter`]: a conversion provider
//! - [`OcrProcessor`]: turns scanned documents into searchable PDFs
//! - [`TableExtractor`]: finds tables in PDFs
//!
//! Converters are shared as `Arc<dyn DocumentConverter>` and must be safe to
//! call concurrently once initialized.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::mime::{detect_file_type, extension_for_mime};
use crate::result::ConversionResult;
use crate::scratch::ScratchDir;
use crate::types::{
    Capabilities, ConvertOptions, ConverterConfig, ExtractedTable, Metadata, OcrOptions,
    OcrOutcome,
};

// ============================================================================
// Conversion providers
// ============================================================================

/// A document conversion provider.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Name the provider is registered under.
    fn provider_name(&self) -> &str;

    /// Probe optional backends and fix the capability map.
    ///
    /// Idempotent: later calls return the first answer. Never panics or errors;
    /// returns whether the provider has its minimum capability.
    async fn initialize(&self) -> bool;

    fn is_initialized(&self) -> bool;

    /// Capabilities found during initialization (empty before).
    fn capabilities(&self) -> Capabilities;

    fn config(&self) -> &ConverterConfig;

    /// Convert a file on disk.
    async fn convert_file(&self, path: &Path, options: &ConvertOptions) -> ConversionResult;

    /// Convert in-memory content.
    ///
    /// `file_type` is a MIME type or a bare extension. The bytes are written to
    /// a private scratch directory which is released on every exit path.
    async fn convert_bytes(
        &self,
        content: &[u8],
        file_type: &str,
        options: &ConvertOptions,
    ) -> ConversionResult {
        let config = self.config();
        let scratch = match ScratchDir::create(config.temp_dir.as_deref(), config.cleanup_temp_files)
        {
            Ok(scratch) => scratch,
            Err(e) => {
                warn!("Cannot create scratch directory: {}", e);
                return ConversionResult::failure(ConversionError::Io(e).to_string());
            }
        };

        let input = scratch.join(&format!("input.{}", extension_for_mime(file_type)));
        if let Err(e) = tokio::fs::write(&input, content).await {
            return ConversionResult::failure(ConversionError::Io(e).to_string());
        }
        debug!(
            "Materialized {} bytes of '{}' at {:?}",
            content.len(),
            file_type,
            input
        );

        let result = self.convert_file(&input, options).await;
        scratch.release();
        result
    }

    /// Base file facts plus best-effort format details. Never fails.
    async fn extract_metadata(&self, path: &Path) -> Metadata;

    /// MIME type by extension, then content sniffing. Never fails.
    fn detect_file_type(&self, path: &Path) -> String {
        detect_file_type(path)
    }

    /// Extensions this provider can currently convert.
    fn supported_file_types(&self) -> Vec<String>;
}

// ============================================================================
// Collaborators
// ============================================================================

/// OCR engine producing a searchable PDF from a scanned document or image.
#[async_trait]
pub trait OcrProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the engine can run on this machine.
    async fn is_available(&self) -> bool;

    /// Whether a PDF lacks a usable text layer. Has no side effects.
    async fn needs_ocr(&self, path: &Path) -> Result<bool, ConversionError>;

    /// Run OCR on `input`, writing the output PDF under `output_dir`.
    async fn process_document(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &OcrOptions,
    ) -> OcrOutcome;
}

/// Table detection engine.
#[async_trait]
pub trait TableExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn is_available(&self) -> bool;

    async fn extract_tables(&self, path: &Path) -> Result<Vec<ExtractedTable>, ConversionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records the path it was asked to convert and echoes the file.
    struct EchoConverter {
        config: ConverterConfig,
        seen: Mutex<Option<PathBuf>>,
    }

    impl EchoConverter {
        fn new(config: ConverterConfig) -> Self {
            Self {
                config,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl DocumentConverter for EchoConverter {
        fn provider_name(&self) -> &str {
            "echo"
        }

        async fn initialize(&self) -> bool {
            true
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::new()
        }

        fn config(&self) -> &ConverterConfig {
            &self.config
        }

        async fn convert_file(&self, path: &Path, _options: &ConvertOptions) -> ConversionResult {
            *self.seen.lock().unwrap() = Some(path.to_path_buf());
            match std::fs::read_to_string(path) {
                Ok(text) => ConversionResult::success(text, Metadata::new(), 1, 1),
                Err(e) => ConversionResult::failure(e.to_string()),
            }
        }

        async fn extract_metadata(&self, path: &Path) -> Metadata {
            crate::mime::base_metadata(path)
        }

        fn supported_file_types(&self) -> Vec<String> {
            vec!["txt".to_string()]
        }
    }

    #[tokio::test]
    async fn test_convert_bytes_uses_extension_and_cleans_up() {
        let parent = tempfile::tempdir().unwrap();
        let config = ConverterConfig {
            temp_dir: Some(parent.path().to_path_buf()),
            ..Default::default()
        };
        let converter = EchoConverter::new(config);

        let result = converter
            .convert_bytes(b"hello bytes", "text/plain", &ConvertOptions::default())
            .await;

        assert!(result.is_success());
        assert_eq!(result.text(), Some("hello bytes"));

        let seen = converter.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.file_name().unwrap(), "input.txt");
        assert!(!seen.exists());
    }

    #[tokio::test]
    async fn test_convert_bytes_unknown_type_uses_bin() {
        let converter = EchoConverter::new(ConverterConfig::default());
        let _ = converter
            .convert_bytes(b"\x00\x01", "application/x-whatever", &ConvertOptions::default())
            .await;
        let seen = converter.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.extension().unwrap(), "bin");
    }

    #[tokio::test]
    async fn test_convert_bytes_keeps_scratch_without_cleanup() {
        let parent = tempfile::tempdir().unwrap();
        let config = ConverterConfig {
            temp_dir: Some(parent.path().to_path_buf()),
            cleanup_temp_files: false,
            ..Default::default()
        };
        let converter = EchoConverter::new(config);
        let _ = converter
            .convert_bytes(b"kept", "txt", &ConvertOptions::default())
            .await;

        let seen = converter.seen.lock().unwrap().clone().unwrap();
        assert!(seen.exists());
    }

    #[test]
    fn test_default_detect_file_type() {
        let converter = EchoConverter::new(ConverterConfig::default());
        assert_eq!(
            converter.detect_file_type(Path::new("a.pdf")),
            "application/pdf"
        );
    }
}
