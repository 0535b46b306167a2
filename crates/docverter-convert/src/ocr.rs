//! OCR collaborators.
//!
//! Both engines are external programs: `tesseract` recognizes single images
//! for the standard converter, `ocrmypdf` turns scanned documents into
//! searchable PDFs for the advanced converter.

use async_trait::async_trait;
use docverter_core::{
    file_extension, ConversionError, FileCategory, OcrOptions, OcrOutcome, OcrProcessor,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// A document with less text than this in total has no usable text layer.
pub const MIN_TEXT_CHARS: usize = 50;

/// A page with less text than this counts as blank.
pub const MIN_PAGE_CHARS: usize = 10;

/// Whether `program --version` runs successfully.
pub async fn command_available(program: &str) -> bool {
    let status = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("{} not usable: {}", program, e);
            false
        }
    }
}

/// Decide from per-page text whether a PDF needs OCR.
///
/// True when the whole text layer is shorter than [`MIN_TEXT_CHARS`] or more
/// than half of the pages hold fewer than [`MIN_PAGE_CHARS`] characters.
/// Whitespace is not counted.
#[must_use]
pub fn text_layer_needs_ocr(pages: &[String]) -> bool {
    let counts: Vec<usize> = pages
        .iter()
        .map(|page| page.chars().filter(|c| !c.is_whitespace()).count())
        .collect();
    let total: usize = counts.iter().sum();
    let blank = counts.iter().filter(|&&n| n < MIN_PAGE_CHARS).count();
    total < MIN_TEXT_CHARS || blank * 2 > counts.len()
}

/// Read a PDF's text layer and apply [`text_layer_needs_ocr`].
pub async fn pdf_needs_ocr(path: &Path) -> Result<bool, ConversionError> {
    let path = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || crate::pdf::read_page_texts(&path))
        .await
        .map_err(|e| ConversionError::Failed(format!("Task join error: {e}")))??;
    Ok(text_layer_needs_ocr(&pages))
}

/// Last non-empty line of a program's stderr.
fn stderr_summary(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map_or_else(|| "no diagnostic output".to_string(), |l| l.trim().to_string())
}

// ============================================================================
// Image recognition
// ============================================================================

/// Recognizes text in a single image.
#[async_trait]
pub trait ImageRecognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn is_available(&self) -> bool;

    async fn recognize(&self, image: &Path, options: &OcrOptions)
        -> Result<String, ConversionError>;
}

/// Runs the `tesseract` command line.
pub struct TesseractRecognizer {
    program: String,
}

impl TesseractRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("tesseract")
    }

    /// Use a specific executable.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn is_available(&self) -> bool {
        command_available(&self.program).await
    }

    async fn recognize(
        &self,
        image: &Path,
        options: &OcrOptions,
    ) -> Result<String, ConversionError> {
        debug!("Running tesseract on {:?} ({})", image, options.lang);
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .args(["-l", options.lang.as_str()])
            .args(["--dpi", options.dpi.to_string().as_str()])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConversionError::OcrUnavailable(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(ConversionError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr_summary(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ============================================================================
// Document OCR
// ============================================================================

/// Runs the `ocrmypdf` command line.
pub struct OcrMyPdfProcessor {
    program: String,
}

impl OcrMyPdfProcessor {
    /// File name of the searchable PDF written to the output directory.
    pub const OUTPUT_NAME: &'static str = "ocr_output.pdf";

    #[must_use]
    pub fn new() -> Self {
        Self::with_program("ocrmypdf")
    }

    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn arguments(input: &Path, output: &Path, options: &OcrOptions) -> Vec<String> {
        let mut args = vec!["-l".to_string(), options.lang.clone()];
        args.push(if options.force { "--force-ocr" } else { "--skip-text" }.to_string());
        if FileCategory::from_extension(&file_extension(input)) == Some(FileCategory::Image) {
            args.push("--image-dpi".to_string());
            args.push(options.dpi.to_string());
        }
        args.push(input.to_string_lossy().into_owned());
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

impl Default for OcrMyPdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrProcessor for OcrMyPdfProcessor {
    fn name(&self) -> &str {
        "ocrmypdf"
    }

    async fn is_available(&self) -> bool {
        command_available(&self.program).await
    }

    async fn needs_ocr(&self, path: &Path) -> Result<bool, ConversionError> {
        pdf_needs_ocr(path).await
    }

    async fn process_document(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &OcrOptions,
    ) -> OcrOutcome {
        let started = Instant::now();
        let output: PathBuf = output_dir.join(Self::OUTPUT_NAME);
        let args = Self::arguments(input, &output, options);
        debug!("Running {} {:?}", self.program, args);

        let run = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match run {
            Ok(out) if out.status.success() && output.exists() => {
                OcrOutcome::completed(output, elapsed)
            }
            Ok(out) => {
                let message = format!(
                    "ocrmypdf exited with {}: {}",
                    out.status,
                    stderr_summary(&out.stderr)
                );
                warn!("{}", message);
                OcrOutcome::failed(message, elapsed)
            }
            Err(e) => OcrOutcome::failed(format!("cannot run {}: {e}", self.program), elapsed),
        }
    }
}

/// OCR processor for a configured provider name; `"none"` disables OCR.
#[must_use]
pub fn ocr_processor_for(name: &str) -> Option<Arc<dyn OcrProcessor>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "ocrmypdf" => Some(Arc::new(OcrMyPdfProcessor::new())),
        "" | "none" => None,
        other => {
            warn!("Unknown OCR provider '{}', OCR disabled", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::render_text_pdf;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn test_empty_layer_needs_ocr() {
        assert!(text_layer_needs_ocr(&pages(&["", "  \n "])));
        assert!(text_layer_needs_ocr(&[]));
    }

    #[test]
    fn test_rich_layer_does_not_need_ocr() {
        let body = "The quick brown fox jumps over the lazy dog near the river bank.";
        assert!(!text_layer_needs_ocr(&pages(&[body, body, body])));
    }

    #[test]
    fn test_mostly_blank_pages_need_ocr() {
        let body = "The quick brown fox jumps over the lazy dog near the river bank.";
        assert!(text_layer_needs_ocr(&pages(&[body, "", "", "3"])));
    }

    #[test]
    fn test_half_blank_pages_do_not_need_ocr() {
        let body = "The quick brown fox jumps over the lazy dog near the river bank.";
        assert!(!text_layer_needs_ocr(&pages(&[body, ""])));
    }

    #[test]
    fn test_whitespace_is_not_text() {
        let spaced = format!("{}x", " ".repeat(200));
        assert!(text_layer_needs_ocr(&pages(&[&spaced])));
    }

    #[tokio::test]
    async fn test_pdf_needs_ocr_on_files() {
        let dir = tempfile::tempdir().unwrap();
        let scanned = dir.path().join("scanned.pdf");
        std::fs::write(&scanned, render_text_pdf(&["", ""]).unwrap()).unwrap();
        assert!(pdf_needs_ocr(&scanned).await.unwrap());

        let missing = dir.path().join("missing.pdf");
        assert!(pdf_needs_ocr(&missing).await.is_err());
    }

    #[test]
    fn test_ocrmypdf_arguments_for_pdf() {
        let options = OcrOptions {
            lang: "eng".to_string(),
            dpi: 300,
            force: false,
        };
        let args = OcrMyPdfProcessor::arguments(
            Path::new("/in/scan.pdf"),
            Path::new("/out/ocr_output.pdf"),
            &options,
        );
        assert_eq!(
            args,
            vec!["-l", "eng", "--skip-text", "/in/scan.pdf", "/out/ocr_output.pdf"]
        );
    }

    #[test]
    fn test_ocrmypdf_arguments_for_image() {
        let options = OcrOptions {
            lang: "fra".to_string(),
            dpi: 200,
            force: true,
        };
        let args = OcrMyPdfProcessor::arguments(
            Path::new("/in/photo.png"),
            Path::new("/out/ocr_output.pdf"),
            &options,
        );
        assert!(args.contains(&"--force-ocr".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--image-dpi" && w[1] == "200"));
    }

    #[test]
    fn test_stderr_summary() {
        assert_eq!(stderr_summary(b"warning\nerror: bad input\n\n"), "error: bad input");
        assert_eq!(stderr_summary(b""), "no diagnostic output");
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        assert!(!command_available("docverter-no-such-program").await);
        let processor = OcrMyPdfProcessor::with_program("docverter-no-such-program");
        assert!(!processor.is_available().await);

        let dir = tempfile::tempdir().unwrap();
        let outcome = processor
            .process_document(
                Path::new("/in/scan.pdf"),
                dir.path(),
                &OcrOptions {
                    lang: "eng".to_string(),
                    dpi: 300,
                    force: false,
                },
            )
            .await;
        assert!(!outcome.success);
        assert!(outcome.error_message.is_some());
    }

    #[test]
    fn test_ocr_processor_for() {
        assert_eq!(ocr_processor_for("ocrmypdf").unwrap().name(), "ocrmypdf");
        assert!(ocr_processor_for("none").is_none());
        assert!(ocr_processor_for("abbyy").is_none());
    }
}
