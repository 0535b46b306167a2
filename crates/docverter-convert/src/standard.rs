//! The baseline conversion provider.
//!
//! Every format family has its own handler. Backends are probed once at
//! initialization and the resulting dispatch table is fixed afterwards.

use async_trait::async_trait;
use docverter_core::{
    base_metadata, file_extension, Capabilities, ConversionError, ConversionResult,
    ConvertOptions, ConverterConfig, DocumentConverter, FileCategory, Metadata, OcrOptions,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::html::{self, HtmlBackend};
use crate::image::image_metadata;
use crate::ocr::{ImageRecognizer, TesseractRecognizer};
use crate::office::{self, OfficeBackend, OfficeDocument};
use crate::pdf::{self, PdfBackend};
use crate::text::decode_text;

/// Registry name of the standard provider.
pub const STANDARD: &str = "standard";

/// Backends that passed their probes.
struct DispatchTable {
    capabilities: Capabilities,
    pdf: Vec<Arc<dyn PdfBackend>>,
    office: Vec<Arc<dyn OfficeBackend>>,
    html: Option<Arc<dyn HtmlBackend>>,
    ocr: Option<Arc<dyn ImageRecognizer>>,
}

impl DispatchTable {
    fn usable(&self) -> bool {
        self.capabilities.any_with_prefix("pdf:")
    }
}

/// Text and facts produced by one format handler.
struct Extraction {
    text: String,
    metadata: Metadata,
    pages: u32,
}

/// Baseline converter for PDF, office, text, HTML and image files.
pub struct StandardConverter {
    config: ConverterConfig,
    pdf_candidates: Vec<Arc<dyn PdfBackend>>,
    office_candidates: Vec<Arc<dyn OfficeBackend>>,
    html_candidate: Option<Arc<dyn HtmlBackend>>,
    ocr_candidate: Option<Arc<dyn ImageRecognizer>>,
    state: OnceCell<DispatchTable>,
}

impl StandardConverter {
    /// Create a converter with every compiled-in backend as candidate.
    #[must_use]
    pub fn new(config: ConverterConfig) -> Self {
        let pdf_candidates = pdf::default_backends(config.pdf_parser.as_deref());
        let office_candidates = office::default_backends(config.office_parser.as_deref());
        let ocr_candidate: Option<Arc<dyn ImageRecognizer>> =
            Some(Arc::new(TesseractRecognizer::new()));
        Self {
            config,
            pdf_candidates,
            office_candidates,
            html_candidate: html::default_backend(),
            ocr_candidate,
            state: OnceCell::new(),
        }
    }

    /// Replace the PDF backend candidates.
    #[must_use]
    pub fn with_pdf_backends(mut self, backends: Vec<Arc<dyn PdfBackend>>) -> Self {
        self.pdf_candidates = backends;
        self
    }

    /// Replace the office backend candidates.
    #[must_use]
    pub fn with_office_backends(mut self, backends: Vec<Arc<dyn OfficeBackend>>) -> Self {
        self.office_candidates = backends;
        self
    }

    /// Replace the HTML backend candidate.
    #[must_use]
    pub fn with_html_backend(mut self, backend: Option<Arc<dyn HtmlBackend>>) -> Self {
        self.html_candidate = backend;
        self
    }

    /// Replace the image OCR candidate.
    #[must_use]
    pub fn with_image_recognizer(mut self, recognizer: Option<Arc<dyn ImageRecognizer>>) -> Self {
        self.ocr_candidate = recognizer;
        self
    }

    async fn dispatch(&self) -> &DispatchTable {
        self.state.get_or_init(|| self.probe()).await
    }

    async fn probe(&self) -> DispatchTable {
        let mut capabilities = Capabilities::new();

        let mut pdf = Vec::new();
        let probed =
            probe_blocking("PDF", self.pdf_candidates.clone(), |backend| backend.probe()).await;
        for (backend, usable) in probed {
            capabilities.set(format!("pdf:{}", backend.name()), usable);
            if usable {
                pdf.push(backend);
            }
        }

        let mut office = Vec::new();
        let probed =
            probe_blocking("Office", self.office_candidates.clone(), |backend| backend.probe())
                .await;
        for (backend, usable) in probed {
            capabilities.set(format!("office:{}", backend.name()), usable);
            if usable {
                office.push(backend);
            }
        }

        let mut html = None;
        let probed = probe_blocking(
            "HTML",
            self.html_candidate.iter().cloned().collect::<Vec<_>>(),
            |backend| backend.probe(),
        )
        .await;
        for (backend, usable) in probed {
            capabilities.set(format!("html:{}", backend.name()), usable);
            if usable {
                html = Some(backend);
            }
        }
        capabilities.set("text:encoding_rs", true);

        let mut ocr = None;
        if let Some(recognizer) = &self.ocr_candidate {
            let usable = recognizer.is_available().await;
            capabilities.set(format!("ocr:{}", recognizer.name()), usable);
            if usable {
                ocr = Some(Arc::clone(recognizer));
            }
        }

        let table = DispatchTable {
            capabilities,
            pdf,
            office,
            html,
            ocr,
        };
        if table.usable() {
            info!(
                "Standard converter ready ({} PDF backends, OCR: {})",
                table.pdf.len(),
                table.ocr.is_some()
            );
        } else {
            warn!("Standard converter has no usable PDF backend");
        }
        table
    }

    async fn convert_inner(
        &self,
        path: &Path,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, ConversionError> {
        if !path.exists() {
            return Err(ConversionError::NotFound(path.to_path_buf()));
        }
        if !self.initialize().await {
            return Err(ConversionError::NotInitialized(
                "no PDF backend passed its probe".to_string(),
            ));
        }
        let table = self.dispatch().await;

        let extension = file_extension(path);
        let Some(category) = FileCategory::from_extension(&extension) else {
            return Err(ConversionError::UnsupportedType {
                extension,
                mime_type: self.detect_file_type(path),
            });
        };
        debug!("Converting {:?} as {:?}", path, category);

        let extraction = match category {
            FileCategory::Pdf => self.convert_pdf(table, path).await?,
            FileCategory::Text => self.convert_text(path).await?,
            FileCategory::Html => self.convert_html(table, path).await?,
            FileCategory::Office => self.convert_office(table, path, options).await?,
            FileCategory::Image => self.convert_image(table, path, options).await?,
        };

        let mut metadata = base_metadata(path);
        metadata.extend(extraction.metadata);
        metadata.insert("converter".to_string(), Value::from(STANDARD));
        Ok(ConversionResult::success(
            extraction.text,
            metadata,
            extraction.pages,
            extraction.pages,
        ))
    }

    async fn convert_pdf(
        &self,
        table: &DispatchTable,
        path: &Path,
    ) -> Result<Extraction, ConversionError> {
        let (text, backend) = pdf::extract_with_fallback(&table.pdf, path).await?;
        let mut metadata = Metadata::new();
        metadata.insert("parser".to_string(), Value::from(backend));
        Ok(Extraction {
            text: text.joined(),
            metadata,
            pages: text.page_count,
        })
    }

    async fn convert_text(&self, path: &Path) -> Result<Extraction, ConversionError> {
        let bytes = tokio::fs::read(path).await?;
        let decoded = decode_text(&bytes)?;
        let mut metadata = Metadata::new();
        if let Some(encoding) = decoded.encoding {
            debug!("{:?} decoded as {}", path, encoding);
            metadata.insert("encoding".to_string(), Value::from(encoding));
        }
        Ok(Extraction {
            text: decoded.text,
            metadata,
            pages: 1,
        })
    }

    async fn convert_html(
        &self,
        table: &DispatchTable,
        path: &Path,
    ) -> Result<Extraction, ConversionError> {
        let mut extraction = self.convert_text(path).await?;
        let Some(backend) = table.html.clone() else {
            debug!("No HTML backend, keeping markup of {:?}", path);
            return Ok(extraction);
        };

        let markup = std::mem::take(&mut extraction.text);
        extraction.text = tokio::task::spawn_blocking(move || backend.extract(&markup))
            .await
            .map_err(|e| ConversionError::Failed(format!("Task join error: {e}")))??;
        extraction.metadata.insert(
            "html_parser".to_string(),
            Value::from(table.html.as_ref().map_or("", |b| b.name())),
        );
        Ok(extraction)
    }

    async fn convert_office(
        &self,
        table: &DispatchTable,
        path: &Path,
        options: &ConvertOptions,
    ) -> Result<Extraction, ConversionError> {
        let (document, backend) = extract_office(&table.office, path).await?;
        let mut metadata = Metadata::new();
        metadata.insert("parser".to_string(), Value::from(backend));
        metadata.insert(
            "paragraph_count".to_string(),
            Value::from(document.paragraphs.len()),
        );
        metadata.insert(
            "table_row_count".to_string(),
            Value::from(document.table_row_count()),
        );
        Ok(Extraction {
            text: document.render(options.output_format),
            metadata,
            pages: 1,
        })
    }

    async fn convert_image(
        &self,
        table: &DispatchTable,
        path: &Path,
        options: &ConvertOptions,
    ) -> Result<Extraction, ConversionError> {
        if !self.config.enable_ocr || !options.ocr {
            return Err(ConversionError::OcrUnavailable(
                "OCR disabled for this conversion".to_string(),
            ));
        }
        let recognizer = table.ocr.as_ref().ok_or_else(|| {
            ConversionError::OcrUnavailable("no OCR engine passed its probe".to_string())
        })?;

        let text = recognizer
            .recognize(path, &OcrOptions::from(options))
            .await?;
        let mut metadata = Metadata::new();
        metadata.insert("ocr_engine".to_string(), Value::from(recognizer.name()));
        Ok(Extraction {
            text,
            metadata,
            pages: 1,
        })
    }
}

/// Probe candidates on the blocking pool; an aborted task leaves none usable.
async fn probe_blocking<B, F>(
    family: &str,
    candidates: Vec<Arc<B>>,
    probe: F,
) -> Vec<(Arc<B>, bool)>
where
    B: ?Sized + Send + Sync + 'static,
    F: Fn(&B) -> bool + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        candidates
            .into_iter()
            .map(|backend| {
                let usable = probe(&*backend);
                (backend, usable)
            })
            .collect::<Vec<_>>()
    })
    .await
    .unwrap_or_else(|e| {
        warn!("{} backend probing aborted: {}", family, e);
        Vec::new()
    })
}

/// Try each office backend that handles the file's extension.
async fn extract_office(
    backends: &[Arc<dyn OfficeBackend>],
    path: &Path,
) -> Result<(OfficeDocument, &'static str), ConversionError> {
    let extension = file_extension(path);
    let mut failures = Vec::new();
    for backend in backends
        .iter()
        .filter(|b| b.extensions().contains(&extension.as_str()))
    {
        let task_backend = Arc::clone(backend);
        let task_path: PathBuf = path.to_path_buf();
        match tokio::task::spawn_blocking(move || task_backend.extract(&task_path)).await {
            Ok(Ok(document)) => return Ok((document, backend.name())),
            Ok(Err(e)) => {
                warn!("Office backend {} failed on {:?}: {}", backend.name(), path, e);
                failures.push(format!("{}: {e}", backend.name()));
            }
            Err(e) => failures.push(format!("{}: {e}", backend.name())),
        }
    }
    if failures.is_empty() {
        failures.push(format!("no backend for .{extension}"));
    }
    Err(ConversionError::NoOfficeBackend(failures.join("; ")))
}

/// Format-specific metadata; errors are reported to the caller.
fn format_metadata(
    path: &Path,
    office: &[Arc<dyn OfficeBackend>],
) -> Result<Metadata, ConversionError> {
    match FileCategory::from_extension(&file_extension(path)) {
        Some(FileCategory::Pdf) => pdf::pdf_metadata(path),
        Some(FileCategory::Image) => image_metadata(path),
        Some(FileCategory::Office) => {
            let backend = office
                .first()
                .ok_or_else(|| ConversionError::NoOfficeBackend("none compiled in".to_string()))?;
            let document = backend.extract(path)?;
            let mut metadata = Metadata::new();
            metadata.insert(
                "paragraph_count".to_string(),
                Value::from(document.paragraphs.len()),
            );
            metadata.insert("table_count".to_string(), Value::from(document.tables.len()));
            Ok(metadata)
        }
        Some(FileCategory::Text | FileCategory::Html) | None => Ok(Metadata::new()),
    }
}

/// Base file facts merged with best-effort format details.
pub(crate) async fn enriched_metadata(
    path: &Path,
    office: Vec<Arc<dyn OfficeBackend>>,
) -> Metadata {
    let mut metadata = base_metadata(path);
    if !path.exists() {
        return metadata;
    }

    let task_path = path.to_path_buf();
    match tokio::task::spawn_blocking(move || format_metadata(&task_path, &office)).await {
        Ok(Ok(extra)) => metadata.extend(extra),
        Ok(Err(e)) => debug!("Metadata enrichment skipped for {:?}: {}", path, e),
        Err(e) => debug!("Metadata enrichment aborted for {:?}: {}", path, e),
    }
    metadata
}

#[async_trait]
impl DocumentConverter for StandardConverter {
    fn provider_name(&self) -> &str {
        STANDARD
    }

    async fn initialize(&self) -> bool {
        self.dispatch().await.usable()
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized()
    }

    fn capabilities(&self) -> Capabilities {
        self.state
            .get()
            .map(|table| table.capabilities.clone())
            .unwrap_or_default()
    }

    fn config(&self) -> &ConverterConfig {
        &self.config
    }

    async fn convert_file(&self, path: &Path, options: &ConvertOptions) -> ConversionResult {
        let started = Instant::now();
        let outcome = self.convert_inner(path, options).await;
        let elapsed = started.elapsed().as_secs_f64();
        match outcome {
            Ok(result) => result.with_processing_time(elapsed),
            Err(e) => {
                warn!("Conversion of {:?} failed: {}", path, e);
                ConversionResult::failure(e.to_string()).with_processing_time(elapsed)
            }
        }
    }

    async fn extract_metadata(&self, path: &Path) -> Metadata {
        enriched_metadata(path, self.office_candidates.clone()).await
    }

    fn supported_file_types(&self) -> Vec<String> {
        let Some(table) = self.state.get() else {
            return Vec::new();
        };
        let mut types: Vec<&str> = Vec::new();
        if !table.pdf.is_empty() {
            types.extend(FileCategory::PDF_EXTENSIONS);
        }
        for backend in &table.office {
            types.extend(backend.extensions());
        }
        types.extend(FileCategory::TEXT_EXTENSIONS);
        types.extend(FileCategory::HTML_EXTENSIONS);
        if table.ocr.is_some() {
            types.extend(FileCategory::IMAGE_EXTENSIONS);
        }
        types.dedup();
        types.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{render_text_pdf, LopdfBackend};
    use docverter_core::OutputFormat;
    use tempfile::tempdir;

    /// Recognizer answering with fixed text.
    struct FixedRecognizer(&'static str);

    #[async_trait]
    impl ImageRecognizer for FixedRecognizer {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn recognize(
            &self,
            _image: &Path,
            _options: &OcrOptions,
        ) -> Result<String, ConversionError> {
            Ok(self.0.to_string())
        }
    }

    fn converter() -> StandardConverter {
        StandardConverter::new(ConverterConfig::default())
            .with_pdf_backends(vec![Arc::new(LopdfBackend)])
            .with_image_recognizer(None)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let converter = converter();
        assert!(!converter.is_initialized());
        assert!(converter.capabilities().is_empty());
        assert!(converter.supported_file_types().is_empty());

        assert!(converter.initialize().await);
        let first = converter.capabilities();
        assert!(converter.initialize().await);
        assert_eq!(converter.capabilities(), first);
        assert!(converter.is_initialized());
        assert!(first.has("pdf:lopdf"));
        assert!(first.has("text:encoding_rs"));
    }

    #[tokio::test]
    async fn test_no_pdf_backend_means_not_usable() {
        let converter = converter().with_pdf_backends(Vec::new());
        assert!(!converter.initialize().await);

        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();
        let result = converter.convert_file(&path, &ConvertOptions::default()).await;
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_supported_types_follow_capabilities() {
        let converter = converter();
        converter.initialize().await;
        let types = converter.supported_file_types();
        assert!(types.contains(&"pdf".to_string()));
        assert!(types.contains(&"txt".to_string()));
        assert!(!types.contains(&"png".to_string()));

        let with_ocr = converter_with_ocr("x");
        with_ocr.initialize().await;
        assert!(with_ocr.supported_file_types().contains(&"png".to_string()));
    }

    fn converter_with_ocr(text: &'static str) -> StandardConverter {
        StandardConverter::new(ConverterConfig::default())
            .with_pdf_backends(vec![Arc::new(LopdfBackend)])
            .with_image_recognizer(Some(Arc::new(FixedRecognizer(text))))
    }

    #[tokio::test]
    async fn test_convert_text_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "first line\nsecond line").unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.text(), Some("first line\nsecond line"));
        assert_eq!(result.metadata()["line_count"], 2);
        assert_eq!(result.metadata()["converter"], "standard");
        assert!(!result.metadata().contains_key("encoding"));
    }

    #[tokio::test]
    async fn test_convert_latin1_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.txt");
        std::fs::write(&path, b"r\xE9sum\xE9").unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.text(), Some("résumé"));
        assert_eq!(result.metadata()["encoding"], "latin-1");
    }

    #[tokio::test]
    async fn test_convert_pdf_reports_pages_and_parser() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, render_text_pdf(&["Alpha", "Bravo", "Charlie"]).unwrap()).unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.pages_processed(), 3);
        assert_eq!(result.total_pages(), 3);
        assert_eq!(result.metadata()["parser"], "lopdf");
        assert!(result.text().unwrap().contains("Bravo"));
    }

    #[tokio::test]
    async fn test_convert_broken_pdf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage").unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(!result.is_success());
        assert!(result
            .error_message()
            .unwrap()
            .contains("no PDF backend available/succeeded"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = converter()
            .convert_file(Path::new("/nonexistent/file.pdf"), &ConvertOptions::default())
            .await;
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("file not found"));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(!result.is_success());
        let message = result.error_message().unwrap();
        assert!(message.contains("'bin'"));
        assert!(message.contains("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_image_without_ocr_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png").unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("OCR unavailable"));
    }

    #[tokio::test]
    async fn test_image_with_ocr() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png").unwrap();

        let result = converter_with_ocr("recognized words")
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.text(), Some("recognized words"));
        assert_eq!(result.metadata()["ocr_engine"], "fixed");
        assert_eq!(result.pages_processed(), 1);
    }

    #[tokio::test]
    async fn test_image_ocr_disabled_by_options() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png").unwrap();

        let options = ConvertOptions {
            ocr: false,
            ..Default::default()
        };
        let result = converter_with_ocr("x").convert_file(&path, &options).await;
        assert!(!result.is_success());
    }

    #[cfg(feature = "html")]
    #[tokio::test]
    async fn test_convert_html() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(
            &path,
            "<html><body><script>alert(1)</script><p>Visible</p>\n\n\n<p>Text</p></body></html>",
        )
        .unwrap();

        let result = converter()
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.text(), Some("Visible\nText"));
        assert_eq!(result.metadata()["html_parser"], "scraper");
    }

    #[tokio::test]
    async fn test_convert_html_without_backend_keeps_markup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.htm");
        std::fs::write(&path, "<p>raw</p>").unwrap();

        let result = converter()
            .with_html_backend(None)
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert_eq!(result.text(), Some("<p>raw</p>"));
    }

    #[cfg(feature = "office")]
    #[tokio::test]
    async fn test_convert_docx_markdown_tables() {
        use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

        let dir = tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        let cell = |text: &str| {
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
        };
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Memo")))
            .add_table(Table::new(vec![
                TableRow::new(vec![cell("k"), cell("v")]),
                TableRow::new(vec![cell("a"), cell("1")]),
            ]))
            .build()
            .pack(std::fs::File::create(&path).unwrap())
            .unwrap();

        let options = ConvertOptions {
            output_format: OutputFormat::Markdown,
            ..Default::default()
        };
        let result = converter().convert_file(&path, &options).await;
        assert!(result.is_success());
        assert_eq!(result.pages_processed(), 1);
        assert_eq!(result.metadata()["parser"], "docx-rs");
        assert!(result.text().unwrap().contains("| k | v |\n| --- | --- |"));

        let meta = converter().extract_metadata(&path).await;
        assert_eq!(meta["paragraph_count"], 1);
        assert_eq!(meta["table_count"], 1);
    }

    /// Office backend that claims DOCX but rejects every file.
    struct RejectingOffice;

    impl OfficeBackend for RejectingOffice {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        fn extensions(&self) -> &[&str] {
            &["docx"]
        }

        fn extract(&self, _path: &Path) -> Result<OfficeDocument, ConversionError> {
            Err(ConversionError::Parse("not a package".to_string()))
        }
    }

    /// HTML backend that leaves markup untouched.
    struct Passthrough;

    impl HtmlBackend for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }

        fn extract(&self, html: &str) -> Result<String, ConversionError> {
            Ok(html.to_string())
        }
    }

    #[tokio::test]
    async fn test_backends_failing_probe_are_not_dispatched() {
        let converter = converter()
            .with_office_backends(vec![Arc::new(RejectingOffice)])
            .with_html_backend(Some(Arc::new(Passthrough)));
        assert!(converter.initialize().await);

        let caps = converter.capabilities();
        assert!(!caps.has("office:rejecting"));
        assert!(!caps.has("html:passthrough"));
        assert!(caps.iter().any(|(key, _)| key == "office:rejecting"));
        assert!(!converter.supported_file_types().contains(&"docx".to_string()));

        let dir = tempdir().unwrap();
        let docx = dir.path().join("memo.docx");
        std::fs::write(&docx, b"PK").unwrap();
        let result = converter.convert_file(&docx, &ConvertOptions::default()).await;
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("no backend for .docx"));

        let html = dir.path().join("page.html");
        std::fs::write(&html, "<p>raw</p>").unwrap();
        let result = converter.convert_file(&html, &ConvertOptions::default()).await;
        assert_eq!(result.text(), Some("<p>raw</p>"));
        assert!(!result.metadata().contains_key("html_parser"));
    }

    #[tokio::test]
    async fn test_compiled_in_backends_pass_probes() {
        let converter =
            StandardConverter::new(ConverterConfig::default()).with_image_recognizer(None);
        assert!(converter.initialize().await);
        let caps = converter.capabilities();
        assert!(caps.has("pdf:pdf-extract"));
        assert!(caps.has("pdf:lopdf"));
        #[cfg(feature = "office")]
        assert!(caps.has("office:docx-rs"));
        #[cfg(feature = "html")]
        assert!(caps.has("html:scraper"));
    }

    #[tokio::test]
    async fn test_default_pdf_backends_keep_pages_apart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chapters.pdf");
        std::fs::write(
            &path,
            render_text_pdf(&[
                "Chapter one ends in detail.",
                "Region results follow",
                "Closing notes",
            ])
            .unwrap(),
        )
        .unwrap();

        let result = StandardConverter::new(ConverterConfig::default())
            .with_image_recognizer(None)
            .convert_file(&path, &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert_eq!(result.pages_processed(), 3);
        let text = result.text().unwrap();
        assert!(text.contains("detail.\n\nRegion"));
        assert!(!text.contains("detail.Region"));
        assert_eq!(result.metadata()["word_count"], 10);
    }

    #[tokio::test]
    async fn test_extract_metadata_pdf_enrichment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, render_text_pdf(&["a", "b"]).unwrap()).unwrap();

        let meta = converter().extract_metadata(&path).await;
        assert_eq!(meta["filename"], "doc.pdf");
        assert_eq!(meta["extension"], "pdf");
        assert_eq!(meta["mime_type"], "application/pdf");
        assert_eq!(meta["page_count"], 2);
    }

    #[tokio::test]
    async fn test_extract_metadata_survives_broken_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"nope").unwrap();

        let meta = converter().extract_metadata(&path).await;
        assert_eq!(meta["size"], 4);
        assert!(!meta.contains_key("page_count"));

        let missing = converter()
            .extract_metadata(Path::new("/nonexistent/x.docx"))
            .await;
        assert_eq!(missing["filename"], "x.docx");
    }

    #[tokio::test]
    async fn test_convert_bytes_pdf() {
        let bytes = render_text_pdf(&["From memory"]).unwrap();
        let result = converter()
            .convert_bytes(&bytes, "application/pdf", &ConvertOptions::default())
            .await;
        assert!(result.is_success());
        assert!(result.text().unwrap().contains("memory"));
        assert_eq!(result.pages_processed(), 1);
    }
}
