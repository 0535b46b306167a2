//! OCR-aware conversion provider.
//!
//! Wraps a [`StandardConverter`] and adds:
//!
//! - a text-layer check deciding whether a PDF goes through OCR
//! - image cleanup before OCR
//! - table detection appended to PDF text
//! - automatic fallback to the standard converter when anything in the
//!   pipeline errors or panics

use async_trait::async_trait;
use docverter_core::{
    file_extension, Capabilities, ConversionError, ConversionResult, ConvertOptions,
    ConverterConfig, DocumentConverter, ExtractedTable, FileCategory, Metadata, OcrOptions,
    OcrProcessor, OutputFormat, ScratchDir, TableExtractor,
};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::ocr::ocr_processor_for;
use crate::office;
use crate::pdf::{self, PdfBackend};
use crate::preprocess;
use crate::standard::{enriched_metadata, StandardConverter};
use crate::tables::TextLayoutTableExtractor;

/// Registry name of the advanced provider.
pub const ADVANCED: &str = "advanced";

/// Collaborators that passed their probes.
struct AdvancedState {
    capabilities: Capabilities,
    delegate_ready: bool,
    pdf: Vec<Arc<dyn PdfBackend>>,
    ocr: Option<Arc<dyn OcrProcessor>>,
    tables: Option<Arc<dyn TableExtractor>>,
    preprocess: bool,
}

impl AdvancedState {
    fn usable(&self) -> bool {
        self.delegate_ready || self.capabilities.any_with_prefix("pdf:")
    }
}

/// Converter adding OCR, table detection and fallback on top of the standard one.
pub struct AdvancedConverter {
    config: ConverterConfig,
    delegate: Option<Arc<StandardConverter>>,
    pdf_candidates: Vec<Arc<dyn PdfBackend>>,
    ocr_candidate: Option<Arc<dyn OcrProcessor>>,
    table_candidate: Option<Arc<dyn TableExtractor>>,
    state: OnceCell<AdvancedState>,
}

impl AdvancedConverter {
    /// Create a converter from configuration.
    ///
    /// A standard delegate is kept when `fallback_to_standard` is set, the OCR
    /// processor comes from `ocr_provider`.
    #[must_use]
    pub fn new(config: ConverterConfig) -> Self {
        let delegate = config
            .fallback_to_standard
            .then(|| Arc::new(StandardConverter::new(config.clone())));
        let pdf_candidates = pdf::default_backends(config.pdf_parser.as_deref());
        let ocr_candidate = if config.enable_ocr {
            ocr_processor_for(&config.ocr_provider)
        } else {
            None
        };
        let table_candidate: Option<Arc<dyn TableExtractor>> = config
            .detect_tables
            .then(|| {
                Arc::new(TextLayoutTableExtractor::new(pdf_candidates.clone()))
                    as Arc<dyn TableExtractor>
            });

        Self {
            config,
            delegate,
            pdf_candidates,
            ocr_candidate,
            table_candidate,
            state: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_delegate(mut self, delegate: Option<Arc<StandardConverter>>) -> Self {
        self.delegate = delegate;
        self
    }

    #[must_use]
    pub fn without_delegate(self) -> Self {
        self.with_delegate(None)
    }

    #[must_use]
    pub fn with_ocr_processor(mut self, processor: Option<Arc<dyn OcrProcessor>>) -> Self {
        self.ocr_candidate = processor;
        self
    }

    #[must_use]
    pub fn with_table_extractor(mut self, extractor: Option<Arc<dyn TableExtractor>>) -> Self {
        self.table_candidate = extractor;
        self
    }

    #[must_use]
    pub fn with_pdf_backends(mut self, backends: Vec<Arc<dyn PdfBackend>>) -> Self {
        self.pdf_candidates = backends;
        self
    }

    async fn state(&self) -> &AdvancedState {
        self.state.get_or_init(|| self.probe()).await
    }

    async fn probe(&self) -> AdvancedState {
        let mut capabilities = Capabilities::new();

        let delegate_ready = match &self.delegate {
            Some(delegate) => delegate.initialize().await,
            None => false,
        };
        capabilities.set("standard_delegate", delegate_ready);

        let candidates = self.pdf_candidates.clone();
        let probed = tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .filter(|backend| backend.probe())
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_else(|e| {
            warn!("PDF backend probing aborted: {}", e);
            Vec::new()
        });
        for backend in &self.pdf_candidates {
            let usable = probed.iter().any(|b| b.name() == backend.name());
            capabilities.set(format!("pdf:{}", backend.name()), usable);
        }

        let mut ocr = None;
        if let Some(processor) = &self.ocr_candidate {
            let usable = processor.is_available().await;
            capabilities.set(format!("ocr:{}", processor.name()), usable);
            if usable {
                ocr = Some(Arc::clone(processor));
            }
        }

        let mut tables = None;
        if let Some(extractor) = &self.table_candidate {
            if extractor.is_available().await {
                tables = Some(Arc::clone(extractor));
            }
        }
        capabilities.set("table_extraction", tables.is_some());

        let preprocess = self.config.preprocess_images && preprocess::is_available();
        capabilities.set("image_preprocessing", preprocess);

        let state = AdvancedState {
            capabilities,
            delegate_ready,
            pdf: probed,
            ocr,
            tables,
            preprocess,
        };
        if state.usable() {
            info!(
                "Advanced converter ready (delegate: {}, OCR: {}, tables: {})",
                state.delegate_ready,
                state.ocr.is_some(),
                state.tables.is_some()
            );
        } else {
            warn!("Advanced converter has neither a standard delegate nor a PDF backend");
        }
        state
    }

    fn ready_delegate(&self, state: &AdvancedState) -> Option<&Arc<StandardConverter>> {
        self.delegate.as_ref().filter(|_| state.delegate_ready)
    }

    async fn run_pipeline(
        &self,
        state: &AdvancedState,
        path: &Path,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, ConversionError> {
        let extension = file_extension(path);
        let category = FileCategory::from_extension(&extension);
        let base = self.extract_metadata(path).await;

        let ocr = if self.config.enable_ocr && options.ocr {
            state.ocr.clone()
        } else {
            None
        };
        let needs_ocr = match (&ocr, category) {
            (Some(processor), Some(FileCategory::Pdf)) => processor.needs_ocr(path).await?,
            _ => false,
        };
        debug!("{:?}: category {:?}, needs OCR: {}", path, category, needs_ocr);

        let result = match (category, ocr) {
            (Some(FileCategory::Pdf), Some(processor)) if needs_ocr => {
                self.ocr_path(state, processor.as_ref(), path, true, options)
                    .await?
            }
            (Some(FileCategory::Pdf), _) => {
                let result = self.text_layer(state, path, options).await?;
                self.with_tables(state, result, path, options).await
            }
            (Some(FileCategory::Image), Some(processor)) => {
                self.ocr_path(state, processor.as_ref(), path, false, options)
                    .await?
            }
            (Some(FileCategory::Image), None) => {
                self.delegate_or_fail(state, path, options, "no OCR processor available".to_string())
                    .await
            }
            (_, _) => {
                let reason = ConversionError::UnsupportedType {
                    extension,
                    mime_type: self.detect_file_type(path),
                };
                self.delegate_or_fail(state, path, options, reason.to_string())
                    .await
            }
        };

        Ok(result
            .merge_metadata(base)
            .with_metadata("needs_ocr", needs_ocr)
            .with_metadata("converter", ADVANCED))
    }

    /// Text layer of a PDF, through the delegate when there is one.
    async fn text_layer(
        &self,
        state: &AdvancedState,
        path: &Path,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, ConversionError> {
        match self.ready_delegate(state) {
            Some(delegate) => Ok(delegate.convert_file(path, options).await),
            None => own_pdf(state, path).await,
        }
    }

    async fn delegate_or_fail(
        &self,
        state: &AdvancedState,
        path: &Path,
        options: &ConvertOptions,
        reason: String,
    ) -> ConversionResult {
        match self.ready_delegate(state) {
            Some(delegate) => delegate.convert_file(path, options).await,
            None => ConversionResult::failure(reason),
        }
    }

    /// OCR into a scratch directory, then read the text of the OCR output.
    async fn ocr_path(
        &self,
        state: &AdvancedState,
        processor: &dyn OcrProcessor,
        path: &Path,
        is_pdf: bool,
        options: &ConvertOptions,
    ) -> Result<ConversionResult, ConversionError> {
        let scratch = ScratchDir::create(
            self.config.temp_dir.as_deref(),
            self.config.cleanup_temp_files,
        )?;

        let mut input = path.to_path_buf();
        if !is_pdf && options.preprocess_images && state.preprocess {
            let source = path.to_path_buf();
            let target = scratch.path().to_path_buf();
            match tokio::task::spawn_blocking(move || preprocess::preprocess_image(&source, &target))
                .await
            {
                Ok(Ok(cleaned)) => input = cleaned,
                Ok(Err(e)) => warn!("Preprocessing {:?} failed, using original: {}", path, e),
                Err(e) => warn!("Preprocessing {:?} aborted, using original: {}", path, e),
            }
        }

        info!("Running OCR ({}) on {:?}", processor.name(), input);
        let outcome = processor
            .process_document(&input, scratch.path(), &OcrOptions::from(options))
            .await;
        if !outcome.success {
            return Err(ConversionError::Ocr(
                outcome
                    .error_message
                    .unwrap_or_else(|| "OCR engine reported a failure".to_string()),
            ));
        }
        let output = outcome.output_path.clone().ok_or_else(|| {
            ConversionError::Ocr("OCR engine reported success without output".to_string())
        })?;

        let result = match self.ready_delegate(state) {
            Some(delegate) => delegate.convert_file(&output, options).await,
            None => own_pdf(state, &output).await?,
        };
        if !result.is_success() {
            return Err(ConversionError::Ocr(format!(
                "text extraction from OCR output failed: {}",
                result.error_message().unwrap_or("unknown error")
            )));
        }

        let mut result = result
            .with_metadata("ocr_processed", true)
            .with_metadata("ocr_processing_time", outcome.processing_time)
            .with_metadata("ocr_provider", processor.name());
        if is_pdf {
            result = self
                .with_tables(state, result, &output, options)
                .await;
        }

        scratch.release();
        Ok(result)
    }

    /// Append detected tables. Never fails the conversion.
    async fn with_tables(
        &self,
        state: &AdvancedState,
        result: ConversionResult,
        source: &Path,
        options: &ConvertOptions,
    ) -> ConversionResult {
        if !options.detect_tables || !result.is_success() {
            return result;
        }
        let Some(extractor) = &state.tables else {
            return result;
        };

        match AssertUnwindSafe(extractor.extract_tables(source))
            .catch_unwind()
            .await
        {
            Ok(Ok(tables)) => append_tables(result, &tables, options.output_format),
            Ok(Err(e)) => {
                warn!("Table extraction failed for {:?}: {}", source, e);
                result
            }
            Err(panic) => {
                warn!(
                    "Table extraction panicked for {:?}: {}",
                    source,
                    panic_message(panic.as_ref())
                );
                result
            }
        }
    }
}

/// Extract a PDF with the converter's own backends.
async fn own_pdf(state: &AdvancedState, path: &Path) -> Result<ConversionResult, ConversionError> {
    let (text, backend) = pdf::extract_with_fallback(&state.pdf, path).await?;
    let mut metadata = Metadata::new();
    metadata.insert("parser".to_string(), Value::from(backend));
    Ok(ConversionResult::success(
        text.joined(),
        metadata,
        text.page_count,
        text.page_count,
    ))
}

/// Append each table between markers and record per-table metrics.
fn append_tables(
    result: ConversionResult,
    tables: &[ExtractedTable],
    format: OutputFormat,
) -> ConversionResult {
    let mut result = result.with_metadata("table_count", tables.len());
    for table in tables {
        let body = match format {
            OutputFormat::Text => table.to_text(),
            OutputFormat::Markdown => table.to_markdown(),
        };
        result = result.append_text(&format!(
            "[TABLE {n} BEGIN]\n{body}\n[TABLE {n} END]",
            n = table.index
        ));
    }
    let summaries: Vec<Value> = tables.iter().map(ExtractedTable::summary).collect();
    result.with_metadata("tables", summaries)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with non-string payload".to_string()
    }
}

#[async_trait]
impl DocumentConverter for AdvancedConverter {
    fn provider_name(&self) -> &str {
        ADVANCED
    }

    async fn initialize(&self) -> bool {
        self.state().await.usable()
    }

    fn is_initialized(&self) -> bool {
        self.state.initialized()
    }

    fn capabilities(&self) -> Capabilities {
        self.state
            .get()
            .map(|state| state.capabilities.clone())
            .unwrap_or_default()
    }

    fn config(&self) -> &ConverterConfig {
        &self.config
    }

    async fn convert_file(&self, path: &Path, options: &ConvertOptions) -> ConversionResult {
        let started = Instant::now();
        if !path.exists() {
            return ConversionResult::failure(
                ConversionError::NotFound(path.to_path_buf()).to_string(),
            )
            .with_processing_time(started.elapsed().as_secs_f64());
        }
        if !self.initialize().await {
            return ConversionResult::failure(
                ConversionError::NotInitialized(
                    "neither a standard delegate nor a PDF backend is usable".to_string(),
                )
                .to_string(),
            )
            .with_processing_time(started.elapsed().as_secs_f64());
        }
        let state = self.state().await;

        let attempt = AssertUnwindSafe(self.run_pipeline(state, path, options))
            .catch_unwind()
            .await;
        let fault = match attempt {
            Ok(Ok(result)) => {
                return result.with_processing_time(started.elapsed().as_secs_f64());
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };
        error!("Advanced conversion of {:?} failed: {}", path, fault);

        let result = match self.ready_delegate(state) {
            Some(delegate) => {
                warn!("Falling back to the standard converter for {:?}", path);
                delegate
                    .convert_file(path, options)
                    .await
                    .with_metadata("fallback_used", true)
                    .with_metadata("fallback_reason", fault)
            }
            None => ConversionResult::failure(fault),
        };
        result.with_processing_time(started.elapsed().as_secs_f64())
    }

    async fn extract_metadata(&self, path: &Path) -> Metadata {
        let office = office::default_backends(self.config.office_parser.as_deref());
        enriched_metadata(path, office).await
    }

    fn supported_file_types(&self) -> Vec<String> {
        let Some(state) = self.state.get() else {
            return Vec::new();
        };
        let mut types: Vec<String> = match self.ready_delegate(state) {
            Some(delegate) => delegate.supported_file_types(),
            None => Vec::new(),
        };
        let mut add = |extensions: &[&str]| {
            for ext in extensions {
                if !types.iter().any(|t| t == ext) {
                    types.push((*ext).to_string());
                }
            }
        };
        if !state.pdf.is_empty() {
            add(FileCategory::PDF_EXTENSIONS);
        }
        if state.ocr.is_some() {
            add(FileCategory::IMAGE_EXTENSIONS);
        }
        types
    }
}
