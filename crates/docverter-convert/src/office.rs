//! Office document extraction.

use docverter_core::{render_markdown_table, ConversionError, OutputFormat};
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Paragraphs and tables of an office document, in reading order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfficeDocument {
    pub paragraphs: Vec<String>,
    /// Tables as rows of cell texts
    pub tables: Vec<Vec<Vec<String>>>,
}

impl OfficeDocument {
    /// Paragraph text followed by every table.
    ///
    /// Plain output renders rows as `cell | cell`; Markdown output renders
    /// pipe tables.
    #[must_use]
    pub fn render(&self, format: OutputFormat) -> String {
        let mut blocks: Vec<String> = Vec::new();
        if !self.paragraphs.is_empty() {
            blocks.push(self.paragraphs.join("\n"));
        }
        for table in self.tables.iter().filter(|t| !t.is_empty()) {
            let rendered = match format {
                OutputFormat::Text => table
                    .iter()
                    .map(|row| row.join(" | "))
                    .collect::<Vec<_>>()
                    .join("\n"),
                OutputFormat::Markdown => render_markdown_table(table),
            };
            blocks.push(rendered);
        }
        blocks.join("\n\n")
    }

    #[must_use]
    pub fn table_row_count(&self) -> usize {
        self.tables.iter().map(Vec::len).sum()
    }
}

/// An office format parser. Parsing is blocking.
pub trait OfficeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extensions(&self) -> &[&str];

    fn extract(&self, path: &Path) -> Result<OfficeDocument, ConversionError>;

    /// Parse a generated document of the first supported extension.
    ///
    /// Any error, panic or missing sample text means unusable.
    fn probe(&self) -> bool {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| -> Result<bool, ConversionError> {
            let extension = self.extensions().first().copied().unwrap_or_default();
            let bytes = sample_document(extension, SAMPLE_TEXT)?;
            let mut file = tempfile::Builder::new()
                .suffix(&format!(".{extension}"))
                .tempfile()?;
            file.write_all(&bytes)?;
            file.flush()?;
            let document = self.extract(file.path())?;
            Ok(document.paragraphs.iter().any(|p| p.contains(SAMPLE_TEXT)))
        }));
        match outcome {
            Ok(Ok(usable)) => usable,
            Ok(Err(e)) => {
                debug!("Office backend {} failed its probe: {}", self.name(), e);
                false
            }
            Err(_) => {
                debug!("Office backend {} panicked during its probe", self.name());
                false
            }
        }
    }
}

const SAMPLE_TEXT: &str = "Capability check";

/// A one-paragraph document in the given format.
#[cfg_attr(not(feature = "office"), allow(unused_variables))]
fn sample_document(extension: &str, text: &str) -> Result<Vec<u8>, ConversionError> {
    match extension {
        #[cfg(feature = "office")]
        "docx" => render_docx(&[text]),
        other => Err(ConversionError::UnsupportedType {
            extension: other.to_string(),
            mime_type: "application/octet-stream".to_string(),
        }),
    }
}

/// Render a DOCX file with one paragraph per entry.
#[cfg(feature = "office")]
pub fn render_docx(paragraphs: &[&str]) -> Result<Vec<u8>, ConversionError> {
    let mut docx = docx_rs::Docx::new();
    for text in paragraphs {
        docx = docx.add_paragraph(
            docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*text)),
        );
    }
    let mut buffer = std::io::Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ConversionError::Failed(format!("docx-rs: {e}")))?;
    Ok(buffer.into_inner())
}

/// DOCX parser built on docx-rs.
#[cfg(feature = "office")]
pub struct DocxBackend;

#[cfg(feature = "office")]
impl OfficeBackend for DocxBackend {
    fn name(&self) -> &'static str {
        "docx-rs"
    }

    fn extensions(&self) -> &[&str] {
        &["docx"]
    }

    fn extract(&self, path: &Path) -> Result<OfficeDocument, ConversionError> {
        let bytes = std::fs::read(path)?;
        let docx = docx_rs::read_docx(&bytes)
            .map_err(|e| ConversionError::Parse(format!("docx-rs: {e}")))?;

        let mut document = OfficeDocument::default();
        for child in &docx.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(para) => {
                    let text = paragraph_text(para);
                    if !text.trim().is_empty() {
                        document.paragraphs.push(text);
                    }
                }
                docx_rs::DocumentChild::Table(table) => {
                    document.tables.push(table_rows(table));
                }
                _ => {}
            }
        }
        Ok(document)
    }
}

#[cfg(feature = "office")]
fn table_rows(table: &docx_rs::Table) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row in &table.rows {
        match row {
            docx_rs::TableChild::TableRow(tr) => {
                let mut cells = Vec::new();
                for cell in &tr.cells {
                    match cell {
                        docx_rs::TableRowChild::TableCell(tc) => {
                            let texts: Vec<String> = tc
                                .children
                                .iter()
                                .filter_map(|content| match content {
                                    docx_rs::TableCellContent::Paragraph(p) => {
                                        Some(paragraph_text(p))
                                    }
                                    _ => None,
                                })
                                .filter(|t| !t.is_empty())
                                .collect();
                            cells.push(texts.join(" "));
                        }
                    }
                }
                if cells.iter().any(|c| !c.is_empty()) {
                    rows.push(cells);
                }
            }
        }
    }
    rows
}

#[cfg(feature = "office")]
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run_text(&mut text, run),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for child in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        push_run_text(&mut text, run);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

#[cfg(feature = "office")]
fn push_run_text(text: &mut String, run: &docx_rs::Run) {
    for child in &run.children {
        if let docx_rs::RunChild::Text(t) = child {
            text.push_str(&t.text);
        }
    }
}

/// Compiled-in office backends, `preferred` first when it names one of them.
#[must_use]
pub fn default_backends(preferred: Option<&str>) -> Vec<Arc<dyn OfficeBackend>> {
    #[allow(unused_mut)]
    let mut backends: Vec<Arc<dyn OfficeBackend>> = Vec::new();
    #[cfg(feature = "office")]
    backends.push(Arc::new(DocxBackend));

    if let Some(name) = preferred {
        match backends.iter().position(|b| b.name().eq_ignore_ascii_case(name)) {
            Some(pos) => {
                let backend = backends.remove(pos);
                backends.insert(0, backend);
            }
            None => warn!("Unknown office parser '{}', using default order", name),
        }
    }
    backends
}
