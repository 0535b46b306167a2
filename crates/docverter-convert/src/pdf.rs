//! PDF text extraction backends.
//!
//! pdf-extract is preferred for text, lopdf is the structural fallback and is
//! also used for page counts, document info and the text-layer check.
//! Enable the `pdf_oxide` feature to put pdf_oxide in front of both.

use docverter_core::{ConversionError, Metadata};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde_json::Value;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Text of a PDF, one entry per page when the backend can split pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfText {
    pub pages: Vec<String>,
    pub page_count: u32,
}

impl PdfText {
    /// Non-empty pages joined by blank lines.
    #[must_use]
    pub fn joined(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A PDF text extraction library.
///
/// Extraction is blocking; callers run it on the blocking pool.
pub trait PdfBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, path: &Path) -> Result<PdfText, ConversionError>;

    /// Extract a generated one-page document; any error or panic means unusable.
    fn probe(&self) -> bool {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| -> Result<bool, ConversionError> {
            let bytes = render_text_pdf(&["probe"])?;
            let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(self.extract(file.path())?.page_count == 1)
        }));
        match outcome {
            Ok(Ok(usable)) => usable,
            Ok(Err(e)) => {
                debug!("PDF backend {} failed its probe: {}", self.name(), e);
                false
            }
            Err(_) => {
                debug!("PDF backend {} panicked during its probe", self.name());
                false
            }
        }
    }
}

/// Extractor built on lopdf's content stream decoder.
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, path: &Path) -> Result<PdfText, ConversionError> {
        let doc = load_document(path)?;
        let pages = page_texts(&doc);
        let page_count = to_u32(pages.len());
        Ok(PdfText { pages, page_count })
    }
}

/// Extractor built on pdf-extract, one string per page.
pub struct PdfExtractBackend;

impl PdfBackend for PdfExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, path: &Path) -> Result<PdfText, ConversionError> {
        let bytes = std::fs::read(path)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| ConversionError::Parse(format!("pdf-extract: {e}")))?;
        let page_count = to_u32(pages.len());
        Ok(PdfText { pages, page_count })
    }
}

/// Extractor built on pdf_oxide.
///
/// Enable with: `cargo build --features pdf_oxide`
#[cfg(feature = "pdf_oxide")]
pub struct PdfOxideBackend;

#[cfg(feature = "pdf_oxide")]
impl PdfBackend for PdfOxideBackend {
    fn name(&self) -> &'static str {
        "pdf_oxide"
    }

    fn extract(&self, path: &Path) -> Result<PdfText, ConversionError> {
        use pdf_oxide::PdfDocument;

        let mut doc = PdfDocument::open(path)
            .map_err(|e| ConversionError::Parse(format!("pdf_oxide: failed to open PDF: {e}")))?;
        let page_count = doc
            .page_count()
            .map_err(|e| ConversionError::Parse(format!("pdf_oxide: failed to get page count: {e}")))?;

        let mut pages = Vec::with_capacity(page_count);
        for page_idx in 0..page_count {
            match doc.extract_text(page_idx) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    debug!("pdf_oxide: no text on page {}: {}", page_idx + 1, e);
                    pages.push(String::new());
                }
            }
        }
        Ok(PdfText {
            pages,
            page_count: to_u32(page_count),
        })
    }
}

/// All compiled-in backends, `preferred` first when it names one of them.
#[must_use]
pub fn default_backends(preferred: Option<&str>) -> Vec<Arc<dyn PdfBackend>> {
    let mut backends: Vec<Arc<dyn PdfBackend>> = Vec::new();
    #[cfg(feature = "pdf_oxide")]
    backends.push(Arc::new(PdfOxideBackend));
    backends.push(Arc::new(PdfExtractBackend));
    backends.push(Arc::new(LopdfBackend));

    if let Some(name) = preferred {
        match backends.iter().position(|b| b.name().eq_ignore_ascii_case(name)) {
            Some(pos) => {
                let backend = backends.remove(pos);
                backends.insert(0, backend);
            }
            None => warn!("Unknown PDF parser '{}', using default order", name),
        }
    }
    backends
}

/// Try each backend in order until one extracts the document.
///
/// Errors and panics of a backend move on to the next one.
pub async fn extract_with_fallback(
    backends: &[Arc<dyn PdfBackend>],
    path: &Path,
) -> Result<(PdfText, &'static str), ConversionError> {
    if backends.is_empty() {
        return Err(ConversionError::NoPdfBackend(
            "no backend passed its probe".to_string(),
        ));
    }

    let mut failures = Vec::new();
    for backend in backends {
        let name = backend.name();
        let task_backend = Arc::clone(backend);
        let task_path: PathBuf = path.to_path_buf();

        match tokio::task::spawn_blocking(move || task_backend.extract(&task_path)).await {
            Ok(Ok(text)) => {
                debug!("{} extracted {} pages from {:?}", name, text.page_count, path);
                return Ok((text, name));
            }
            Ok(Err(e)) => {
                warn!("PDF backend {} failed on {:?}: {}", name, path, e);
                failures.push(format!("{name}: {e}"));
            }
            Err(e) => {
                warn!("PDF backend {} aborted on {:?}: {}", name, path, e);
                failures.push(format!("{name}: {e}"));
            }
        }
    }
    Err(ConversionError::NoPdfBackend(failures.join("; ")))
}

// ============================================================================
// lopdf helpers
// ============================================================================

fn load_document(path: &Path) -> Result<Document, ConversionError> {
    Document::load(path).map_err(|e| ConversionError::Parse(format!("lopdf: {e}")))
}

/// Per-page text; pages whose content cannot be decoded come back empty.
fn page_texts(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .keys()
        .map(|page_num| {
            doc.extract_text(&[*page_num]).unwrap_or_else(|e| {
                debug!("No text layer on page {}: {}", page_num, e);
                String::new()
            })
        })
        .collect()
}

/// Per-page text layer of a PDF file.
pub fn read_page_texts(path: &Path) -> Result<Vec<String>, ConversionError> {
    load_document(path).map(|doc| page_texts(&doc))
}

/// Page count, version and document info fields.
pub fn pdf_metadata(path: &Path) -> Result<Metadata, ConversionError> {
    let doc = load_document(path)?;
    let mut metadata = Metadata::new();
    metadata.insert(
        "page_count".to_string(),
        Value::from(doc.get_pages().len()),
    );
    metadata.insert("pdf_version".to_string(), Value::from(doc.version.clone()));

    if let Some(info) = info_dictionary(&doc) {
        for (key, field) in [
            ("title", b"Title".as_slice()),
            ("author", b"Author".as_slice()),
            ("subject", b"Subject".as_slice()),
            ("producer", b"Producer".as_slice()),
            ("creator", b"Creator".as_slice()),
        ] {
            if let Some(value) = info.get(field).ok().and_then(decode_pdf_string) {
                metadata.insert(key.to_string(), Value::from(value));
            }
        }
    }
    Ok(metadata)
}

fn info_dictionary(doc: &Document) -> Option<&lopdf::Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise single-byte).
fn decode_pdf_string(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    let text = if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| char::from(b)).collect()
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ============================================================================
// Document generation
// ============================================================================

/// Render a simple PDF with one page per entry, lines split on `\n`.
///
/// An empty entry yields a page without any text layer.
pub fn render_text_pdf(pages: &[&str]) -> Result<Vec<u8>, ConversionError> {
    let encode_err = |e: lopdf::Error| ConversionError::Failed(format!("PDF generation: {e}"));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: page_operations(page),
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(encode_err)?,
        ));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ConversionError::Failed(format!("PDF generation: {e}")))?;
    Ok(bytes)
}

/// One text object per line so every extractor sees a line break.
fn page_operations(text: &str) -> Vec<Operation> {
    let mut ops = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let y = 770 - 16 * i64::try_from(idx).unwrap_or(0);
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ]);
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_pdf(dir: &Path, name: &str, pages: &[&str]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, render_text_pdf(pages).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_joined_skips_empty_pages() {
        let text = PdfText {
            pages: vec!["one".to_string(), "  ".to_string(), "three\n".to_string()],
            page_count: 3,
        };
        assert_eq!(text.joined(), "one\n\nthree");
    }

    #[test]
    fn test_lopdf_extracts_pages() {
        let dir = tempdir().unwrap();
        let path = write_pdf(dir.path(), "doc.pdf", &["Alpha page", "Bravo page"]);

        let text = LopdfBackend.extract(&path).unwrap();
        assert_eq!(text.page_count, 2);
        assert!(text.pages[0].contains("Alpha"));
        assert!(text.pages[1].contains("Bravo"));
    }

    #[test]
    fn test_blank_page_has_no_text() {
        let dir = tempdir().unwrap();
        let path = write_pdf(dir.path(), "blank.pdf", &[""]);
        let pages = read_page_texts(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].trim().is_empty());
    }

    #[test]
    fn test_pdf_extract_splits_pages() {
        let dir = tempdir().unwrap();
        let path = write_pdf(
            dir.path(),
            "three.pdf",
            &["Opening remarks end here.", "Second page begins", "Closing page"],
        );

        let text = PdfExtractBackend.extract(&path).unwrap();
        assert_eq!(text.page_count, 3);
        assert_eq!(text.pages.len(), 3);
        assert!(text.pages[0].contains("Opening remarks end here."));
        assert!(!text.pages[0].contains("Second"));
        assert!(text.pages[1].contains("Second page begins"));
        assert!(!text.pages[1].contains("Closing"));
        assert!(text.pages[2].contains("Closing page"));

        let joined = text.joined();
        assert!(joined.contains("here.\n\nSecond"));
        assert!(!joined.contains("here.Second"));
    }

    #[test]
    fn test_pdf_extract_probe() {
        assert!(PdfExtractBackend.probe());
    }

    #[test]
    fn test_invalid_pdf_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(
            LopdfBackend.extract(&path),
            Err(ConversionError::Parse(_))
        ));
    }

    #[test]
    fn test_lopdf_probe() {
        assert!(LopdfBackend.probe());
    }

    #[test]
    fn test_default_backend_order() {
        let names: Vec<_> = default_backends(None).iter().map(|b| b.name()).collect();
        let extract_pos = names.iter().position(|n| *n == "pdf-extract").unwrap();
        let lopdf_pos = names.iter().position(|n| *n == "lopdf").unwrap();
        assert!(extract_pos < lopdf_pos);
    }

    #[test]
    fn test_preferred_backend_first() {
        let backends = default_backends(Some("LOPDF"));
        assert_eq!(backends[0].name(), "lopdf");

        let unknown = default_backends(Some("nope"));
        assert_eq!(unknown.len(), default_backends(None).len());
    }

    #[test]
    fn test_pdf_metadata() {
        let dir = tempdir().unwrap();
        let path = write_pdf(dir.path(), "meta.pdf", &["x", "y"]);
        let meta = pdf_metadata(&path).unwrap();
        assert_eq!(meta["page_count"], 2);
        assert_eq!(meta["pdf_version"], "1.5");
    }

    #[test]
    fn test_decode_pdf_string() {
        let utf16 = Object::String(vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0xE9], lopdf::StringFormat::Literal);
        assert_eq!(decode_pdf_string(&utf16).as_deref(), Some("Hé"));

        let latin = Object::String(b"Report".to_vec(), lopdf::StringFormat::Literal);
        assert_eq!(decode_pdf_string(&latin).as_deref(), Some("Report"));

        assert!(decode_pdf_string(&Object::Integer(3)).is_none());
    }

    struct FailingBackend;

    impl PdfBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _path: &Path) -> Result<PdfText, ConversionError> {
            Err(ConversionError::Parse("corrupt xref".to_string()))
        }
    }

    struct PanickingBackend;

    impl PdfBackend for PanickingBackend {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn extract(&self, _path: &Path) -> Result<PdfText, ConversionError> {
            panic!("backend bug")
        }
    }

    #[test]
    fn test_failing_backends_fail_probe() {
        assert!(!FailingBackend.probe());
        assert!(!PanickingBackend.probe());
    }

    #[tokio::test]
    async fn test_fallback_skips_failing_and_panicking_backends() {
        let dir = tempdir().unwrap();
        let path = write_pdf(dir.path(), "doc.pdf", &["Charlie"]);
        let backends: Vec<Arc<dyn PdfBackend>> = vec![
            Arc::new(PanickingBackend),
            Arc::new(FailingBackend),
            Arc::new(LopdfBackend),
        ];

        let (text, used) = extract_with_fallback(&backends, &path).await.unwrap();
        assert_eq!(used, "lopdf");
        assert!(text.joined().contains("Charlie"));
    }

    #[tokio::test]
    async fn test_all_backends_failing() {
        let dir = tempdir().unwrap();
        let path = write_pdf(dir.path(), "doc.pdf", &["x"]);
        let backends: Vec<Arc<dyn PdfBackend>> = vec![Arc::new(FailingBackend)];

        let err = extract_with_fallback(&backends, &path).await.unwrap_err();
        assert!(matches!(err, ConversionError::NoPdfBackend(_)));
        assert!(err.to_string().contains("corrupt xref"));

        let err = extract_with_fallback(&[], &path).await.unwrap_err();
        assert!(err.to_string().contains("no PDF backend available/succeeded"));
    }
}
