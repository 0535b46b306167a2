//! HTML text extraction.

use docverter_core::ConversionError;
use std::panic::AssertUnwindSafe;
use tracing::debug;

const SAMPLE_MARKUP: &str =
    "<html><head><style>p { margin: 0 }</style></head><body><p>Capability check</p></body></html>";

/// Turns markup into visible text.
pub trait HtmlBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, html: &str) -> Result<String, ConversionError>;

    /// Extract a small page; the visible text must come back without the styles.
    fn probe(&self) -> bool {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.extract(SAMPLE_MARKUP))) {
            Ok(Ok(text)) => text.contains("Capability check") && !text.contains("margin"),
            Ok(Err(e)) => {
                debug!("HTML backend {} failed its probe: {}", self.name(), e);
                false
            }
            Err(_) => {
                debug!("HTML backend {} panicked during its probe", self.name());
                false
            }
        }
    }
}

/// Elements whose content is never shown.
#[cfg(feature = "html")]
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line of text.
#[cfg(feature = "html")]
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "header", "footer", "table", "ul", "ol", "pre", "blockquote", "title",
];

/// HTML backend built on scraper.
#[cfg(feature = "html")]
pub struct ScraperHtml;

#[cfg(feature = "html")]
impl HtmlBackend for ScraperHtml {
    fn name(&self) -> &'static str {
        "scraper"
    }

    fn extract(&self, html: &str) -> Result<String, ConversionError> {
        let document = scraper::Html::parse_document(html);
        let mut raw = String::new();
        collect_visible_text(document.root_element(), &mut raw);
        Ok(collapse_blank_lines(&raw))
    }
}

#[cfg(feature = "html")]
fn collect_visible_text(element: scraper::ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = scraper::ElementRef::wrap(child) {
            let name = child_element.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_visible_text(child_element, out);
            if block {
                out.push('\n');
            }
        }
    }
}

/// Trim every line and drop the empty ones.
#[must_use]
pub fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The HTML backend compiled into this build, if any.
#[must_use]
pub fn default_backend() -> Option<std::sync::Arc<dyn HtmlBackend>> {
    #[cfg(feature = "html")]
    {
        Some(std::sync::Arc::new(ScraperHtml))
    }
    #[cfg(not(feature = "html"))]
    {
        None
    }
}
