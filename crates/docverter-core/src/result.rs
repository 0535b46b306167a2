//! The outcome of a single document conversion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Metadata;

/// Outcome of converting one document.
///
/// A converter builds the result once. The orchestration layer may still
/// merge metadata or restamp timing through the consuming `with_*` methods
/// before handing it to the caller; after that it is read-only.
///
/// When the text is non-empty the metadata always carries `length`,
/// `word_count`, `line_count` and `pages_processed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    success: bool,
    text: Option<String>,
    metadata: Metadata,
    pages_processed: u32,
    total_pages: u32,
    processing_time: f64,
    error_message: Option<String>,
}

/// Flat, serializable view of a [`ConversionResult`] without the text body.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub success: bool,
    pub text_length: usize,
    pub pages_processed: u32,
    pub total_pages: u32,
    pub completion_percentage: f64,
    pub processing_time: f64,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConversionResult {
    /// Build a result and derive text statistics.
    #[must_use]
    pub fn new(
        success: bool,
        text: Option<String>,
        metadata: Metadata,
        pages_processed: u32,
        total_pages: u32,
        error_message: Option<String>,
    ) -> Self {
        let mut result = Self {
            success,
            text,
            metadata,
            pages_processed,
            total_pages,
            processing_time: 0.0,
            error_message,
        };
        result.derive_stats();
        result
    }

    /// A successful conversion.
    #[must_use]
    pub fn success(
        text: impl Into<String>,
        metadata: Metadata,
        pages_processed: u32,
        total_pages: u32,
    ) -> Self {
        Self::new(
            true,
            Some(text.into()),
            metadata,
            pages_processed,
            total_pages,
            None,
        )
    }

    /// A failed conversion. The message is never left empty.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "conversion failed".to_string();
        }
        Self::new(false, None, Metadata::new(), 0, 0, Some(message))
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn pages_processed(&self) -> u32 {
        self.pages_processed
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Wall-clock seconds spent on the conversion.
    pub fn processing_time(&self) -> f64 {
        self.processing_time
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Take the text out of the result.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        self.text
    }

    /// Set one metadata entry, replacing any previous value.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Merge a metadata map; entries in `extra` win over existing ones.
    #[must_use]
    pub fn merge_metadata(mut self, extra: Metadata) -> Self {
        for (key, value) in extra {
            self.metadata.insert(key, value);
        }
        self
    }

    /// Set the processing time in seconds. Negative values clamp to zero.
    #[must_use]
    pub fn with_processing_time(mut self, seconds: f64) -> Self {
        self.processing_time = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.metadata
            .insert("processing_time".to_string(), Value::from(self.processing_time));
        self
    }

    /// Append a block of text separated by a blank line and refresh the statistics.
    #[must_use]
    pub fn append_text(mut self, block: &str) -> Self {
        if block.is_empty() {
            return self;
        }
        let text = self.text.get_or_insert_with(String::new);
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(block);
        self.derive_stats();
        self
    }

    /// Share of pages processed, in percent.
    ///
    /// With no known page count a successful conversion counts as complete and
    /// a failed one as not started.
    #[must_use]
    pub fn completion_percentage(&self) -> f64 {
        if self.total_pages == 0 {
            return if self.success { 100.0 } else { 0.0 };
        }
        f64::from(self.pages_processed) / f64::from(self.total_pages) * 100.0
    }

    /// Text shortened to about `max_length` characters.
    ///
    /// Long texts are cut at a word boundary when one exists in the second half
    /// of the window and are suffixed with the total character count.
    #[must_use]
    pub fn text_preview(&self, max_length: usize) -> String {
        let Some(text) = self.text.as_deref() else {
            return String::new();
        };
        let total = text.chars().count();
        if total <= max_length {
            return text.to_string();
        }

        let cut: String = text.chars().take(max_length).collect();
        let next_is_space = text
            .chars()
            .nth(max_length)
            .is_some_and(char::is_whitespace);

        let shortened = if next_is_space {
            cut.trim_end()
        } else {
            match cut.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
                Some((idx, _)) if cut[..idx].chars().count() >= max_length / 2 => {
                    cut[..idx].trim_end()
                }
                _ => cut.as_str(),
            }
        };

        format!("{shortened}... [{total} characters total]")
    }

    /// Summary of the result without the text body.
    #[must_use]
    pub fn to_summary(&self) -> ConversionSummary {
        ConversionSummary {
            success: self.success,
            text_length: self.text.as_deref().map_or(0, |t| t.chars().count()),
            pages_processed: self.pages_processed,
            total_pages: self.total_pages,
            completion_percentage: self.completion_percentage(),
            processing_time: self.processing_time,
            metadata: self.metadata.clone(),
            error_message: self.error_message.clone(),
        }
    }

    fn derive_stats(&mut self) {
        let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) else {
            return;
        };
        let stats = [
            ("length", text.chars().count()),
            ("word_count", text.split_whitespace().count()),
            ("line_count", text.split('\n').count()),
        ];
        for (key, value) in stats {
            self.metadata.insert(key.to_string(), Value::from(value));
        }
        self.metadata.insert(
            "pages_processed".to_string(),
            Value::from(self.pages_processed),
        );
    }
}
