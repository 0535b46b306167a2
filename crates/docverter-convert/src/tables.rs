//! Table detection from the text layout of PDF pages.
//!
//! A table is a run of consecutive lines that split into at least two cells,
//! where cells are separated by pipes, tabs or runs of two or more spaces.

use async_trait::async_trait;
use docverter_core::{ConversionError, ExtractedTable, TableExtractor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::pdf::{extract_with_fallback, PdfBackend};

/// Fewest rows a block needs to count as a table.
pub const MIN_TABLE_ROWS: usize = 2;

/// Table extractor working on extracted page text.
pub struct TextLayoutTableExtractor {
    backends: Vec<Arc<dyn PdfBackend>>,
}

impl TextLayoutTableExtractor {
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn PdfBackend>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl TableExtractor for TextLayoutTableExtractor {
    fn name(&self) -> &str {
        "text-layout"
    }

    async fn is_available(&self) -> bool {
        !self.backends.is_empty()
    }

    async fn extract_tables(&self, path: &Path) -> Result<Vec<ExtractedTable>, ConversionError> {
        let (text, backend) = extract_with_fallback(&self.backends, path).await?;
        let mut tables = Vec::new();
        for (page_idx, page) in text.pages.iter().enumerate() {
            let page_no = u32::try_from(page_idx + 1).unwrap_or(u32::MAX);
            for cells in detect_table_blocks(page) {
                tables.push(build_table(tables.len() + 1, page_no, cells));
            }
        }
        debug!(
            "Found {} tables in {:?} using {} text",
            tables.len(),
            path,
            backend
        );
        Ok(tables)
    }
}

/// Split one line into cells; fewer than two cells means not a table row.
#[must_use]
pub fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let raw: Vec<&str> = if line.contains('|') {
        line.trim_matches('|').split('|').collect()
    } else if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split("  ").collect()
    };
    raw.into_iter()
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|cell| cell.chars().all(|c| matches!(c, '-' | ':' | '=' | '+')))
}

/// Blocks of consecutive multi-cell lines, separator rows dropped.
#[must_use]
pub fn detect_table_blocks(page: &str) -> Vec<Vec<Vec<String>>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in page.lines() {
        let cells = split_cells(line);
        if cells.len() >= 2 {
            if !is_separator_row(&cells) {
                current.push(cells);
            }
            continue;
        }
        if current.len() >= MIN_TABLE_ROWS {
            blocks.push(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= MIN_TABLE_ROWS {
        blocks.push(current);
    }
    blocks
}

/// Column count is the most frequent row width; confidence is the share of
/// rows with that width.
fn build_table(index: usize, page: u32, cells: Vec<Vec<String>>) -> ExtractedTable {
    let mut widths: HashMap<usize, usize> = HashMap::new();
    for row in &cells {
        *widths.entry(row.len()).or_default() += 1;
    }
    let (columns, matching) = widths
        .into_iter()
        .max_by_key(|&(width, count)| (count, width))
        .unwrap_or((0, 0));

    #[allow(clippy::cast_precision_loss)]
    let confidence = if cells.is_empty() {
        0.0
    } else {
        matching as f64 / cells.len() as f64
    };

    ExtractedTable {
        index,
        page,
        rows: cells.len(),
        columns,
        confidence,
        cells,
    }
}
