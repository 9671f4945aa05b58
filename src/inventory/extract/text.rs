use crate::document;
use crate::document::Document;
use crate::document::Table;
use crate::error::InventoryError;
use crate::inventory::extract::HostnameSource;
use crate::inventory::hostname::HostnameNormalizer;
use crate::inventory::hostname::HostnameSet;
use crate::inventory::hostname::DEFAULT_HINT;
use crate::inventory::RawDocument;
use tracing::debug;
use tracing::info;

/// Length of the prefix compared when stitching split tables
const CONTINUATION_PREFIX: usize = 4;

/// Hostnames from the tables of a word-processor or PDF document, falling
/// back to marker lines in the text.
pub(crate) struct DocumentSource<'a> {
    pub(crate) normalizer: &'a HostnameNormalizer,
    /// Prioritized header substrings, lowercase without spaces
    pub(crate) headers: &'a [String],
    /// Lowercase marker phrase of the text fallback
    pub(crate) marker: &'a str,
}

/// Host column of a table and the header candidate it matched
#[derive(Clone, Debug, PartialEq)]
struct HostColumn {
    col: usize,
    hint: String,
}

impl HostnameSource for DocumentSource<'_> {
    fn hostnames(&self, document: &RawDocument) -> Result<HostnameSet, InventoryError> {
        let parsed = document::open(&document.path)?;
        let name = document.path.display();

        let hostnames = self.from_tables(&parsed);
        info!("Found {} hostnames in tables in {}", hostnames.len(), name);
        if !hostnames.is_empty() {
            return Ok(hostnames);
        }

        let hostnames = self.from_text(&parsed);
        info!("Found {} hostnames in text in {}", hostnames.len(), name);
        Ok(hostnames)
    }
}

impl DocumentSource<'_> {
    /// Collects the host column of every table. A table without a header of
    /// its own continues the previous one when its first value shares a
    /// prefix with the last hostname collected.
    fn from_tables(&self, document: &Document) -> HostnameSet {
        let mut collected = Vec::<String>::new();
        let mut previous = None::<HostColumn>;

        for table in document.tables() {
            let (column, first_row) = match (self.find_host_column(table), previous.take()) {
                (Some((header_row, column)), _) => (column, header_row + 1),
                (None, None) => continue,
                (None, Some(column)) => match self.continues(table, &column, collected.last()) {
                    Some(true) => (column, 0),
                    Some(false) => continue,
                    None => {
                        previous = Some(column);
                        continue;
                    }
                },
            };

            for row in first_row..table.row_count() {
                // Merged cells cannot be read, the row is skipped
                if let Ok(text) = table.cell(row, column.col) {
                    collected.extend(self.normalizer.clean(text, &column.hint));
                }
            }
            previous = Some(column);
        }

        collected.into_iter().collect()
    }

    /// Whether a header-less table continues the previous host column.
    /// `None` when the table cannot be tested; it is skipped and the chain
    /// stays open for the next table.
    fn continues(&self, table: &Table, column: &HostColumn, last: Option<&String>) -> Option<bool> {
        let Some(last) = last else {
            return Some(false);
        };
        if table.column_count() <= column.col || table.row_count() == 0 {
            return None;
        }

        // The first row may be short or merged
        let text = table.cell(0, column.col).or_else(|_| table.cell(1, column.col)).ok()?;
        let first = self.normalizer.clean(text, &column.hint).into_iter().next()?;
        let is_continuation = prefix(&first) == prefix(last);
        debug!("Table starting with '{}' continues '{}': {}", first, last, is_continuation);
        Some(is_continuation)
    }

    /// Finds the first cell, row by row, containing a header candidate
    fn find_host_column(&self, table: &Table) -> Option<(usize, HostColumn)> {
        for row in 0..table.row_count() {
            for col in 0..table.column_count() {
                let Ok(text) = table.cell(row, col) else {
                    continue;
                };
                let text = text.to_lowercase().replace(' ', "");
                if let Some(header) = self.headers.iter().find(|header| text.contains(header.as_str())) {
                    debug!("Found header {} at ({}, {})", header, row, col);
                    return Some((row, HostColumn { col, hint: header.to_owned() }));
                }
            }
        }
        None
    }

    /// Last word of every line, table cells included, containing the marker phrase
    fn from_text(&self, document: &Document) -> HostnameSet {
        document
            .text_lines()
            .map(|paragraph| paragraph.trim().to_lowercase())
            .filter(|paragraph| paragraph.contains(self.marker))
            .filter_map(|paragraph| paragraph.split_whitespace().last().map(|word| self.normalizer.clean(word, DEFAULT_HINT)))
            .flatten()
            .collect()
    }
}

fn prefix(value: &str) -> String {
    value.chars().take(CONTINUATION_PREFIX).collect()
}
