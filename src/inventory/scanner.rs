//! Header detection and row validation for raw tables.

use crate::inventory::normalize_all;
use crate::spreadsheet::CellValue;
use std::collections::HashSet;
use tracing::warn;

/// A table with a discovered header row. Every row has exactly as many
/// cells as there are headers.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Index of the first column whose header equals `header`
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|name| name == header)
    }

    /// Non-blank values of a column
    pub fn values(&self, col: usize) -> impl Iterator<Item = &CellValue> {
        self.rows.iter().filter_map(move |row| row.get(col)).filter(|value| !value.is_blank())
    }
}

#[derive(Clone, Debug)]
pub struct TableScanner {
    excluded_sheets: Vec<String>,
    excluded_row_prefixes: Vec<String>,
    min_header_values: usize,
}

impl TableScanner {
    pub fn new<S, P>(excluded_sheets: S, excluded_row_prefixes: P, min_header_values: usize) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            excluded_sheets: normalize_all(excluded_sheets),
            excluded_row_prefixes: normalize_all(excluded_row_prefixes),
            min_header_values,
        }
    }

    pub fn is_excluded_sheet(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.excluded_sheets.iter().any(|excluded| *excluded == name)
    }

    /// Finds the header row and keeps the rows after it that look like data.
    /// Returns `None` for excluded sheets, sheets without a header row and
    /// sheets without data rows.
    pub fn scan<I>(&self, rows: I, sheet_name: &str) -> Option<Sheet>
    where
        I: IntoIterator<Item = Vec<CellValue>>,
    {
        if self.is_excluded_sheet(sheet_name) {
            return None;
        }

        let mut rows = rows.into_iter();
        let headers = match rows.by_ref().find(|row| self.is_header_row(row)) {
            Some(row) => row.iter().map(ToString::to_string).collect::<Vec<_>>(),
            None => {
                warn!("Could not find header row in sheet {}", sheet_name);
                return None;
            }
        };

        let rows = rows.filter(|row| self.is_data_row(row, headers.len())).collect::<Vec<_>>();
        if rows.is_empty() {
            warn!("Could not find data in sheet {}", sheet_name);
            return None;
        }

        Some(Sheet { name: sheet_name.to_owned(), headers, rows })
    }

    /// First or second cell starts with boilerplate text
    fn is_bad_start(&self, row: &[CellValue]) -> bool {
        row.iter().take(2).any(|cell| {
            let text = cell.to_string().trim().to_lowercase();
            !text.is_empty() && self.excluded_row_prefixes.iter().any(|prefix| text.starts_with(prefix.as_str()))
        })
    }

    fn is_header_row(&self, row: &[CellValue]) -> bool {
        let distinct = row
            .iter()
            .map(|cell| cell.to_string().trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .collect::<HashSet<_>>();
        !self.is_bad_start(row) && distinct.len() >= self.min_header_values
    }

    fn is_data_row(&self, row: &[CellValue], width: usize) -> bool {
        let has_entries = row.iter().any(|cell| !cell.to_string().trim().is_empty());
        has_entries && row.len() == width && !self.is_bad_start(row)
    }
}
