//! # Inventory Engine
//!
//! Turns raw hardware inventory documents into per-system hostname sets:
//!
//! - [`hostname`]: canonicalizes raw cell text into short hostnames
//! - [`matcher`]: picks the host column among a table's headers
//! - [`scanner`]: finds the header row and the data rows of a sheet
//! - [`extract`]: dispatches a document to the handler for its kind
//! - [`archive`]: expands zip archives next to the archive
//! - [`batch`] and [`export`]: the directory run and the consolidated CSV
pub mod archive;
pub mod batch;
pub mod export;
pub mod extract;
pub mod hostname;
pub mod matcher;
pub mod scanner;

use std::ffi::OsStr;
use std::path::PathBuf;

/// How a document is read, decided by its extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Spreadsheet,
    WordProcessor,
    Archive,
    Unsupported,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "xls" | "xlsx" | "xlsm" => Self::Spreadsheet,
            "doc" | "docx" | "pdf" => Self::WordProcessor,
            "zip" => Self::Archive,
            _ => Self::Unsupported,
        }
    }
}

/// An inventory file on disk.
///
/// File names follow `<prefix>-<system id>.<ext>`; the stem is the key of the
/// per-document header tables.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub identifier: String,
    pub system_id: Option<u64>,
}

impl RawDocument {
    pub fn new(path: PathBuf) -> Self {
        let kind = path.extension().and_then(OsStr::to_str).map_or(DocumentKind::Unsupported, DocumentKind::from_extension);
        let identifier = path.file_stem().map(|stem| stem.to_string_lossy().to_string()).unwrap_or_default();
        let system_id = identifier.rsplit('-').next().and_then(|id| id.trim().parse().ok());
        Self { path, kind, identifier, system_id }
    }
}

/// Trimmed lowercase values, empty ones dropped
pub(crate) fn normalize_all<I>(values: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_kind_and_system_id_from_the_name() {
        let document = RawDocument::new(PathBuf::from("downloads/hw-inventory-402.XLSX"));
        assert_eq!(document.kind, DocumentKind::Spreadsheet);
        assert_eq!(document.identifier, "hw-inventory-402");
        assert_eq!(document.system_id, Some(402));

        let document = RawDocument::new(PathBuf::from("hw-inventory-0-17.pdf"));
        assert_eq!(document.kind, DocumentKind::WordProcessor);
        assert_eq!(document.system_id, Some(17));
    }

    #[test]
    fn unknown_names_have_no_system_id() {
        let document = RawDocument::new(PathBuf::from("notes.txt"));
        assert_eq!(document.kind, DocumentKind::Unsupported);
        assert_eq!(document.system_id, None);
        assert_eq!(RawDocument::new(PathBuf::from("README")).kind, DocumentKind::Unsupported);
    }

    #[test]
    fn normalizes_table_entries() {
        assert_eq!(normalize_all([" Hostname ", "", "  ", "Node"]), vec!["hostname", "node"]);
    }
}
