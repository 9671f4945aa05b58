//! Document-kind dispatch and archive expansion.
mod text;
mod workbook;

use crate::config::Config;
use crate::config::Rules;
use crate::error::InventoryError;
use crate::inventory::archive;
use crate::inventory::extract::text::DocumentSource;
use crate::inventory::extract::workbook::WorkbookSource;
use crate::inventory::hostname::HostnameNormalizer;
use crate::inventory::hostname::HostnameSet;
use crate::inventory::matcher::ColumnMatcher;
use crate::inventory::scanner::TableScanner;
use crate::inventory::DocumentKind;
use crate::inventory::RawDocument;
use std::collections::VecDeque;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Default cap on nested archive expansion
pub const DEFAULT_MAX_ARCHIVE_DEPTH: usize = 4;

/// One handler per document kind
pub(crate) trait HostnameSource {
    fn hostnames(&self, document: &RawDocument) -> Result<HostnameSet, InventoryError>;
}

/// Turns documents into hostname sets.
///
/// Holds no state between calls; one extractor can serve a whole batch.
pub struct Extractor {
    normalizer: HostnameNormalizer,
    matcher: ColumnMatcher,
    scanner: TableScanner,
    document_headers: Vec<String>,
    text_marker: String,
    max_archive_depth: usize,
}

impl Extractor {
    pub fn new(rules: &Rules) -> Self {
        Self {
            normalizer: rules.normalizer(),
            matcher: rules.matcher(),
            scanner: rules.scanner(),
            document_headers: rules
                .document_headers
                .iter()
                .map(|header| header.to_lowercase().replace(' ', ""))
                .filter(|header| !header.is_empty())
                .collect(),
            text_marker: rules.text_marker.trim().to_lowercase(),
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.rules).with_max_archive_depth(config.max_archive_depth)
    }

    pub fn with_max_archive_depth(mut self, max_archive_depth: usize) -> Self {
        self.max_archive_depth = max_archive_depth;
        self
    }

    fn source(&self, kind: DocumentKind) -> Option<Box<dyn HostnameSource + '_>> {
        match kind {
            DocumentKind::Spreadsheet => Some(Box::new(WorkbookSource {
                normalizer: &self.normalizer,
                matcher: &self.matcher,
                scanner: &self.scanner,
            })),
            DocumentKind::WordProcessor => Some(Box::new(DocumentSource {
                normalizer: &self.normalizer,
                headers: &self.document_headers,
                marker: &self.text_marker,
            })),
            DocumentKind::Archive | DocumentKind::Unsupported => None,
        }
    }

    /// Extracts the hostnames of a document, expanding archives into their
    /// entries.
    ///
    /// Unreadable containers are logged and contribute nothing. Any other
    /// failure of the document itself is returned; failures of documents
    /// inside an archive are logged and the remaining entries are still read.
    pub fn extract(&self, document: &RawDocument) -> Result<HostnameSet, InventoryError> {
        let mut hostnames = HostnameSet::new();
        let mut pending = VecDeque::from([(document.clone(), 0usize)]);
        while let Some((current, depth)) = pending.pop_front() {
            let result = match current.kind {
                DocumentKind::Archive if depth >= self.max_archive_depth => {
                    warn!("Skip {}: archives nested deeper than {}", current.path.display(), self.max_archive_depth);
                    continue;
                }
                DocumentKind::Archive => archive::unwrap(&current.path).map(|paths| {
                    pending.extend(paths.into_iter().map(|path| (RawDocument::new(path), depth + 1)));
                    HostnameSet::new()
                }),
                kind => match self.source(kind) {
                    Some(source) => source.hostnames(&current),
                    None => {
                        warn!("Unknown file type: {}", current.path.display());
                        continue;
                    }
                },
            };

            match recover(&current, result) {
                Ok(found) => hostnames.extend(found),
                Err(error) if depth == 0 => return Err(error),
                Err(_) => (),
            }
        }

        if document.kind == DocumentKind::Archive {
            info!("Found {} hosts in {}", hostnames.len(), document.path.display());
        }
        Ok(hostnames)
    }
}

/// Downgrades unreadable formats to an empty result; logs everything else
fn recover(document: &RawDocument, result: Result<HostnameSet, InventoryError>) -> Result<HostnameSet, InventoryError> {
    match result {
        Err(error) if error.is_format_unsupported() => {
            warn!("Unable to read {}: {}", document.path.display(), error);
            Ok(HostnameSet::new())
        }
        Err(error) => {
            error!("Failed to extract hostnames from {}: {}", document.path.display(), error);
            Err(error)
        }
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::paragraph;
    use crate::testing::table;
    use crate::testing::write_docx;
    use crate::testing::write_xlsx;
    use crate::testing::zip_binary;
    use crate::testing::xlsx_bytes;
    use std::path::Path;

    fn extractor() -> Extractor {
        Extractor::new(&Rules::default())
    }

    fn set(values: &[&str]) -> HostnameSet {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn extract(path: &Path) -> Result<HostnameSet, InventoryError> {
        extractor().extract(&RawDocument::new(path.to_path_buf()))
    }

    #[test]
    fn reads_host_column_of_matching_sheets() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-101.xlsx");
        write_xlsx(&path, &[
            ("Contacts", vec![vec!["Name", "Email"], vec!["Ann", "ann@example.com"]]),
            ("Servers", vec![
                vec!["Guidance: list every server", ""],
                vec!["Hostname", "IP"],
                vec!["web01.agency.gov", "10.0.0.1"],
                vec!["WEB02", "10.0.0.2"],
                vec!["db01 (primary)", "10.0.0.3"],
                vec!["", ""],
                vec!["Valid values: short names only", ""],
            ]),
        ])?;

        assert_eq!(extract(&path)?, set(&["db01", "web01", "web02"]));
        Ok(())
    }

    #[test]
    fn header_override_selects_the_column() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-534.xlsx");
        write_xlsx(&path, &[("Hosts", vec![vec!["Hostname", "Master Host"], vec!["vm01", "esx01"]])])?;
        assert_eq!(extract(&path)?, set(&["esx01"]));
        Ok(())
    }

    #[test]
    fn reads_word_tables_with_continuations() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-602.docx");
        let body = [
            paragraph("Hardware inventory"),
            table(&[&["Role", "Host Name"], &["web", "prodweb01"], &["db", "proddb01"]]),
            table(&[&["app", "prodapp01"], &["app", "prodapp02"]]),
            table(&[&["Owner", "Phone"], &["Ann", "555"]]),
            table(&[&["x", "CNAME"], &["y", "alias01 alias02"]]),
        ]
        .concat();
        write_docx(&path, &body)?;

        let hosts = extract(&path)?;
        assert_eq!(hosts, set(&["alias01", "alias02", "prodapp01", "prodapp02", "proddb01", "prodweb01"]));
        Ok(())
    }

    #[test]
    fn unrelated_tables_break_the_chain() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-603.docx");
        let body = [
            table(&[&["Hostname"], &["alpha01"]]),
            table(&[&["zulu01"]]),
            table(&[&["alpha02"]]),
        ]
        .concat();
        write_docx(&path, &body)?;

        assert_eq!(extract(&path)?, set(&["alpha01"]));
        Ok(())
    }

    #[test]
    fn headed_tables_never_need_to_continue() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-604.docx");
        let body = [table(&[&["Hostname"], &["alpha01"]]), table(&[&["Hostname"], &["zulu01"]])].concat();
        write_docx(&path, &body)?;

        assert_eq!(extract(&path)?, set(&["alpha01", "zulu01"]));
        Ok(())
    }

    #[test]
    fn falls_back_to_marker_lines() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-77.docx");
        let body = [
            paragraph("Device Name: WEB01.agency.gov"),
            paragraph("Location: building 4"),
            paragraph("  device name:   db01  "),
        ]
        .concat();
        write_docx(&path, &body)?;

        assert_eq!(extract(&path)?, set(&["db01", "web01"]));
        Ok(())
    }

    #[test]
    fn marker_lines_inside_tables_are_read() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("hw-inventory-78.docx");
        write_docx(&path, &table(&[&["Device Name: web01"], &["Location: bldg 4"]]))?;

        assert_eq!(extract(&path)?, set(&["web01"]));
        Ok(())
    }

    #[test]
    fn expands_nested_archives() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let workbook = xlsx_bytes(&[("Servers", vec![vec!["Hostname", "IP"], vec!["web01", "10.0.0.1"]])]);
        let inner = zip_binary(&[("servers.xlsx", workbook.as_slice())]);
        let outer = zip_binary(&[("nested.zip", inner.as_slice()), ("notes.txt", b"ignored".as_slice())]);
        let path = directory.path().join("hw-inventory-402.zip");
        std::fs::write(&path, outer)?;

        assert_eq!(extract(&path)?, set(&["web01"]));
        assert!(directory.path().join("hw-inventory-0-402.zip").exists());
        assert!(directory.path().join("hw-inventory-0-0-402.xlsx").exists());

        let shallow = Extractor::new(&Rules::default()).with_max_archive_depth(1);
        assert!(shallow.extract(&RawDocument::new(path))?.is_empty());
        Ok(())
    }

    #[test]
    fn unreadable_documents_are_empty() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let workbook = directory.path().join("hw-inventory-5.xlsx");
        std::fs::write(&workbook, b"password protected, honest")?;
        let notes = directory.path().join("hw-inventory-6.txt");
        std::fs::write(&notes, b"web01")?;

        assert!(extract(&workbook)?.is_empty());
        assert!(extract(&notes)?.is_empty());
        Ok(())
    }
}
