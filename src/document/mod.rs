//! # Document Readers
//!
//! Reads word-processor documents into an ordered list of blocks. A block is
//! either a paragraph of text or a table of cells. `.docx` keeps tables,
//! `.doc` and `.pdf` are read as paragraphs only.
mod doc;
mod docx;
mod pdf;

use crate::error::InventoryError;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors specific to document reading.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document '{0}' is password protected")]
    PasswordProtectedError(String),

    #[error("Document '{0}' is not a valid document: {1}")]
    ContainerError(String, String),

    #[error("Unsupported document format '{0}'")]
    FormatError(String),

    #[error("Cell ({0}, {1}) is merged or out of range")]
    CellAccessError(usize, usize),
}

impl DocumentError {
    pub fn is_format_unsupported(&self) -> bool {
        !matches!(self, Self::CellAccessError(_, _))
    }
}

/// A table cell. Vertically merged continuation cells carry no text of
/// their own and cannot be read.
#[derive(Clone, Debug, PartialEq)]
pub enum TableCell {
    Text(String),
    Merged,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<TableCell>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Text of the cell at zero-based (row, col).
    /// Fails for merged cells and positions outside the table.
    pub fn cell(&self, row: usize, col: usize) -> Result<&str, DocumentError> {
        match self.rows.get(row).and_then(|cells| cells.get(col)) {
            Some(TableCell::Text(text)) => Ok(text),
            _ => Err(DocumentError::CellAccessError(row, col)),
        }
    }

    /// Lines of the readable cells, row by row
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|cell| match cell {
                TableCell::Text(text) => Some(text.lines()),
                TableCell::Merged => None,
            })
            .flatten()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(String),
    Table(Table),
}

/// A document as an ordered sequence of blocks
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub name: String,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            Block::Paragraph(_) => None,
        })
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Paragraph(text) => Some(text.as_str()),
            Block::Table(_) => None,
        })
    }

    /// Every line of text in document order: top-level paragraphs, and
    /// the cell lines of each table where the table sits.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().flat_map(|block| {
            let (paragraph, table) = match block {
                Block::Paragraph(text) => (Some(text.as_str()), None),
                Block::Table(table) => (None, Some(table)),
            };
            paragraph.into_iter().chain(table.into_iter().flat_map(|table| table.text_lines()))
        })
    }
}

/// Zip local file header signature
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
/// Compound File Binary signature
const CFB_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Opens a document, choosing the reader from the file signature and
/// falling back to the extension.
pub fn open(path: &Path) -> Result<Document, InventoryError> {
    let name = path.to_string_lossy().to_string();
    let mut signature = [0u8; 8];
    let length = File::open(path)?.read(&mut signature)?;
    let signature = &signature[..length];
    let extension = path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase);
    debug!("Reading document {}", name);

    if signature.starts_with(ZIP_SIGNATURE) {
        docx::read(path)
    } else if signature.starts_with(PDF_SIGNATURE) {
        pdf::read(path)
    } else if signature.starts_with(CFB_SIGNATURE) {
        match extension.as_deref() {
            // Encrypted OOXML documents are wrapped in a compound file
            Some("docx") | Some("docm") => docx::read(path),
            _ => doc::read(path),
        }
    } else {
        match extension.as_deref() {
            Some("doc") | Some("docx") | Some("docm") | Some("pdf") => {
                Err(DocumentError::ContainerError(name, "unrecognized file signature".to_owned()))?
            }
            _ => Err(DocumentError::FormatError(name))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            rows: vec![
                vec![TableCell::Text("Hostname".to_owned()), TableCell::Text("Role".to_owned())],
                vec![TableCell::Merged, TableCell::Text("web".to_owned())],
            ],
        }
    }

    #[test]
    fn reads_cells() {
        let table = table();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.cell(0, 0).ok(), Some("Hostname"));
        assert!(matches!(table.cell(1, 0), Err(DocumentError::CellAccessError(1, 0))));
        assert!(table.cell(5, 0).is_err());
    }

    #[test]
    fn splits_blocks_by_kind() {
        let document = Document {
            name: "a.docx".to_owned(),
            blocks: vec![Block::Paragraph("intro".to_owned()), Block::Table(table())],
        };
        assert_eq!(document.tables().count(), 1);
        assert_eq!(document.paragraphs().collect::<Vec<_>>(), vec!["intro"]);
    }

    #[test]
    fn text_lines_include_table_cells() {
        let mut table = table();
        table.rows.push(vec![TableCell::Text("Device Name: web01\nbldg 4".to_owned())]);
        let document = Document {
            name: "a.docx".to_owned(),
            blocks: vec![
                Block::Paragraph("intro".to_owned()),
                Block::Table(table),
                Block::Paragraph("end".to_owned()),
            ],
        };
        assert_eq!(
            document.text_lines().collect::<Vec<_>>(),
            vec!["intro", "Hostname", "Role", "web", "Device Name: web01", "bldg 4", "end"]
        );
    }

    #[test]
    fn unknown_files_are_unsupported() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("notes.doc");
        std::fs::write(&path, b"plain text")?;
        let error = open(&path).err();
        assert!(error.map(|error| error.is_format_unsupported()).unwrap_or(false));
        Ok(())
    }
}
