//! PDF text extraction. Pages are read as lines of text, one paragraph per line.

use crate::document::Block;
use crate::document::Document;
use crate::document::DocumentError;
use crate::error::InventoryError;
use std::path::Path;
use tracing::warn;

pub(super) fn read(path: &Path) -> Result<Document, InventoryError> {
    let name = path.to_string_lossy().to_string();
    let document = lopdf::Document::load(path)
        .map_err(|error| DocumentError::ContainerError(name.to_owned(), error.to_string()))?;

    let mut blocks = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => blocks.extend(to_paragraphs(&text)),
            Err(error) => warn!("Skip page {} of {}: {}", page_number, name, error),
        }
    }
    Ok(Document { name, blocks })
}

fn to_paragraphs(text: &str) -> impl Iterator<Item = Block> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Block::Paragraph(line.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_page_text_into_lines() {
        let blocks = to_paragraphs("Device Name: web01\n\n  Location: DC1 \n").collect::<Vec<_>>();
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph("Device Name: web01".to_owned()),
                Block::Paragraph("Location: DC1".to_owned()),
            ]
        );
    }

    #[test]
    fn broken_pdf_is_unsupported() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("inventory.pdf");
        std::fs::write(&path, b"%PDF-1.4\nnot really")?;
        let error = read(&path).err();
        assert!(error.map(|error| error.is_format_unsupported()).unwrap_or(false));
        Ok(())
    }
}
