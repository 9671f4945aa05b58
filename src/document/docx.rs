use crate::document::Block;
use crate::document::Document;
use crate::document::DocumentError;
use crate::document::Table;
use crate::document::TableCell;
use crate::error::InventoryError;
use crate::helpers::cfb::is_encrypted_package;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::mem::take;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

// WordprocessingML tag names
const TAG_TABLE: QName = QName(b"w:tbl");
const TAG_ROW: QName = QName(b"w:tr");
const TAG_CELL: QName = QName(b"w:tc");
const TAG_VERTICAL_MERGE: QName = QName(b"w:vMerge");
const TAG_PARAGRAPH: QName = QName(b"w:p");
const TAG_RUN: QName = QName(b"w:r");
const TAG_TEXT: QName = QName(b"w:t");
const TAG_TAB: QName = QName(b"w:tab");
const TAG_BREAK: QName = QName(b"w:br");
const TAG_CARRIAGE_RETURN: QName = QName(b"w:cr");

pub(super) fn read(path: &Path) -> Result<Document, InventoryError> {
    let reader = BufReader::new(File::open(path)?);
    read_from(&path.to_string_lossy(), reader)
}

pub(super) fn read_from<RS: Read + Seek>(name: &str, mut reader: RS) -> Result<Document, InventoryError> {
    if is_encrypted_package(&mut reader) {
        Err(DocumentError::PasswordProtectedError(name.to_owned()))?
    }

    let mut zip = ZipArchive::new(reader)
        .map_err(|error| DocumentError::ContainerError(name.to_owned(), error.to_string()))?;
    let reader = zip.xml_reader(DOCUMENT_PART)?
        .ok_or_else(|| DocumentError::ContainerError(name.to_owned(), format!("missing part '{}'", DOCUMENT_PART)))?;
    let blocks = read_blocks(reader)?;
    Ok(Document { name: name.to_owned(), blocks })
}

/// Walks the document body. Top-level tables become table blocks, the text
/// of nested tables is folded into the enclosing cell.
fn read_blocks<R: BufRead>(mut reader: XmlReader<R>) -> Result<Vec<Block>, InventoryError> {
    let mut blocks = Vec::<Block>::new();
    let mut table_depth = 0usize;
    let mut rows = Vec::<Vec<TableCell>>::new();
    let mut row = Vec::<TableCell>::new();
    let mut cell = Vec::<String>::new();
    let mut is_merged = false;
    let mut paragraph = String::new();
    let mut is_run = false;
    let mut is_text = false;

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_TABLE => {
            table_depth += 1;
            if table_depth == 1 {
                rows.clear();
            }
        }
        Event::End(event) if event.name() == TAG_TABLE => {
            if table_depth == 1 {
                blocks.push(Block::Table(Table { rows: take(&mut rows) }));
            }
            table_depth = table_depth.saturating_sub(1);
        }
        Event::Start(event) if table_depth == 1 && event.name() == TAG_ROW => row.clear(),
        Event::End(event) if table_depth == 1 && event.name() == TAG_ROW => rows.push(take(&mut row)),
        Event::Start(event) if table_depth == 1 && event.name() == TAG_CELL => {
            cell.clear();
            is_merged = false;
        }
        Event::End(event) if table_depth == 1 && event.name() == TAG_CELL => {
            if is_merged {
                row.push(TableCell::Merged);
            } else {
                row.push(TableCell::Text(cell.join("\n")));
            }
            cell.clear();
        }
        Event::Start(event) if table_depth == 1 && event.name() == TAG_VERTICAL_MERGE => {
            // `restart` opens a merged region, a missing value continues one
            let value = event.get_attribute_value("w:val")?;
            is_merged = value.map(|value| value == "continue").unwrap_or(true);
        }
        Event::Start(event) if event.name() == TAG_PARAGRAPH => paragraph.clear(),
        Event::End(event) if event.name() == TAG_PARAGRAPH => {
            if table_depth == 0 {
                blocks.push(Block::Paragraph(take(&mut paragraph)));
            } else {
                cell.push(take(&mut paragraph));
            }
        }
        Event::Start(event) if event.name() == TAG_RUN => is_run = true,
        Event::End(event) if event.name() == TAG_RUN => is_run = false,
        Event::Start(event) if is_run && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if event.name() == TAG_TEXT => is_text = false,
        Event::Start(event) if is_run && event.name() == TAG_TAB => paragraph.push('\t'),
        Event::Start(event) if is_run && (event.name() == TAG_BREAK || event.name() == TAG_CARRIAGE_RETURN) => {
            paragraph.push('\n');
        }
        Event::Text(event) if is_text => paragraph.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => paragraph.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => paragraph.push_bytes_ref(&event)?,
    });

    Ok(blocks)
}
