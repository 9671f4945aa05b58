//! Word 97-2003 binary documents (.doc)
//!
//! Text is recovered through the piece table in the table stream. Only the
//! main document story is read and table structure is not rebuilt: cell and
//! row marks end paragraphs like carriage returns do.

use crate::document::Block;
use crate::document::Document;
use crate::document::DocumentError;
use crate::error::InventoryError;
use crate::helpers::cfb::Cfb;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use encoding_rs::UTF_16LE;
use encoding_rs::WINDOWS_1252;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

const WORD_IDENTIFIER: u16 = 0xA5EC;

// File Information Block offsets
const FIB_FLAGS: usize = 0x000A;
const FIB_CCP_TEXT: usize = 0x004C;
const FIB_FC_CLX: usize = 0x01A2;
const FIB_LCB_CLX: usize = 0x01A6;

const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_WHICH_TABLE_STREAM: u16 = 0x0200;

// Clx entry markers
const CLX_PRC: u8 = 0x01;
const CLX_PCDT: u8 = 0x02;

/// Size of a piece descriptor in the PlcPcd
const PCD_SIZE: usize = 8;
const FC_COMPRESSED: u32 = 0x4000_0000;

// Special characters of the document stream
const PARAGRAPH_MARK: char = '\r';
const CELL_MARK: char = '\u{07}';
const LINE_BREAK: char = '\u{0B}';
const PAGE_BREAK: char = '\u{0C}';
const FIELD_BEGIN: char = '\u{13}';
const FIELD_SEPARATOR: char = '\u{14}';
const FIELD_END: char = '\u{15}';

/// A run of characters stored contiguously in the WordDocument stream
#[derive(Debug, PartialEq)]
struct Piece {
    cp_start: usize,
    cp_end: usize,
    fc: u32,
}

impl Piece {
    fn is_compressed(&self) -> bool {
        self.fc & FC_COMPRESSED != 0
    }

    fn offset(&self) -> usize {
        if self.is_compressed() {
            ((self.fc & !FC_COMPRESSED) / 2) as usize
        } else {
            self.fc as usize
        }
    }
}

pub(super) fn read(path: &Path) -> Result<Document, InventoryError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_from(&path.to_string_lossy(), &mut reader)
}

pub(super) fn read_from<RS: Read + Seek>(name: &str, reader: &mut RS) -> Result<Document, InventoryError> {
    let container_error = |message: &str| DocumentError::ContainerError(name.to_owned(), message.to_owned());

    let cfb = Cfb::new(reader).map_err(|error| container_error(&error.to_string()))?;
    if cfb.exists("EncryptedPackage") {
        Err(DocumentError::PasswordProtectedError(name.to_owned()))?
    }
    let word = cfb.read("WordDocument")?
        .ok_or_else(|| container_error("missing WordDocument stream"))?;
    let fib = word.get(..FIB_LCB_CLX + 4)
        .ok_or_else(|| container_error("truncated file information block"))?;
    if to_u16(fib) != WORD_IDENTIFIER {
        Err(container_error("not a Word binary document"))?
    }

    let flags = to_u16(&fib[FIB_FLAGS..]);
    if flags & FLAG_ENCRYPTED != 0 {
        Err(DocumentError::PasswordProtectedError(name.to_owned()))?
    }
    let table_name = if flags & FLAG_WHICH_TABLE_STREAM != 0 { "1Table" } else { "0Table" };
    let table = cfb.read(table_name)?
        .ok_or_else(|| container_error("missing table stream"))?;

    let ccp_text = to_u32(&fib[FIB_CCP_TEXT..]) as usize;
    let fc_clx = to_u32(&fib[FIB_FC_CLX..]) as usize;
    let lcb_clx = to_u32(&fib[FIB_LCB_CLX..]) as usize;
    let clx = fc_clx.checked_add(lcb_clx)
        .and_then(|end| table.get(fc_clx..end))
        .ok_or_else(|| container_error("piece table out of range"))?;

    let pieces = read_piece_table(clx).ok_or_else(|| container_error("invalid piece table"))?;
    let text = read_text(&word, &pieces, ccp_text).ok_or_else(|| container_error("piece out of range"))?;
    let blocks = split_paragraphs(&text).into_iter().map(Block::Paragraph).collect();
    Ok(Document { name: name.to_owned(), blocks })
}

/// Skips property runs and decodes the piece descriptors of the Clx
fn read_piece_table(clx: &[u8]) -> Option<Vec<Piece>> {
    let mut offset = 0usize;
    while *clx.get(offset)? == CLX_PRC {
        let size = to_u16(clx.get(offset + 1..offset + 3)?) as usize;
        offset += 3 + size;
    }
    if *clx.get(offset)? != CLX_PCDT {
        return None;
    }
    let length = to_u32(clx.get(offset + 1..offset + 5)?) as usize;
    let plc = clx.get(offset + 5..offset + 5 + length)?;

    // (n + 1) character positions followed by n piece descriptors
    let count = length.checked_sub(4)? / (4 + PCD_SIZE);
    let mut pieces = Vec::with_capacity(count);
    for index in 0..count {
        let cp_start = to_u32(plc.get(index * 4..)?) as usize;
        let cp_end = to_u32(plc.get((index + 1) * 4..)?) as usize;
        let pcd = plc.get((count + 1) * 4 + index * PCD_SIZE..)?;
        let fc = to_u32(pcd.get(2..6)?);
        pieces.push(Piece { cp_start, cp_end, fc });
    }
    Some(pieces)
}

/// Concatenates the first `ccp_text` characters of the document
fn read_text(word: &[u8], pieces: &[Piece], ccp_text: usize) -> Option<String> {
    let mut text = String::new();
    for piece in pieces {
        if piece.cp_start >= ccp_text {
            break;
        }
        let characters = piece.cp_end.min(ccp_text).saturating_sub(piece.cp_start);
        let offset = piece.offset();
        if piece.is_compressed() {
            let bytes = word.get(offset..offset + characters)?;
            text.push_str(&WINDOWS_1252.decode_without_bom_handling(bytes).0);
        } else {
            let bytes = word.get(offset..offset + characters * 2)?;
            text.push_str(&UTF_16LE.decode_without_bom_handling(bytes).0);
        }
    }
    Some(text)
}

/// Splits document text into paragraphs, dropping field instructions and
/// control characters while keeping field results.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut paragraph = String::new();
    let mut field_depth = 0usize;
    let mut instruction_depth = 0usize;
    for character in text.chars() {
        match character {
            FIELD_BEGIN => {
                field_depth += 1;
                instruction_depth = field_depth;
            }
            FIELD_SEPARATOR => instruction_depth = 0,
            FIELD_END => {
                field_depth = field_depth.saturating_sub(1);
                if instruction_depth > field_depth {
                    instruction_depth = 0;
                }
            }
            _ if instruction_depth > 0 => (),
            PARAGRAPH_MARK | CELL_MARK | PAGE_BREAK => paragraphs.push(std::mem::take(&mut paragraph)),
            LINE_BREAK => paragraph.push('\n'),
            '\t' => paragraph.push('\t'),
            _ if character.is_control() => (),
            _ => paragraph.push(character),
        }
    }
    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn clx(pieces: &[(u32, u32, u32)]) -> Vec<u8> {
        let mut plc = Vec::new();
        for (cp_start, _, _) in pieces {
            plc.extend_from_slice(&cp_start.to_le_bytes());
        }
        if let Some((_, cp_end, _)) = pieces.last() {
            plc.extend_from_slice(&cp_end.to_le_bytes());
        }
        for (_, _, fc) in pieces {
            plc.extend_from_slice(&0u16.to_le_bytes());
            plc.extend_from_slice(&fc.to_le_bytes());
            plc.extend_from_slice(&0u16.to_le_bytes());
        }
        let mut clx = vec![CLX_PRC, 2, 0, 0xAA, 0xBB, CLX_PCDT];
        clx.extend_from_slice(&(plc.len() as u32).to_le_bytes());
        clx.extend(plc);
        clx
    }

    #[test]
    fn reads_mixed_pieces() {
        let mut word = vec![0u8; 16];
        word.extend_from_slice(b"Device Name: ");
        let unicode_offset = word.len() as u32;
        for unit in "web01\r".encode_utf16() {
            word.extend_from_slice(&unit.to_le_bytes());
        }
        word.extend_from_slice(b"footnote");

        let compressed = FC_COMPRESSED | (16 * 2);
        let pieces = read_piece_table(&clx(&[(0, 13, compressed), (13, 19, unicode_offset)]));
        assert_eq!(
            pieces.as_deref(),
            Some(&[
                Piece { cp_start: 0, cp_end: 13, fc: compressed },
                Piece { cp_start: 13, cp_end: 19, fc: unicode_offset },
            ][..])
        );
        let text = pieces.and_then(|pieces| read_text(&word, &pieces, 19));
        assert_eq!(text.as_deref(), Some("Device Name: web01\r"));
    }

    #[test]
    fn rejects_out_of_range_pieces() {
        let pieces = [Piece { cp_start: 0, cp_end: 100, fc: 0 }];
        assert_eq!(read_text(b"short", &pieces, 100), None);
        assert_eq!(read_piece_table(&[CLX_PRC, 200]), None);
    }

    #[test]
    fn splits_paragraphs_and_drops_field_codes() {
        let text = "Host\u{07}web01\u{07}\u{07}\u{13} HYPERLINK \"x\" \u{14}link\u{15} text\rline\u{0B}two\r";
        assert_eq!(split_paragraphs(text), vec!["Host", "web01", "", "link text", "line\ntwo"]);
    }

    #[test]
    fn rejects_non_compound_files() {
        let error = read_from("test.doc", &mut Cursor::new(vec![0u8; 600])).err();
        assert!(error.map(|error| error.is_format_unsupported()).unwrap_or(false));
    }
}
