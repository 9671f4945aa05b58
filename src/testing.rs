//! Fixture builders for unit tests: in-memory zip packages, minimal
//! workbooks and documents.

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub(crate) type Rows<'a> = Vec<Vec<&'a str>>;

/// Builds a zip archive from (name, content) pairs
pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Builds an archive holding binary entries
pub(crate) fn zip_binary(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).expect("start zip entry");
        writer.write_all(content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

fn escape(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn column_name(col: usize) -> String {
    crate::spreadsheet::reference::index_to_reference(0, col).trim_end_matches('1').to_owned()
}

/// Builds an xlsx workbook with inline string cells. Empty strings are
/// left out of the sheet.
pub(crate) fn xlsx_bytes(sheets: &[(&str, Rows)]) -> Vec<u8> {
    let sheets = sheets
        .iter()
        .map(|(name, rows)| {
            let mut sheet = String::new();
            for (row, cells) in rows.iter().enumerate() {
                sheet.push_str(&format!(r#"<row r="{}">"#, row + 1));
                for (col, value) in cells.iter().enumerate().filter(|(_, value)| !value.is_empty()) {
                    sheet.push_str(&format!(
                        r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        column_name(col),
                        row + 1,
                        escape(value)
                    ));
                }
                sheet.push_str("</row>");
            }
            (*name, sheet)
        })
        .collect::<Vec<_>>();
    xlsx_sheet_data_bytes(&sheets)
}

/// Builds an xlsx workbook from raw `sheetData` markup per sheet
pub(crate) fn xlsx_sheet_data_bytes(sheets: &[(&str, String)]) -> Vec<u8> {
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut parts = Vec::new();
    for (index, (name, sheet_data)) in sheets.iter().enumerate() {
        let number = index + 1;
        workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));
        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_data}</sheetData></worksheet>"#
        );
        parts.push((format!("xl/worksheets/sheet{number}.xml"), sheet));
    }
    workbook.push_str("</sheets></workbook>");
    relationships.push_str("</Relationships>");

    let mut entries = vec![
        ("xl/workbook.xml".to_owned(), workbook),
        ("xl/_rels/workbook.xml.rels".to_owned(), relationships),
    ];
    entries.extend(parts);
    let entries = entries.iter().map(|(name, content)| (name.as_str(), content.as_str())).collect::<Vec<_>>();
    zip_bytes(&entries)
}

pub(crate) fn write_xlsx(path: &Path, sheets: &[(&str, Rows)]) -> std::io::Result<()> {
    std::fs::write(path, xlsx_bytes(sheets))
}

/// Wraps WordprocessingML body content into a docx package
pub(crate) fn docx_bytes(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    zip_bytes(&[("word/document.xml", &document)])
}

pub(crate) fn write_docx(path: &Path, body: &str) -> std::io::Result<()> {
    std::fs::write(path, docx_bytes(body))
}

/// Body markup for a paragraph of plain text
pub(crate) fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", escape(text))
}

/// Body markup for a table of plain text cells
pub(crate) fn table(rows: &[&[&str]]) -> String {
    let mut table = String::from("<w:tbl>");
    for row in rows {
        table.push_str("<w:tr>");
        for cell in row.iter() {
            table.push_str(&format!("<w:tc>{}</w:tc>", paragraph(cell)));
        }
        table.push_str("</w:tr>");
    }
    table.push_str("</w:tbl>");
    table
}
