use crate::error::InventoryError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::parse_iso_datetime;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::worksheet::Worksheet;
use crate::spreadsheet::worksheet::WorksheetBuilder;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Cell types declared by the `t` attribute
#[derive(Copy, Clone, Debug, Default, PartialEq)]
enum CellKind {
    #[default]
    Number,
    SharedString,
    InlineString,
    Boolean,
    IsoDateTime,
    Error,
}

impl CellKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "s" => Self::SharedString,
            "inlineStr" | "str" => Self::InlineString,
            "b" => Self::Boolean,
            "d" => Self::IsoDateTime,
            "e" => Self::Error,
            _ => Self::Number,
        }
    }
}

/// Represents an Excel XLSX workbook
pub(crate) struct XlsxSpreadsheet<RS: Read + Seek = BufReader<File>> {
    /// File name of the spreadsheet
    name: String,
    /// ZIP archive containing the XLSX parts
    zip: ZipArchive<RS>,
    /// Shared string table
    shared_strings: Vec<String>,
    /// Number formats indexed by cell style
    number_formats: Vec<NumberFormat>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    /// Opens an XLSX workbook and parses its structure
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, InventoryError> {
        let reader = BufReader::new(File::open(path)?);
        Self::from_reader(&path.to_string_lossy(), reader)
    }
}

impl<RS: Read + Seek> XlsxSpreadsheet<RS> {
    pub(crate) fn from_reader(file_name: &str, reader: RS) -> Result<XlsxSpreadsheet<RS>, InventoryError> {
        let mut zip = excel::open_package(file_name, reader)?;
        let (sheets, is_1904) = load_workbook(&mut zip).map_err(|error| match error {
            InventoryError::SpreadsheetError(SpreadsheetError::FileError(part)) => {
                SpreadsheetError::ContainerError(file_name.to_owned(), format!("missing part '{}'", part)).into()
            }
            error => error,
        })?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyError(file_name.to_owned()))?
        }

        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            shared_strings,
            number_formats,
            sheets,
        })
    }
}

impl<RS: Read + Seek> Spreadsheet for XlsxSpreadsheet<RS> {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    /// Parses worksheet parts into dense rows
    fn read_sheets(&mut self, accept: &dyn Fn(&str) -> bool) -> Result<Vec<Worksheet>, InventoryError> {
        let mut sheets = Vec::<Worksheet>::new();
        for (sheet_name, zip_path) in &self.sheets {
            if !accept(sheet_name) {
                continue;
            }

            let mut sheet = WorksheetBuilder::new(sheet_name);
            let mut row_count = 0usize;
            let mut col_count = 0usize;
            let mut row = 0usize;
            let mut col = 0usize;
            let mut kind = CellKind::default();
            let mut style = 0usize;
            let mut value = String::new();
            let mut has_value = false;
            let mut reader = self.zip.xml_reader(zip_path)?
                .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    row_count = event.get_attribute_value("r")?
                        .and_then(|index| index.parse::<usize>().ok())
                        .and_then(|index| index.checked_sub(1))
                        .unwrap_or(row_count);
                    col_count = 0;
                }
                Event::End(event) if event.name() == TAG_ROW => {
                    row_count += 1;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    (row, col) = match event.get_attribute_value("r")? {
                        Some(reference) => reference_to_index(&reference).ok_or_else(|| {
                            SpreadsheetError::ContainerError(
                                self.name.to_owned(),
                                format!("cell reference '{reference}' in '{sheet_name}' is out of range"),
                            )
                        })?,
                        None => (row_count, col_count),
                    };
                    if row >= MAX_ROWS || col >= MAX_COLUMNS {
                        Err(SpreadsheetError::ContainerError(
                            self.name.to_owned(),
                            format!("cell position {row}:{col} in '{sheet_name}' is out of range"),
                        ))?
                    }
                    col_count = col + 1;
                    kind = event.get_attribute_value("t")?
                        .map(|t| CellKind::parse(&t))
                        .unwrap_or_default();
                    style = event.get_attribute_value("s")?
                        .and_then(|index| index.parse::<usize>().ok())
                        .unwrap_or(0);
                    value.clear();
                    has_value = false;
                }
                Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                    has_value = true;
                }
                Event::Start(event) if event.name() == TAG_VALUE => {
                    value = read_string_value(&mut reader, TAG_VALUE, true)?;
                    has_value = true;
                }
                Event::End(event) if event.name() == TAG_CELL => {
                    if has_value {
                        let format = self.number_formats.get(style).copied().unwrap_or_default();
                        let cell = to_cell_value(kind, &value, format, &self.shared_strings)?;
                        sheet.push(row, col, cell);
                    }
                },
            });
            sheets.push(sheet.finish());
        }

        Ok(sheets)
    }
}

/// Converts the raw text of a cell into a typed value
fn to_cell_value(
    kind: CellKind,
    value: &str,
    format: NumberFormat,
    shared_strings: &[String],
) -> Result<CellValue, InventoryError> {
    let cell = match kind {
        CellKind::SharedString => {
            let index = value.trim().parse::<usize>()?;
            let string = shared_strings
                .get(index)
                .ok_or(SpreadsheetError::SharedStringError(index))?;
            CellValue::Text(string.to_owned())
        }
        CellKind::InlineString => CellValue::Text(value.to_owned()),
        CellKind::Boolean => CellValue::Boolean(value.trim() == "1"),
        CellKind::Error => CellValue::Error(value.to_owned()),
        CellKind::IsoDateTime => match parse_iso_datetime(value.trim()) {
            Some(datetime) => CellValue::DateTime(datetime),
            None => CellValue::Text(value.to_owned()),
        },
        CellKind::Number => match value.trim().parse::<f64>() {
            Ok(number) => format.to_cell_value(number),
            Err(_) => CellValue::Text(value.to_owned()),
        },
    };
    Ok(cell)
}

/// Loads worksheet names and part paths, and the date system, from workbook.xml
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), InventoryError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads number formats and cell style indexes from styles.xml
fn load_number_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>, is_1904: bool) -> Result<Vec<NumberFormat>, InventoryError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, NumberFormat>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = NumberFormat::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?;
            format_indexes.push(id.map(|id| id.to_string()).unwrap_or_else(|| "0".to_owned()));
        }
    });

    Ok(excel::resolve_number_formats(format_indexes, custom_formats, is_1904))
}

/// Loads the shared string table, empty when the part is missing
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, InventoryError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Reads string content up to `end_tag`, skipping phonetic annotations
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, InventoryError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
