use crate::error::InventoryError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::excel::resolve_number_formats;
use crate::spreadsheet::worksheet::Worksheet;
use crate::spreadsheet::worksheet::WorksheetBuilder;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

// BIFF8 record type identifiers
const FORMULA: u16 = 6;        // Formula record, string results follow in a STRING record
const EOF: u16 = 10;           // End of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // Workbook is encrypted
const BOUND_SHEET8: u16 = 133; // Sheet name, type and stream position
const MUL_RK: u16 = 189;       // Several RK numbers in one row
const XF: u16 = 224;           // Extended format, links a cell style to a number format
const SST: u16 = 252;          // Shared string table
const LABEL_SST: u16 = 253;    // Cell referencing the shared string table
const NUMBER: u16 = 515;       // Floating point cell
const LABEL: u16 = 516;        // Inline string cell
const BOOL_ERR: u16 = 517;     // Boolean or error cell
const STRING: u16 = 519;       // String result of the preceding formula
const RK: u16 = 638;           // Compressed number cell
const FORMAT: u16 = 1054;      // Custom number format definition
const BOF: u16 = 2057;         // Beginning of a substream

/// Sheet type of a worksheet in BOUNDSHEET8
const WORKSHEET: u8 = 0;

/// Reader for Excel 97-2003 workbooks
pub(crate) struct XlsSpreadsheet {
    /// File name for error reporting
    name: String,
    /// Reader over the `Workbook` stream
    reader: Biff8Reader,
    /// Shared string table
    shared_strings: Vec<String>,
    /// Number formats indexed by XF record
    number_formats: Vec<NumberFormat>,
    /// Worksheets with their names and stream positions
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Opens an XLS file and reads the workbook globals substream
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, InventoryError> {
        let mut buf_reader = BufReader::new(File::open(path)?);
        Self::from_reader(&path.to_string_lossy(), &mut buf_reader)
    }

    pub(crate) fn from_reader<RS: Read + Seek>(file_name: &str, reader: &mut RS) -> Result<XlsSpreadsheet, InventoryError> {
        let cfb = Cfb::new(reader)
            .map_err(|error| SpreadsheetError::ContainerError(file_name.to_owned(), error.to_string()))?;
        if cfb.exists("EncryptedPackage") {
            Err(SpreadsheetError::PasswordProtectedError(file_name.to_owned()))?
        }

        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or_else(|| SpreadsheetError::FileError("Workbook".to_owned()))?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, NumberFormat> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::PasswordProtectedError(file_name.to_owned()))?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(id.to_string(), NumberFormat::parse_custom_number_format(&format, is_1904));
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyError(file_name.to_owned()))?
        }

        // DATE1904 may follow FORMAT records, so custom formats are re-resolved
        let custom_formats = custom_formats
            .into_iter()
            .map(|(id, format)| (id, with_date_system(format, is_1904)))
            .collect();
        let number_formats = resolve_number_formats(format_indexes, custom_formats, is_1904);

        Ok(XlsSpreadsheet {
            name: file_name.to_owned(),
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn number_format(&self, index: usize) -> NumberFormat {
        self.number_formats.get(index).copied().unwrap_or_default()
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.clone()
    }

    /// Walks the cell records of each accepted worksheet substream
    fn read_sheets(&mut self, accept: &dyn Fn(&str) -> bool) -> Result<Vec<Worksheet>, InventoryError> {
        let mut sheets = Vec::<Worksheet>::new();
        for (sheet_name, pointer) in self.sheets.clone() {
            if !accept(&sheet_name) {
                continue;
            }

            self.reader.goto(pointer);
            self.reader.next()?;
            let mut sheet = WorksheetBuilder::new(&sheet_name);
            while let Some(tag) = self.reader.next()? {
                match tag {
                    BOF | EOF => break,
                    MUL_RK => {
                        let row = self.reader.read_u16()? as usize;
                        let col_lower_bound = self.reader.read_u16()? as usize;
                        let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                        for col in col_lower_bound..=col_upper_bound {
                            let index = self.reader.read_u16()? as usize;
                            let value = self.reader.read_rk_number()?;
                            sheet.push(row, col, self.number_format(index).to_cell_value(value));
                        }
                    }
                    BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                        let row = self.reader.read_u16()? as usize;
                        let col = self.reader.read_u16()? as usize;
                        let value = match tag {
                            BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                            NUMBER => {
                                let index = self.reader.read_u16()? as usize;
                                let value = self.reader.read_f64()?;
                                self.number_format(index).to_cell_value(value)
                            }
                            RK => {
                                let index = self.reader.read_u16()? as usize;
                                let value = self.reader.read_rk_number()?;
                                self.number_format(index).to_cell_value(value)
                            }
                            LABEL_SST => {
                                self.reader.skip(2)?;
                                let index = self.reader.read_usize()?;
                                let string = self.shared_strings
                                    .get(index)
                                    .ok_or(SpreadsheetError::SharedStringError(index))?;
                                CellValue::Text(string.to_owned())
                            }
                            LABEL => {
                                self.reader.skip(2)?;
                                CellValue::Text(self.reader.read_xl_unicode_string()?)
                            }
                            _ => {
                                let index = self.reader.read_u16()? as usize;
                                let format = self.number_format(index);
                                read_formula_cell(&mut self.reader, format)?
                            }
                        };
                        sheet.push(row, col, value);
                    }
                    _ => (),
                }
            }
            sheets.push(sheet.finish());
        }

        Ok(sheets)
    }
}

fn with_date_system(format: NumberFormat, is_1904: bool) -> NumberFormat {
    match format {
        NumberFormat::Date { .. } => NumberFormat::Date { is_1904 },
        NumberFormat::DateTime { .. } => NumberFormat::DateTime { is_1904 },
        format => format,
    }
}

/// Loads the shared string table from the SST record
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, InventoryError> {
    let mut shared_strings: Vec<String> = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        let string = reader.read_xl_unicode_rich_extended_string()?;
        shared_strings.push(string);
    }
    Ok(shared_strings)
}

/// Reads a BOOL_ERR record body after the cell position
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<CellValue, InventoryError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    if flag == 0 {
        Ok(CellValue::Boolean(value != 0))
    } else {
        Ok(CellValue::Error(to_error_value(value).to_owned()))
    }
}

/// Reads the cached result of a FORMULA record.
/// String results live in the STRING record that follows.
fn read_formula_cell(reader: &mut Biff8Reader, format: NumberFormat) -> Result<CellValue, InventoryError> {
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok(format.to_cell_value(f64::from_bits(formula)))
    } else if flag == 0 {
        match reader.next()? {
            Some(STRING) => Ok(CellValue::Text(reader.read_xl_unicode_string()?)),
            _ => Err(SpreadsheetError::FormulaValueError(formula))?,
        }
    } else if flag == 1 {
        Ok(CellValue::Boolean((formula & 0xFF0000) > 0))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok(CellValue::Error(to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok(CellValue::Empty)
    } else {
        Err(SpreadsheetError::FormulaValueError(formula))?
    }
}
