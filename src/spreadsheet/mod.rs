//! # Spreadsheet Readers
//!
//! Reads Excel workbooks (`.xlsx`, `.xlsm` and legacy `.xls`) into dense rows of
//! typed cell values. The container is detected from the file signature so a
//! workbook saved with the wrong extension is still read by the right parser.
pub(crate) mod cell;
mod excel;
pub(crate) mod reference;
mod worksheet;
mod xls;
mod xlsx;

pub use cell::CellValue;
pub use worksheet::Worksheet;

use crate::error::InventoryError;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Zip local file header signature
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
/// Compound File Binary signature
const CFB_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Errors specific to spreadsheet reading.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Spreadsheet '{0}' is password protected")]
    PasswordProtectedError(String),

    #[error("Spreadsheet '{0}' is not a valid workbook: {1}")]
    ContainerError(String, String),

    #[error("Spreadsheet '{0}' contains no worksheets")]
    EmptyError(String),

    #[error("Part '{0}' not found in workbook")]
    FileError(String),

    #[error("Shared string index {0} out of range")]
    SharedStringError(usize),

    #[error("Invalid formula value '{0}'")]
    FormulaValueError(u64),

    #[error("Unsupported spreadsheet format '{0}'")]
    FormatError(String),
}

impl SpreadsheetError {
    /// Errors meaning the file cannot be read at all, as opposed to a fault
    /// in the middle of a readable workbook.
    pub fn is_format_unsupported(&self) -> bool {
        matches!(
            self,
            Self::PasswordProtectedError(_) | Self::ContainerError(_, _) | Self::FileError(_) | Self::FormatError(_)
        )
    }
}

/// Common interface of the workbook readers.
pub(crate) trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Reads every worksheet whose name is accepted, in workbook order
    fn read_sheets(&mut self, accept: &dyn Fn(&str) -> bool) -> Result<Vec<Worksheet>, InventoryError>;
}

/// Opens a workbook, choosing the reader from the file signature and
/// falling back to the extension.
pub(crate) fn open(path: &Path) -> Result<Box<dyn Spreadsheet>, InventoryError> {
    let name = path.to_string_lossy().to_string();
    let mut signature = [0u8; 8];
    let length = File::open(path)?.read(&mut signature)?;
    let signature = &signature[..length];

    if signature.starts_with(ZIP_SIGNATURE) {
        return Ok(Box::new(XlsxSpreadsheet::open(path)?));
    }
    if signature.starts_with(CFB_SIGNATURE) {
        // Encrypted OOXML workbooks are wrapped in a compound file too
        return match path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase).as_deref() {
            Some("xlsx") | Some("xlsm") => Ok(Box::new(XlsxSpreadsheet::open(path)?)),
            _ => Ok(Box::new(XlsSpreadsheet::open(path)?)),
        };
    }

    match path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase).as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xls") => {
            Err(SpreadsheetError::ContainerError(name, "unrecognized file signature".to_owned()))?
        }
        _ => Err(SpreadsheetError::FormatError(name))?,
    }
}

/// Reads all accepted worksheets of a workbook.
pub fn read_worksheets(path: &Path, accept: &dyn Fn(&str) -> bool) -> Result<Vec<Worksheet>, InventoryError> {
    let mut spreadsheet = open(path)?;
    debug!("Reading worksheets of {}", spreadsheet.name());
    spreadsheet.read_sheets(accept)
}
