//! Microsoft Office Excel helpers shared by the workbook readers
use crate::error::InventoryError;
use crate::helpers::cfb::is_encrypted_package;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

/// XML tag name for relationship elements
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Opens the zip container of an Office Open XML workbook.
///
/// Password protected workbooks are stored as a compound file holding an
/// `EncryptedPackage` stream, which is reported before zip parsing fails.
pub(super) fn open_package<RS: Read + Seek>(file_name: &str, mut reader: RS) -> Result<ZipArchive<RS>, InventoryError> {
    if is_encrypted_package(&mut reader) {
        Err(SpreadsheetError::PasswordProtectedError(file_name.to_owned()))?;
    }

    ZipArchive::new(reader)
        .map_err(|error| SpreadsheetError::ContainerError(file_name.to_owned(), error.to_string()).into())
}

/// Loads worksheet relationships, mapping relationship IDs to part paths
pub(super) fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, InventoryError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheets, chartsheets carry no cells
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps format indexes to number formats using custom and built-in formats
pub(super) fn resolve_number_formats(
    format_indexes: Vec<String>,
    custom_formats: HashMap<String, NumberFormat>,
    is_1904: bool,
) -> Vec<NumberFormat> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| NumberFormat::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or_default()
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the workbook package
pub(super) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}
