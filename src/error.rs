use thiserror::Error;

/// Main error type for the inventory extractor.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    GlobError(#[from] glob::GlobError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Reader module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    DocumentError(#[from] crate::document::DocumentError),

    // Inventory module errors
    #[error("{0}")]
    ArchiveError(#[from] crate::inventory::archive::ArchiveError),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

impl InventoryError {
    /// Password protected, corrupt or otherwise unreadable containers.
    /// These are recoverable: the document contributes no hostnames and the
    /// batch carries on.
    pub fn is_format_unsupported(&self) -> bool {
        match self {
            Self::SpreadsheetError(error) => error.is_format_unsupported(),
            Self::DocumentError(error) => error.is_format_unsupported(),
            Self::ArchiveError(error) => error.is_format_unsupported(),
            _ => false,
        }
    }
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, InventoryError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| InventoryError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::SpreadsheetError;

    #[test]
    fn classifies_format_unsupported() {
        let protected = InventoryError::from(SpreadsheetError::PasswordProtectedError("a.xlsx".to_owned()));
        assert!(protected.is_format_unsupported());

        let io = InventoryError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!io.is_format_unsupported());
    }

    #[test]
    fn prefixes_messages() {
        let result: Result<(), InventoryError> = Err(InventoryError::WithContextError("boom".to_owned()));
        let message = result.with_prefix("Read a.xlsx").err().map(|e| e.to_string());
        assert_eq!(message.as_deref(), Some("Read a.xlsx: boom"));
    }

    #[test]
    fn chains_optional_lookups() {
        let first: Result<Option<u8>, ()> = Ok(None);
        assert_eq!(first.ok_none_else(|| Ok(Some(2))), Ok(Some(2)));
        let second: Result<Option<u8>, ()> = Ok(Some(1));
        assert_eq!(second.ok_none_else(|| Ok(Some(2))), Ok(Some(1)));
    }
}
