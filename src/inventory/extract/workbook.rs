use crate::error::InventoryError;
use crate::inventory::extract::HostnameSource;
use crate::inventory::hostname::HostnameCandidate;
use crate::inventory::hostname::HostnameNormalizer;
use crate::inventory::hostname::HostnameSet;
use crate::inventory::matcher::ColumnMatcher;
use crate::inventory::scanner::TableScanner;
use crate::inventory::RawDocument;
use crate::spreadsheet;
use tracing::info;
use tracing::warn;

/// Hostnames from the host column of every sheet of a workbook
pub(crate) struct WorkbookSource<'a> {
    pub(crate) normalizer: &'a HostnameNormalizer,
    pub(crate) matcher: &'a ColumnMatcher,
    pub(crate) scanner: &'a TableScanner,
}

impl HostnameSource for WorkbookSource<'_> {
    fn hostnames(&self, document: &RawDocument) -> Result<HostnameSet, InventoryError> {
        info!("Loading workbook at {}", document.path.display());
        let scanner = self.scanner;
        let worksheets = spreadsheet::read_worksheets(&document.path, &|name| !scanner.is_excluded_sheet(name))?;

        let mut hostnames = HostnameSet::new();
        for worksheet in worksheets {
            info!("Processing sheet {}", worksheet.name);
            let Some(sheet) = self.scanner.scan(worksheet.rows, &worksheet.name) else {
                continue;
            };
            let Some(header) = self.matcher.find_host_column(&document.identifier, &sheet.headers) else {
                warn!("Could not find hostname column in sheet {} of {}", sheet.name, document.identifier);
                continue;
            };
            let Some(col) = sheet.column(&header) else {
                warn!("Column '{}' is missing from sheet {} of {}", header, sheet.name, document.identifier);
                continue;
            };

            for value in sheet.values(col) {
                let candidate = HostnameCandidate::new(value.to_string(), header.as_str());
                hostnames.extend(self.normalizer.normalize(&candidate));
            }
        }

        info!("Found {} hosts in {}", hostnames.len(), document.path.display());
        Ok(hostnames)
    }
}
