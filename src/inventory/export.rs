//! Consolidated hostname export.

use crate::error::InventoryError;
use crate::inventory::hostname::HostnameSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use tracing::warn;

/// Name of the organization side file found next to the inventories
pub const ORG_FILE_NAME: &str = "id-org-acronym-diff.csv";

const EXPORT_HEADER: [&str; 5] = ["csam_id", "org", "acronym", "id_acronym", "hostname"];

/// Organization and acronym of each system
#[derive(Clone, Debug, Default)]
pub struct OrgDirectory {
    entries: HashMap<u64, (String, String)>,
}

impl OrgDirectory {
    /// Reads `(id, organization, acronym)` rows. Rows whose id is not a
    /// number, the header among them, are skipped. A missing file yields an
    /// empty directory.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        if !path.is_file() {
            warn!("Organization file {} not found, exporting without organizations", path.display());
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_path(path)?;
        let mut entries = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let (Some(id), Some(org), Some(acronym)) = (record.get(0), record.get(1), record.get(2)) else {
                continue;
            };
            if let Ok(id) = id.trim().parse::<u64>() {
                entries.insert(id, (org.to_owned(), acronym.to_owned()));
            }
        }
        info!("Loaded {} organizations from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn get(&self, system_id: u64) -> (&str, &str) {
        self.entries
            .get(&system_id)
            .map(|(org, acronym)| (org.as_str(), acronym.as_str()))
            .unwrap_or(("", ""))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One line of the export
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportRow {
    pub csam_id: u64,
    pub org: String,
    pub acronym: String,
    pub id_acronym: String,
    pub hostname: String,
}

/// Rows ordered by system id, then hostname
pub fn export_rows(inventories: &BTreeMap<u64, HostnameSet>, directory: &OrgDirectory) -> Vec<ExportRow> {
    inventories
        .iter()
        .flat_map(|(&system_id, hostnames)| {
            let (org, acronym) = directory.get(system_id);
            hostnames.iter().map(move |hostname| ExportRow {
                csam_id: system_id,
                org: org.to_owned(),
                acronym: acronym.to_owned(),
                id_acronym: format!("{}-{}", system_id, acronym),
                hostname: hostname.to_owned(),
            })
        })
        .collect()
}

/// Writes the export CSV, header included even when there are no rows
pub fn write_export(path: &Path, rows: &[ExportRow]) -> Result<(), InventoryError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(EXPORT_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> HostnameSet {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn loads_numeric_rows_only() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join(ORG_FILE_NAME);
        std::fs::write(&path, "id,org,acronym\n402,Office of Finance,OF\nabc,x,y\n17,\"Labs, West\",LW\n9\n")?;

        let orgs = OrgDirectory::load(&path)?;
        assert_eq!(orgs.len(), 2);
        assert_eq!(orgs.get(17), ("Labs, West", "LW"));
        assert_eq!(orgs.get(5), ("", ""));
        assert!(OrgDirectory::load(&directory.path().join("missing.csv"))?.is_empty());
        Ok(())
    }

    #[test]
    fn writes_sorted_rows() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let org_path = directory.path().join(ORG_FILE_NAME);
        std::fs::write(&org_path, "402,Office of Finance,OF\n")?;
        let orgs = OrgDirectory::load(&org_path)?;

        let inventories = BTreeMap::from([(402, set(&["web02", "db01"])), (17, set(&["app01"])), (3, set(&[]))]);
        let rows = export_rows(&inventories, &orgs);
        let output = directory.path().join("hostnames.csv");
        write_export(&output, &rows)?;

        assert_eq!(
            std::fs::read_to_string(&output)?,
            "csam_id,org,acronym,id_acronym,hostname\n\
             17,,,17-,app01\n\
             402,Office of Finance,OF,402-OF,db01\n\
             402,Office of Finance,OF,402-OF,web02\n"
        );
        Ok(())
    }
}
