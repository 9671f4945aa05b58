//! Directory run: every inventory document in, one consolidated CSV out.

use crate::config::Config;
use crate::error::InventoryError;
use crate::error::ResultMessage;
use crate::inventory::export::export_rows;
use crate::inventory::export::write_export;
use crate::inventory::export::OrgDirectory;
use crate::inventory::export::ORG_FILE_NAME;
use crate::inventory::extract::Extractor;
use crate::inventory::hostname::HostnameSet;
use crate::inventory::RawDocument;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Outcome counters of a batch run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Documents extracted, including the ones that yielded nothing
    pub processed: usize,
    /// Documents whose extraction failed
    pub failed: usize,
    /// Files without a system id in their name
    pub skipped: usize,
    /// Distinct system ids seen
    pub systems: usize,
    /// Exported rows
    pub rows: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub input: PathBuf,
    pub file_pattern: String,
    pub output: PathBuf,
    pub org_file: PathBuf,
}

impl Batch {
    pub fn from_config(config: &Config) -> Self {
        Self {
            input: config.download_path.clone(),
            file_pattern: config.file_pattern.clone(),
            output: config.output_path.clone(),
            org_file: config.download_path.join(ORG_FILE_NAME),
        }
    }

    /// Inventory files of the input directory, sorted by name
    pub fn documents(&self) -> Result<Vec<PathBuf>, InventoryError> {
        if !self.input.is_dir() {
            let message = format!("Input directory {} not found", self.input.display());
            Err(std::io::Error::new(ErrorKind::NotFound, message))?;
        }

        let pattern = self.input.join(&self.file_pattern);
        let mut paths = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let path = entry?;
            if path.is_file() && !is_org_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Extracts every document and writes the export.
    ///
    /// A document that fails is counted and logged, it never stops the run.
    pub fn run(&self, extractor: &Extractor) -> Result<BatchReport, InventoryError> {
        let mut report = BatchReport::default();
        let mut inventories = BTreeMap::<u64, HostnameSet>::new();

        for path in self.documents()? {
            let document = RawDocument::new(path);
            let Some(system_id) = document.system_id else {
                warn!("Skip {}: no system id in file name", document.path.display());
                report.skipped += 1;
                continue;
            };

            let hostnames = inventories.entry(system_id).or_default();
            match extractor.extract(&document) {
                Ok(found) => {
                    hostnames.extend(found);
                    report.processed += 1;
                }
                Err(e) => {
                    error!("Skip {} after failure: {}", document.path.display(), e);
                    report.failed += 1;
                }
            }
        }

        let directory = OrgDirectory::load(&self.org_file)
            .with_prefix(&format!("Read {}", self.org_file.display()))?;
        let rows = export_rows(&inventories, &directory);
        write_export(&self.output, &rows).with_prefix(&format!("Write {}", self.output.display()))?;

        report.systems = inventories.len();
        report.rows = rows.len();
        info!(
            "Processed {} documents ({} failed, {} skipped) for {} systems, exported {} rows",
            report.processed, report.failed, report.skipped, report.systems, report.rows
        );
        Ok(report)
    }
}

fn is_org_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case(ORG_FILE_NAME))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;
    use crate::testing::table;
    use crate::testing::write_docx;
    use crate::testing::write_xlsx;
    use crate::testing::zip_bytes;

    /// A workbook referencing a shared string it does not have
    fn broken_workbook() -> Vec<u8> {
        zip_bytes(&[
            (
                "xl/workbook.xml",
                r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Servers" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>5</v></c></row></sheetData></worksheet>"#,
            ),
        ])
    }

    #[test]
    fn exports_every_system() -> Result<(), InventoryError> {
        let input = tempfile::tempdir()?;
        let output = tempfile::tempdir()?;
        write_xlsx(&input.path().join("hw-inventory-402.xlsx"), &[(
            "Servers",
            vec![vec!["Hostname", "IP"], vec!["web01", "10.0.0.1"], vec!["db01", "10.0.0.2"]],
        )])?;
        write_docx(&input.path().join("hw-inventory-17.docx"), &table(&[&["Hostname", "Role"], &["app01", "api"]]))?;
        write_docx(&input.path().join("hw-inventory-0-402.docx"), &table(&[&["CNAME"], &["web01 web03"]]))?;
        std::fs::write(input.path().join("hw-inventory-5.xlsx"), broken_workbook())?;
        std::fs::write(input.path().join("notes.txt"), "web09")?;
        std::fs::write(input.path().join(ORG_FILE_NAME), "id,org,acronym\n402,Finance,FIN\n")?;

        let batch = Batch {
            input: input.path().to_path_buf(),
            file_pattern: "*".to_owned(),
            output: output.path().join("hostnames.csv"),
            org_file: input.path().join(ORG_FILE_NAME),
        };
        let report = batch.run(&Extractor::new(&Rules::default()))?;

        assert_eq!(report, BatchReport { processed: 3, failed: 1, skipped: 1, systems: 3, rows: 4 });
        assert_eq!(
            std::fs::read_to_string(&batch.output)?,
            "csam_id,org,acronym,id_acronym,hostname\n\
             17,,,17-,app01\n\
             402,Finance,FIN,402-FIN,db01\n\
             402,Finance,FIN,402-FIN,web01\n\
             402,Finance,FIN,402-FIN,web03\n"
        );
        Ok(())
    }

    #[test]
    fn lists_matching_files_in_order() -> Result<(), InventoryError> {
        let input = tempfile::tempdir()?;
        for name in ["hw-inventory-2.pdf", "hw-inventory-1.xlsx", ORG_FILE_NAME] {
            std::fs::write(input.path().join(name), "")?;
        }
        std::fs::create_dir(input.path().join("hw-inventory-3.zip"))?;

        let batch = Batch {
            input: input.path().to_path_buf(),
            file_pattern: "hw-*".to_owned(),
            output: input.path().join("out.csv"),
            org_file: input.path().join(ORG_FILE_NAME),
        };
        let names = batch
            .documents()?
            .iter()
            .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["hw-inventory-1.xlsx", "hw-inventory-2.pdf"]);

        let missing = Batch { input: input.path().join("missing"), ..batch };
        assert!(missing.documents().is_err());
        Ok(())
    }
}
