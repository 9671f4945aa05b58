//! Zip archive expansion.
//!
//! Entries are written next to the archive under names that keep the
//! `<prefix>-<system id>` convention, so an extracted document resolves to
//! the same system as the archive it came from.

use crate::error::InventoryError;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use tracing::warn;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive name '{0}' does not end with a system id")]
    NameError(String),

    #[error("Archive '{0}' is not a valid zip file: {1}")]
    ContainerError(String, String),

    #[error("Entry {1} of archive '{0}' is encrypted or uses an unsupported method")]
    UnsupportedEntryError(String, usize),
}

impl ArchiveError {
    pub fn is_format_unsupported(&self) -> bool {
        true
    }
}

/// Extracts every file of an archive into the archive's directory.
///
/// Entry `i` of `<prefix>-<id>.zip` is written as `<prefix>-<i>-<id><.suffix>`.
/// Directory entries write nothing but still take an index.
pub fn unwrap(path: &Path) -> Result<Vec<PathBuf>, InventoryError> {
    let name = path.to_string_lossy().to_string();
    info!("Extracting files from {}", name);

    let stem = path.file_stem().map(|stem| stem.to_string_lossy().to_string()).unwrap_or_default();
    let Some((prefix, system_id)) = stem.rsplit_once('-') else {
        return Err(ArchiveError::NameError(name).into());
    };
    let directory = path.parent().unwrap_or(Path::new("."));

    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))
        .map_err(|error| ArchiveError::ContainerError(name.clone(), error.to_string()))?;

    let mut extracted = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(ZipError::UnsupportedArchive(_)) | Err(ZipError::InvalidPassword) => {
                Err(ArchiveError::UnsupportedEntryError(name.clone(), index))?
            }
            Err(error) => Err(error)?,
        };
        if entry.is_dir() {
            continue;
        }
        let Some(entry_path) = entry.enclosed_name() else {
            warn!("Skip entry '{}' of {}: unsafe path", entry.name(), name);
            continue;
        };

        let suffix = entry_path
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();
        let output = directory.join(format!("{prefix}-{index}-{system_id}{suffix}"));
        std::io::copy(&mut entry, &mut File::create(&output)?)?;
        extracted.push(output);
    }

    info!("Extracted {} files from {}", extracted.len(), name);
    Ok(extracted)
}
