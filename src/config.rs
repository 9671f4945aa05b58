//! Run configuration.
//!
//! Settings are read from a YAML file (`./config.yml` by default). Every key
//! is optional and unknown keys are rejected:
//!
//! ```yaml
//! download_path: ./downloads
//! output_path: hostnames.csv
//! log_level: info
//! file_pattern: "hw-inventory-*"
//! max_archive_depth: 4
//! rules:
//!   unique_headers:
//!     hw-inventory-349: IP Address
//!   excluded_sheets: [decommissioned]
//! ```
//!
//! The `rules` tables are plain data; [`Rules`] builds the normalizer, the
//! column matcher and the table scanner from them.

use crate::error::InventoryError;
use crate::inventory::extract::DEFAULT_MAX_ARCHIVE_DEPTH;
use crate::inventory::hostname::HostnameNormalizer;
use crate::inventory::matcher::ColumnMatcher;
use crate::inventory::scanner::TableScanner;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "./config.yml";

const DEFAULT_DOWNLOAD_PATH: &str = "./downloads";
const DEFAULT_OUTPUT_PATH: &str = "hostnames.csv";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_FILE_PATTERN: &str = "*";
const DEFAULT_MIN_HEADER_VALUES: usize = 2;
const DEFAULT_TEXT_MARKER: &str = "device name:";

/// Spreadsheet host column candidates, most likely first
const HEADERS: &[&str] = &[
    "hostname",
    "identifier",
    "host name",
    "inventory",
    "doed name",
    "fims hostname",
    "doed vm name",
    "server name",
    "node",
    "asset classification 1",
    "configuration item",
];

/// Table header candidates of word-processor and PDF documents
const DOCUMENT_HEADERS: &[&str] = &["cname", "hostname", "identifier"];

/// Documents whose hosts sit under a header that is not a general candidate
const UNIQUE_HEADERS: &[(&str, &str)] = &[
    ("hw-inventory-349", "IP Address"),
    ("hw-inventory-527", "Name/Type"),
    ("hw-inventory-534", "Master Host"),
];

const EXCLUDED_HEADERS: &[&str] = &["prior hostname", "server name / function"];

const EXCLUDED_HEADERS_BY_DOCUMENT: &[(&str, &[&str])] = &[("hw-inventory-593", &["doed vm name"])];

const EXCLUDED_SHEETS: &[&str] = &["decommissioned"];

/// Instructional text of the inventory templates
const EXCLUDED_ROW_PREFIXES: &[&str] = &[
    "assets are owned and maintained by",
    "delete column a",
    "guidance",
    "if a device has multiple ip addresses",
    "infrastructure example",
    "mandatory or optional",
    "optional",
    "valid values",
    "yes or no",
    "reviewed",
    "customer",
    "contract name",
    "siebel",
    "award date",
    "start date",
    "contract end date",
    "inventory system",
    "principle office",
    "csam name",
    "server order",
    "invoice name",
    "server order form",
];

/// Template placeholders that look like hostnames
const EXCLUDED_HOSTNAMES: &[&str] = &[
    "bigiploadbalancer",
    "ciscoswitch",
    "ciscol2aggregator",
    "ciscoraccessrouter",
    "windowsserver",
    "nasaas",
    "na",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration '{0}': {1}")]
    ReadError(String, std::io::Error),

    #[error("Invalid configuration '{0}': {1}")]
    ParseError(String, serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub download_path: PathBuf,
    pub output_path: PathBuf,
    pub log_level: String,
    pub file_pattern: String,
    pub max_archive_depth: usize,
    pub rules: Rules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from(DEFAULT_DOWNLOAD_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            file_pattern: DEFAULT_FILE_PATTERN.to_owned(),
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
            rules: Rules::default(),
        }
    }
}

impl Config {
    /// Reads and validates a configuration file
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let name = path.to_string_lossy().to_string();
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::ReadError(name.clone(), error))?;
        let config = Self::parse(&name, &text)?;
        debug!("Configuration loaded from {}", name);
        Ok(config)
    }

    /// Like [`Config::load`], with the defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, InventoryError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn parse(name: &str, text: &str) -> Result<Self, InventoryError> {
        // An empty file is a document without keys
        let config = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str::<Self>(text).map_err(|error| ConfigError::ParseError(name.to_owned(), error))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_pattern.trim().is_empty() {
            return Err(ConfigError::ValidationError("file_pattern must not be empty".to_owned()));
        }
        if self.rules.min_header_values == 0 {
            return Err(ConfigError::ValidationError("rules.min_header_values must be at least 1".to_owned()));
        }
        if self.rules.text_marker.trim().is_empty() {
            return Err(ConfigError::ValidationError("rules.text_marker must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// Header, sheet, row and hostname tables driving extraction
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Rules {
    pub headers: Vec<String>,
    pub document_headers: Vec<String>,
    pub unique_headers: HashMap<String, String>,
    pub excluded_headers: Vec<String>,
    pub excluded_headers_by_document: HashMap<String, Vec<String>>,
    pub excluded_sheets: Vec<String>,
    pub excluded_row_prefixes: Vec<String>,
    pub excluded_hostnames: Vec<String>,
    pub min_header_values: usize,
    pub text_marker: String,
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            headers: to_strings(HEADERS),
            document_headers: to_strings(DOCUMENT_HEADERS),
            unique_headers: UNIQUE_HEADERS
                .iter()
                .map(|(document, header)| (document.to_string(), header.to_string()))
                .collect(),
            excluded_headers: to_strings(EXCLUDED_HEADERS),
            excluded_headers_by_document: EXCLUDED_HEADERS_BY_DOCUMENT
                .iter()
                .map(|(document, headers)| (document.to_string(), to_strings(headers)))
                .collect(),
            excluded_sheets: to_strings(EXCLUDED_SHEETS),
            excluded_row_prefixes: to_strings(EXCLUDED_ROW_PREFIXES),
            excluded_hostnames: to_strings(EXCLUDED_HOSTNAMES),
            min_header_values: DEFAULT_MIN_HEADER_VALUES,
            text_marker: DEFAULT_TEXT_MARKER.to_owned(),
        }
    }
}

impl Rules {
    pub fn normalizer(&self) -> HostnameNormalizer {
        HostnameNormalizer::new(&self.excluded_hostnames)
    }

    pub fn matcher(&self) -> ColumnMatcher {
        ColumnMatcher::new(&self.headers)
            .with_overrides(&self.unique_headers)
            .with_exclusions(&self.excluded_headers)
            .with_document_exclusions(&self.excluded_headers_by_document)
    }

    pub fn scanner(&self) -> TableScanner {
        TableScanner::new(&self.excluded_sheets, &self.excluded_row_prefixes, self.min_header_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() -> Result<(), InventoryError> {
        let config = Config::parse(
            "config.yml",
            "download_path: /data/csam\nrules:\n  excluded_sheets: [archive, decommissioned]\n  min_header_values: 3\n",
        )?;
        assert_eq!(config.download_path, PathBuf::from("/data/csam"));
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.rules.excluded_sheets, vec!["archive", "decommissioned"]);
        assert_eq!(config.rules.min_header_values, 3);
        assert_eq!(config.rules.headers, Rules::default().headers);
        assert_eq!(Config::parse("config.yml", "\n")?, Config::default());
        Ok(())
    }

    #[test]
    fn rejects_unknown_and_invalid_keys() {
        let unknown = Config::parse("config.yml", "download_pth: ./x\n").err();
        assert!(matches!(unknown, Some(InventoryError::ConfigError(ConfigError::ParseError(_, _)))));

        let invalid = Config::parse("config.yml", "rules:\n  min_header_values: 0\n").err();
        assert!(matches!(invalid, Some(InventoryError::ConfigError(ConfigError::ValidationError(_)))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() -> Result<(), InventoryError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("config.yml");
        assert_eq!(Config::load_or_default(&path)?, Config::default());
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "output_path: out.csv\nmax_archive_depth: 1\n")?;
        let config = Config::load_or_default(&path)?;
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
        assert_eq!(config.max_archive_depth, 1);
        Ok(())
    }

    #[test]
    fn row_prefixes_are_separate_entries() {
        let rules = Rules::default();
        assert_eq!(rules.excluded_row_prefixes.len(), 22);
        assert!(rules.excluded_row_prefixes.contains(&"mandatory or optional".to_owned()));
    }
}
