//! # CSAM Hardware Inventory Extraction
//!
//! Reads the hardware inventory documents attached to tracked systems and
//! consolidates the hostnames they list into a single CSV.
//!
//! Inventories arrive in whatever format their owners chose: Excel workbooks
//! (`.xlsx`, `.xlsm`, `.xls`), Word documents (`.docx`, `.doc`), PDFs, or zip
//! archives of any of these. Each file is named `<prefix>-<system id>.<ext>`.
//!
//! ## Features
//!
//! - **Spreadsheets**: finds the header row below template boilerplate and
//!   picks the host column by prioritized header candidates, with
//!   per-document overrides and exclusions
//! - **Documents**: reads host columns of tables, stitching tables split
//!   across pages, and falls back to `Device Name:` lines
//! - **Archives**: expands zip files next to the archive, keeping the system id
//!   in the extracted names
//! - **Normalization**: splits multi-value cells and reduces every value to a
//!   lowercase short hostname
//!
//! ## Example
//!
//! ```no_run
//! use csam_inventory::{Config, Extractor, RawDocument};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), csam_inventory::InventoryError> {
//! let config = Config::default();
//! let extractor = Extractor::from_config(&config);
//! let hostnames = extractor.extract(&RawDocument::new(PathBuf::from("hw-inventory-402.xlsx")))?;
//! for hostname in hostnames {
//!     println!("{hostname}");
//! }
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod document;
pub mod error;
mod helpers;
pub mod inventory;
pub mod spreadsheet;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use config::Rules;
pub use error::InventoryError;
pub use inventory::batch::Batch;
pub use inventory::batch::BatchReport;
pub use inventory::extract::Extractor;
pub use inventory::hostname::HostnameSet;
pub use inventory::DocumentKind;
pub use inventory::RawDocument;
