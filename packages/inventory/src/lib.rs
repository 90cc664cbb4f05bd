#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Service line inventory lookups.
//!
//! Two ways in:
//!
//! - [`lookup`]: an address-keyed artifact built from the service-lines
//!   CSV, so a display address returned by the search index maps to its
//!   service lines without touching the full inventory.
//! - [`scan`]: a row-id scan of the full inventory CSV, which carries the
//!   risk and notification flags the compact artifact leaves out.
//!
//! [`counts`] summarizes the lookup into per-address service-line counts.

pub mod counts;
pub mod lookup;
pub mod report;
pub mod scan;

pub use chi_pb_inventory_models::{
    CompactServiceLine, Confidence, InventoryLookup, InventoryReport, LookupMetadata,
    ServiceCounts,
};

use chi_pb_search_index::artifact::ArtifactError;
use chi_pb_search_index::service_lines::CsvError;

/// Errors from inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Inventory CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File or URL being read.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Inventory file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Download failed.
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying request error.
        source: reqwest::Error,
    },

    /// Server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Service-lines CSV error.
    #[error("Service lines error: {0}")]
    ServiceLines(#[from] CsvError),

    /// Artifact read/write error.
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Async task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
