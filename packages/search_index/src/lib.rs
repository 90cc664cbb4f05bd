#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address search index for Chicago's lead service line inventory.
//!
//! # Architecture
//!
//! - **Build time**: rows of the city's geocoded service-lines CSV are
//!   coerced into address records, their streets normalized
//!   (`"NORTH STATE STREET"` → `"n state st"`), and registered in four
//!   inverted maps: exact street key, word, word pair, and word prefix.
//!   The result is written as one JSON artifact plus a zstd copy.
//! - **Query time**: the artifact is loaded once through an
//!   [`loader::IndexLoader`], and free-text queries are normalized the
//!   same way and resolved tier by tier, then filtered by house number
//!   and ZIP. [`spatial::SpatialIndex`] answers radius queries over the
//!   records' coordinates.
//!
//! # Usage
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use chi_pb_search_index::loader::IndexLoader;
//! use chi_pb_search_index::resolve::Resolver;
//!
//! let loader = IndexLoader::for_location("data/processed/combined-index.json")?;
//! let resolver = Resolver::new(loader.get().await?);
//! for record in resolver.resolve("5410 N Kenmore Ave") {
//!     println!("{} (row {})", record.display_address, record.row_reference);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod builder;
pub mod config;
pub mod loader;
pub mod normalize;
pub mod paths;
pub mod progress;
pub mod query;
pub mod resolve;
pub mod service_lines;
pub mod spatial;
pub mod synonyms;
pub mod verify;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub use chi_pb_search_index_models::{
    AddressRecord, IndexMetadata, IndexStats, LeadStatus, MatchTier, SearchIndex,
    SearchIndexConfig, StreetNameIndex,
};

use builder::IndexBuilder;
use progress::ProgressCallback;

/// Errors from search index operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchIndexError {
    /// Service-lines CSV error.
    #[error("Service lines error: {0}")]
    Csv(#[from] service_lines::CsvError),

    /// Artifact read/write error.
    #[error("Artifact error: {0}")]
    Artifact(#[from] artifact::ArtifactError),

    /// Index load error.
    #[error("Load error: {0}")]
    Load(#[from] loader::LoadError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Async task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Inputs for one index build.
pub struct BuildConfig<'a> {
    /// Service-lines CSV (plain or `.zst`).
    pub input_csv: &'a Path,
    /// Where the JSON artifact is written.
    pub output_path: &'a Path,
    /// Whether to also write the `.zst` copy and its `.meta` sidecar.
    pub compress: bool,
    /// Version tag recorded in the metadata.
    pub version: &'a str,
}

impl<'a> BuildConfig<'a> {
    /// Borrows the build settings from a loaded config, with its paths
    /// already resolved by the caller.
    #[must_use]
    pub fn from_config(
        config: &'a SearchIndexConfig,
        input_csv: &'a Path,
        output_path: &'a Path,
    ) -> Self {
        Self {
            input_csv,
            output_path,
            compress: config.compress,
            version: &config.version,
        }
    }
}

/// Builds the index from the service-lines CSV and writes the artifact.
///
/// This is the main entry point for index construction. It:
/// 1. Streams the CSV, coercing each row and registering its streets
/// 2. Deduplicates every bucket and stamps the metadata
/// 3. Writes the JSON artifact and, if enabled, the zstd copy
///
/// The work runs on a blocking thread.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read or the artifact cannot be
/// written.
pub async fn build_index(
    config: BuildConfig<'_>,
    progress: Arc<dyn ProgressCallback>,
) -> Result<IndexStats, SearchIndexError> {
    let input_csv = config.input_csv.to_path_buf();
    let output_path = config.output_path.to_path_buf();
    let compress = config.compress;
    let version = config.version.to_string();

    tokio::task::spawn_blocking(move || {
        build_index_sync(
            &input_csv,
            &output_path,
            compress,
            &version,
            progress.as_ref(),
        )
    })
    .await?
}

/// Synchronous index build implementation.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read or the artifact cannot be
/// written.
pub fn build_index_sync(
    input_csv: &Path,
    output_path: &Path,
    compress: bool,
    version: &str,
    progress: &dyn ProgressCallback,
) -> Result<IndexStats, SearchIndexError> {
    let start = Instant::now();

    let (index, coerced_rows, intersections) = read_index(input_csv, version, progress)?;

    progress.set_message("writing artifact".to_string());
    let written = artifact::write_json(&index, output_path, compress)?;

    let elapsed = start.elapsed();
    log::info!(
        "Index built: {} addresses, {} streets, {:.1}s",
        index.metadata.total_addresses,
        index.metadata.unique_streets,
        elapsed.as_secs_f64()
    );
    progress.finish(format!(
        "{} addresses indexed",
        index.metadata.total_addresses
    ));

    Ok(IndexStats {
        total_addresses: index.metadata.total_addresses,
        unique_streets: index.metadata.unique_streets,
        coerced_rows,
        intersections,
        artifact_size_bytes: written.size_bytes,
        compressed_size_bytes: written.compressed_size_bytes,
        build_time_secs: elapsed.as_secs_f64(),
    })
}

/// Streams the CSV through an [`IndexBuilder`] without writing anything.
/// Returns the index plus the coerced-row and intersection counts.
fn read_index(
    input_csv: &Path,
    version: &str,
    progress: &dyn ProgressCallback,
) -> Result<(SearchIndex, u64, u64), SearchIndexError> {
    let mut builder = IndexBuilder::new(version);
    progress.set_message("indexing service lines".to_string());

    service_lines::parse_file(input_csv, |row| {
        builder.push_row(&row);
        progress.inc(1);
        if builder.len().is_multiple_of(100_000) {
            log::info!("  indexed {} records...", builder.len());
        }
    })?;

    if builder.coerced_rows() > 0 {
        log::warn!(
            "{} rows had unparseable numeric fields and were defaulted",
            builder.coerced_rows()
        );
    }
    log::info!("  {} intersection rows", builder.intersections());

    let coerced_rows = builder.coerced_rows();
    let intersections = builder.intersections();
    Ok((builder.finish(), coerced_rows, intersections))
}

/// Builds an in-memory index from a CSV without writing an artifact.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read.
pub fn build_in_memory(input_csv: &Path, version: &str) -> Result<SearchIndex, SearchIndexError> {
    read_index(input_csv, version, &progress::NullProgress).map(|(index, _, _)| index)
}
