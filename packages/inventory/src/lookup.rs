//! Address-keyed inventory lookup.
//!
//! Built from the same service-lines CSV as the search index. Each row's
//! display address (ranges rendered as `low-high`, city suffix removed)
//! is collapsed to lowercase words and used as the key, so a display
//! address returned by the search index finds its service lines
//! directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chi_pb_inventory_models::{
    CompactServiceLine, InventoryLookup, InventoryReport, LOOKUP_VERSION, LookupMetadata,
    UNKNOWN_MATERIAL,
};
use chi_pb_search_index::artifact;
use chi_pb_search_index::normalize;
use chi_pb_search_index::progress::ProgressCallback;
use chi_pb_search_index::service_lines::{self, ServiceLineRow, leading_int};

use crate::InventoryError;
use crate::counts;
use crate::report::report_from_compact;

/// Lookup key for an address: lowercase, punctuation to spaces,
/// whitespace collapsed.
#[must_use]
pub fn lookup_key(address: &str) -> String {
    normalize::collapse(address)
}

/// Returns the metadata sidecar path for a lookup artifact:
/// `inventory-lookup.json` → `inventory-lookup-metadata.json`.
#[must_use]
pub fn metadata_path(lookup_path: &Path) -> PathBuf {
    let stem = lookup_path
        .file_stem()
        .map_or_else(|| "inventory-lookup".into(), |s| s.to_string_lossy());
    lookup_path.with_file_name(format!("{stem}-metadata.json"))
}

/// Accumulates service lines by address.
#[derive(Debug, Default)]
pub struct LookupBuilder {
    lookup: InventoryLookup,
    total_records: u64,
    skipped_rows: u64,
}

impl LookupBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one row. Rows without an address or a row id are skipped;
    /// returns whether the row was added.
    pub fn push_row(&mut self, row: &ServiceLineRow) -> bool {
        let row_id = leading_int::<u64>(&row.row).unwrap_or(0);
        if row_id == 0 || row.matched_address.trim().is_empty() {
            self.skipped_rows += 1;
            return false;
        }

        let key = lookup_key(&row.short_address());
        let line = CompactServiceLine {
            row: row_id,
            public_material: or_unknown(&row.pws_owned_service_line_material),
            private_material: or_unknown(&row.customer_side_service_line_material),
            gooseneck: or_unknown(&row.gooseneck_pigtail),
            overall: or_unknown(&row.classification_for_entire_service_line),
        };

        self.lookup.entry(key).or_default().push(line);
        self.total_records += 1;
        true
    }

    /// Rows skipped so far.
    #[must_use]
    pub const fn skipped_rows(&self) -> u64 {
        self.skipped_rows
    }

    /// Returns the lookup and its metadata.
    #[must_use]
    pub fn finish(self) -> (InventoryLookup, LookupMetadata) {
        let metadata = LookupMetadata {
            total_records: self.total_records,
            unique_addresses: self.lookup.len() as u64,
            generated_at: chrono::Utc::now().to_rfc3339(),
            version: LOOKUP_VERSION.to_string(),
        };
        (self.lookup, metadata)
    }
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN_MATERIAL.to_string()
    } else {
        value.to_string()
    }
}

/// Statistics from a lookup build.
#[derive(Debug, Clone)]
pub struct LookupStats {
    /// Service lines written.
    pub total_records: u64,
    /// Distinct address keys.
    pub unique_addresses: u64,
    /// Rows skipped for lacking an address or row id.
    pub skipped_rows: u64,
    /// Addresses with more than one service line.
    pub multi_line_addresses: u64,
    /// Size of the JSON artifact in bytes.
    pub artifact_size_bytes: u64,
    /// Size of the `.zst` sibling, when one was written.
    pub compressed_size_bytes: Option<u64>,
    /// Wall-clock build time.
    pub build_time_secs: f64,
}

/// Builds the address-keyed lookup and writes it with its metadata
/// sidecar and the per-address service counts. The work runs on a
/// blocking thread.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read or an artifact cannot be
/// written.
pub async fn build_lookup(
    input_csv: &Path,
    output_path: &Path,
    compress: bool,
    progress: Arc<dyn ProgressCallback>,
) -> Result<LookupStats, InventoryError> {
    let input_csv = input_csv.to_path_buf();
    let output_path = output_path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        build_lookup_sync(&input_csv, &output_path, compress, progress.as_ref())
    })
    .await?
}

/// Synchronous lookup build implementation.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read or an artifact cannot be
/// written.
pub fn build_lookup_sync(
    input_csv: &Path,
    output_path: &Path,
    compress: bool,
    progress: &dyn ProgressCallback,
) -> Result<LookupStats, InventoryError> {
    let start = Instant::now();
    let mut builder = LookupBuilder::new();

    progress.set_message("grouping service lines by address".to_string());
    service_lines::parse_file(input_csv, |row| {
        builder.push_row(&row);
        progress.inc(1);
    })?;

    let skipped_rows = builder.skipped_rows();
    if skipped_rows > 0 {
        log::warn!("{skipped_rows} rows had no address or row id and were skipped");
    }

    let (lookup, metadata) = builder.finish();

    progress.set_message("writing lookup".to_string());
    let written = artifact::write_json(&lookup, output_path, compress)?;
    artifact::write_json(&metadata, &metadata_path(output_path), false)?;

    let source = input_csv
        .file_name()
        .map_or_else(|| input_csv.display().to_string(), |n| n.to_string_lossy().into_owned());
    let service_counts = counts::service_counts(&lookup, &source, metadata.generated_at.clone());
    artifact::write_json(&service_counts, &counts::counts_path(output_path), false)?;
    counts::log_summary(&service_counts, 5);

    let elapsed = start.elapsed();
    log::info!(
        "Inventory lookup built: {} records, {} addresses, {:.1}s",
        metadata.total_records,
        metadata.unique_addresses,
        elapsed.as_secs_f64()
    );
    progress.finish(format!("{} addresses", metadata.unique_addresses));

    Ok(LookupStats {
        total_records: metadata.total_records,
        unique_addresses: metadata.unique_addresses,
        skipped_rows,
        multi_line_addresses: service_counts.addresses_with_multiple_lines,
        artifact_size_bytes: written.size_bytes,
        compressed_size_bytes: written.compressed_size_bytes,
        build_time_secs: elapsed.as_secs_f64(),
    })
}

/// A loaded address-keyed lookup.
#[derive(Debug, Clone, Default)]
pub struct AddressLookup {
    lookup: InventoryLookup,
}

impl AddressLookup {
    /// Wraps an in-memory lookup.
    #[must_use]
    pub const fn new(lookup: InventoryLookup) -> Self {
        Self { lookup }
    }

    /// Reads a lookup artifact (plain JSON or zstd).
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read or decoded.
    pub fn open(path: &Path) -> Result<Self, InventoryError> {
        let lookup: InventoryLookup = artifact::read_json(path)?;
        log::info!(
            "Loaded inventory lookup with {} addresses from {}",
            lookup.len(),
            path.display()
        );
        Ok(Self::new(lookup))
    }

    /// Number of distinct addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns `true` if the lookup holds no addresses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Raw service lines at `address`.
    #[must_use]
    pub fn lines(&self, address: &str) -> &[CompactServiceLine] {
        self.lookup
            .get(&lookup_key(address))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Reports for every service line at `address`, in CSV order. Empty
    /// when the address is unknown.
    #[must_use]
    pub fn find(&self, address: &str) -> Vec<InventoryReport> {
        self.lines(address)
            .iter()
            .map(|line| report_from_compact(line, address))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chi_pb_inventory_models::{LeadStatus, ServiceCounts};
    use chi_pb_search_index::progress::NullProgress;

    const SERVICE_LINES: &str = "\u{feff}row,matched_address,stnum1,stnum2,pws_owned_service_line_material,customer_side_service_line_material,gooseneck_pigtail,classification_for_entire_service_line\n\
        1,\"1234 N STATE ST, CHICAGO, IL, 60610\",1234,1234,L,C,N,L\n\
        2,\"5408 N KENMORE AVE, CHICAGO, IL, 60640\",5408,5412,G,,U,GRR\n\
        3,\"5408 N KENMORE AVE, CHICAGO, IL, 60640\",5408,5412,C,C,N,NL\n\
        0,\"1 NOWHERE ST\",1,1,L,L,L,L\n\
        4,,1,1,L,L,L,L\n";

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn lookup() -> AddressLookup {
        let mut builder = LookupBuilder::new();
        service_lines::parse_reader(SERVICE_LINES.as_bytes(), |row| {
            builder.push_row(&row);
        })
        .unwrap();
        assert_eq!(builder.skipped_rows(), 2);
        AddressLookup::new(builder.finish().0)
    }

    #[test]
    fn keys_by_collapsed_display_address() {
        assert_eq!(
            lookup_key("5408-5412 N KENMORE AVE, 60640"),
            "5408 5412 n kenmore ave 60640"
        );

        let lookup = lookup();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.lines("5408-5412 N Kenmore Ave, 60640").len(), 2);
        assert_eq!(lookup.lines("1234 N. State St. 60610").len(), 1);
    }

    #[test]
    fn groups_lines_in_csv_order() {
        let reports = lookup().find("5408-5412 N KENMORE AVE, 60640");
        let rows: Vec<u64> = reports.iter().map(|r| r.row_id).collect();
        assert_eq!(rows, vec![2, 3]);
        assert_eq!(
            reports[0].lead_status,
            LeadStatus::GalvanizedRequiringReplacement
        );
        assert_eq!(reports[0].customer_side_material, "U");
        assert_eq!(reports[1].lead_status, LeadStatus::NonLead);
        assert_eq!(reports[0].full_address, "5408-5412 N KENMORE AVE, 60640");
    }

    #[test]
    fn unknown_address_is_empty() {
        assert!(lookup().find("1 Nowhere St").is_empty());
        assert!(lookup().find("").is_empty());
    }

    #[test]
    fn metadata_sits_beside_lookup() {
        assert_eq!(
            metadata_path(Path::new("data/processed/inventory-lookup.json")),
            PathBuf::from("data/processed/inventory-lookup-metadata.json")
        );
    }

    #[test]
    fn builds_writes_and_reopens() {
        let dir = temp_dir("chi_pb_inventory_lookup_test");
        let csv_path = dir.join("service-lines.csv");
        std::fs::write(&csv_path, SERVICE_LINES).unwrap();
        let output = dir.join("inventory-lookup.json");

        let stats = build_lookup_sync(&csv_path, &output, true, &NullProgress).unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.unique_addresses, 2);
        assert_eq!(stats.skipped_rows, 2);

        let metadata: LookupMetadata = artifact::read_json(&metadata_path(&output)).unwrap();
        assert_eq!(metadata.total_records, 3);
        assert_eq!(metadata.version, LOOKUP_VERSION);

        assert_eq!(stats.multi_line_addresses, 1);
        let service_counts: ServiceCounts =
            artifact::read_json(&counts::counts_path(&output)).unwrap();
        assert_eq!(service_counts.total_addresses, 2);
        assert_eq!(
            service_counts.count("5408 5412 n kenmore ave 60640"),
            Some(2)
        );
        assert_eq!(service_counts.metadata.source, "service-lines.csv");
        assert_eq!(service_counts.metadata.generated_at, metadata.generated_at);

        let reopened = AddressLookup::open(&artifact::compressed_path(&output)).unwrap();
        assert_eq!(reopened.find("1234 N STATE ST, 60610")[0].row_id, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
