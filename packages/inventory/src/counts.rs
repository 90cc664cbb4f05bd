//! Per-address service-line counts.
//!
//! Derived from the address-keyed lookup: every key with more than one
//! service line is listed with its count, and written next to the lookup
//! as `address-service-counts.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chi_pb_inventory_models::{InventoryLookup, ServiceCounts, ServiceCountsMetadata};

/// File name of the counts artifact.
pub const COUNTS_FILE_NAME: &str = "address-service-counts.json";

/// Returns the counts artifact path beside a lookup artifact.
#[must_use]
pub fn counts_path(lookup_path: &Path) -> PathBuf {
    lookup_path.with_file_name(COUNTS_FILE_NAME)
}

/// Counts service lines per address in `lookup`, keeping addresses with
/// more than one. `source` names the CSV the lookup was built from.
#[must_use]
pub fn service_counts(
    lookup: &InventoryLookup,
    source: &str,
    generated_at: String,
) -> ServiceCounts {
    let counts: BTreeMap<String, u32> = lookup
        .iter()
        .filter(|(_, lines)| lines.len() > 1)
        .map(|(key, lines)| (key.clone(), u32::try_from(lines.len()).unwrap_or(u32::MAX)))
        .collect();

    ServiceCounts {
        total_addresses: lookup.len() as u64,
        addresses_with_multiple_lines: counts.len() as u64,
        counts,
        metadata: ServiceCountsMetadata {
            generated_at,
            source: source.to_string(),
        },
    }
}

/// Logs the summary and the `top` busiest addresses.
pub fn log_summary(counts: &ServiceCounts, top: usize) {
    log::info!(
        "  {} of {} addresses have more than one service line",
        counts.addresses_with_multiple_lines,
        counts.total_addresses
    );
    for (address, count) in counts.busiest(top) {
        log::info!("    {address}: {count} service lines");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chi_pb_inventory_models::CompactServiceLine;

    fn line(row: u64) -> CompactServiceLine {
        CompactServiceLine {
            row,
            public_material: "L".to_string(),
            private_material: "C".to_string(),
            gooseneck: "U".to_string(),
            overall: "L".to_string(),
        }
    }

    #[test]
    fn keeps_only_multi_line_addresses() {
        let lookup = InventoryLookup::from([
            ("1234 n state st 60610".to_string(), vec![line(1)]),
            ("5408 5412 n kenmore ave 60640".to_string(), vec![line(2), line(3)]),
            ("10 w lake st".to_string(), vec![line(4), line(5), line(6)]),
        ]);

        let counts = service_counts(&lookup, "service-lines.csv", "t".to_string());
        assert_eq!(counts.total_addresses, 3);
        assert_eq!(counts.addresses_with_multiple_lines, 2);
        assert_eq!(counts.count("5408 5412 n kenmore ave 60640"), Some(2));
        assert_eq!(counts.count("1234 n state st 60610"), None);
        assert_eq!(counts.busiest(1), vec![("10 w lake st", 3)]);
        assert_eq!(counts.metadata.source, "service-lines.csv");
    }

    #[test]
    fn empty_lookup_has_no_counts() {
        let counts = service_counts(&InventoryLookup::new(), "x.csv", String::new());
        assert_eq!(counts.total_addresses, 0);
        assert!(counts.counts.is_empty());
    }

    #[test]
    fn counts_sit_beside_lookup() {
        assert_eq!(
            counts_path(Path::new("data/processed/inventory-lookup.json")),
            PathBuf::from("data/processed/address-service-counts.json")
        );
    }
}
