#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the service line inventory lookup.
//!
//! The address-keyed lookup artifact maps a collapsed address string to
//! the compact service lines found there. Either that artifact or a row
//! of the full inventory CSV can be turned into an [`InventoryReport`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use chi_pb_search_index_models::LeadStatus;

/// Version tag written into [`LookupMetadata::version`].
pub const LOOKUP_VERSION: &str = "2.0.0";

/// Placeholder stored for a material the inventory does not report.
pub const UNKNOWN_MATERIAL: &str = "U";

/// One service line in the address-keyed lookup artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactServiceLine {
    /// Inventory row id.
    #[serde(rename = "i")]
    pub row: u64,
    /// Utility-owned side material.
    #[serde(rename = "p")]
    pub public_material: String,
    /// Customer-owned side material.
    #[serde(rename = "r")]
    pub private_material: String,
    /// Gooseneck / pigtail material.
    #[serde(rename = "g")]
    pub gooseneck: String,
    /// Overall classification code.
    #[serde(rename = "o")]
    pub overall: String,
}

/// Address-keyed lookup: collapsed address → service lines, in CSV
/// order.
pub type InventoryLookup = BTreeMap<String, Vec<CompactServiceLine>>;

/// Sidecar metadata for the lookup artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupMetadata {
    /// Service lines written.
    pub total_records: u64,
    /// Distinct address keys.
    pub unique_addresses: u64,
    /// Build time, RFC 3339.
    pub generated_at: String,
    /// Format version tag.
    pub version: String,
}

/// How many service lines each address has, kept only for addresses
/// with more than one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCounts {
    /// Distinct addresses seen.
    pub total_addresses: u64,
    /// Addresses with two or more service lines.
    pub addresses_with_multiple_lines: u64,
    /// Lookup key → service-line count, for multi-line addresses only.
    pub counts: BTreeMap<String, u32>,
    /// Provenance.
    pub metadata: ServiceCountsMetadata,
}

/// Provenance of a [`ServiceCounts`] artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCountsMetadata {
    /// Build time, RFC 3339.
    pub generated_at: String,
    /// File name of the CSV the counts came from.
    pub source: String,
}

impl ServiceCounts {
    /// Service lines at `key`. Addresses not listed have at most one.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<u32> {
        self.counts.get(key).copied()
    }

    /// The `n` addresses with the most service lines, most first, ties
    /// by key.
    #[must_use]
    pub fn busiest(&self, n: usize) -> Vec<(&str, u32)> {
        let mut ranked: Vec<(&str, u32)> = self
            .counts
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// How much the inventory's answer can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// At least one material is unknown.
    Low,
    /// Every material is reported.
    Medium,
}

impl Confidence {
    /// Low if any of the given materials is unknown or blank.
    #[must_use]
    pub fn from_materials(materials: &[&str]) -> Self {
        let has_unknown = materials
            .iter()
            .any(|m| m.trim().is_empty() || m.trim().eq_ignore_ascii_case(UNKNOWN_MATERIAL));
        if has_unknown { Self::Low } else { Self::Medium }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low - Contains unknown materials",
            Self::Medium => "Medium - Based on available records",
        }
    }
}

/// Everything the inventory says about one service line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    /// Inventory row id.
    pub row_id: u64,
    /// Address as recorded in the inventory (or as queried).
    pub full_address: String,
    /// Service line material (the utility-side material).
    pub service_line_material: String,
    /// Customer-owned side material.
    pub customer_side_material: String,
    /// Utility-owned side material.
    pub utility_side_material: String,
    /// Overall classification code (`L`, `GRR`, `NL`, `U`).
    pub overall_code: String,
    /// Gooseneck / pigtail material.
    pub gooseneck: String,
    /// Whether the property is flagged high risk.
    pub high_risk: bool,
    /// Lead status derived from [`overall_code`](Self::overall_code).
    pub lead_status: LeadStatus,
    /// Confidence in the reported materials.
    pub confidence: Confidence,
    /// Extra flags from the inventory, one sentence each.
    pub additional_notes: Vec<String>,
}

impl InventoryReport {
    /// Notes joined with `"; "`, empty when there are none.
    #[must_use]
    pub fn notes_text(&self) -> String {
        self.additional_notes.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_or_blank_material_lowers_confidence() {
        assert_eq!(Confidence::from_materials(&["L", "U", "N"]), Confidence::Low);
        assert_eq!(Confidence::from_materials(&["L", "", "N"]), Confidence::Low);
        assert_eq!(Confidence::from_materials(&["L", "C", "N"]), Confidence::Medium);
    }

    #[test]
    fn compact_lines_use_short_keys() {
        let line = CompactServiceLine {
            row: 12,
            public_material: "L".to_string(),
            private_material: "C".to_string(),
            gooseneck: "U".to_string(),
            overall: "L".to_string(),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["i"], 12);
        assert_eq!(json["p"], "L");
        assert_eq!(json["r"], "C");
        assert_eq!(json["g"], "U");
        assert_eq!(json["o"], "L");
    }

    #[test]
    fn ranks_busiest_addresses() {
        let counts = ServiceCounts {
            total_addresses: 10,
            addresses_with_multiple_lines: 3,
            counts: BTreeMap::from([
                ("b st".to_string(), 2),
                ("a st".to_string(), 2),
                ("c st".to_string(), 5),
            ]),
            metadata: ServiceCountsMetadata {
                generated_at: String::new(),
                source: "service-lines.csv".to_string(),
            },
        };

        assert_eq!(counts.busiest(2), vec![("c st", 5), ("a st", 2)]);
        assert_eq!(counts.busiest(10).len(), 3);
        assert_eq!(counts.count("b st"), Some(2));
        assert_eq!(counts.count("z st"), None);

        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["addressesWithMultipleLines"], 3);
        assert_eq!(json["metadata"]["source"], "service-lines.csv");
    }

    #[test]
    fn metadata_uses_camel_case() {
        let meta = LookupMetadata {
            total_records: 3,
            unique_addresses: 2,
            generated_at: "2024-01-01T00:00:00+00:00".to_string(),
            version: LOOKUP_VERSION.to_string(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["totalRecords"], 3);
        assert_eq!(json["uniqueAddresses"], 2);
    }
}
