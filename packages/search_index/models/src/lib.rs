#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the lead service line address search index.
//!
//! This crate contains only data types, configuration structs, and simple
//! conversions. It has no heavyweight dependencies (no regex, no I/O), so
//! the artifact schema can be consumed by anything that deserializes JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Suffix appended to prefix keys so that a truncated token such as
/// `"ken*"` never collides with a genuine word key such as `"ken"`.
pub const PREFIX_SENTINEL: char = '*';

/// Version tag written into [`IndexMetadata::version`] by default.
pub const DEFAULT_INDEX_VERSION: &str = "2.0.0-tiered";

/// Configuration for building or loading the search index.
///
/// Every field has a default so an empty TOML file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    /// Raw service-lines CSV snapshot. Defaults to
    /// `data/raw/service-lines.csv` when unset.
    #[serde(default)]
    pub input_csv: Option<String>,

    /// Where the JSON artifact is written. Defaults to
    /// `data/processed/combined-index.json` when unset.
    #[serde(default)]
    pub output_path: Option<String>,

    /// Whether a zstd-compressed sibling (`.zst`) is written next to
    /// the JSON artifact.
    #[serde(default = "default_compress")]
    pub compress: bool,

    /// Where the lookup side loads the artifact from: a local path or
    /// an `http(s)://` URL. Falls back to `output_path` when unset.
    #[serde(default)]
    pub index_source: Option<String>,

    /// Where the address-keyed inventory lookup is written. Defaults to
    /// `data/processed/inventory-lookup.json` when unset.
    #[serde(default)]
    pub inventory_output: Option<String>,

    /// Version tag recorded in the artifact metadata.
    #[serde(default = "default_version")]
    pub version: String,
}

const fn default_compress() -> bool {
    true
}

fn default_version() -> String {
    DEFAULT_INDEX_VERSION.to_string()
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            input_csv: None,
            output_path: None,
            compress: default_compress(),
            index_source: None,
            inventory_output: None,
            version: default_version(),
        }
    }
}

/// One physical address or address range.
///
/// Field names are shortened in the serialized artifact to keep the
/// payload small; the artifact holds hundreds of thousands of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Zero-based offset into [`SearchIndex::addresses`].
    #[serde(rename = "i")]
    pub id: u32,
    /// Row id in the external inventory dataset.
    #[serde(rename = "r")]
    pub row_reference: u64,
    /// Human-readable address, e.g. `"5408-5412 N KENMORE AVE"`.
    #[serde(rename = "a")]
    pub display_address: String,
    /// Raw street direction (`"N"`).
    #[serde(rename = "sd", default, skip_serializing_if = "String::is_empty")]
    pub street_direction: String,
    /// Raw street name (`"KENMORE"`).
    #[serde(rename = "sn", default, skip_serializing_if = "String::is_empty")]
    pub street_name: String,
    /// Raw street type (`"AVE"`).
    #[serde(rename = "st", default, skip_serializing_if = "String::is_empty")]
    pub street_type: String,
    /// Lowest house number covered by this record.
    #[serde(rename = "n1")]
    pub house_number_low: u32,
    /// Highest house number covered by this record.
    #[serde(rename = "n2")]
    pub house_number_high: u32,
    /// Five-digit ZIP code, or empty.
    #[serde(rename = "z", default)]
    pub zip: String,
    /// Latitude (WGS84). `None` when the source had no coordinate.
    #[serde(rename = "la", default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude (WGS84). `None` when the source had no coordinate.
    #[serde(rename = "lo", default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Canonical street key produced by the normalizer.
    #[serde(rename = "s")]
    pub normalized_street_key: String,
    /// First letter of the overall service line classification.
    #[serde(rename = "m", default = "unknown_material")]
    pub material: char,
}

const fn unknown_material() -> char {
    'U'
}

impl AddressRecord {
    /// Returns `true` if this record spans more than one house number.
    #[must_use]
    pub const fn is_range(&self) -> bool {
        self.house_number_low > 0
            && self.house_number_high > 0
            && self.house_number_low != self.house_number_high
    }

    /// Returns `true` if `number` falls inside this record's house
    /// number range (inclusive on both ends).
    ///
    /// Records without any house number never match.
    #[must_use]
    pub const fn contains_house_number(&self, number: u32) -> bool {
        if self.house_number_low == 0 && self.house_number_high == 0 {
            return false;
        }
        self.house_number_low <= number && number <= self.house_number_high
    }

    /// Returns `(latitude, longitude)` when both are known.
    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Lead status derived from the stored material letter.
    #[must_use]
    pub const fn lead_status(&self) -> LeadStatus {
        LeadStatus::from_material_char(self.material)
    }
}

/// Overall lead classification of a service line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    /// Lead (`L`).
    Lead,
    /// Galvanized requiring replacement (`GRR`).
    GalvanizedRequiringReplacement,
    /// Non-lead (`NL`).
    NonLead,
    /// Unknown or unclassified.
    Unknown,
}

impl LeadStatus {
    /// Parses the inventory's overall classification code.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "L" => Self::Lead,
            "GRR" => Self::GalvanizedRequiringReplacement,
            "NL" => Self::NonLead,
            _ => Self::Unknown,
        }
    }

    /// Parses the single-letter material tag stored in the artifact.
    #[must_use]
    pub const fn from_material_char(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'L' => Self::Lead,
            'G' => Self::GalvanizedRequiringReplacement,
            'N' => Self::NonLead,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::GalvanizedRequiringReplacement => "Galvanized requiring replacement",
            Self::NonLead => "Non-lead",
            Self::Unknown => "Unknown",
        }
    }
}

/// The four inverted maps from normalized street text to address ids.
///
/// `BTreeMap` keeps serialization order stable so that two builds of the
/// same CSV produce identical bytes (apart from the build timestamp).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetNameIndex {
    /// Full normalized street key.
    #[serde(default)]
    pub exact: BTreeMap<String, Vec<u32>>,
    /// Single tokens (longer than two characters, or compass letters).
    #[serde(default)]
    pub words: BTreeMap<String, Vec<u32>>,
    /// Adjacent token pairs joined by a space.
    #[serde(default)]
    pub bigrams: BTreeMap<String, Vec<u32>>,
    /// Token prefixes suffixed with [`PREFIX_SENTINEL`].
    #[serde(default)]
    pub prefixes: BTreeMap<String, Vec<u32>>,
}

impl StreetNameIndex {
    /// Iterates every bucket of every map.
    pub fn buckets(&self) -> impl Iterator<Item = (&String, &Vec<u32>)> {
        self.exact
            .iter()
            .chain(&self.words)
            .chain(&self.bigrams)
            .chain(&self.prefixes)
    }
}

/// Build metadata stored alongside the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    /// Number of address records.
    pub total_addresses: u64,
    /// Number of distinct normalized street keys.
    pub unique_streets: u64,
    /// Build time, RFC 3339.
    pub generated_at: String,
    /// Format version tag.
    pub version: String,
}

/// The serialized search index artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndex {
    /// Inverted maps.
    pub street_names: StreetNameIndex,
    /// Address records; the array offset is the record id.
    pub addresses: Vec<AddressRecord>,
    /// Build metadata.
    pub metadata: IndexMetadata,
}

impl SearchIndex {
    /// Looks up a record by id.
    #[must_use]
    pub fn record(&self, id: u32) -> Option<&AddressRecord> {
        self.addresses.get(id as usize)
    }

    /// Number of address records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns `true` if the index holds no addresses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Statistics from an index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Address records written.
    pub total_addresses: u64,
    /// Distinct exact street keys.
    pub unique_streets: u64,
    /// Rows where at least one column fell back to a default.
    pub coerced_rows: u64,
    /// Rows registered as intersections.
    pub intersections: u64,
    /// Size of the JSON artifact in bytes.
    pub artifact_size_bytes: u64,
    /// Size of the `.zst` sibling, when one was written.
    pub compressed_size_bytes: Option<u64>,
    /// Wall-clock build time.
    pub build_time_secs: f64,
}

/// Which index tier produced a set of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchTier {
    /// The full normalized street matched an exact key.
    Exact,
    /// One or more whole words matched.
    Word,
    /// Bigram or prefix keys matched.
    Partial,
}

impl MatchTier {
    /// Short tag used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Word => "word",
            Self::Partial => "partial",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(low: u32, high: u32) -> AddressRecord {
        AddressRecord {
            id: 0,
            row_reference: 2,
            display_address: "5408-5412 N KENMORE AVE".to_string(),
            street_direction: "N".to_string(),
            street_name: "KENMORE".to_string(),
            street_type: "AVE".to_string(),
            house_number_low: low,
            house_number_high: high,
            zip: "60640".to_string(),
            latitude: None,
            longitude: None,
            normalized_street_key: "n kenmore ave".to_string(),
            material: 'L',
        }
    }

    #[test]
    fn range_contains_inner_number() {
        let r = record(5408, 5412);
        assert!(r.contains_house_number(5408));
        assert!(r.contains_house_number(5410));
        assert!(r.contains_house_number(5412));
        assert!(!r.contains_house_number(5420));
        assert!(!r.contains_house_number(5407));
        assert!(r.is_range());
    }

    #[test]
    fn record_without_number_never_matches() {
        let r = record(0, 0);
        assert!(!r.contains_house_number(0));
        assert!(!r.is_range());
    }

    #[test]
    fn parses_lead_status_codes() {
        assert_eq!(LeadStatus::from_code("L"), LeadStatus::Lead);
        assert_eq!(
            LeadStatus::from_code(" grr "),
            LeadStatus::GalvanizedRequiringReplacement
        );
        assert_eq!(LeadStatus::from_code("NL"), LeadStatus::NonLead);
        assert_eq!(LeadStatus::from_code("U"), LeadStatus::Unknown);
        assert_eq!(LeadStatus::from_code(""), LeadStatus::Unknown);
        assert_eq!(record(1, 1).lead_status(), LeadStatus::Lead);
    }

    #[test]
    fn serializes_with_short_field_names() {
        let json = serde_json::to_value(record(5408, 5412)).unwrap();
        assert_eq!(json["i"], 0);
        assert_eq!(json["n1"], 5408);
        assert_eq!(json["s"], "n kenmore ave");
        assert_eq!(json["m"], "L");
        assert!(json.get("la").is_none());
    }

    #[test]
    fn config_defaults_from_empty_document() {
        let config: SearchIndexConfig = serde_json::from_str("{}").unwrap();
        assert!(config.compress);
        assert_eq!(config.version, DEFAULT_INDEX_VERSION);
        assert!(config.input_csv.is_none());
    }
}
