#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the `data/` directory.
//!
//! Raw inputs live under `data/raw/`, generated artifacts under
//! `data/processed/`. Set `CHI_PB_DATA_DIR` to relocate the whole tree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`data_dir`].
pub const DATA_DIR_ENV: &str = "CHI_PB_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// current directory if the manifest is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path, honouring `CHI_PB_DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    data_dir_from(std::env::var_os(DATA_DIR_ENV))
}

fn data_dir_from(value: Option<OsString>) -> PathBuf {
    value
        .filter(|v| !v.is_empty())
        .map_or_else(|| project_root().join("data"), PathBuf::from)
}

/// Returns the `data/raw/` directory for downloaded city datasets.
#[must_use]
pub fn raw_dir() -> PathBuf {
    data_dir().join("raw")
}

/// Returns the `data/processed/` directory for generated artifacts.
#[must_use]
pub fn processed_dir() -> PathBuf {
    data_dir().join("processed")
}

/// Returns the path of the geocoded service-lines CSV.
#[must_use]
pub fn service_lines_csv_path() -> PathBuf {
    raw_dir().join("service-lines.csv")
}

/// Returns the path of the full inventory CSV.
#[must_use]
pub fn inventory_csv_path() -> PathBuf {
    raw_dir().join("inventory.csv")
}

/// Returns the path of the search index artifact.
#[must_use]
pub fn combined_index_path() -> PathBuf {
    processed_dir().join("combined-index.json")
}

/// Returns the path of the address-keyed inventory lookup.
#[must_use]
pub fn inventory_lookup_path() -> PathBuf {
    processed_dir().join("inventory-lookup.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_data_dir() {
        assert_eq!(
            data_dir_from(Some(OsString::from("/srv/chi-pb"))),
            PathBuf::from("/srv/chi-pb")
        );
    }

    #[test]
    fn empty_override_is_ignored() {
        assert_eq!(
            data_dir_from(Some(OsString::new())),
            project_root().join("data")
        );
        assert_eq!(data_dir_from(None), project_root().join("data"));
    }

    #[test]
    fn artifacts_live_under_processed() {
        assert!(combined_index_path().ends_with("processed/combined-index.json"));
        assert!(inventory_lookup_path().ends_with("processed/inventory-lookup.json"));
        assert!(service_lines_csv_path().ends_with("raw/service-lines.csv"));
    }
}
