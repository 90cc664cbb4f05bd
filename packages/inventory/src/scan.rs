//! Row-id lookup against the full inventory CSV.
//!
//! The inventory is scanned top to bottom and the first row whose `Idx`
//! equals the requested id wins. The file can be local (plain or `.zst`)
//! or an `http(s)://` URL.

use std::io::Read;
use std::path::Path;

use chi_pb_inventory_models::InventoryReport;
use chi_pb_search_index::service_lines::{clean_headers, pad_record};

use crate::InventoryError;
use crate::report::InventoryRecord;

/// Finds `row_id` in any CSV reader.
///
/// Short rows read their missing columns as empty; rows the CSV reader
/// cannot decode are logged and skipped.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn find_in_reader(
    reader: impl Read,
    row_id: u64,
) -> Result<Option<InventoryRecord>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = clean_headers(csv_reader.headers()?);
    csv_reader.set_headers(headers.clone());

    for (line, result) in csv_reader.records().enumerate() {
        let parsed = result.and_then(|mut r| {
            pad_record(&mut r, headers.len());
            r.deserialize::<InventoryRecord>(Some(&headers))
        });
        let record = match parsed {
            Ok(record) => record,
            Err(e) => {
                log::warn!("  skipping unreadable inventory row {}: {e}", line + 2);
                continue;
            }
        };

        if record.row_id() == Some(row_id) {
            return Ok(Some(record));
        }
    }

    Ok(None)
}

/// Finds `row_id` in a local inventory CSV.
///
/// # Errors
///
/// Returns an error if the file is missing or cannot be read.
pub fn find_by_row_id(path: &Path, row_id: u64) -> Result<Option<InventoryReport>, InventoryError> {
    if !path.exists() {
        return Err(InventoryError::FileNotFound(path.display().to_string()));
    }

    log::info!("Scanning {} for row {row_id}", path.display());

    let io_err = |e: std::io::Error| InventoryError::Io {
        path: path.display().to_string(),
        source: e,
    };
    let csv_err = |e: csv::Error| InventoryError::Csv {
        path: path.display().to_string(),
        source: e,
    };

    let file = std::fs::File::open(path).map_err(io_err)?;
    let is_zst = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zst"));

    let record = if is_zst {
        find_in_reader(zstd::Decoder::new(file).map_err(io_err)?, row_id).map_err(csv_err)?
    } else {
        find_in_reader(file, row_id).map_err(csv_err)?
    };

    Ok(record.map(|r| r.to_report()))
}

/// Finds `row_id` in the inventory at `location`: a local path, or an
/// `http(s)://` URL that is downloaded first.
///
/// # Errors
///
/// Returns an error if the inventory cannot be fetched or read.
pub async fn fetch_by_row_id(
    location: &str,
    row_id: u64,
) -> Result<Option<InventoryReport>, InventoryError> {
    let lower = location.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        let path = Path::new(location).to_path_buf();
        return tokio::task::spawn_blocking(move || find_by_row_id(&path, row_id)).await?;
    }

    log::info!("Downloading inventory from {location}");

    let http_err = |e: reqwest::Error| InventoryError::Http {
        url: location.to_string(),
        source: e,
    };

    let response = reqwest::get(location).await.map_err(http_err)?;
    if !response.status().is_success() {
        return Err(InventoryError::HttpStatus {
            url: location.to_string(),
            status: response.status().as_u16(),
        });
    }
    let bytes = response.bytes().await.map_err(http_err)?;

    let url = location.to_string();
    let record = tokio::task::spawn_blocking(move || find_in_reader(bytes.as_ref(), row_id))
        .await?
        .map_err(|e| InventoryError::Csv {
            path: url,
            source: e,
        })?;

    Ok(record.map(|r| r.to_report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chi_pb_inventory_models::{Confidence, LeadStatus};

    const INVENTORY: &str = "\u{feff}Idx , FullAddress,PublSrvLnMatEPA,PrivateSrvLnMatEPA,Gooseneck,OverallSL Code,High Risk,ServiceNewlyIdentified,PreviousLeadServiceReplaced,Customer Notified date\n\
        11,\"1234 N STATE ST, CHICAGO\",C,C,N,NL,N,N,N,\n\
        12,5408 N KENMORE AVE,L,U,U,L,Y,N,Y,2024-05-01\n\
        12,DUPLICATE ROW,C,C,C,NL,N,N,N,\n";

    #[test]
    fn finds_first_matching_row() {
        let record = find_in_reader(INVENTORY.as_bytes(), 12).unwrap().unwrap();
        assert_eq!(record.full_address, "5408 N KENMORE AVE");

        let report = record.to_report();
        assert_eq!(report.row_id, 12);
        assert_eq!(report.lead_status, LeadStatus::Lead);
        assert_eq!(report.confidence, Confidence::Low);
        assert!(report.high_risk);
        assert_eq!(
            report.notes_text(),
            "Marked as high risk property; Previous lead service line was replaced; \
             Customer notified on: 2024-05-01"
        );
    }

    #[test]
    fn handles_quoted_commas() {
        let record = find_in_reader(INVENTORY.as_bytes(), 11).unwrap().unwrap();
        assert_eq!(record.full_address, "1234 N STATE ST, CHICAGO");
        assert_eq!(record.to_report().lead_status, LeadStatus::NonLead);
    }

    #[test]
    fn short_rows_read_as_unknown() {
        let csv_data = "Idx,FullAddress,PublSrvLnMatEPA,PrivateSrvLnMatEPA,OverallSL Code\n\
            21,100 W MAIN ST\n\
            22,200 W MAIN ST,L,C,L\n";

        let record = find_in_reader(csv_data.as_bytes(), 21).unwrap().unwrap();
        assert_eq!(record.full_address, "100 W MAIN ST");
        let report = record.to_report();
        assert_eq!(report.row_id, 21);
        assert_eq!(report.service_line_material, "Unknown");
        assert!(!report.high_risk);

        let later = find_in_reader(csv_data.as_bytes(), 22).unwrap().unwrap();
        assert_eq!(later.to_report().lead_status, LeadStatus::Lead);
    }

    #[test]
    fn missing_row_is_none() {
        assert!(find_in_reader(INVENTORY.as_bytes(), 99).unwrap().is_none());
    }

    #[test]
    fn scans_files_and_compressed_files() {
        let dir = std::env::temp_dir().join("chi_pb_inventory_scan_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let plain = dir.join("inventory.csv");
        std::fs::write(&plain, INVENTORY).unwrap();
        let packed = dir.join("inventory.csv.zst");
        std::fs::write(&packed, zstd::encode_all(INVENTORY.as_bytes(), 3).unwrap()).unwrap();

        assert_eq!(find_by_row_id(&plain, 11).unwrap().unwrap().row_id, 11);
        assert_eq!(find_by_row_id(&packed, 12).unwrap().unwrap().row_id, 12);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = find_by_row_id(Path::new("/nonexistent/inventory.csv"), 1);
        assert!(matches!(result, Err(InventoryError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn fetches_local_locations() {
        let result = fetch_by_row_id("/nonexistent/inventory.csv", 1).await;
        assert!(matches!(result, Err(InventoryError::FileNotFound(_))));
    }
}
