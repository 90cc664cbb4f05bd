//! Service-lines CSV parser.
//!
//! Parses the city's geocoded service-lines CSV and coerces each row into
//! an [`AddressInput`] at the ingestion boundary. Numeric columns that are
//! missing or unparseable fall back to zero and are reported through
//! [`AddressInput::coerced_fields`] rather than failing the row.

use std::io::Read;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// `", CHICAGO, IL, 60601"` / `", CHICAGO IL 60601"` → `", 60601"`.
static CITY_STATE_BEFORE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),\s*CHICAGO,?\s*IL,?\s*(\d{5})").expect("valid regex")
});

/// Trailing `", CHICAGO, IL"`.
static TRAILING_CITY_STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),\s*CHICAGO,?\s*IL,?\s*$").expect("valid regex"));

/// A raw row from the service-lines CSV.
///
/// Every column is read as text so that one bad cell never rejects the
/// whole row; coercion happens in [`ServiceLineRow::to_input`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceLineRow {
    /// Row id shared with the inventory dataset.
    #[serde(default)]
    pub row: String,
    /// Geocoder-matched address, e.g. `"5408 N KENMORE AVE, CHICAGO, IL, 60640"`.
    #[serde(default, alias = "full_address")]
    pub matched_address: String,
    /// Low house number.
    #[serde(default)]
    pub stnum1: String,
    /// High house number.
    #[serde(default)]
    pub stnum2: String,
    /// Street direction.
    #[serde(default)]
    pub stdir: String,
    /// Street name.
    #[serde(default)]
    pub stname: String,
    /// Street type.
    #[serde(default)]
    pub sttype: String,
    /// ZIP code.
    #[serde(default)]
    pub zip: String,
    /// Latitude.
    #[serde(default)]
    pub lat: String,
    /// Longitude.
    #[serde(default)]
    pub long: String,
    /// `"TRUE"` when the geocoder matched an intersection.
    #[serde(default)]
    pub is_intersection: String,
    /// Overall classification (`L`, `GRR`, `NL`, `U`).
    #[serde(default)]
    pub classification_for_entire_service_line: String,
    /// Utility-owned side material.
    #[serde(default)]
    pub pws_owned_service_line_material: String,
    /// Customer-owned side material.
    #[serde(default)]
    pub customer_side_service_line_material: String,
    /// Gooseneck / pigtail material.
    #[serde(default)]
    pub gooseneck_pigtail: String,
}

/// A service-lines row coerced into typed fields, ready for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressInput {
    /// Inventory row id (zero when missing).
    pub row_reference: u64,
    /// Display address with the `", CHICAGO, IL"` suffix removed.
    pub display_address: String,
    /// Raw street direction.
    pub street_direction: String,
    /// Raw street name.
    pub street_name: String,
    /// Raw street type.
    pub street_type: String,
    /// Low house number, `<= house_number_high`.
    pub house_number_low: u32,
    /// High house number.
    pub house_number_high: u32,
    /// ZIP code or empty.
    pub zip: String,
    /// Latitude, `None` for the `0,0` placeholder.
    pub latitude: Option<f64>,
    /// Longitude, `None` for the `0,0` placeholder.
    pub longitude: Option<f64>,
    /// First letter of the overall classification.
    pub material: char,
    /// Both sides of an intersection address, when flagged as one.
    pub intersection_streets: Vec<String>,
    /// Names of columns that were present but could not be parsed.
    pub coerced_fields: Vec<&'static str>,
}

impl ServiceLineRow {
    /// Low and high house numbers, ordered and gap-filled.
    ///
    /// A missing high number takes the low number (and vice versa);
    /// reversed numbers are swapped.
    #[must_use]
    pub fn house_numbers(&self) -> (u32, u32) {
        let low = leading_int(&self.stnum1).unwrap_or(0);
        let high = leading_int(&self.stnum2).unwrap_or(0);
        match (low, high) {
            (0, h) => (h, h),
            (l, 0) => (l, l),
            (l, h) if l > h => (h, l),
            (l, h) => (l, h),
        }
    }

    /// The matched address with a genuine range rendered as `low-high`.
    ///
    /// The geocoder only reports the first number of a range, so
    /// `"5408 N KENMORE AVE"` becomes `"5408-5412 N KENMORE AVE"`.
    #[must_use]
    pub fn ranged_address(&self) -> String {
        let address = self.matched_address.trim();
        let (low, high) = self.house_numbers();
        if low == 0 || low == high {
            return address.to_string();
        }

        let range = format!("{low}-{high}");
        let mut parts: Vec<&str> = address.split(' ').collect();
        let starts_with_number = parts
            .first()
            .is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
        if !starts_with_number {
            return address.to_string();
        }

        parts[0] = &range;
        parts.join(" ")
    }

    /// The ranged address without the `", CHICAGO, IL"` suffix.
    #[must_use]
    pub fn short_address(&self) -> String {
        let ranged = self.ranged_address();
        let without_city = CITY_STATE_BEFORE_ZIP_RE.replace_all(&ranged, ", $1");
        TRAILING_CITY_STATE_RE
            .replace_all(&without_city, "")
            .trim()
            .to_string()
    }

    /// Returns `true` when the row is flagged as an intersection.
    #[must_use]
    pub fn is_intersection(&self) -> bool {
        self.is_intersection.trim().eq_ignore_ascii_case("true")
    }

    /// Both cross streets of an intersection row, e.g.
    /// `"W LAKE & N CALIF, CHICAGO IL 60612"` → `["W LAKE", "N CALIF"]`.
    #[must_use]
    pub fn intersection_streets(&self) -> Vec<String> {
        if !self.is_intersection() || !self.matched_address.contains('&') {
            return Vec::new();
        }

        let text = self
            .matched_address
            .split(',')
            .next()
            .unwrap_or_default();

        text.split('&')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Coerces this row into typed fields.
    #[must_use]
    pub fn to_input(&self) -> AddressInput {
        let mut coerced_fields = Vec::new();

        let row_reference = coerce(&self.row, "row", &mut coerced_fields, leading_int::<u64>);
        coerce(&self.stnum1, "stnum1", &mut coerced_fields, leading_int::<u32>);
        coerce(&self.stnum2, "stnum2", &mut coerced_fields, leading_int::<u32>);
        let lat = coerce(&self.lat, "lat", &mut coerced_fields, parse_float);
        let lon = coerce(&self.long, "long", &mut coerced_fields, parse_float);

        let (house_number_low, house_number_high) = self.house_numbers();

        // 0,0 is the source's placeholder for "no coordinate".
        #[allow(clippy::float_cmp)]
        let (latitude, longitude) = if lat == 0.0 && lon == 0.0 {
            (None, None)
        } else {
            (Some(lat), Some(lon))
        };

        AddressInput {
            row_reference,
            display_address: self.short_address(),
            street_direction: self.stdir.trim().to_string(),
            street_name: self.stname.trim().to_string(),
            street_type: self.sttype.trim().to_string(),
            house_number_low,
            house_number_high,
            zip: self.zip.trim().to_string(),
            latitude,
            longitude,
            material: self
                .classification_for_entire_service_line
                .trim()
                .chars()
                .next()
                .map_or('U', |c| c.to_ascii_uppercase()),
            intersection_streets: self.intersection_streets(),
            coerced_fields,
        }
    }
}

/// Parses a cell, recording the column name when a non-empty value
/// fails to parse.
fn coerce<T: Default>(
    value: &str,
    column: &'static str,
    coerced: &mut Vec<&'static str>,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    if value.trim().is_empty() {
        return T::default();
    }
    parse(value).unwrap_or_else(|| {
        coerced.push(column);
        T::default()
    })
}

/// Parses the leading run of ASCII digits (`"1234.0"` → `1234`).
#[must_use]
pub fn leading_int<T: std::str::FromStr>(value: &str) -> Option<T> {
    let trimmed = value.trim();
    let end = trimmed
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Reads a service-lines CSV file.
///
/// Files ending in `.zst` are decompressed while streaming. Returns the
/// number of rows handed to `on_row`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its header row
/// cannot be read.
pub fn parse_file(
    path: &Path,
    on_row: impl FnMut(ServiceLineRow),
) -> Result<u64, CsvError> {
    if !path.exists() {
        return Err(CsvError::FileNotFound(path.display().to_string()));
    }

    log::info!("Reading service lines from {}", path.display());

    let file = std::fs::File::open(path).map_err(|e| CsvError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_zst = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zst"));

    let result = if is_zst {
        let decoder = zstd::Decoder::new(file).map_err(|e| CsvError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        parse_reader(decoder, on_row)
    } else {
        parse_reader(file, on_row)
    };

    result.map_err(|e| match e {
        CsvError::Csv { source, .. } => CsvError::Csv {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })
}

/// Reads service-lines rows from any `Read` source.
///
/// Header names are cleaned of a leading byte-order mark and padding.
/// Rows the CSV reader cannot decode are logged and skipped.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_reader(
    reader: impl Read,
    mut on_row: impl FnMut(ServiceLineRow),
) -> Result<u64, CsvError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = clean_headers(csv_reader.headers().map_err(|e| CsvError::Csv {
        path: String::new(),
        source: e,
    })?);
    csv_reader.set_headers(headers.clone());

    let mut count = 0u64;
    for (line, result) in csv_reader.records().enumerate() {
        let row = result.and_then(|mut record| {
            pad_record(&mut record, headers.len());
            record.deserialize::<ServiceLineRow>(Some(&headers))
        });
        match row {
            Ok(row) => {
                on_row(row);
                count += 1;
            }
            Err(e) => {
                log::warn!("  skipping unreadable row {}: {e}", line + 2);
            }
        }
    }

    Ok(count)
}

/// Appends empty fields until `record` has `width` fields, so a short row
/// deserializes with defaults instead of failing at end of row.
pub fn pad_record(record: &mut csv::StringRecord, width: usize) {
    while record.len() < width {
        record.push_field("");
    }
}

/// Strips a byte-order mark and surrounding whitespace from every header.
#[must_use]
pub fn clean_headers(headers: &csv::StringRecord) -> csv::StringRecord {
    headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect()
}

/// Errors from service-lines CSV parsing.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    /// CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file (empty for in-memory readers).
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error opening or decompressing the file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kenmore_row() -> ServiceLineRow {
        ServiceLineRow {
            row: "2".to_string(),
            matched_address: "5408 N KENMORE AVE, CHICAGO, IL, 60640".to_string(),
            stnum1: "5408".to_string(),
            stnum2: "5412".to_string(),
            stdir: "N".to_string(),
            stname: "KENMORE".to_string(),
            sttype: "AVE".to_string(),
            zip: "60640".to_string(),
            lat: "41.98".to_string(),
            long: "-87.65".to_string(),
            classification_for_entire_service_line: "L".to_string(),
            ..ServiceLineRow::default()
        }
    }

    #[test]
    fn renders_ranges_and_strips_city() {
        let row = kenmore_row();
        assert_eq!(row.ranged_address(), "5408-5412 N KENMORE AVE, CHICAGO, IL, 60640");
        assert_eq!(row.short_address(), "5408-5412 N KENMORE AVE, 60640");
    }

    #[test]
    fn strips_trailing_city_without_zip() {
        let row = ServiceLineRow {
            matched_address: "1234 N STATE ST, CHICAGO, IL".to_string(),
            stnum1: "1234".to_string(),
            stnum2: "1234".to_string(),
            ..ServiceLineRow::default()
        };
        assert_eq!(row.short_address(), "1234 N STATE ST");
    }

    #[test]
    fn coerces_typed_fields() {
        let input = kenmore_row().to_input();
        assert_eq!(input.row_reference, 2);
        assert_eq!(input.house_number_low, 5408);
        assert_eq!(input.house_number_high, 5412);
        assert_eq!(input.material, 'L');
        assert_eq!(input.latitude, Some(41.98));
        assert!(input.coerced_fields.is_empty());
        assert!(input.intersection_streets.is_empty());
    }

    #[test]
    fn malformed_numbers_default_to_zero() {
        let row = ServiceLineRow {
            row: "abc".to_string(),
            stnum1: "n/a".to_string(),
            lat: "north".to_string(),
            long: String::new(),
            ..kenmore_row()
        };
        let input = row.to_input();
        assert_eq!(input.row_reference, 0);
        assert_eq!(input.house_number_low, 5412);
        assert_eq!(input.house_number_high, 5412);
        assert_eq!(input.latitude, None);
        assert_eq!(input.coerced_fields, vec!["row", "stnum1", "lat"]);
    }

    #[test]
    fn orders_reversed_house_numbers() {
        let row = ServiceLineRow {
            stnum1: "5412".to_string(),
            stnum2: "5408".to_string(),
            ..kenmore_row()
        };
        assert_eq!(row.house_numbers(), (5408, 5412));
    }

    #[test]
    fn zero_coordinates_are_missing() {
        let row = ServiceLineRow {
            lat: "0".to_string(),
            long: "0".to_string(),
            ..kenmore_row()
        };
        let input = row.to_input();
        assert_eq!(input.latitude, None);
        assert_eq!(input.longitude, None);
    }

    #[test]
    fn splits_intersections() {
        let row = ServiceLineRow {
            matched_address: "W LAKE & N CALIF, CHICAGO IL 60612".to_string(),
            is_intersection: "TRUE".to_string(),
            ..ServiceLineRow::default()
        };
        assert_eq!(row.intersection_streets(), vec!["W LAKE", "N CALIF"]);

        let not_flagged = ServiceLineRow {
            is_intersection: "FALSE".to_string(),
            ..row
        };
        assert!(not_flagged.intersection_streets().is_empty());
    }

    #[test]
    fn parses_leading_digits() {
        assert_eq!(leading_int::<u32>("1234.0"), Some(1234));
        assert_eq!(leading_int::<u32>(" 42 "), Some(42));
        assert_eq!(leading_int::<u32>("abc"), None);
    }

    #[test]
    fn parses_csv_with_bom_and_padded_headers() {
        let csv_data = "\u{feff}row, full_address ,stdir,stname,sttype,stnum1,stnum2\n\
            1,1234 N STATE ST,N,STATE,ST,1234,1234\n\
            2,5408 N KENMORE AVE,N,KENMORE,AVE,5408,5412\n";

        let mut rows = Vec::new();
        let count = parse_reader(csv_data.as_bytes(), |row| rows.push(row)).unwrap();

        assert_eq!(count, 2);
        assert_eq!(rows[0].row, "1");
        assert_eq!(rows[0].matched_address, "1234 N STATE ST");
        assert_eq!(rows[1].stname, "KENMORE");
        assert_eq!(rows[1].ranged_address(), "5408-5412 N KENMORE AVE");
    }

    #[test]
    fn parses_short_rows_with_defaults() {
        let csv_data = "row,matched_address,stnum1,stnum2,zip\n7,100 W MAIN ST\n";
        let mut rows = Vec::new();
        parse_reader(csv_data.as_bytes(), |row| rows.push(row)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].zip, "");
    }

    #[test]
    fn short_row_coerces_to_defaults() {
        let csv_data = "row,matched_address,stnum1,stnum2,lat,long,zip\n\
            1,1234 N STATE ST,1234,1234,41.9,-87.6,60610\n\
            7,100 W MAIN ST\n\
            8\n";
        let mut rows = Vec::new();
        let count = parse_reader(csv_data.as_bytes(), |row| rows.push(row)).unwrap();

        assert_eq!(count, 3);
        let short = rows[1].to_input();
        assert_eq!(short.row_reference, 7);
        assert_eq!(short.display_address, "100 W MAIN ST");
        assert_eq!(short.house_number_low, 0);
        assert_eq!(short.latitude, None);
        assert!(short.coerced_fields.is_empty());
        assert_eq!(rows[2].to_input().row_reference, 8);
    }

    #[test]
    fn pads_records_to_header_width() {
        let mut record = csv::StringRecord::from(vec!["7"]);
        pad_record(&mut record, 3);
        assert_eq!(record.len(), 3);
        assert_eq!(record.get(2), Some(""));

        pad_record(&mut record, 2);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn parses_zst_file() {
        let tmp = std::env::temp_dir().join("chi_pb_service_lines_zst_test");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        let csv_data = b"row,matched_address,stdir,stname,sttype,stnum1,stnum2\n\
            1,1234 N STATE ST,N,STATE,ST,1234,1234\n";
        let path = tmp.join("service-lines.csv.zst");
        std::fs::write(&path, zstd::encode_all(&csv_data[..], 3).unwrap()).unwrap();

        let mut rows = Vec::new();
        let count = parse_file(&path, |row| rows.push(row)).unwrap();
        assert_eq!(count, 1);
        assert_eq!(rows[0].stname, "STATE");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = parse_file(Path::new("/nonexistent/service-lines.csv"), |_| {});
        assert!(matches!(result, Err(CsvError::FileNotFound(_))));
    }
}
