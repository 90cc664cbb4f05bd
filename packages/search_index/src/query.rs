//! Free-text query parsing.
//!
//! A typical query looks like `"5410 N Kenmore Ave, Chicago, IL 60640"`.
//! The house number, ZIP, and city/state suffix are set aside first; only
//! the remaining street text goes through [`normalize::normalize_street`].

use regex::Regex;
use std::sync::LazyLock;

use chi_pb_search_index_models::AddressRecord;

use crate::normalize;

/// Leading house number, optionally a `low-high` range.
static HOUSE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)(?:\s*-\s*(\d+))?(?:[\s,]+|$)").expect("valid regex")
});

/// Trailing five-digit ZIP, optionally ZIP+4.
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s,]+)(\d{5})(?:-\d{4})?[\s,]*$").expect("valid regex")
});

/// Trailing city/state suffix. Every indexed address is in Chicago, so
/// the suffix carries no information and would only pollute the key.
///
/// A bare trailing `chicago` is kept unless it follows a comma, since
/// `"800 W Chicago"` names Chicago Avenue.
static CITY_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:,\s*chicago(?:[\s,]+(?:il|illinois))?|[\s,]+chicago[\s,]+(?:il|illinois))[\s,]*$",
    )
    .expect("valid regex")
});

/// A query split into its numeric parts and normalized street key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Leading house number (the low end if the query gave a range).
    pub house_number: Option<u32>,
    /// High end of a `low-high` range in the query.
    pub house_number_high: Option<u32>,
    /// Trailing five-digit ZIP.
    pub zip: Option<String>,
    /// Normalized street key. Empty when nothing but numbers remained.
    pub street_key: String,
}

impl ParsedQuery {
    /// Returns `true` if the record passes the house number and ZIP
    /// filters implied by this query.
    ///
    /// Without a house number every record passes the number filter.
    /// The ZIP filter only applies when both sides carry a ZIP.
    #[must_use]
    pub fn accepts(&self, record: &AddressRecord) -> bool {
        self.accepts_house_number(record) && self.accepts_zip(record)
    }

    fn accepts_house_number(&self, record: &AddressRecord) -> bool {
        let Some(low) = self.house_number else {
            return true;
        };
        match self.house_number_high {
            Some(high) if high > low => {
                record.house_number_low <= high
                    && low <= record.house_number_high
                    && record.house_number_high > 0
            }
            _ => record.contains_house_number(low),
        }
    }

    fn accepts_zip(&self, record: &AddressRecord) -> bool {
        match &self.zip {
            Some(zip) if !record.zip.is_empty() => record.zip == *zip,
            _ => true,
        }
    }
}

/// Splits a free-text query into house number, ZIP, and street key.
#[must_use]
pub fn parse_query(input: &str) -> ParsedQuery {
    let mut rest = input.trim().to_string();

    let mut house_number = None;
    let mut house_number_high = None;
    if let Some(caps) = HOUSE_NUMBER_RE.captures(&rest) {
        house_number = caps.get(1).and_then(|m| m.as_str().parse().ok());
        house_number_high = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let end = caps.get(0).map_or(0, |m| m.end());
        rest = rest[end..].to_string();
    }

    let mut zip = None;
    if let Some(caps) = ZIP_RE.captures(&rest) {
        zip = caps.get(1).map(|m| m.as_str().to_string());
        let start = caps.get(0).map_or(rest.len(), |m| m.start());
        rest.truncate(start);
    }

    if let Some(m) = CITY_STATE_RE.find(&rest) {
        rest.truncate(m.start());
    }

    ParsedQuery {
        house_number,
        house_number_high,
        zip,
        street_key: normalize::normalize_street(&rest),
    }
}
