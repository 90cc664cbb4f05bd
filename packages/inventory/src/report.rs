//! Turning inventory data into [`InventoryReport`]s.

use serde::Deserialize;

use chi_pb_inventory_models::{CompactServiceLine, Confidence, InventoryReport, LeadStatus};
use chi_pb_search_index::service_lines::leading_int;

/// Shown for a field the inventory leaves blank.
const UNKNOWN_LABEL: &str = "Unknown";

/// A row of the full inventory CSV.
///
/// Column names are the city's own, spaces included.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryRecord {
    /// Row id joined by the search index's `row_reference`.
    #[serde(rename = "Idx", default)]
    pub idx: String,
    /// Address as recorded by the city.
    #[serde(rename = "FullAddress", default)]
    pub full_address: String,
    /// Utility-owned side material (EPA code).
    #[serde(rename = "PublSrvLnMatEPA", default)]
    pub public_material: String,
    /// Customer-owned side material (EPA code).
    #[serde(rename = "PrivateSrvLnMatEPA", default)]
    pub private_material: String,
    /// Gooseneck / pigtail material.
    #[serde(rename = "Gooseneck", default)]
    pub gooseneck: String,
    /// Overall classification code.
    #[serde(rename = "OverallSL Code", default)]
    pub overall_code: String,
    /// `Y` when the property is high risk.
    #[serde(rename = "High Risk", default)]
    pub high_risk: String,
    /// `Y` when the service line was newly identified.
    #[serde(rename = "ServiceNewlyIdentified", default)]
    pub newly_identified: String,
    /// `Y` when a previous lead line was replaced.
    #[serde(rename = "PreviousLeadServiceReplaced", default)]
    pub previous_lead_replaced: String,
    /// Date the customer was notified, if any.
    #[serde(rename = "Customer Notified date", default)]
    pub customer_notified_date: String,
}

impl InventoryRecord {
    /// Parsed [`idx`](Self::idx).
    #[must_use]
    pub fn row_id(&self) -> Option<u64> {
        leading_int(&self.idx)
    }

    /// Builds the report for this row.
    #[must_use]
    pub fn to_report(&self) -> InventoryReport {
        let mut notes = Vec::new();
        if is_yes(&self.high_risk) {
            notes.push("Marked as high risk property".to_string());
        }
        if is_yes(&self.newly_identified) {
            notes.push("Service line newly identified".to_string());
        }
        if is_yes(&self.previous_lead_replaced) {
            notes.push("Previous lead service line was replaced".to_string());
        }
        let notified = self.customer_notified_date.trim();
        if !notified.is_empty() {
            notes.push(format!("Customer notified on: {notified}"));
        }

        InventoryReport {
            row_id: self.row_id().unwrap_or(0),
            full_address: self.full_address.trim().to_string(),
            service_line_material: or_unknown(&self.public_material),
            customer_side_material: or_unknown(&self.private_material),
            utility_side_material: or_unknown(&self.public_material),
            overall_code: or_unknown(&self.overall_code),
            gooseneck: or_unknown(&self.gooseneck),
            high_risk: is_yes(&self.high_risk),
            lead_status: LeadStatus::from_code(&self.overall_code),
            confidence: Confidence::from_materials(&[
                self.public_material.as_str(),
                self.private_material.as_str(),
                self.gooseneck.as_str(),
            ]),
            additional_notes: notes,
        }
    }
}

/// Builds the report for one line of the address-keyed lookup.
///
/// The compact format carries no risk flags, so the report has none.
#[must_use]
pub fn report_from_compact(line: &CompactServiceLine, full_address: &str) -> InventoryReport {
    InventoryReport {
        row_id: line.row,
        full_address: full_address.to_string(),
        service_line_material: or_unknown(&line.public_material),
        customer_side_material: or_unknown(&line.private_material),
        utility_side_material: or_unknown(&line.public_material),
        overall_code: or_unknown(&line.overall),
        gooseneck: or_unknown(&line.gooseneck),
        high_risk: false,
        lead_status: LeadStatus::from_code(&line.overall),
        confidence: Confidence::from_materials(&[
            line.public_material.as_str(),
            line.private_material.as_str(),
            line.gooseneck.as_str(),
        ]),
        additional_notes: Vec::new(),
    }
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        value.to_string()
    }
}

fn is_yes(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> InventoryRecord {
        InventoryRecord {
            idx: "12345".to_string(),
            full_address: " 5408 N KENMORE AVE ".to_string(),
            public_material: "L".to_string(),
            private_material: "C".to_string(),
            gooseneck: "N".to_string(),
            overall_code: "L".to_string(),
            ..InventoryRecord::default()
        }
    }

    #[test]
    fn builds_report_from_record() {
        let report = record().to_report();
        assert_eq!(report.row_id, 12345);
        assert_eq!(report.full_address, "5408 N KENMORE AVE");
        assert_eq!(report.service_line_material, "L");
        assert_eq!(report.utility_side_material, "L");
        assert_eq!(report.customer_side_material, "C");
        assert_eq!(report.lead_status, LeadStatus::Lead);
        assert_eq!(report.confidence, Confidence::Medium);
        assert!(!report.high_risk);
        assert!(report.additional_notes.is_empty());
        assert_eq!(report.notes_text(), "");
    }

    #[test]
    fn collects_notes_in_order() {
        let report = InventoryRecord {
            high_risk: "Y".to_string(),
            newly_identified: "Y".to_string(),
            previous_lead_replaced: "Y".to_string(),
            customer_notified_date: "2024-05-01".to_string(),
            ..record()
        }
        .to_report();

        assert!(report.high_risk);
        assert_eq!(
            report.notes_text(),
            "Marked as high risk property; Service line newly identified; \
             Previous lead service line was replaced; Customer notified on: 2024-05-01"
        );
    }

    #[test]
    fn blank_fields_read_as_unknown() {
        let report = InventoryRecord {
            private_material: String::new(),
            overall_code: String::new(),
            ..record()
        }
        .to_report();

        assert_eq!(report.customer_side_material, "Unknown");
        assert_eq!(report.overall_code, "Unknown");
        assert_eq!(report.lead_status, LeadStatus::Unknown);
        assert_eq!(report.confidence, Confidence::Low);
    }

    #[test]
    fn builds_report_from_compact_line() {
        let line = CompactServiceLine {
            row: 7,
            public_material: "G".to_string(),
            private_material: "U".to_string(),
            gooseneck: "U".to_string(),
            overall: "GRR".to_string(),
        };
        let report = report_from_compact(&line, "5410 N Kenmore Ave");

        assert_eq!(report.row_id, 7);
        assert_eq!(report.full_address, "5410 N Kenmore Ave");
        assert_eq!(
            report.lead_status,
            LeadStatus::GalvanizedRequiringReplacement
        );
        assert_eq!(report.confidence, Confidence::Low);
    }
}
