//! Smoke test runner for the search index.
//!
//! Loads queries from the embedded `smoke_tests.toml` file, resolves each
//! one against a built index, and checks the street (and optionally the
//! inventory rows) of the result.
//!
//! All tests must pass. If an address is no longer in the published
//! inventory, the entry should be updated or removed from the TOML file.

use serde::Deserialize;

use chi_pb_search_index_models::{MatchTier, SearchIndex};

use crate::SearchIndexError;
use crate::resolve;

/// Embedded smoke test configuration (compiled into the binary).
const SMOKE_TESTS_TOML: &str = include_str!("../smoke_tests.toml");

#[derive(Debug, Deserialize)]
struct SmokeTestConfig {
    tests: Vec<SmokeTestEntry>,
}

#[derive(Debug, Deserialize)]
struct SmokeTestEntry {
    query: String,
    expected_street: Option<String>,
    #[serde(default)]
    expected_rows: Vec<u64>,
}

/// Result of a single smoke test.
#[derive(Debug)]
pub struct SmokeTestResult {
    /// The query that was resolved.
    pub query: String,
    /// Tier that produced the candidates.
    pub tier: Option<MatchTier>,
    /// Display address of the first match.
    pub matched_address: Option<String>,
    /// Inventory rows of every match.
    pub matched_rows: Vec<u64>,
    /// Whether the test passed.
    pub passed: bool,
    /// Reason for failure (if any).
    pub failure_reason: Option<String>,
}

/// Aggregate report from running all smoke tests.
#[derive(Debug)]
pub struct SmokeTestReport {
    /// Individual test results.
    pub results: Vec<SmokeTestResult>,
    /// Number of tests that passed.
    pub passed: usize,
    /// Total number of tests.
    pub total: usize,
}

impl SmokeTestReport {
    /// Returns `true` if all tests passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

/// Runs the embedded smoke tests against `index`.
///
/// # Errors
///
/// Returns an error if the embedded TOML cannot be parsed.
pub fn run_smoke_tests(index: &SearchIndex) -> Result<SmokeTestReport, SearchIndexError> {
    run_smoke_tests_from(SMOKE_TESTS_TOML, index)
}

/// Runs smoke tests described by `toml_str` against `index`.
///
/// # Errors
///
/// Returns an error if the TOML cannot be parsed.
pub fn run_smoke_tests_from(
    toml_str: &str,
    index: &SearchIndex,
) -> Result<SmokeTestReport, SearchIndexError> {
    let config: SmokeTestConfig = toml::from_str(toml_str)
        .map_err(|e| SearchIndexError::Other(format!("Failed to parse smoke tests: {e}")))?;

    let results: Vec<SmokeTestResult> = config
        .tests
        .iter()
        .map(|entry| run_single_test(index, entry))
        .collect();

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    Ok(SmokeTestReport {
        results,
        passed,
        total,
    })
}

fn run_single_test(index: &SearchIndex, entry: &SmokeTestEntry) -> SmokeTestResult {
    let resolution = resolve::resolve_detailed(index, &entry.query);
    let matched_rows: Vec<u64> = resolution
        .matches
        .iter()
        .map(|r| r.row_reference)
        .collect();
    let first = resolution.matches.first();

    let failure_reason = match first {
        None if resolution.filtered_out() => Some(format!(
            "street matched {} candidates but none cover the house number",
            resolution.candidates.len()
        )),
        None => Some("no match found".to_string()),
        Some(record) => {
            let wrong_street = entry
                .expected_street
                .as_ref()
                .filter(|expected| record.normalized_street_key != **expected);
            let missing_rows: Vec<u64> = entry
                .expected_rows
                .iter()
                .copied()
                .filter(|row| !matched_rows.contains(row))
                .collect();

            if let Some(expected) = wrong_street {
                Some(format!(
                    "expected street {expected:?}, got {:?}",
                    record.normalized_street_key
                ))
            } else if missing_rows.is_empty() {
                None
            } else {
                Some(format!("missing rows {missing_rows:?}"))
            }
        }
    };

    SmokeTestResult {
        query: entry.query.clone(),
        tier: resolution.tier,
        matched_address: first.map(|r| r.display_address.clone()),
        matched_rows,
        passed: failure_reason.is_none(),
        failure_reason,
    }
}
