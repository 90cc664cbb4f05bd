//! Street normalization for the search index.
//!
//! Provides a deterministic normalization pipeline applied symmetrically
//! at index time and query time. This ensures that `"NORTH STATE STREET"`
//! and `"N STATE ST"` both produce the key `"n state st"`.

use regex::Regex;
use std::sync::LazyLock;

use crate::synonyms;

/// Regex matching every character that is not an ASCII word character
/// or whitespace.
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s]").expect("valid regex"));

/// Regex matching runs of whitespace.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A compiled `(pattern, replacement)` pass.
struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

/// Compiles a whole-word replacement table, preserving table order.
fn whole_word_rules(table: &[(&str, &'static str)]) -> Vec<Rule> {
    table
        .iter()
        .map(|(from, to)| Rule {
            pattern: Regex::new(&format!(r"\b{}\b", regex::escape(from)))
                .expect("valid regex"),
            replacement: *to,
        })
        .collect()
}

static STREET_TYPE_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| whole_word_rules(synonyms::STREET_TYPES));

static STREET_NAME_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| whole_word_rules(synonyms::STREET_NAMES));

static FUSED_PREFIX_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    synonyms::FUSED_PREFIXES
        .iter()
        .map(|prefix| Rule {
            pattern: Regex::new(&format!(r"\b{}\s+", regex::escape(prefix)))
                .expect("valid regex"),
            replacement: *prefix,
        })
        .collect()
});

static DIRECTION_RULES: LazyLock<Vec<Rule>> =
    LazyLock::new(|| whole_word_rules(synonyms::DIRECTIONS));

/// Upper bound on pipeline passes when settling to a fixed point.
///
/// One pass is enough for real street names; a second is only needed
/// when prefix fusion produces a word another table rewrites (e.g.
/// `"la ne"` → `"lane"` → `"ln"`).
const MAX_PASSES: usize = 4;

/// Lowercases, replaces punctuation with spaces, collapses whitespace,
/// and trims.
///
/// This is the first half of [`normalize_street`]. It is also the key
/// function for the address-keyed inventory lookup, which matches whole
/// display addresses rather than street names.
#[must_use]
pub fn collapse(input: &str) -> String {
    let lower = input.to_lowercase();
    let no_punct = NON_WORD_RE.replace_all(&lower, " ");
    WHITESPACE_RE.replace_all(&no_punct, " ").trim().to_string()
}

/// Normalizes a street (or a whole free-text query) into its canonical
/// search key.
///
/// The pipeline:
/// 1. Lowercase
/// 2. Replace non-word characters with spaces
/// 3. Collapse whitespace and trim
/// 4. Street types (`avenue` → `ave`, ...)
/// 5. Named-street variants (`de koven` ↔ `dekoven`, ...)
/// 6. Prefix fusion (`la salle` → `lasalle`, `mc`, `o`)
/// 7. Compass directions (`north` → `n`, ...)
///
/// Steps 4-7 repeat until the output stops changing, so the result is
/// always already in normal form.
#[must_use]
pub fn normalize_street(raw: &str) -> String {
    let mut current = collapse(raw);
    if current.is_empty() {
        return current;
    }

    for _ in 0..MAX_PASSES {
        let next = apply_tables(&current);
        if next == current {
            break;
        }
        current = next;
    }

    current
}

/// Normalizes street components joined with single spaces, skipping
/// empty parts.
#[must_use]
pub fn normalize_street_parts(direction: &str, name: &str, street_type: &str) -> String {
    let parts: Vec<&str> = [direction, name, street_type]
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    normalize_street(&parts.join(" "))
}

/// Splits a normalized key into tokens.
pub fn tokens(key: &str) -> impl Iterator<Item = &str> {
    key.split_whitespace()
}

/// One pass of steps 4-7 followed by whitespace cleanup.
fn apply_tables(input: &str) -> String {
    let mut text = input.to_string();

    for rules in [
        &*STREET_TYPE_RULES,
        &*STREET_NAME_RULES,
        &*FUSED_PREFIX_RULES,
        &*DIRECTION_RULES,
    ] {
        for rule in rules {
            text = rule
                .pattern
                .replace_all(&text, rule.replacement)
                .into_owned();
        }
    }

    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}
