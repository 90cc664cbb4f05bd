//! Ordered replacement tables for street normalization.
//!
//! Every table is applied top to bottom, one whole-word regex pass per
//! entry. Order matters: a later entry may rewrite text produced by an
//! earlier one (the named-street pairs below rely on this), so entries
//! must not be sorted or deduplicated.

/// Street type words collapsed to their short form.
pub const STREET_TYPES: &[(&str, &str)] = &[
    ("avenue", "ave"),
    ("street", "st"),
    ("saint", "st"),
    ("boulevard", "blvd"),
    ("parkway", "park"),
    ("terrace", "ter"),
    ("plaza", "plz"),
    ("place", "pl"),
    ("court", "ct"),
    ("drive", "dr"),
    ("lane", "ln"),
    ("road", "rd"),
    ("circle", "cir"),
];

/// Named-street spelling variants.
///
/// The `blue island`, `de koven` and `des plaines` pairs map each
/// spelling to the other. Applied in order, both spellings end in the
/// fused form (`dekoven` → `de koven` → `dekoven`).
pub const STREET_NAMES: &[(&str, &str)] = &[
    ("martin luther king jr", "king"),
    ("martin l king jr", "king"),
    ("lakeshore", "lake shore"),
    ("crestline", "crest line"),
    ("blueisland", "blue island"),
    ("blue island", "blueisland"),
    ("dekoven", "de koven"),
    ("de koven", "dekoven"),
    ("desplaines", "des plaines"),
    ("des plaines", "desplaines"),
];

/// Short standalone prefixes fused with the following word
/// (`la salle` → `lasalle`).
pub const FUSED_PREFIXES: &[&str] = &["la", "mc", "o"];

/// Compass words collapsed to their abbreviation.
pub const DIRECTIONS: &[(&str, &str)] = &[
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
    ("northeast", "ne"),
    ("northwest", "nw"),
    ("southeast", "se"),
    ("southwest", "sw"),
];

/// Returns `true` if the token is one of the eight compass
/// abbreviations.
#[must_use]
pub fn is_direction_abbreviation(token: &str) -> bool {
    DIRECTIONS.iter().any(|(_, abbrev)| *abbrev == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_direction_abbreviations() {
        for abbrev in ["n", "s", "e", "w", "ne", "nw", "se", "sw"] {
            assert!(is_direction_abbreviation(abbrev), "{abbrev}");
        }
        assert!(!is_direction_abbreviation("north"));
        assert!(!is_direction_abbreviation("st"));
    }

    #[test]
    fn variant_pairs_are_adjacent_and_reversed() {
        for pair in STREET_NAMES[4..].chunks(2) {
            assert_eq!(pair[0].0, pair[1].1);
            assert_eq!(pair[0].1, pair[1].0);
        }
    }
}
