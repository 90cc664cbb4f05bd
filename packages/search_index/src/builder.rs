//! Inverted index construction.
//!
//! Every record is keyed by its normalized street and registered in four
//! maps: the full key, its words, its adjacent word pairs, and the
//! prefixes of its longer words. Intersection rows register both cross
//! streets as well, plus the two sides together as one exact key so the
//! row's own `"A & B"` address resolves back to it. Buckets are
//! deduplicated once at the end.

use std::collections::{BTreeMap, HashSet};

use chi_pb_search_index_models::{
    AddressRecord, DEFAULT_INDEX_VERSION, IndexMetadata, PREFIX_SENTINEL, SearchIndex,
    StreetNameIndex,
};

use crate::normalize;
use crate::service_lines::{AddressInput, ServiceLineRow};
use crate::synonyms;

/// Words shorter than this are only indexed when they are compass
/// abbreviations.
const MIN_WORD_LEN: usize = 3;

/// Only words longer than this get prefix keys.
const MIN_PREFIX_SOURCE_LEN: usize = 4;

/// Shortest prefix that gets a key.
const MIN_PREFIX_LEN: usize = 2;

/// Accumulates address records and their street keys.
#[derive(Debug)]
pub struct IndexBuilder {
    addresses: Vec<AddressRecord>,
    street_names: StreetNameIndex,
    version: String,
    coerced_rows: u64,
    intersections: u64,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_VERSION)
    }
}

impl IndexBuilder {
    /// Creates an empty builder that stamps `version` into the metadata.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            addresses: Vec::new(),
            street_names: StreetNameIndex::default(),
            version: version.into(),
            coerced_rows: 0,
            intersections: 0,
        }
    }

    /// Number of records added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns `true` if no records have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Rows that needed at least one default substituted.
    #[must_use]
    pub const fn coerced_rows(&self) -> u64 {
        self.coerced_rows
    }

    /// Rows registered as intersections.
    #[must_use]
    pub const fn intersections(&self) -> u64 {
        self.intersections
    }

    /// Coerces a raw CSV row and adds it. Returns the assigned id.
    pub fn push_row(&mut self, row: &ServiceLineRow) -> u32 {
        self.push(row.to_input())
    }

    /// Adds one address and registers its street keys. Returns the
    /// assigned id.
    pub fn push(&mut self, input: AddressInput) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let id = self.addresses.len() as u32;

        if !input.coerced_fields.is_empty() {
            self.coerced_rows += 1;
            log::debug!(
                "row {} ({}): defaulted unparseable {}",
                id,
                input.display_address,
                input.coerced_fields.join(", ")
            );
        }

        let key = normalize::normalize_street_parts(
            &input.street_direction,
            &input.street_name,
            &input.street_type,
        );

        if !input.intersection_streets.is_empty() {
            self.intersections += 1;
            for street in &input.intersection_streets {
                let cross_key = normalize::normalize_street(street);
                register_street(&mut self.street_names, &cross_key, id);
            }

            let combined = normalize::normalize_street(&input.intersection_streets.join(" "));
            if !combined.is_empty() {
                push_id(&mut self.street_names.exact, &combined, id);
            }
        }

        register_street(&mut self.street_names, &key, id);

        self.addresses.push(AddressRecord {
            id,
            row_reference: input.row_reference,
            display_address: input.display_address,
            street_direction: input.street_direction,
            street_name: input.street_name,
            street_type: input.street_type,
            house_number_low: input.house_number_low,
            house_number_high: input.house_number_high,
            zip: input.zip,
            latitude: input.latitude,
            longitude: input.longitude,
            normalized_street_key: key,
            material: input.material,
        });

        id
    }

    /// Deduplicates every bucket and stamps the metadata with the
    /// current time.
    #[must_use]
    pub fn finish(self) -> SearchIndex {
        let generated_at = chrono::Utc::now().to_rfc3339();
        self.finish_at(generated_at)
    }

    /// Like [`finish`](Self::finish) with an explicit timestamp, so two
    /// builds of the same input can be compared byte for byte.
    #[must_use]
    pub fn finish_at(mut self, generated_at: String) -> SearchIndex {
        let street_names = &mut self.street_names;
        for map in [
            &mut street_names.exact,
            &mut street_names.words,
            &mut street_names.bigrams,
            &mut street_names.prefixes,
        ] {
            dedup_buckets(map);
        }

        let metadata = IndexMetadata {
            total_addresses: self.addresses.len() as u64,
            unique_streets: self.street_names.exact.len() as u64,
            generated_at,
            version: self.version,
        };

        SearchIndex {
            street_names: self.street_names,
            addresses: self.addresses,
            metadata,
        }
    }
}

/// Registers one normalized street key under all four maps.
///
/// Empty keys are ignored.
fn register_street(index: &mut StreetNameIndex, key: &str, id: u32) {
    if key.is_empty() {
        return;
    }

    push_id(&mut index.exact, key, id);

    let words: Vec<&str> = normalize::tokens(key).collect();

    for word in &words {
        if is_indexed_word(word) {
            push_id(&mut index.words, word, id);
        }
    }

    for pair in words.windows(2) {
        push_id(&mut index.bigrams, &pair.join(" "), id);
    }

    for word in &words {
        for prefix in prefixes(word) {
            push_id(&mut index.prefixes, &prefix_key(prefix), id);
        }
    }
}

/// Returns `true` for words that get their own word key.
#[must_use]
pub fn is_indexed_word(word: &str) -> bool {
    word.chars().count() >= MIN_WORD_LEN || synonyms::is_direction_abbreviation(word)
}

/// Prefixes of `word` from two characters up to one short of the whole
/// word. Words of three characters or fewer produce nothing.
pub fn prefixes(word: &str) -> impl Iterator<Item = &str> {
    let boundaries: Vec<usize> = word.char_indices().map(|(i, _)| i).collect();
    let len = boundaries.len();
    let range = if len >= MIN_PREFIX_SOURCE_LEN {
        MIN_PREFIX_LEN..len
    } else {
        0..0
    };
    range.map(move |n| &word[..boundaries[n]])
}

/// Appends the prefix sentinel.
#[must_use]
pub fn prefix_key(prefix: &str) -> String {
    format!("{prefix}{PREFIX_SENTINEL}")
}

fn push_id(map: &mut BTreeMap<String, Vec<u32>>, key: &str, id: u32) {
    if let Some(bucket) = map.get_mut(key) {
        bucket.push(id);
    } else {
        map.insert(key.to_string(), vec![id]);
    }
}

/// Removes repeated ids from every bucket, keeping first occurrences.
fn dedup_buckets(map: &mut BTreeMap<String, Vec<u32>>) {
    for bucket in map.values_mut() {
        let mut seen = HashSet::with_capacity(bucket.len());
        bucket.retain(|id| seen.insert(*id));
    }
}
