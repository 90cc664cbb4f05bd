//! Query resolution against a loaded [`SearchIndex`].
//!
//! Resolution walks three tiers and stops at the first one that yields
//! any street-level candidates:
//!
//! 1. **Exact**: the whole normalized street key.
//! 2. **Word**: the union of every indexed query word.
//! 3. **Partial**: the union of every adjacent word pair and every
//!    `word*` prefix key.
//!
//! Candidates are then filtered by house number and ZIP. Within a tier
//! results keep ascending id order, which is CSV row order. There is no
//! scoring.

use std::collections::BTreeSet;
use std::sync::Arc;

use chi_pb_search_index_models::{AddressRecord, MatchTier, SearchIndex};

use crate::builder::prefix_key;
use crate::normalize;
use crate::query::{self, ParsedQuery};

/// Everything [`Resolver::resolve_detailed`] learned about a query.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    /// The parsed query.
    pub query: ParsedQuery,
    /// Tier that produced the candidates, `None` when nothing matched.
    pub tier: Option<MatchTier>,
    /// Street-level candidates before house number and ZIP filtering.
    pub candidates: Vec<&'a AddressRecord>,
    /// Candidates that passed the filters.
    pub matches: Vec<&'a AddressRecord>,
}

impl Resolution<'_> {
    /// Returns `true` when the street matched but the house number or
    /// ZIP filter removed every candidate.
    #[must_use]
    pub fn filtered_out(&self) -> bool {
        self.matches.is_empty() && !self.candidates.is_empty()
    }
}

/// Resolves free-text queries against a shared index.
///
/// Cloning is cheap and the resolver is `Send + Sync`, so one instance
/// can serve concurrent lookups.
#[derive(Debug, Clone)]
pub struct Resolver {
    index: Arc<SearchIndex>,
}

impl Resolver {
    /// Wraps a loaded index.
    #[must_use]
    pub const fn new(index: Arc<SearchIndex>) -> Self {
        Self { index }
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Returns matching records, best tier first, then by id.
    ///
    /// An empty query or a query with no street text yields an empty
    /// list, as does a query nothing matches.
    #[must_use]
    pub fn resolve(&self, query: &str) -> Vec<&AddressRecord> {
        self.resolve_detailed(query).matches
    }

    /// Like [`resolve`](Self::resolve), but also reports the tier and
    /// the unfiltered candidates.
    #[must_use]
    pub fn resolve_detailed(&self, query: &str) -> Resolution<'_> {
        resolve_detailed(&self.index, query)
    }
}

/// Resolves `query` against `index`. See [`Resolver::resolve`].
#[must_use]
pub fn resolve<'a>(index: &'a SearchIndex, query: &str) -> Vec<&'a AddressRecord> {
    resolve_detailed(index, query).matches
}

/// Resolves `query` against `index`. See [`Resolver::resolve_detailed`].
#[must_use]
pub fn resolve_detailed<'a>(index: &'a SearchIndex, query: &str) -> Resolution<'a> {
    let parsed = query::parse_query(query);

    let Some((tier, ids)) = street_candidates(index, &parsed.street_key) else {
        log::debug!("no street match for {query:?} (key {:?})", parsed.street_key);
        return Resolution {
            query: parsed,
            tier: None,
            candidates: Vec::new(),
            matches: Vec::new(),
        };
    };

    let candidates: Vec<&AddressRecord> =
        ids.into_iter().filter_map(|id| index.record(id)).collect();
    let matches: Vec<&AddressRecord> = candidates
        .iter()
        .copied()
        .filter(|record| parsed.accepts(record))
        .collect();

    log::debug!(
        "{query:?}: {} tier, {} candidates, {} after filters",
        tier.as_str(),
        candidates.len(),
        matches.len()
    );

    Resolution {
        query: parsed,
        tier: Some(tier),
        candidates,
        matches,
    }
}

/// Finds the first tier with any ids for `key`, returned in ascending
/// order.
fn street_candidates(index: &SearchIndex, key: &str) -> Option<(MatchTier, BTreeSet<u32>)> {
    if key.is_empty() {
        return None;
    }

    let maps = &index.street_names;

    if let Some(ids) = maps.exact.get(key).filter(|ids| !ids.is_empty()) {
        return Some((MatchTier::Exact, ids.iter().copied().collect()));
    }

    let words: Vec<&str> = normalize::tokens(key).collect();

    let word_ids: BTreeSet<u32> = words
        .iter()
        .filter_map(|word| maps.words.get(*word))
        .flatten()
        .copied()
        .collect();
    if !word_ids.is_empty() {
        return Some((MatchTier::Word, word_ids));
    }

    let bigram_ids = words
        .windows(2)
        .filter_map(|pair| maps.bigrams.get(&pair.join(" ")))
        .flatten();
    let prefix_ids = words
        .iter()
        .filter_map(|word| maps.prefixes.get(&prefix_key(word)))
        .flatten();
    let partial_ids: BTreeSet<u32> = bigram_ids.chain(prefix_ids).copied().collect();
    if !partial_ids.is_empty() {
        return Some((MatchTier::Partial, partial_ids));
    }

    None
}
