//! Canonicalized pairwise comparison cache.
//!
//! Every judged pair is stored under a canonical [`PairKey`] (the two ids in
//! sorted order) with the verdict oriented to match; lookups in either
//! direction are O(log n) and a swapped query returns the inverted verdict,
//! so `(a,b) → Left` implies `(b,a) → Right` by construction. Ties are
//! additionally tracked in a tie set used for equal-rank display grouping.
//!
//! All drivers consult the cache before prompting and short-circuit on a
//! hit, which is what makes resumed and undone sessions avoid re-asking
//! questions the user already answered.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateId;
use crate::error::RankError;
use crate::judgment::Verdict;

// ---------------------------------------------------------------------------
// PairKey
// ---------------------------------------------------------------------------

/// Canonical key for an unordered candidate pair.
///
/// Holds the lexicographically smaller id first. Serialized as the string
/// `"first|second"` so it can key a JSON map; `|` cannot occur in an id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairKey {
    first: CandidateId,
    second: CandidateId,
}

impl PairKey {
    /// Build the canonical key for `{x, y}`, or `None` when `x == y`
    /// (a candidate is never compared against itself).
    #[must_use]
    pub fn new(x: &CandidateId, y: &CandidateId) -> Option<Self> {
        match x.cmp(y) {
            std::cmp::Ordering::Less => Some(Self {
                first: x.clone(),
                second: y.clone(),
            }),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(Self {
                first: y.clone(),
                second: x.clone(),
            }),
        }
    }

    /// The smaller id.
    #[must_use]
    pub const fn first(&self) -> &CandidateId {
        &self.first
    }

    /// The larger id.
    #[must_use]
    pub const fn second(&self) -> &CandidateId {
        &self.second
    }

    /// Whether either side of the pair is `id`.
    #[must_use]
    pub fn involves(&self, id: &CandidateId) -> bool {
        &self.first == id || &self.second == id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.first, self.second)
    }
}

impl TryFrom<String> for PairKey {
    type Error = RankError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (a, b) = s.split_once('|').ok_or_else(|| RankError::CorruptState {
            detail: format!("pair key {s:?} is missing the '|' separator"),
        })?;
        let first = CandidateId::new(a).map_err(|e| RankError::CorruptState {
            detail: format!("pair key {s:?}: {e}"),
        })?;
        let second = CandidateId::new(b).map_err(|e| RankError::CorruptState {
            detail: format!("pair key {s:?}: {e}"),
        })?;
        if first >= second {
            return Err(RankError::CorruptState {
                detail: format!("pair key {s:?} is not in canonical order"),
            });
        }
        Ok(Self { first, second })
    }
}

impl From<PairKey> for String {
    fn from(key: PairKey) -> Self {
        format!("{}|{}", key.first, key.second)
    }
}

// ---------------------------------------------------------------------------
// ComparisonCache
// ---------------------------------------------------------------------------

/// All verdicts recorded so far plus the tie set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonCache {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    entries: BTreeMap<PairKey, Verdict>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    ties: BTreeSet<PairKey>,
}

impl ComparisonCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict for `(left, right)`. The key is canonicalized and
    /// the verdict inverted as needed so orientation never matters on read.
    /// Re-recording a pair overwrites. Comparing an id against itself is a
    /// no-op.
    pub fn record(&mut self, left: &CandidateId, right: &CandidateId, verdict: Verdict) {
        let Some(key) = PairKey::new(left, right) else {
            return;
        };
        let canonical = if key.first() == left {
            verdict
        } else {
            verdict.invert()
        };
        if canonical.is_tie() {
            self.ties.insert(key.clone());
        } else {
            self.ties.remove(&key);
        }
        self.entries.insert(key, canonical);
    }

    /// Look up the verdict for `(left, right)`, oriented to the query.
    #[must_use]
    pub fn lookup(&self, left: &CandidateId, right: &CandidateId) -> Option<Verdict> {
        let key = PairKey::new(left, right)?;
        let stored = *self.entries.get(&key)?;
        if key.first() == left {
            Some(stored)
        } else {
            Some(stored.invert())
        }
    }

    /// Whether `{a, b}` was judged a tie.
    #[must_use]
    pub fn is_tie(&self, a: &CandidateId, b: &CandidateId) -> bool {
        PairKey::new(a, b).is_some_and(|key| self.ties.contains(&key))
    }

    /// Number of distinct unordered pairs judged. This is the numerator of
    /// the merge driver's progress estimate.
    #[must_use]
    pub fn unique_pairs(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pair has been judged yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical keys of all tie pairs.
    pub fn tie_keys(&self) -> impl Iterator<Item = &PairKey> {
        self.ties.iter()
    }

    /// Drop every entry that references an id outside `known`, and any tie
    /// marker left without a matching tie entry. Returns how many records
    /// were removed. Used when reconciling loaded state against the live
    /// candidate set.
    pub fn retain_known(&mut self, known: &BTreeSet<CandidateId>) -> usize {
        let before = self.entries.len() + self.ties.len();
        self.entries
            .retain(|key, _| known.contains(key.first()) && known.contains(key.second()));
        let entries = &self.entries;
        self.ties
            .retain(|key| entries.get(key).is_some_and(|v| v.is_tie()));
        before - (self.entries.len() + self.ties.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
