//! Flat export document for finished rankings.
//!
//! One JSON document carries the final order, recorded ties, rounded ELO
//! ratings when the run produced any, and an optional tier assignment.
//! Import validates the schema string first and then every id against the
//! live roster; a single unknown id rejects the whole document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cache::PairKey;
use crate::candidate::{CandidateId, Roster};
use crate::error::RankError;
use crate::tier::TierAssignment;

/// Schema string this build reads and writes.
pub const RANKING_SCHEMA: &str = "podium_ranking_v1";

/// A finished ranking in exportable form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingDoc {
    pub schema: String,
    /// Final order, best first.
    pub order: Vec<CandidateId>,
    /// Canonical keys of every pair judged a tie.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ties: Vec<PairKey>,
    /// Rounded ELO ratings; empty for non-rating runs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ratings: BTreeMap<CandidateId, i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<TierAssignment>,
}

impl RankingDoc {
    /// Document with just an order; ties, ratings, and tiers start empty.
    #[must_use]
    pub fn new(order: Vec<CandidateId>) -> Self {
        Self {
            schema: RANKING_SCHEMA.to_owned(),
            order,
            ties: Vec::new(),
            ratings: BTreeMap::new(),
            tiers: None,
        }
    }

    /// Pretty-printed JSON for files and stdout.
    ///
    /// # Errors
    /// Returns [`RankError::Serialize`] if encoding fails.
    pub fn to_json(&self) -> Result<String, RankError> {
        serde_json::to_string_pretty(self).map_err(|e| RankError::Serialize {
            detail: e.to_string(),
        })
    }

    /// Parse a document from JSON text.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidInput`] when the text is not a ranking
    /// document at all. Referential checks live in [`RankingDoc::validate`].
    pub fn from_json(text: &str) -> Result<Self, RankError> {
        serde_json::from_str(text).map_err(|e| RankError::InvalidInput {
            reason: format!("malformed ranking document: {e}"),
        })
    }

    /// Check the document against the live roster.
    ///
    /// # Errors
    /// - [`RankError::SchemaMismatch`] for a foreign schema string.
    /// - [`RankError::InvalidInput`] for a duplicated id in the order.
    /// - [`RankError::UnknownCandidate`] for any id (order, ties, ratings,
    ///   tiers) the roster does not contain.
    pub fn validate(&self, roster: &Roster) -> Result<(), RankError> {
        if self.schema != RANKING_SCHEMA {
            return Err(RankError::SchemaMismatch {
                expected: RANKING_SCHEMA.to_owned(),
                found: self.schema.clone(),
            });
        }

        let mut seen = BTreeSet::new();
        for id in &self.order {
            if !seen.insert(id) {
                return Err(RankError::invalid_input(format!(
                    "candidate {id} appears twice in the ranking order"
                )));
            }
        }

        let check = |id: &CandidateId| -> Result<(), RankError> {
            if roster.contains(id) {
                Ok(())
            } else {
                Err(RankError::UnknownCandidate {
                    id: id.to_string(),
                })
            }
        };

        for id in &self.order {
            check(id)?;
        }
        for key in &self.ties {
            check(key.first())?;
            check(key.second())?;
        }
        for id in self.ratings.keys() {
            check(id)?;
        }
        if let Some(tiers) = &self.tiers {
            for id in tiers.ids() {
                check(id)?;
            }
        }
        Ok(())
    }

    /// Competition-style rank numbers aligned with `order`: tied neighbors
    /// share a rank and the next distinct id jumps past the group
    /// (1, 1, 3, ...).
    #[must_use]
    pub fn display_ranks(&self) -> Vec<usize> {
        let tie_set: BTreeSet<&PairKey> = self.ties.iter().collect();
        let mut ranks = Vec::with_capacity(self.order.len());
        for i in 0..self.order.len() {
            if i > 0
                && PairKey::new(&self.order[i - 1], &self.order[i])
                    .is_some_and(|key| tie_set.contains(&key))
            {
                ranks.push(ranks[i - 1]);
            } else {
                ranks.push(i + 1);
            }
        }
        ranks
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
