//! Tier cutoff classifier.
//!
//! Walks a finished ranking top to bottom, carving it into labeled buckets
//! by user-chosen counts. Counts are clamped to what is actually left, the
//! user can step back one tier at a time before committing, and whatever
//! remains after the last label lands in `Unplaced` so the buckets always
//! partition the ranking exactly.

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateId;

/// Label order used when the config does not override it.
pub const DEFAULT_TIER_LABELS: [&str; 7] = ["SS", "S", "A", "B", "C", "D", "F"];

/// Bucket label for ids left over after the last assigned tier.
pub const UNPLACED_LABEL: &str = "Unplaced";

// ---------------------------------------------------------------------------
// TierAssigner
// ---------------------------------------------------------------------------

/// In-progress cutoff walk over a finished ranking.
///
/// `cursor` is the index of the first unassigned id; `taken[k]` is how many
/// ids went to `labels[k]`. The walk commits with [`TierAssigner::finish`],
/// which may happen before every label is used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierAssigner {
    order: Vec<CandidateId>,
    labels: Vec<String>,
    cursor: usize,
    taken: Vec<usize>,
}

impl TierAssigner {
    /// Start a walk over `order` (best first) with the given tier labels.
    #[must_use]
    pub fn new(order: Vec<CandidateId>, labels: Vec<String>) -> Self {
        Self {
            order,
            labels,
            cursor: 0,
            taken: Vec::new(),
        }
    }

    /// Walk with the default SS..F labels.
    #[must_use]
    pub fn with_default_labels(order: Vec<CandidateId>) -> Self {
        Self::new(
            order,
            DEFAULT_TIER_LABELS.iter().map(|s| (*s).to_owned()).collect(),
        )
    }

    /// Ids not yet assigned to any tier.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.order.len() - self.cursor
    }

    /// The label the next [`TierAssigner::assign`] call fills, or `None`
    /// when every label has been used.
    #[must_use]
    pub fn current_label(&self) -> Option<&str> {
        self.labels.get(self.taken.len()).map(String::as_str)
    }

    /// The ids that would land in the current tier for a given count,
    /// after clamping.
    #[must_use]
    pub fn preview(&self, count: usize) -> &[CandidateId] {
        let take = count.min(self.remaining());
        &self.order[self.cursor..self.cursor + take]
    }

    /// Assign the next `count` ids (clamped to `[0, remaining]`) to the
    /// current label and advance. Returns the count actually taken. A call
    /// with every label already used takes nothing.
    pub fn assign(&mut self, count: usize) -> usize {
        if self.taken.len() >= self.labels.len() {
            return 0;
        }
        let take = count.min(self.remaining());
        self.taken.push(take);
        self.cursor += take;
        take
    }

    /// Un-assign the previous tier, moving its ids back into the unassigned
    /// pool. Returns `false` at the first tier.
    pub fn step_back(&mut self) -> bool {
        match self.taken.pop() {
            Some(count) => {
                self.cursor -= count;
                true
            }
            None => false,
        }
    }

    /// Whether every label has received a count.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.taken.len() == self.labels.len()
    }

    /// Commit the walk. Labels that received a count become buckets in
    /// order; anything past the cursor goes to `Unplaced`. Labels never
    /// reached are omitted.
    #[must_use]
    pub fn finish(self) -> TierAssignment {
        let mut tiers = Vec::with_capacity(self.taken.len() + 1);
        let mut start = 0;
        for (label, &count) in self.labels.iter().zip(&self.taken) {
            tiers.push(TierBucket {
                label: label.clone(),
                members: self.order[start..start + count].to_vec(),
            });
            start += count;
        }
        if start < self.order.len() {
            tiers.push(TierBucket {
                label: UNPLACED_LABEL.to_owned(),
                members: self.order[start..].to_vec(),
            });
        }
        TierAssignment { tiers }
    }
}

// ---------------------------------------------------------------------------
// TierAssignment
// ---------------------------------------------------------------------------

/// One committed tier bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBucket {
    pub label: String,
    pub members: Vec<CandidateId>,
}

/// A committed partition of a ranking into ordered buckets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAssignment {
    pub tiers: Vec<TierBucket>,
}

impl TierAssignment {
    /// Total ids across all buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tiers.iter().map(|t| t.members.len()).sum()
    }

    /// Every id in bucket order, flattened.
    pub fn ids(&self) -> impl Iterator<Item = &CandidateId> {
        self.tiers.iter().flat_map(|t| t.members.iter())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
