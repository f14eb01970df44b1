//! Ranking drivers.
//!
//! Each driver is a resumable state machine with one shared contract:
//! [`Driver::poll`] advances structural bookkeeping, consuming cached
//! verdicts as it goes, until the driver either needs a judgment or is
//! done; [`Driver::resolve`] (or the batch variants) feeds the pending
//! judgment back in; [`Driver::finish`] yields the product once polling
//! reports [`Step::Done`]. All mutable driver state is plain data that
//! clones and round-trips through serde, which is what lets snapshots and
//! persistence work as wholesale copies.

pub mod elo;
pub mod merge;
pub mod picker;

#[cfg(test)]
mod property_tests;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cache::ComparisonCache;
use crate::candidate::CandidateId;
use crate::error::RankError;
use crate::judgment::Verdict;

pub use elo::EloDriver;
pub use merge::MergeDriver;
pub use picker::PickerDriver;

// ---------------------------------------------------------------------------
// DriverKind
// ---------------------------------------------------------------------------

/// Which ranking algorithm a session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Comparison-driven bottom-up merge sort; full order, fewest prompts.
    #[default]
    Merge,
    /// Pairwise ELO ratings over a budgeted work queue.
    Elo,
    /// Elimination tournament that surfaces favorites one at a time.
    Picker,
}

impl DriverKind {
    /// Stable lowercase name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Elo => "elo",
            Self::Picker => "picker",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "elo" => Ok(Self::Elo),
            "picker" | "favorites" => Ok(Self::Picker),
            other => Err(RankError::InvalidInput {
                reason: format!("unknown driver {other:?} (expected merge, elo, or picker)"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Intensity
// ---------------------------------------------------------------------------

/// Judgment budget and rating sensitivity for the ELO driver.
///
/// `fast` asks fewer questions and moves ratings harder per answer;
/// `accurate` asks more and moves them gently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Fast,
    #[default]
    Balanced,
    Accurate,
}

impl Intensity {
    /// Scale applied to the pair budget after the floor is taken.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Fast => 0.6,
            Self::Balanced => 1.0,
            Self::Accurate => 1.5,
        }
    }

    /// ELO K-factor.
    #[must_use]
    pub const fn k_factor(self) -> f64 {
        match self {
            Self::Fast => 40.0,
            Self::Balanced => 32.0,
            Self::Accurate => 24.0,
        }
    }

    /// Stable lowercase name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Accurate => "accurate",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intensity {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "accurate" => Ok(Self::Accurate),
            other => Err(RankError::InvalidInput {
                reason: format!(
                    "unknown intensity {other:?} (expected fast, balanced, or accurate)"
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Step / Finish
// ---------------------------------------------------------------------------

/// What a driver needs next, as reported by [`Driver::poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Suspended on a pairwise judgment for `(left, right)`.
    AwaitPair {
        left: CandidateId,
        right: CandidateId,
    },
    /// Suspended on a batch pick over `members`.
    AwaitBatch { members: Vec<CandidateId> },
    /// Nothing left to ask; [`Driver::finish`] will yield the product.
    Done,
}

/// Terminal product of a driver run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finish {
    /// A full ordering, best first. Always a permutation of the input.
    Ranked(Vec<CandidateId>),
    /// Favorites in the order they were surfaced. Covers every candidate
    /// when the tournament ran to exhaustion.
    Favorites(Vec<CandidateId>),
}

impl Finish {
    /// The ordered ids regardless of flavor.
    #[must_use]
    pub fn order(&self) -> &[CandidateId] {
        match self {
            Self::Ranked(ids) | Self::Favorites(ids) => ids,
        }
    }
}

// ---------------------------------------------------------------------------
// Shuffler
// ---------------------------------------------------------------------------

/// Deterministic shuffle source.
///
/// Seeded once per session; every shuffle derives a fresh [`StdRng`] from
/// `(seed, counter)` and bumps the counter, so a session resumed from disk
/// replays the exact same shuffle sequence no matter how many shuffles
/// already happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shuffler {
    seed: u64,
    #[serde(default)]
    counter: u64,
}

impl Shuffler {
    /// Shuffler with a fixed seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Shuffler seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(rand::rng().random())
    }

    /// The session seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Shuffle `items` in place with the next derived RNG.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.seed.hash(&mut hasher);
        self.counter.hash(&mut hasher);
        self.counter += 1;
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        items.shuffle(&mut rng);
    }
}

// ---------------------------------------------------------------------------
// RepairReport
// ---------------------------------------------------------------------------

/// Tally of what state reconciliation had to fix after a load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Ids referenced by the loaded state but absent from the roster.
    pub dropped_ids: usize,
    /// Cursors that were out of bounds and got clamped.
    pub clamped_cursors: usize,
    /// Cache entries removed for referencing unknown ids.
    pub dropped_cache_entries: usize,
}

impl RepairReport {
    /// Whether nothing needed fixing.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.dropped_ids == 0 && self.clamped_cursors == 0 && self.dropped_cache_entries == 0
    }

    /// Fold another report into this one.
    pub fn absorb(&mut self, other: Self) {
        self.dropped_ids += other.dropped_ids;
        self.clamped_cursors += other.clamped_cursors;
        self.dropped_cache_entries += other.dropped_cache_entries;
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// A running ranking algorithm with its full resumable state.
///
/// Serialized with an internal `driver` tag so a persisted blob is
/// self-describing about which algorithm it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum Driver {
    Merge(MergeDriver),
    Elo(EloDriver),
    Picker(PickerDriver),
}

impl Driver {
    /// Start a fresh driver over `ids`. The caller supplies ids already in
    /// presentation order; drivers that want randomized internal order
    /// (ELO cycles, picker rounds) draw from `shuffler` themselves.
    #[must_use]
    pub fn new(
        kind: DriverKind,
        ids: Vec<CandidateId>,
        intensity: Intensity,
        shuffler: &mut Shuffler,
    ) -> Self {
        match kind {
            DriverKind::Merge => Self::Merge(MergeDriver::new(ids)),
            DriverKind::Elo => Self::Elo(EloDriver::new(ids, intensity, shuffler)),
            DriverKind::Picker => Self::Picker(PickerDriver::new(ids, shuffler)),
        }
    }

    /// Which algorithm this is.
    #[must_use]
    pub const fn kind(&self) -> DriverKind {
        match self {
            Self::Merge(_) => DriverKind::Merge,
            Self::Elo(_) => DriverKind::Elo,
            Self::Picker(_) => DriverKind::Picker,
        }
    }

    /// Advance until a judgment is needed or the run is done. Cached
    /// verdicts are consumed without prompting. Idempotent when already
    /// suspended: polling again re-reports the same step.
    pub fn poll(&mut self, cache: &ComparisonCache, shuffler: &mut Shuffler) -> Step {
        match self {
            Self::Merge(d) => d.poll(cache),
            Self::Elo(d) => d.poll(cache),
            Self::Picker(d) => d.poll(shuffler),
        }
    }

    /// Apply a real verdict to the pending pair and record it in the cache.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no pairwise judgment is
    /// pending (wrong driver flavor, or nothing awaited).
    pub fn resolve(&mut self, verdict: Verdict, cache: &mut ComparisonCache) -> Result<(), RankError> {
        match self {
            Self::Merge(d) => d.resolve(verdict, cache),
            Self::Elo(d) => d.resolve(verdict, cache),
            Self::Picker(_) => Err(RankError::invalid_reply(
                "the favorites picker takes batch replies, not pairwise verdicts",
            )),
        }
    }

    /// Defer the pending pair.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no pairwise judgment is
    /// pending.
    pub fn skip(&mut self, cache: &mut ComparisonCache) -> Result<(), RankError> {
        match self {
            Self::Merge(d) => d.skip(cache),
            Self::Elo(d) => d.skip(),
            Self::Picker(_) => Err(RankError::invalid_reply(
                "the favorites picker takes batch replies; pass the batch instead",
            )),
        }
    }

    /// Apply a batch pick to the pending batch.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no batch is pending or a
    /// picked id is not in it.
    pub fn resolve_batch(&mut self, picked: &[CandidateId]) -> Result<(), RankError> {
        match self {
            Self::Picker(d) => d.resolve_batch(picked),
            Self::Merge(_) | Self::Elo(_) => Err(RankError::invalid_reply(
                "this driver takes pairwise verdicts, not batch picks",
            )),
        }
    }

    /// Wave the pending batch through, surviving every member.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no batch is pending.
    pub fn pass_batch(&mut self) -> Result<(), RankError> {
        match self {
            Self::Picker(d) => d.pass_batch(),
            Self::Merge(_) | Self::Elo(_) => Err(RankError::invalid_reply(
                "this driver takes pairwise verdicts, not batch picks",
            )),
        }
    }

    /// The finished product, once [`Driver::poll`] has reported done.
    #[must_use]
    pub fn finish(&self) -> Option<Finish> {
        match self {
            Self::Merge(d) => d.finish(),
            Self::Elo(d) => d.finish(),
            Self::Picker(d) => d.finish(),
        }
    }

    /// Completion estimate in percent.
    #[must_use]
    pub fn progress(&self, cache: &ComparisonCache) -> f64 {
        match self {
            Self::Merge(d) => d.progress(cache),
            Self::Elo(d) => d.progress(),
            Self::Picker(d) => d.progress(),
        }
    }

    /// Best-known current ordering for status display. Always covers every
    /// candidate exactly once.
    #[must_use]
    pub fn live_ranking(&self) -> Vec<CandidateId> {
        match self {
            Self::Merge(d) => d.live_ranking(),
            Self::Elo(d) => d.live_ranking(),
            Self::Picker(d) => d.live_ranking(),
        }
    }

    /// Whether the run is over.
    #[must_use]
    pub fn is_done(&self) -> bool {
        match self {
            Self::Merge(d) => d.is_done(),
            Self::Elo(d) => d.is_done(),
            Self::Picker(d) => d.is_done(),
        }
    }

    /// Number of candidates this driver was started with.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        match self {
            Self::Merge(d) => d.candidate_count(),
            Self::Elo(d) => d.candidate_count(),
            Self::Picker(d) => d.candidate_count(),
        }
    }

    /// Reconcile loaded state against the live roster: drop unknown ids,
    /// restore set invariants, clamp cursors. Never fails; returns what was
    /// fixed so the caller can log it.
    pub fn repair(&mut self, known: &BTreeSet<CandidateId>) -> RepairReport {
        match self {
            Self::Merge(d) => d.repair(known),
            Self::Elo(d) => d.repair(known),
            Self::Picker(d) => d.repair(known),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
