//! Scripted oracle and judgment-count measurement.
//!
//! The oracle answers from candidate ordinals (lower wins, equal ties) and
//! counts how often it is actually consulted, so cache short-circuits show
//! up as savings. `simulate` runs a driver to completion against it over
//! several seeds and reports the judgment-count spread, which is how the
//! per-driver prompt budgets here were measured in the first place.

use crate::candidate::{CandidateId, Roster};
use crate::driver::{DriverKind, Intensity, Step};
use crate::error::RankError;
use crate::export::RankingDoc;
use crate::judgment::{BatchReply, Reply, Verdict};
use crate::session::Session;
use crate::store::{MemoryStore, StateStore};

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

/// Deterministic oracle backed by roster ordinals.
#[derive(Debug)]
pub struct ScriptedOracle<'a> {
    roster: &'a Roster,
    judgments: usize,
}

impl<'a> ScriptedOracle<'a> {
    /// Oracle over `roster`.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidInput`] when any candidate lacks an
    /// ordinal; scripted judging needs a ground-truth order.
    pub fn new(roster: &'a Roster) -> Result<Self, RankError> {
        for candidate in roster.iter() {
            if candidate.ordinal.is_none() {
                return Err(RankError::invalid_input(format!(
                    "candidate {} has no ordinal; use ordinal,name roster lines to simulate",
                    candidate.id
                )));
            }
        }
        Ok(Self {
            roster,
            judgments: 0,
        })
    }

    fn ordinal(&self, id: &CandidateId) -> u32 {
        self.roster
            .get(id)
            .and_then(|c| c.ordinal)
            .unwrap_or(u32::MAX)
    }

    /// Judge a pair: the lower ordinal wins, equal ordinals tie.
    pub fn judge(&mut self, left: &CandidateId, right: &CandidateId) -> Verdict {
        self.judgments += 1;
        match self.ordinal(left).cmp(&self.ordinal(right)) {
            std::cmp::Ordering::Less => Verdict::Left,
            std::cmp::Ordering::Equal => Verdict::Tie,
            std::cmp::Ordering::Greater => Verdict::Right,
        }
    }

    /// Pick the better half of a batch (rounded up), best first.
    pub fn pick_batch(&mut self, members: &[CandidateId]) -> Vec<CandidateId> {
        self.judgments += 1;
        let mut sorted: Vec<CandidateId> = members.to_vec();
        sorted.sort_by_key(|id| self.ordinal(id));
        sorted.truncate(members.len().div_ceil(2));
        sorted
    }

    /// How many times the oracle was actually consulted.
    #[must_use]
    pub const fn judgments(&self) -> usize {
        self.judgments
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Drive `session` to completion against the oracle and return the final
/// document.
///
/// # Errors
/// Propagates reply rejections, which indicate a driver/oracle mismatch.
pub fn run_to_completion<S: StateStore>(
    session: &mut Session<S>,
    oracle: &mut ScriptedOracle<'_>,
) -> Result<RankingDoc, RankError> {
    loop {
        match session.step() {
            Step::AwaitPair { left, right } => {
                let verdict = oracle.judge(&left, &right);
                session.judge(Reply::Verdict(verdict))?;
            }
            Step::AwaitBatch { members } => {
                let picked = oracle.pick_batch(&members);
                session.judge_batch(BatchReply::Picked(picked))?;
            }
            Step::Done => {
                return session.finish().ok_or_else(|| RankError::CorruptState {
                    detail: "driver reported done but produced no ranking".to_owned(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Judgment-count spread over repeated scripted runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimSummary {
    pub attempts: usize,
    pub min: usize,
    pub mean: f64,
    pub max: usize,
}

impl SimSummary {
    #[allow(clippy::cast_precision_loss)]
    fn from_counts(counts: &[usize]) -> Self {
        let sum: usize = counts.iter().sum();
        Self {
            attempts: counts.len(),
            min: counts.iter().copied().min().unwrap_or(0),
            mean: sum as f64 / counts.len() as f64,
            max: counts.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Run `attempts` scripted sessions with distinct seeds and summarize how
/// many judgments each needed.
///
/// # Errors
/// Returns [`RankError::InvalidInput`] for zero attempts or a roster
/// without ordinals.
pub fn simulate(
    roster: &Roster,
    kind: DriverKind,
    intensity: Intensity,
    attempts: usize,
    seed: u64,
) -> Result<SimSummary, RankError> {
    if attempts == 0 {
        return Err(RankError::invalid_input("attempts must be at least 1"));
    }
    let mut counts = Vec::with_capacity(attempts);
    for attempt in 0..attempts {
        let mut session = Session::new(
            roster.clone(),
            kind,
            intensity,
            Some(seed.wrapping_add(attempt as u64)),
            MemoryStore::new(),
        );
        let mut oracle = ScriptedOracle::new(roster)?;
        run_to_completion(&mut session, &mut oracle)?;
        counts.push(oracle.judgments());
    }
    Ok(SimSummary::from_counts(&counts))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
