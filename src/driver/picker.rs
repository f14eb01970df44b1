//! Elimination picker ("favorites tournament").
//!
//! Approval-style batch elimination: the oracle is shown a small batch and
//! picks whichever members it favors. Picked ids survive the round;
//! everyone else is eliminated and remembers who knocked them out. When a
//! round whittles the field to a single survivor, that id becomes the next
//! favorite, and anything eliminated only by now-favorited ids returns to
//! play. Repeating this surfaces favorites one at a time, best first,
//! until every candidate has been placed.
//!
//! Candidates are never lost: a fully-eliminated field is restored
//! wholesale, and an empty pick just pushes the whole batch into the
//! eliminated set with nothing holding it down.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateId;
use crate::driver::{Finish, RepairReport, Shuffler, Step};
use crate::error::RankError;
use crate::progress;

const MIN_BATCH: usize = 2;
const MAX_BATCH: usize = 6;

/// A knocked-out candidate and the picks that did it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eliminated {
    pub id: CandidateId,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub eliminated_by: BTreeSet<CandidateId>,
}

/// Suspended favorites tournament.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerDriver {
    current: Vec<CandidateId>,
    survived: Vec<CandidateId>,
    evaluating: Vec<CandidateId>,
    eliminated: Vec<Eliminated>,
    favorites: Vec<CandidateId>,
    batch_size: usize,
    #[serde(default)]
    stalled: bool,
}

impl PickerDriver {
    /// Start a tournament over `ids`, shuffled into the opening round.
    #[must_use]
    pub fn new(mut ids: Vec<CandidateId>, shuffler: &mut Shuffler) -> Self {
        shuffler.shuffle(&mut ids);
        let batch_size = batch_size_for(ids.len());
        Self {
            current: ids,
            survived: Vec::new(),
            evaluating: Vec::new(),
            eliminated: Vec::new(),
            favorites: Vec::new(),
            batch_size,
            stalled: false,
        }
    }

    /// Advance round bookkeeping until a batch awaits a pick or every
    /// candidate has been favorited.
    pub fn poll(&mut self, shuffler: &mut Shuffler) -> Step {
        loop {
            if self.is_done() {
                return Step::Done;
            }
            if !self.evaluating.is_empty() {
                return Step::AwaitBatch {
                    members: self.evaluating.clone(),
                };
            }
            if !self.fill_batch(shuffler) {
                tracing::warn!(
                    "favorites run stalled with {} of {} placed; finishing early",
                    self.favorites.len(),
                    self.total()
                );
                self.stalled = true;
                return Step::Done;
            }
        }
    }

    /// Apply a pick to the pending batch: picked members survive, the rest
    /// are eliminated and tagged with the picked set. With two candidates
    /// left overall and one of two picked, both are favorited directly,
    /// picked first.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no batch is pending or a
    /// picked id is not in it.
    pub fn resolve_batch(&mut self, picked: &[CandidateId]) -> Result<(), RankError> {
        if self.evaluating.is_empty() {
            return Err(RankError::invalid_reply("no batch is awaiting a pick"));
        }
        let mut chosen: Vec<CandidateId> = Vec::new();
        for id in picked {
            if !self.evaluating.contains(id) {
                return Err(RankError::InvalidReply {
                    detail: format!("picked id {:?} is not in the current batch", id.as_str()),
                });
            }
            if !chosen.contains(id) {
                chosen.push(id.clone());
            }
        }

        let remaining = self.total() - self.favorites.len();
        if remaining == 2 && self.evaluating.len() == 2 && chosen.len() == 1 {
            // A final head-to-head settles both places at once.
            let first = chosen.remove(0);
            let second = self.evaluating.iter().find(|id| **id != first).cloned();
            self.evaluating.clear();
            self.favorites.push(first);
            if let Some(second) = second {
                self.favorites.push(second);
            }
            return Ok(());
        }

        let eliminators: BTreeSet<CandidateId> = chosen.iter().cloned().collect();
        for id in std::mem::take(&mut self.evaluating) {
            if !eliminators.contains(&id) {
                self.eliminated.push(Eliminated {
                    id,
                    eliminated_by: eliminators.clone(),
                });
            }
        }
        self.survived.extend(chosen);
        Ok(())
    }

    /// Wave the whole batch through to `survived`.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no batch is pending.
    pub fn pass_batch(&mut self) -> Result<(), RankError> {
        if self.evaluating.is_empty() {
            return Err(RankError::invalid_reply("no batch is awaiting a pick"));
        }
        self.survived.append(&mut self.evaluating);
        Ok(())
    }

    /// Favorites surfaced so far, in order, once the run is over.
    #[must_use]
    pub fn finish(&self) -> Option<Finish> {
        if self.is_done() {
            Some(Finish::Favorites(self.favorites.clone()))
        } else {
            None
        }
    }

    /// Whether every candidate has been favorited (or the run stalled).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.stalled || self.favorites.len() == self.total()
    }

    /// Favorites placed over the total field.
    #[must_use]
    pub fn progress(&self) -> f64 {
        progress::ratio_percent(self.favorites.len(), self.total())
    }

    /// Favorites first, then the unsettled field.
    #[must_use]
    pub fn live_ranking(&self) -> Vec<CandidateId> {
        let mut view = self.favorites.clone();
        view.extend(self.evaluating.iter().cloned());
        view.extend(self.current.iter().cloned());
        view.extend(self.survived.iter().cloned());
        view.extend(self.eliminated.iter().map(|e| e.id.clone()));
        view
    }

    /// Total number of candidates across every state.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.total()
    }

    /// Favorites surfaced so far.
    #[must_use]
    pub fn favorites(&self) -> &[CandidateId] {
        &self.favorites
    }

    /// Reconcile loaded state against the roster: drop unknown and
    /// duplicated ids, scrub eliminator sets, and restore a sane batch
    /// size.
    pub fn repair(&mut self, known: &BTreeSet<CandidateId>) -> RepairReport {
        let mut report = RepairReport::default();
        let mut seen: BTreeSet<CandidateId> = BTreeSet::new();
        let mut keep = |id: &CandidateId| known.contains(id) && seen.insert(id.clone());

        let before = self.total();
        self.favorites.retain(&mut keep);
        self.evaluating.retain(&mut keep);
        self.current.retain(&mut keep);
        self.survived.retain(&mut keep);
        self.eliminated.retain(|e| keep(&e.id));
        report.dropped_ids += before - self.total();

        // Eliminator sets may name ids that are gone or already favorited;
        // an entry with nothing holding it down returns to play.
        let favorites: BTreeSet<CandidateId> = self.favorites.iter().cloned().collect();
        let mut restored = Vec::new();
        self.eliminated.retain_mut(|e| {
            e.eliminated_by
                .retain(|by| known.contains(by) && !favorites.contains(by));
            if e.eliminated_by.is_empty() {
                restored.push(e.id.clone());
                false
            } else {
                true
            }
        });
        self.survived.extend(restored);

        if self.batch_size < MIN_BATCH || self.batch_size > MAX_BATCH {
            self.batch_size = batch_size_for(self.current.len());
            report.clamped_cursors += 1;
        }
        report
    }

    // -- internals --

    fn total(&self) -> usize {
        self.favorites.len()
            + self.evaluating.len()
            + self.current.len()
            + self.survived.len()
            + self.eliminated.len()
    }

    /// One bookkeeping move toward a non-empty `evaluating`. Returns false
    /// when no move is possible, which only happens on inconsistent state.
    fn fill_batch(&mut self, shuffler: &mut Shuffler) -> bool {
        if self.current.is_empty() && self.survived.is_empty() {
            if self.eliminated.is_empty() {
                return false;
            }
            // Everyone got knocked out; restore the whole field.
            for e in self.eliminated.drain(..) {
                self.survived.push(e.id);
            }
            return true;
        }
        if self.current.len() < self.batch_size && !self.survived.is_empty() {
            self.next_round(shuffler);
            return true;
        }
        let take = self.batch_size.min(self.current.len());
        if take == 0 {
            return false;
        }
        self.evaluating = self.current.drain(..take).collect();
        true
    }

    fn next_round(&mut self, shuffler: &mut Shuffler) {
        if self.current.is_empty() && self.survived.len() == 1 {
            let favorite = self.survived.remove(0);
            self.unlock_after(&favorite);
            self.favorites.push(favorite);
        }
        shuffler.shuffle(&mut self.survived);
        self.current.append(&mut self.survived);
        self.batch_size = batch_size_for(self.current.len());
    }

    /// Remove a freshly-promoted favorite from every eliminator set and
    /// restore entries no longer held down by anyone.
    fn unlock_after(&mut self, favorite: &CandidateId) {
        let mut kept = Vec::with_capacity(self.eliminated.len());
        for mut e in std::mem::take(&mut self.eliminated) {
            e.eliminated_by.remove(favorite);
            if e.eliminated_by.is_empty() {
                self.survived.push(e.id);
            } else {
                kept.push(e);
            }
        }
        self.eliminated = kept;
    }
}

fn batch_size_for(n: usize) -> usize {
    n.div_ceil(2).clamp(MIN_BATCH, MAX_BATCH)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<CandidateId> {
        names
            .iter()
            .map(|n| CandidateId::new(n).unwrap())
            .collect()
    }

    /// Every id must sit in exactly one state collection.
    fn assert_invariant(driver: &PickerDriver, expected: &[&str]) {
        let mut all: Vec<&str> = driver
            .favorites
            .iter()
            .chain(driver.evaluating.iter())
            .chain(driver.current.iter())
            .chain(driver.survived.iter())
            .map(CandidateId::as_str)
            .chain(driver.eliminated.iter().map(|e| e.id.as_str()))
            .collect();
        all.sort_unstable();
        let mut want = expected.to_vec();
        want.sort_unstable();
        assert_eq!(all, want, "ids duplicated or dropped");
    }

    /// Pick the best half of the batch according to `priority` (earlier is
    /// better), mirroring a perfectly consistent judge.
    fn best_half(batch: &[CandidateId], priority: &[&str]) -> Vec<CandidateId> {
        let pos = |id: &CandidateId| {
            priority
                .iter()
                .position(|p| *p == id.as_str())
                .unwrap_or(usize::MAX)
        };
        let mut sorted = batch.to_vec();
        sorted.sort_by_key(|id| pos(id));
        sorted.truncate(batch.len().div_ceil(2));
        sorted
    }

    #[test]
    fn opening_batch_sizes() {
        for (n, expected) in [(2, 2), (3, 2), (4, 2), (7, 4), (12, 6), (40, 6)] {
            let names: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let mut shuffler = Shuffler::new(4);
            let mut driver = PickerDriver::new(ids(&names), &mut shuffler);
            let Step::AwaitBatch { members } = driver.poll(&mut shuffler) else {
                panic!("expected a batch for n={n}");
            };
            assert_eq!(members.len(), expected, "n={n}");
        }
    }

    #[test]
    fn consistent_picks_surface_favorites_in_merit_order() {
        let priority = ["a", "b", "c", "d", "e", "f"];
        let mut shuffler = Shuffler::new(99);
        let mut driver = PickerDriver::new(ids(&priority), &mut shuffler);

        let mut rounds = 0;
        loop {
            match driver.poll(&mut shuffler) {
                Step::AwaitBatch { members } => {
                    rounds += 1;
                    assert!(rounds <= 200, "tournament failed to terminate");
                    let picked = best_half(&members, &priority);
                    driver.resolve_batch(&picked).unwrap();
                    assert_invariant(&driver, &priority);
                }
                Step::Done => break,
                Step::AwaitPair { .. } => unreachable!("picker never pairs"),
            }
        }
        let Some(Finish::Favorites(favorites)) = driver.finish() else {
            panic!("expected favorites");
        };
        let got: Vec<&str> = favorites.iter().map(CandidateId::as_str).collect();
        assert_eq!(got, priority);
    }

    #[test]
    fn pass_waves_the_whole_batch_through() {
        let all = ["a", "b", "c", "d"];
        let mut shuffler = Shuffler::new(7);
        let mut driver = PickerDriver::new(ids(&all), &mut shuffler);
        let Step::AwaitBatch { members } = driver.poll(&mut shuffler) else {
            panic!("expected a batch");
        };
        let batch_len = members.len();
        driver.pass_batch().unwrap();
        assert_invariant(&driver, &all);
        assert_eq!(driver.survived.len(), batch_len);
        assert!(driver.eliminated.is_empty());
    }

    #[test]
    fn empty_pick_eliminates_batch_then_field_recovers() {
        let all = ["a", "b", "c", "d"];
        let mut shuffler = Shuffler::new(13);
        let mut driver = PickerDriver::new(ids(&all), &mut shuffler);

        // Reject both opening batches.
        for _ in 0..2 {
            let Step::AwaitBatch { .. } = driver.poll(&mut shuffler) else {
                panic!("expected a batch");
            };
            driver.resolve_batch(&[]).unwrap();
            assert_invariant(&driver, &all);
        }
        assert_eq!(driver.eliminated.len(), 4);

        // The stuck field restores itself rather than ending the run.
        let step = driver.poll(&mut shuffler);
        assert!(matches!(step, Step::AwaitBatch { .. }));
        assert!(!driver.is_done());
        assert_invariant(&driver, &all);
    }

    #[test]
    fn two_left_head_to_head_settles_both() {
        let mut shuffler = Shuffler::new(8);
        let mut driver = PickerDriver::new(ids(&["x", "y"]), &mut shuffler);
        let Step::AwaitBatch { members } = driver.poll(&mut shuffler) else {
            panic!("expected a batch");
        };
        assert_eq!(members.len(), 2);
        driver.resolve_batch(&members[..1]).unwrap();

        assert_eq!(driver.poll(&mut shuffler), Step::Done);
        let Some(Finish::Favorites(favorites)) = driver.finish() else {
            panic!("expected favorites");
        };
        assert_eq!(favorites[0], members[0]);
        assert_eq!(favorites.len(), 2);
    }

    #[test]
    fn promotion_unlocks_candidates_it_eliminated() {
        let priority = ["a", "b", "c", "d"];
        let mut shuffler = Shuffler::new(41);
        let mut driver = PickerDriver::new(ids(&priority), &mut shuffler);

        let mut rounds = 0;
        // Stop at the first poll that reports a promotion.
        loop {
            match driver.poll(&mut shuffler) {
                Step::AwaitBatch { members } => {
                    if !driver.favorites().is_empty() {
                        break;
                    }
                    rounds += 1;
                    assert!(rounds <= 50, "no favorite after 50 batches");
                    let picked = best_half(&members, &priority);
                    driver.resolve_batch(&picked).unwrap();
                }
                Step::Done => panic!("finished without promoting anyone"),
                Step::AwaitPair { .. } => unreachable!(),
            }
        }
        // The consistent judge's first favorite is the best candidate, and
        // promoting it released everyone it had personally eliminated.
        assert_eq!(driver.favorites(), &ids(&["a"])[..]);
        let a = &ids(&["a"])[0];
        assert!(driver.eliminated.iter().all(|e| !e.eliminated_by.contains(a)));
        assert_invariant(&driver, &priority);
    }

    #[test]
    fn picks_outside_the_batch_are_rejected() {
        let mut shuffler = Shuffler::new(3);
        let mut driver = PickerDriver::new(ids(&["a", "b", "c", "d"]), &mut shuffler);
        let Step::AwaitBatch { members } = driver.poll(&mut shuffler) else {
            panic!("expected a batch");
        };
        let outsider = ids(&["zz"]);
        let err = driver.resolve_batch(&outsider).unwrap_err();
        assert!(matches!(err, RankError::InvalidReply { .. }));
        // The batch is still pending.
        let Step::AwaitBatch { members: again } = driver.poll(&mut shuffler) else {
            panic!("expected the batch to still be pending");
        };
        assert_eq!(members, again);
    }

    #[test]
    fn single_candidate_becomes_the_only_favorite() {
        let mut shuffler = Shuffler::new(6);
        let mut driver = PickerDriver::new(ids(&["solo"]), &mut shuffler);
        let Step::AwaitBatch { members } = driver.poll(&mut shuffler) else {
            panic!("expected a batch");
        };
        assert_eq!(members, ids(&["solo"]));
        driver.resolve_batch(&members).unwrap();
        assert_eq!(driver.poll(&mut shuffler), Step::Done);
        let Some(Finish::Favorites(favorites)) = driver.finish() else {
            panic!("expected favorites");
        };
        assert_eq!(favorites, ids(&["solo"]));
    }

    #[test]
    fn repair_scrubs_ghosts_and_unlocks_orphans() {
        let json = r#"{
            "current": ["a", "ghost"],
            "survived": ["b"],
            "evaluating": [],
            "eliminated": [
                {"id": "c", "eliminated_by": ["ghost"]},
                {"id": "d", "eliminated_by": ["a", "b"]}
            ],
            "favorites": [],
            "batch_size": 99
        }"#;
        let mut driver: PickerDriver = serde_json::from_str(json).unwrap();
        let known: BTreeSet<_> = ids(&["a", "b", "c", "d"]).into_iter().collect();
        let report = driver.repair(&known);

        assert_eq!(report.dropped_ids, 1);
        assert_eq!(report.clamped_cursors, 1);
        // c was only held down by the ghost, so it returned to play.
        assert!(driver.survived.contains(&ids(&["c"])[0]));
        assert_eq!(driver.eliminated.len(), 1);
        assert_invariant(&driver, &["a", "b", "c", "d"]);

        let mut shuffler = Shuffler::new(1);
        assert!(matches!(driver.poll(&mut shuffler), Step::AwaitBatch { .. }));
    }
}
