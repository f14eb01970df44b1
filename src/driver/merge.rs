//! Resumable bottom-up merge sort driven by human judgments.
//!
//! The classic iterative merge sort, unrolled so it can stop between any
//! two comparisons. All loop variables live in the struct: `arr` is the
//! full working order, `width` the current block size, `i` the block
//! origin, and `left`/`right`/`out` the in-flight merge with cursors `li`
//! and `rj`. Suspending is just returning from [`MergeDriver::poll`];
//! resuming is calling it again on a deserialized value.
//!
//! Judged pairs come back through the comparison cache, so a resumed or
//! undone run replays prior verdicts without prompting. Ties order as
//! left-wins but are recorded in the tie set for equal-rank display.
//!
//! Skips rotate the untaken remainder of both sides so a different pair
//! comes up next, with two escape hatches: a 1v1 block skips straight to a
//! forced tie, and a run of consecutive skips longer than the remaining
//! block forces a tie rather than rotating forever.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cache::ComparisonCache;
use crate::candidate::CandidateId;
use crate::driver::{Finish, RepairReport, Step};
use crate::error::RankError;
use crate::judgment::Verdict;
use crate::progress;

/// Suspended merge sort over candidate ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDriver {
    arr: Vec<CandidateId>,
    width: usize,
    i: usize,
    left: Vec<CandidateId>,
    right: Vec<CandidateId>,
    li: usize,
    rj: usize,
    out: Vec<CandidateId>,
    rotations: usize,
}

impl MergeDriver {
    /// Seed a frame over `ids` in the given presentation order.
    #[must_use]
    pub fn new(ids: Vec<CandidateId>) -> Self {
        Self {
            arr: ids,
            width: 1,
            i: 0,
            left: Vec::new(),
            right: Vec::new(),
            li: 0,
            rj: 0,
            out: Vec::new(),
            rotations: 0,
        }
    }

    /// Advance bookkeeping until a judgment is needed or the sort is done.
    /// Cached verdicts for upcoming pairs are applied without prompting.
    pub fn poll(&mut self, cache: &ComparisonCache) -> Step {
        loop {
            if self.is_done() {
                return Step::Done;
            }
            if self.i >= self.arr.len() {
                self.width *= 2;
                self.i = 0;
                continue;
            }
            if self.left.is_empty() && self.right.is_empty() {
                let mid = (self.i + self.width).min(self.arr.len());
                let end = (self.i + 2 * self.width).min(self.arr.len());
                if mid >= end {
                    // Odd tail block with nothing to merge against.
                    self.i += 2 * self.width;
                    continue;
                }
                self.left = self.arr[self.i..mid].to_vec();
                self.right = self.arr[mid..end].to_vec();
                self.li = 0;
                self.rj = 0;
                self.rotations = 0;
            }
            if self.li < self.left.len() && self.rj < self.right.len() {
                let l = self.left[self.li].clone();
                let r = self.right[self.rj].clone();
                match cache.lookup(&l, &r) {
                    Some(verdict) => {
                        self.apply_verdict(verdict);
                        continue;
                    }
                    None => return Step::AwaitPair { left: l, right: r },
                }
            }
            self.finish_block();
        }
    }

    /// Apply a verdict to the pending pair and record it in the cache.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no pair is pending.
    pub fn resolve(&mut self, verdict: Verdict, cache: &mut ComparisonCache) -> Result<(), RankError> {
        let (l, r) = self.pending_pair()?;
        cache.record(&l, &r, verdict);
        self.apply_verdict(verdict);
        Ok(())
    }

    /// Defer the pending pair. A 1v1 block forces a tie instead; otherwise
    /// both current elements rotate to the back of their sides so the next
    /// poll surfaces a different pair. A streak of skips longer than the
    /// remaining block also forces a tie, so rotation cannot loop forever.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no pair is pending.
    pub fn skip(&mut self, cache: &mut ComparisonCache) -> Result<(), RankError> {
        let (l, r) = self.pending_pair()?;
        let remaining = (self.left.len() - self.li) + (self.right.len() - self.rj);
        if remaining == 2 || self.rotations + 1 > remaining {
            cache.record(&l, &r, Verdict::Tie);
            self.apply_verdict(Verdict::Tie);
            return Ok(());
        }
        self.rotations += 1;
        self.left[self.li..].rotate_left(1);
        self.right[self.rj..].rotate_left(1);
        Ok(())
    }

    /// The sorted order, best first, once the sort is done.
    #[must_use]
    pub fn finish(&self) -> Option<Finish> {
        if self.is_done() {
            Some(Finish::Ranked(self.arr.clone()))
        } else {
            None
        }
    }

    /// Whether the final pass has completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.width >= self.arr.len()
    }

    /// Completion estimate: unique judged pairs over the worst-case bound.
    #[must_use]
    pub fn progress(&self, cache: &ComparisonCache) -> f64 {
        progress::merge_percent(cache.unique_pairs(), self.arr.len())
    }

    /// Current best-known order, including the in-flight block. Always a
    /// permutation of the input.
    #[must_use]
    pub fn live_ranking(&self) -> Vec<CandidateId> {
        if self.left.is_empty() && self.right.is_empty() {
            return self.arr.clone();
        }
        let block = self.left.len() + self.right.len();
        let rest = (self.i + block).min(self.arr.len());
        let mut view = Vec::with_capacity(self.arr.len());
        view.extend_from_slice(&self.arr[..self.i]);
        view.extend_from_slice(&self.out);
        view.extend_from_slice(&self.left[self.li..]);
        view.extend_from_slice(&self.right[self.rj..]);
        view.extend_from_slice(&self.arr[rest..]);
        view
    }

    /// Number of candidates being sorted.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.arr.len()
    }

    /// Reconcile a loaded frame against the roster. Unknown and duplicate
    /// ids are dropped from `arr`; if the in-flight block fails any
    /// consistency check the block is rewound and rebuilt from `arr` at the
    /// next poll, with recorded verdicts replaying from the cache.
    pub fn repair(&mut self, known: &BTreeSet<CandidateId>) -> RepairReport {
        let mut report = RepairReport::default();

        let before = self.arr.len();
        let mut seen = BTreeSet::new();
        self.arr
            .retain(|id| known.contains(id) && seen.insert(id.clone()));
        report.dropped_ids += before - self.arr.len();

        if self.width == 0 {
            self.width = 1;
            report.clamped_cursors += 1;
        }
        // A cursor past the end restarts the current pass rather than
        // skipping it; prior verdicts replay from the cache at no cost.
        if self.i > self.arr.len() {
            self.i = 0;
            report.clamped_cursors += 1;
        }

        let dirty = report.dropped_ids > 0
            || report.clamped_cursors > 0
            || !self.block_is_consistent(known);
        if dirty {
            let block_held_state = !(self.left.is_empty()
                && self.right.is_empty()
                && self.out.is_empty()
                && self.li == 0
                && self.rj == 0);
            if block_held_state {
                report.clamped_cursors += 1;
            }
            self.rewind_block();
        }
        report
    }

    // -- internals --

    fn pending_pair(&self) -> Result<(CandidateId, CandidateId), RankError> {
        if !self.is_done() && self.li < self.left.len() && self.rj < self.right.len() {
            Ok((self.left[self.li].clone(), self.right[self.rj].clone()))
        } else {
            Err(RankError::invalid_reply("no pairwise judgment is pending"))
        }
    }

    fn apply_verdict(&mut self, verdict: Verdict) {
        match verdict {
            // Ties emit the left element first.
            Verdict::Left | Verdict::Tie => {
                self.out.push(self.left[self.li].clone());
                self.li += 1;
            }
            Verdict::Right => {
                self.out.push(self.right[self.rj].clone());
                self.rj += 1;
            }
        }
        self.rotations = 0;
    }

    fn finish_block(&mut self) {
        self.out.extend(self.left.drain(self.li..));
        self.out.extend(self.right.drain(self.rj..));
        let n = self.out.len();
        self.arr.splice(self.i..self.i + n, self.out.drain(..));
        self.left.clear();
        self.right.clear();
        self.li = 0;
        self.rj = 0;
        self.rotations = 0;
        self.i += 2 * self.width;
    }

    fn block_is_consistent(&self, known: &BTreeSet<CandidateId>) -> bool {
        if self.left.is_empty() && self.right.is_empty() {
            return self.out.is_empty() && self.li == 0 && self.rj == 0;
        }
        if self.li > self.left.len() || self.rj > self.right.len() {
            return false;
        }
        if self.out.len() != self.li + self.rj {
            return false;
        }
        let mut seen = BTreeSet::new();
        self.left
            .iter()
            .chain(self.right.iter())
            .all(|id| known.contains(id) && seen.insert(id))
    }

    fn rewind_block(&mut self) {
        self.left.clear();
        self.right.clear();
        self.out.clear();
        self.li = 0;
        self.rj = 0;
        self.rotations = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
