//! Pairwise ELO rating driver.
//!
//! Every candidate starts at 1000. A work queue seeded with shuffled
//! round-robin cycles supplies matchups; once the queue drains, the driver
//! synthesizes the pair with the smallest rating gap so late judgments
//! refine close calls. The run stops when a fixed pair budget derived from
//! the candidate count and intensity is spent, and the descending ratings
//! become the final order.
//!
//! Ratings move by the textbook update `R' = R + K(S - E)` with
//! `E_a = 1 / (1 + 10^((R_b - R_a)/400))`, both sides updated from
//! pre-update values. Every seventh judgment injects one extra matchup
//! between the two candidates straddling the rating median, which sharpens
//! the middle of the table where orderings are least settled.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::cache::ComparisonCache;
use crate::candidate::CandidateId;
use crate::driver::{Finish, Intensity, RepairReport, Shuffler, Step};
use crate::error::RankError;
use crate::judgment::Verdict;
use crate::progress;

/// Rating every candidate starts from.
pub const DEFAULT_RATING: f64 = 1000.0;

/// How many rounded ratings are kept per candidate for delta display.
const HISTORY_LEN: usize = 10;

/// A judgment count divisible by this injects a median-boundary matchup.
const BOUNDARY_EVERY: usize = 7;

/// Suspended ELO run over candidate ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EloDriver {
    ratings: BTreeMap<CandidateId, f64>,
    history: BTreeMap<CandidateId, Vec<i32>>,
    queue: VecDeque<(CandidateId, CandidateId)>,
    current: Option<(CandidateId, CandidateId)>,
    pairs_done: usize,
    total_pairs: usize,
    intensity: Intensity,
}

impl EloDriver {
    /// Start a run: default ratings, a pair budget from `intensity`, and a
    /// queue of `max(2, ⌈log2 n⌉)` shuffled round-robin cycles.
    #[must_use]
    pub fn new(ids: Vec<CandidateId>, intensity: Intensity, shuffler: &mut Shuffler) -> Self {
        let n = ids.len();
        let cycles = progress::ceil_log2(n).max(2);
        let mut queue = VecDeque::new();
        for _ in 0..cycles {
            let mut order = ids.clone();
            shuffler.shuffle(&mut order);
            for pair in order.windows(2) {
                queue.push_back((pair[0].clone(), pair[1].clone()));
            }
        }
        Self {
            ratings: ids.iter().map(|id| (id.clone(), DEFAULT_RATING)).collect(),
            history: BTreeMap::new(),
            queue,
            current: None,
            pairs_done: 0,
            total_pairs: pair_budget(n, intensity),
            intensity,
        }
    }

    /// Advance to the next unjudged matchup, consuming cached verdicts as
    /// completed judgments along the way.
    pub fn poll(&mut self, cache: &ComparisonCache) -> Step {
        loop {
            if self.is_done() {
                return Step::Done;
            }
            let (a, b) = match self.current.clone() {
                Some(pair) => pair,
                None => {
                    let Some(pair) = self.queue.pop_front().or_else(|| self.closest_pair())
                    else {
                        return Step::Done;
                    };
                    if pair.0 == pair.1
                        || !self.ratings.contains_key(&pair.0)
                        || !self.ratings.contains_key(&pair.1)
                    {
                        continue;
                    }
                    self.current = Some(pair.clone());
                    pair
                }
            };
            if let Some(verdict) = cache.lookup(&a, &b) {
                self.current = None;
                self.apply(&a, &b, verdict);
                continue;
            }
            return Step::AwaitPair { left: a, right: b };
        }
    }

    /// Apply a verdict to the pending matchup and record it in the cache.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no matchup is pending.
    pub fn resolve(&mut self, verdict: Verdict, cache: &mut ComparisonCache) -> Result<(), RankError> {
        let Some((a, b)) = self.current.take() else {
            return Err(RankError::invalid_reply("no pairwise judgment is pending"));
        };
        cache.record(&a, &b, verdict);
        self.apply(&a, &b, verdict);
        Ok(())
    }

    /// Defer the pending matchup to the back of the queue, unjudged.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no matchup is pending.
    pub fn skip(&mut self) -> Result<(), RankError> {
        let Some(pair) = self.current.take() else {
            return Err(RankError::invalid_reply("no pairwise judgment is pending"));
        };
        self.queue.push_back(pair);
        Ok(())
    }

    /// Descending-rating order once the budget is spent.
    #[must_use]
    pub fn finish(&self) -> Option<Finish> {
        if self.is_done() {
            Some(Finish::Ranked(self.live_ranking()))
        } else {
            None
        }
    }

    /// Whether the pair budget is spent (or there is nothing to compare).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.pairs_done >= self.total_pairs || self.ratings.len() < 2
    }

    /// Completed judgments over the pair budget.
    #[must_use]
    pub fn progress(&self) -> f64 {
        progress::ratio_percent(self.pairs_done, self.total_pairs)
    }

    /// Ids sorted by rating, best first, id as tiebreak.
    #[must_use]
    pub fn live_ranking(&self) -> Vec<CandidateId> {
        self.sorted_by_rating()
            .into_iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of rated candidates.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.ratings.len()
    }

    /// Completed judgments so far.
    #[must_use]
    pub const fn pairs_done(&self) -> usize {
        self.pairs_done
    }

    /// The judgment budget for this run.
    #[must_use]
    pub const fn total_pairs(&self) -> usize {
        self.total_pairs
    }

    /// Current rating for `id`.
    #[must_use]
    pub fn rating_of(&self, id: &CandidateId) -> Option<f64> {
        self.ratings.get(id).copied()
    }

    /// Rating rounded for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rounded_rating(&self, id: &CandidateId) -> Option<i32> {
        self.ratings.get(id).map(|r| r.round() as i32)
    }

    /// Change between the last two recorded ratings for `id`, if at least
    /// two judgments touched it.
    #[must_use]
    pub fn last_delta(&self, id: &CandidateId) -> Option<i32> {
        let h = self.history.get(id)?;
        if h.len() < 2 {
            return None;
        }
        Some(h[h.len() - 1] - h[h.len() - 2])
    }

    /// Reconcile loaded state against the roster: drop unknown ids from the
    /// ratings, history, queue, and pending matchup; restore a sane budget
    /// and finite ratings.
    pub fn repair(&mut self, known: &BTreeSet<CandidateId>) -> RepairReport {
        let mut report = RepairReport::default();

        let before = self.ratings.len();
        self.ratings.retain(|id, _| known.contains(id));
        report.dropped_ids += before - self.ratings.len();
        for rating in self.ratings.values_mut() {
            if !rating.is_finite() {
                *rating = DEFAULT_RATING;
                report.clamped_cursors += 1;
            }
        }

        self.history.retain(|id, _| self.ratings.contains_key(id));
        for h in self.history.values_mut() {
            if h.len() > HISTORY_LEN {
                h.drain(..h.len() - HISTORY_LEN);
            }
        }

        let qbefore = self.queue.len();
        let ratings = &self.ratings;
        self.queue.retain(|(a, b)| {
            a != b && ratings.contains_key(a) && ratings.contains_key(b)
        });
        report.dropped_ids += qbefore - self.queue.len();

        if let Some((a, b)) = &self.current {
            if a == b || !self.ratings.contains_key(a) || !self.ratings.contains_key(b) {
                self.current = None;
                report.dropped_ids += 1;
            }
        }

        if self.total_pairs == 0 && self.ratings.len() >= 2 {
            self.total_pairs = pair_budget(self.ratings.len(), self.intensity);
            report.clamped_cursors += 1;
        }
        report
    }

    // -- internals --

    fn apply(&mut self, a: &CandidateId, b: &CandidateId, verdict: Verdict) {
        let ra = self.ratings.get(a).copied().unwrap_or(DEFAULT_RATING);
        let rb = self.ratings.get(b).copied().unwrap_or(DEFAULT_RATING);
        let (sa, sb) = verdict.scores();
        let ea = 1.0 / (1.0 + 10f64.powf((rb - ra) / 400.0));
        let eb = 1.0 - ea;
        let k = self.intensity.k_factor();
        let ra_next = ra + k * (sa - ea);
        let rb_next = rb + k * (sb - eb);
        self.ratings.insert(a.clone(), ra_next);
        self.ratings.insert(b.clone(), rb_next);
        self.push_history(a, ra_next);
        self.push_history(b, rb_next);
        self.pairs_done += 1;
        if self.pairs_done % BOUNDARY_EVERY == 0 {
            if let Some(pair) = self.median_straddling_pair() {
                self.queue.push_front(pair);
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn push_history(&mut self, id: &CandidateId, rating: f64) {
        let h = self.history.entry(id.clone()).or_default();
        h.push(rating.round() as i32);
        if h.len() > HISTORY_LEN {
            h.remove(0);
        }
    }

    fn sorted_by_rating(&self) -> Vec<(&CandidateId, f64)> {
        let mut sorted: Vec<_> = self.ratings.iter().map(|(id, r)| (id, *r)).collect();
        sorted.sort_by(|x, y| y.1.total_cmp(&x.1).then_with(|| x.0.cmp(y.0)));
        sorted
    }

    /// The adjacent pair with the smallest rating gap, for queue refills.
    fn closest_pair(&self) -> Option<(CandidateId, CandidateId)> {
        let sorted = self.sorted_by_rating();
        sorted
            .windows(2)
            .min_by(|w1, w2| (w1[0].1 - w1[1].1).abs().total_cmp(&(w2[0].1 - w2[1].1).abs()))
            .map(|w| (w[0].0.clone(), w[1].0.clone()))
    }

    /// The two candidates either side of the table's midpoint.
    fn median_straddling_pair(&self) -> Option<(CandidateId, CandidateId)> {
        let sorted = self.sorted_by_rating();
        if sorted.len() < 2 {
            return None;
        }
        let mid = sorted.len() / 2;
        Some((sorted[mid - 1].0.clone(), sorted[mid].0.clone()))
    }
}

/// Judgment budget: `max(n−1, round(1.5·n·⌈log2 n⌉))`, scaled by the
/// intensity multiplier.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pair_budget(n: usize, intensity: Intensity) -> usize {
    if n < 2 {
        return 0;
    }
    let coverage = (1.5 * n as f64 * f64::from(progress::ceil_log2(n))).round();
    let floor = (n - 1) as f64;
    (coverage.max(floor) * intensity.multiplier()).round() as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
