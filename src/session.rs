//! Owned ranking session.
//!
//! A [`Session`] owns one driver plus everything around it: the comparison
//! cache, the snapshot stack, the seeded shuffler, and the state store.
//! Callers drive the cooperative loop themselves: [`Session::step`] until a
//! judgment is needed, feed the oracle's answer back with [`Session::judge`]
//! or [`Session::judge_batch`], repeat until [`Step::Done`], then collect
//! the product with [`Session::finish`].
//!
//! Every mutation autosaves (debounced) to the store as one JSON blob.
//! Loading that blob back repairs it against the live roster instead of
//! rejecting it: unknown ids are filtered, cursors clamped, and only a blob
//! that cannot be decoded at all falls back to a fresh run.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cache::ComparisonCache;
use crate::candidate::{CandidateId, Roster};
use crate::driver::{Driver, DriverKind, Intensity, RepairReport, Shuffler, Step};
use crate::error::RankError;
use crate::export::RankingDoc;
use crate::judgment::{BatchReply, Reply};
use crate::store::StateStore;
use crate::undo::SnapshotStack;

/// Store key for the resumable session blob.
pub const SESSION_KEY: &str = "podium/session/v1";

/// Store key for the finished ranking document.
pub const RANKING_KEY: &str = "podium/ranking/v1";

/// Version stamp inside the session blob; a different stamp starts fresh.
pub const STATE_VERSION: u32 = 1;

/// Default debounce between autosaves.
pub const DEFAULT_AUTOSAVE_MS: u64 = 500;

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Everything a judgment can mutate, captured before each prompt goes out.
///
/// Restoring a checkpoint replaces the live driver and cache wholesale; the
/// cache must roll back together with the driver, otherwise the re-asked
/// prompt would short-circuit on its own undone verdict.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    driver: Driver,
    cache: ComparisonCache,
}

#[derive(Serialize)]
struct SaveState<'a> {
    version: u32,
    driver: &'a Driver,
    cache: &'a ComparisonCache,
    snapshots: &'a SnapshotStack<Checkpoint>,
    shuffler: &'a Shuffler,
    awaiting: bool,
}

#[derive(Deserialize)]
struct LoadState {
    version: u32,
    driver: Driver,
    cache: ComparisonCache,
    #[serde(default)]
    snapshots: SnapshotStack<Checkpoint>,
    shuffler: Shuffler,
    #[serde(default)]
    awaiting: bool,
}

struct Restored {
    driver: Driver,
    cache: ComparisonCache,
    snapshots: SnapshotStack<Checkpoint>,
    shuffler: Shuffler,
    awaiting: bool,
    repairs: RepairReport,
}

/// Decode and reconcile a saved blob against the live roster. `expected`
/// pins the driver kind when the caller asked for a specific one. The error
/// is a human-readable reason to fall back to a fresh run.
fn restore(roster: &Roster, expected: Option<DriverKind>, blob: &str) -> Result<Restored, String> {
    let state: LoadState =
        serde_json::from_str(blob).map_err(|e| format!("saved session does not decode ({e})"))?;

    if state.version != STATE_VERSION {
        return Err(format!(
            "saved session has state version {}, this build reads {STATE_VERSION}",
            state.version
        ));
    }
    if let Some(kind) = expected {
        if state.driver.kind() != kind {
            return Err(format!(
                "saved session ran the {} driver, not {kind}",
                state.driver.kind()
            ));
        }
    }

    let LoadState {
        mut driver,
        mut cache,
        mut snapshots,
        shuffler,
        awaiting,
        ..
    } = state;

    let known = roster.id_set();
    let mut repairs = driver.repair(&known);
    repairs.dropped_cache_entries += cache.retain_known(&known);
    // Checkpoints get the same reconciliation, uncounted; they describe the
    // same drops the live state already reported.
    for checkpoint in snapshots.iter_mut() {
        checkpoint.driver.repair(&known);
        checkpoint.cache.retain_known(&known);
    }
    snapshots.truncate_to_cap();

    if driver.candidate_count() == 0 {
        return Err("no saved candidate survives the current roster".to_owned());
    }

    Ok(Restored {
        driver,
        cache,
        snapshots,
        shuffler,
        awaiting,
        repairs,
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A ranking run in progress, bound to a roster and a store.
pub struct Session<S: StateStore> {
    roster: Roster,
    driver: Driver,
    cache: ComparisonCache,
    snapshots: SnapshotStack<Checkpoint>,
    shuffler: Shuffler,
    awaiting: bool,
    store: S,
    autosave: Duration,
    last_save: Option<Instant>,
    resumed: bool,
    notices: Vec<String>,
}

impl<S: StateStore> Session<S> {
    /// Start a fresh run. The roster order is shuffled (seeded) before the
    /// driver sees it, so presentation order never leaks into results.
    pub fn new(
        roster: Roster,
        kind: DriverKind,
        intensity: Intensity,
        seed: Option<u64>,
        store: S,
    ) -> Self {
        let mut shuffler = seed.map_or_else(Shuffler::from_entropy, Shuffler::new);
        let mut ids = roster.ids();
        shuffler.shuffle(&mut ids);
        let driver = Driver::new(kind, ids, intensity, &mut shuffler);
        Self {
            roster,
            driver,
            cache: ComparisonCache::new(),
            snapshots: SnapshotStack::new(),
            shuffler,
            awaiting: false,
            store,
            autosave: Duration::from_millis(DEFAULT_AUTOSAVE_MS),
            last_save: None,
            resumed: false,
            notices: Vec::new(),
        }
    }

    /// Resume the saved session if one exists and is usable, otherwise
    /// start fresh. A blob for a different driver kind, a foreign state
    /// version, or one that does not decode all fall back to fresh with a
    /// notice; partial damage is repaired instead.
    pub fn resume_or_new(
        roster: Roster,
        kind: DriverKind,
        intensity: Intensity,
        seed: Option<u64>,
        store: S,
    ) -> Self {
        let mut fallback_notice = None;
        match store.get(SESSION_KEY) {
            Ok(Some(blob)) => match restore(&roster, Some(kind), &blob) {
                Ok(parts) => return Self::from_restored(roster, parts, store),
                Err(reason) => {
                    tracing::warn!("discarding saved session: {reason}");
                    fallback_notice = Some(format!("starting fresh: {reason}"));
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("could not read saved session: {e}");
                fallback_notice = Some(format!("starting fresh: {e}"));
            }
        }

        let mut session = Self::new(roster, kind, intensity, seed, store);
        if let Some(notice) = fallback_notice {
            session.notices.push(notice);
        }
        session
    }

    /// Resume the saved session, whatever driver it ran. `None` when there
    /// is nothing usable to resume.
    pub fn resume(roster: Roster, store: S) -> Option<Self> {
        let blob = match store.get(SESSION_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("could not read saved session: {e}");
                return None;
            }
        };
        match restore(&roster, None, &blob) {
            Ok(parts) => Some(Self::from_restored(roster, parts, store)),
            Err(reason) => {
                tracing::warn!("saved session is unusable: {reason}");
                None
            }
        }
    }

    fn from_restored(roster: Roster, parts: Restored, store: S) -> Self {
        let mut notices = Vec::new();
        if !parts.repairs.is_clean() {
            tracing::warn!(
                "repaired saved session: {} unknown ids dropped, {} cursors clamped, {} cache entries dropped",
                parts.repairs.dropped_ids,
                parts.repairs.clamped_cursors,
                parts.repairs.dropped_cache_entries
            );
            notices.push(format!(
                "repaired saved state ({} unknown ids dropped)",
                parts.repairs.dropped_ids
            ));
        }
        let newcomers = roster.len().saturating_sub(parts.driver.candidate_count());
        if newcomers > 0 {
            notices.push(format!(
                "{newcomers} roster entries are not part of the resumed run; restart to include them"
            ));
        }
        Self {
            roster,
            driver: parts.driver,
            cache: parts.cache,
            snapshots: parts.snapshots,
            shuffler: parts.shuffler,
            awaiting: parts.awaiting,
            store,
            autosave: Duration::from_millis(DEFAULT_AUTOSAVE_MS),
            last_save: None,
            resumed: true,
            notices,
        }
    }

    // -- Cooperative loop ---------------------------------------------------

    /// Advance to the next judgment request, or [`Step::Done`].
    ///
    /// Emitting a new prompt pushes a checkpoint first; re-polling a prompt
    /// that is already pending (after a resume or an undo) re-reports it
    /// without pushing again.
    pub fn step(&mut self) -> Step {
        let step = self.driver.poll(&self.cache, &mut self.shuffler);
        match step {
            Step::Done => self.awaiting = false,
            Step::AwaitPair { .. } | Step::AwaitBatch { .. } => {
                if !self.awaiting {
                    self.snapshots.push(Checkpoint {
                        driver: self.driver.clone(),
                        cache: self.cache.clone(),
                    });
                    self.awaiting = true;
                    self.autosave_maybe();
                }
            }
        }
        step
    }

    /// Apply a pairwise oracle reply to the pending prompt.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no prompt is pending or the
    /// running driver takes batch replies.
    pub fn judge(&mut self, reply: Reply) -> Result<(), RankError> {
        if !self.awaiting {
            return Err(RankError::invalid_reply(
                "no judgment is pending; step the session first",
            ));
        }
        match reply {
            Reply::Verdict(verdict) => {
                self.driver.resolve(verdict, &mut self.cache)?;
                self.awaiting = false;
            }
            Reply::Skip => {
                self.driver.skip(&mut self.cache)?;
                self.awaiting = false;
            }
            Reply::Back => self.undo_or_notice(),
        }
        self.autosave_maybe();
        Ok(())
    }

    /// Apply a batch oracle reply to the pending prompt.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidReply`] when no prompt is pending, the
    /// running driver takes pairwise replies, or a picked id is not in the
    /// pending batch.
    pub fn judge_batch(&mut self, reply: BatchReply) -> Result<(), RankError> {
        if !self.awaiting {
            return Err(RankError::invalid_reply(
                "no batch is pending; step the session first",
            ));
        }
        match reply {
            BatchReply::Picked(ids) => {
                self.driver.resolve_batch(&ids)?;
                self.awaiting = false;
            }
            BatchReply::Pass => {
                self.driver.pass_batch()?;
                self.awaiting = false;
            }
            BatchReply::Back => self.undo_or_notice(),
        }
        self.autosave_maybe();
        Ok(())
    }

    /// Step back one judgment: pop the pending prompt's checkpoint and
    /// restore the one beneath it. Returns `false` at the pristine floor.
    pub fn undo(&mut self) -> bool {
        match self.snapshots.undo() {
            Some(checkpoint) => {
                self.driver = checkpoint.driver;
                self.cache = checkpoint.cache;
                // The restored state is suspended at its own prompt and its
                // checkpoint is the new stack top, so the next step() must
                // not push again.
                self.awaiting = true;
                true
            }
            None => false,
        }
    }

    fn undo_or_notice(&mut self) {
        if !self.undo() {
            self.notices
                .push("nothing to undo; this is the first judgment".to_owned());
        }
    }

    /// Collect the product once the driver is done, persist it under
    /// [`RANKING_KEY`], and clear the resumable blob. `None` while the run
    /// is still in progress.
    pub fn finish(&mut self) -> Option<RankingDoc> {
        let product = self.driver.finish()?;
        let mut doc = RankingDoc::new(product.order().to_vec());
        doc.ties = self.cache.tie_keys().cloned().collect();
        if let Driver::Elo(elo) = &self.driver {
            for id in &doc.order {
                if let Some(rating) = elo.rounded_rating(id) {
                    doc.ratings.insert(id.clone(), rating);
                }
            }
        }

        match doc.to_json() {
            Ok(json) => {
                if let Err(e) = self.store.set(RANKING_KEY, &json) {
                    tracing::warn!("could not persist ranking: {e}");
                    self.notices.push(format!("ranking not saved: {e}"));
                }
            }
            Err(e) => {
                tracing::warn!("could not encode ranking: {e}");
                self.notices.push(format!("ranking not saved: {e}"));
            }
        }
        if let Err(e) = self.store.remove(SESSION_KEY) {
            tracing::warn!("could not clear session blob: {e}");
        }
        self.snapshots.clear();
        Some(doc)
    }

    // -- Persistence --------------------------------------------------------

    /// Save immediately, bypassing the debounce.
    pub fn flush(&mut self) {
        self.save_now();
    }

    /// Change the autosave debounce. Zero saves on every mutation.
    pub fn set_autosave_debounce(&mut self, ms: u64) {
        self.autosave = Duration::from_millis(ms);
    }

    fn autosave_maybe(&mut self) {
        if let Some(at) = self.last_save {
            if at.elapsed() < self.autosave {
                return;
            }
        }
        self.save_now();
    }

    fn save_now(&mut self) {
        let blob = SaveState {
            version: STATE_VERSION,
            driver: &self.driver,
            cache: &self.cache,
            snapshots: &self.snapshots,
            shuffler: &self.shuffler,
            awaiting: self.awaiting,
        };
        let json = match serde_json::to_string(&blob) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("session encode failed: {e}");
                self.notices.push(format!("autosave failed: {e}"));
                return;
            }
        };
        match self.store.set(SESSION_KEY, &json) {
            Ok(()) => {
                tracing::debug!("session saved ({} bytes)", json.len());
                self.last_save = Some(Instant::now());
            }
            Err(e) => {
                tracing::warn!("session save failed: {e}");
                self.notices.push(format!("autosave failed: {e}"));
            }
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// Which driver this session runs.
    #[must_use]
    pub fn kind(&self) -> DriverKind {
        self.driver.kind()
    }

    /// Whether this session was restored from a saved blob.
    #[must_use]
    pub const fn was_resumed(&self) -> bool {
        self.resumed
    }

    /// Completion estimate in percent.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.driver.progress(&self.cache)
    }

    /// Best-known current ordering.
    #[must_use]
    pub fn live_ranking(&self) -> Vec<CandidateId> {
        self.driver.live_ranking()
    }

    /// Whether the driver has nothing left to ask.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.driver.is_done()
    }

    /// Candidates participating in this run.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.driver.candidate_count()
    }

    /// Unique pairs judged so far.
    #[must_use]
    pub fn unique_pairs(&self) -> usize {
        self.cache.unique_pairs()
    }

    /// Checkpoints currently held.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.snapshots.len()
    }

    /// The seed shuffles derive from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.shuffler.seed()
    }

    /// The roster this session ranks.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Display name for `id`, falling back to the raw id.
    #[must_use]
    pub fn display_name<'a>(&'a self, id: &'a CandidateId) -> &'a str {
        self.roster.display_name(id)
    }

    /// Rounded ELO rating for `id`; `None` outside rating runs.
    #[must_use]
    pub fn rounded_rating(&self, id: &CandidateId) -> Option<i32> {
        match &self.driver {
            Driver::Elo(elo) => elo.rounded_rating(id),
            Driver::Merge(_) | Driver::Picker(_) => None,
        }
    }

    /// Most recent rating movement for `id`; `None` outside rating runs or
    /// before two rounds of history exist.
    #[must_use]
    pub fn rating_delta(&self, id: &CandidateId) -> Option<i32> {
        match &self.driver {
            Driver::Elo(elo) => elo.last_delta(id),
            Driver::Merge(_) | Driver::Picker(_) => None,
        }
    }

    /// Accumulated non-fatal notices (repairs, save failures), draining
    /// them.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
