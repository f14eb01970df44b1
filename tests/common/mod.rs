//! Shared test helpers for podium integration tests.
//!
//! All tests drive the library directly: sessions over a `MemoryStore` or a
//! tempfile-backed `FileStore`, with scripted judgments standing in for a
//! human. No terminal, no side effects outside the temp dirs.

// Not every test binary uses every helper.
#![allow(dead_code)]

use podium::candidate::{CandidateId, Roster};
use podium::driver::Step;
use podium::export::RankingDoc;
use podium::judgment::{BatchReply, Reply, Verdict};
use podium::session::Session;
use podium::store::StateStore;

/// Roster of `n` candidates whose ordinal matches their position, so the
/// ground-truth order is `entry_01`, `entry_02`, ...
pub fn ranked_roster(n: usize) -> Roster {
    let lines: Vec<String> = (1..=n).map(|i| format!("{i},Entry {i:02}")).collect();
    Roster::parse(&lines.join("\n")).expect("roster parses")
}

/// Id of the `i`-th (1-based) entry of [`ranked_roster`].
pub fn entry(i: usize) -> CandidateId {
    CandidateId::new(&format!("entry_{i:02}")).expect("valid id")
}

/// The ids `entry_01..=entry_n` in ground-truth order.
pub fn entries(n: usize) -> Vec<CandidateId> {
    (1..=n).map(entry).collect()
}

/// Judge a pair by position in `priority`: earlier wins, absent loses,
/// same position ties.
pub fn verdict_by(priority: &[CandidateId], left: &CandidateId, right: &CandidateId) -> Verdict {
    let pos = |id: &CandidateId| priority.iter().position(|p| p == id).unwrap_or(usize::MAX);
    match pos(left).cmp(&pos(right)) {
        std::cmp::Ordering::Less => Verdict::Left,
        std::cmp::Ordering::Equal => Verdict::Tie,
        std::cmp::Ordering::Greater => Verdict::Right,
    }
}

/// Drive `session` to completion, answering every prompt from `priority`.
/// Batch prompts keep the better half. Panics if the session does not
/// finish within a generous step bound.
pub fn drive_to_done<S: StateStore>(
    session: &mut Session<S>,
    priority: &[CandidateId],
) -> RankingDoc {
    for _ in 0..10_000 {
        match session.step() {
            Step::AwaitPair { left, right } => {
                let verdict = verdict_by(priority, &left, &right);
                session
                    .judge(Reply::Verdict(verdict))
                    .expect("verdict accepted");
            }
            Step::AwaitBatch { members } => {
                let mut picked: Vec<CandidateId> = members.clone();
                picked.sort_by_key(|id| {
                    priority.iter().position(|p| p == id).unwrap_or(usize::MAX)
                });
                picked.truncate(members.len().div_ceil(2));
                session
                    .judge_batch(BatchReply::Picked(picked))
                    .expect("batch accepted");
            }
            Step::Done => {
                return session.finish().expect("finished session yields a document");
            }
        }
    }
    panic!("session did not finish within 10_000 steps");
}
