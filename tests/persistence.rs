//! Integration tests: session persistence and resume over a real state dir.
//!
//! Every test gets its own temp directory; a fresh `FileStore` over the
//! same path stands in for a process restart. Covers mid-run resume,
//! resume determinism, corrupt-blob fallback, and roster-drift repair.

mod common;

use common::{drive_to_done, entries, entry, ranked_roster, verdict_by};
use podium::driver::{DriverKind, Intensity, Step};
use podium::export::RankingDoc;
use podium::judgment::Reply;
use podium::session::{RANKING_KEY, SESSION_KEY, Session};
use podium::sim::{ScriptedOracle, run_to_completion};
use podium::store::{FileStore, StateStore};
use tempfile::TempDir;

fn start(dir: &TempDir, n: usize, seed: u64) -> Session<FileStore> {
    let mut session = Session::new(
        ranked_roster(n),
        DriverKind::Merge,
        Intensity::Balanced,
        Some(seed),
        FileStore::new(dir.path()),
    );
    session.set_autosave_debounce(0);
    session
}

// ---------------------------------------------------------------------------
// Resume
// ---------------------------------------------------------------------------

#[test]
fn session_resumes_from_disk_mid_run() {
    let dir = TempDir::new().unwrap();
    let priority = entries(6);
    let mut session = start(&dir, 6, 41);

    for _ in 0..3 {
        let Step::AwaitPair { left, right } = session.step() else {
            panic!("expected a pair");
        };
        session
            .judge(Reply::Verdict(verdict_by(&priority, &left, &right)))
            .unwrap();
    }
    let pending = session.step();
    session.flush();
    drop(session);

    let mut resumed =
        Session::resume(ranked_roster(6), FileStore::new(dir.path())).expect("resumable");
    assert!(resumed.was_resumed());
    assert_eq!(resumed.step(), pending, "resume re-asks the suspended prompt");

    let doc = drive_to_done(&mut resumed, &priority);
    assert_eq!(doc.order, priority);
}

#[test]
fn resuming_after_every_judgment_matches_a_straight_run() {
    let roster = ranked_roster(6);
    let mut oracle = ScriptedOracle::new(&roster).unwrap();
    let mut straight = Session::new(
        roster.clone(),
        DriverKind::Merge,
        Intensity::Balanced,
        Some(77),
        podium::store::MemoryStore::new(),
    );
    let reference = run_to_completion(&mut straight, &mut oracle).unwrap();

    let dir = TempDir::new().unwrap();
    let priority = entries(6);
    let mut session = start(&dir, 6, 77);
    let mut guard = 0;
    let interrupted = loop {
        guard += 1;
        assert!(guard <= 1_000, "interrupted run failed to terminate");
        match session.step() {
            Step::AwaitPair { left, right } => {
                session
                    .judge(Reply::Verdict(verdict_by(&priority, &left, &right)))
                    .unwrap();
                session.flush();
                session = Session::resume(roster.clone(), FileStore::new(dir.path()))
                    .expect("mid-run session must resume");
            }
            Step::AwaitBatch { .. } => unreachable!("merge never batches"),
            Step::Done => break session.finish().expect("finished session yields a document"),
        }
    };

    assert_eq!(interrupted, reference);
}

#[test]
fn resume_is_none_without_a_saved_session() {
    let dir = TempDir::new().unwrap();
    assert!(Session::resume(ranked_roster(3), FileStore::new(dir.path())).is_none());
}

// ---------------------------------------------------------------------------
// Corruption and drift
// ---------------------------------------------------------------------------

#[test]
fn corrupt_blob_starts_fresh_with_a_notice() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::new(dir.path());
    store.set(SESSION_KEY, "definitely not json").unwrap();

    let mut session = Session::resume_or_new(
        ranked_roster(3),
        DriverKind::Merge,
        Intensity::Balanced,
        Some(1),
        store,
    );
    assert!(!session.was_resumed());
    let notices = session.take_notices();
    assert!(
        notices.iter().any(|n| n.contains("starting fresh")),
        "expected a fallback notice, got {notices:?}"
    );
}

#[test]
fn resume_refuses_a_corrupt_blob() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::new(dir.path());
    store.set(SESSION_KEY, r#"{"version": 99}"#).unwrap();
    assert!(Session::resume(ranked_roster(3), FileStore::new(dir.path())).is_none());
}

#[test]
fn shrunken_roster_resumes_with_repair() {
    let dir = TempDir::new().unwrap();
    let priority = entries(6);
    let mut session = start(&dir, 6, 13);
    for _ in 0..3 {
        let Step::AwaitPair { left, right } = session.step() else {
            panic!("expected a pair");
        };
        session
            .judge(Reply::Verdict(verdict_by(&priority, &left, &right)))
            .unwrap();
    }
    session.flush();
    drop(session);

    // entry_06 has left the roster since the save.
    let mut resumed =
        Session::resume(ranked_roster(5), FileStore::new(dir.path())).expect("repairable");
    assert_eq!(resumed.candidate_count(), 5);
    let notices = resumed.take_notices();
    assert!(
        notices.iter().any(|n| n.contains("repaired")),
        "expected a repair notice, got {notices:?}"
    );

    let doc = drive_to_done(&mut resumed, &entries(5));
    assert_eq!(doc.order.len(), 5);
    assert!(!doc.order.contains(&entry(6)));
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn finishing_clears_the_session_and_stores_the_ranking() {
    let dir = TempDir::new().unwrap();
    let roster = ranked_roster(4);
    let mut oracle = ScriptedOracle::new(&roster).unwrap();
    let mut session = Session::new(
        roster.clone(),
        DriverKind::Merge,
        Intensity::Balanced,
        Some(19),
        FileStore::new(dir.path()),
    );
    let doc = run_to_completion(&mut session, &mut oracle).unwrap();
    drop(session);

    let store = FileStore::new(dir.path());
    assert!(store.get(SESSION_KEY).unwrap().is_none());
    let blob = store.get(RANKING_KEY).unwrap().expect("ranking persisted");
    assert_eq!(RankingDoc::from_json(&blob).unwrap(), doc);
}

#[test]
fn state_files_land_in_the_configured_directory() {
    let dir = TempDir::new().unwrap();
    let mut session = start(&dir, 4, 3);
    let _ = session.step();
    session.flush();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.contains(&"podium-session-v1.json".to_owned()),
        "unexpected state dir contents: {names:?}"
    );
}
