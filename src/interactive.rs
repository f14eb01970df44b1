//! Terminal front end for the cooperative ranking loop.
//!
//! Prompts go to stdout, one judgment per line of input. Pairwise prompts
//! take `1`/`2`/`t`/`s`/`b`; batch prompts take comma-separated numbers or
//! `p` to pass. `q` (or end of input) saves and exits; the next run resumes
//! where this one stopped.

use std::io::{self, Write};

use anyhow::{Context, Result, bail};

use crate::candidate::{CandidateId, Roster};
use crate::driver::{DriverKind, Intensity, Step};
use crate::export::RankingDoc;
use crate::judgment::{BatchReply, Reply, Verdict};
use crate::session::{RANKING_KEY, Session};
use crate::store::StateStore;
use crate::tier::TierAssigner;

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

/// One line of input at a pairwise prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
enum PairInput {
    Judge(Reply),
    Quit,
}

fn parse_pair_input(input: &str) -> Option<PairInput> {
    match input.to_ascii_lowercase().as_str() {
        "1" => Some(PairInput::Judge(Reply::Verdict(Verdict::Left))),
        "2" => Some(PairInput::Judge(Reply::Verdict(Verdict::Right))),
        "t" | "tie" => Some(PairInput::Judge(Reply::Verdict(Verdict::Tie))),
        "s" | "skip" => Some(PairInput::Judge(Reply::Skip)),
        "b" | "back" => Some(PairInput::Judge(Reply::Back)),
        "q" | "quit" => Some(PairInput::Quit),
        _ => None,
    }
}

/// One line of input at a batch prompt, picks as zero-based indices.
#[derive(Clone, Debug, PartialEq, Eq)]
enum BatchInput {
    Pick(Vec<usize>),
    Pass,
    Back,
    Quit,
}

fn parse_batch_input(input: &str, batch_len: usize) -> Result<BatchInput, String> {
    match input.to_ascii_lowercase().as_str() {
        "p" | "pass" => return Ok(BatchInput::Pass),
        "b" | "back" => return Ok(BatchInput::Back),
        "q" | "quit" => return Ok(BatchInput::Quit),
        "" => return Err("pick numbers, or p to pass".to_owned()),
        _ => {}
    }
    let mut picks = Vec::new();
    for token in input.split(',').flat_map(str::split_whitespace) {
        let number: usize = token
            .parse()
            .map_err(|_| format!("{token:?} is not an option number"))?;
        if number == 0 || number > batch_len {
            return Err(format!("there is no option {number}"));
        }
        picks.push(number - 1);
    }
    Ok(BatchInput::Pick(picks))
}

/// Print `prompt`, read one trimmed line. `None` on end of input.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    let bytes = io::stdin().read_line(&mut input)?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_owned()))
}

fn print_notices<S: StateStore>(session: &mut Session<S>) {
    for notice in session.take_notices() {
        println!("note: {notice}");
    }
}

// ---------------------------------------------------------------------------
// rank
// ---------------------------------------------------------------------------

/// Run (or resume) a ranking session on the terminal.
///
/// # Errors
/// Fails on I/O errors or on replies the driver rejects, which would
/// indicate a prompt/reply mismatch in this loop.
pub fn run_rank<S: StateStore>(
    roster: Roster,
    kind: DriverKind,
    intensity: Intensity,
    seed: Option<u64>,
    autosave_ms: u64,
    store: S,
) -> Result<()> {
    let total = roster.len();
    let mut session = Session::resume_or_new(roster, kind, intensity, seed, store);
    session.set_autosave_debounce(autosave_ms);
    if session.was_resumed() {
        println!(
            "Resuming {} session at {:.0}% ({} candidates).",
            session.kind(),
            session.progress(),
            session.candidate_count()
        );
    } else {
        println!("Ranking {total} candidates with the {} driver.", session.kind());
    }
    print_notices(&mut session);

    loop {
        match session.step() {
            Step::AwaitPair { left, right } => {
                println!();
                println!("[{:>5.1}%] Which comes out ahead?", session.progress());
                println!("  1) {}", session.display_name(&left));
                println!("  2) {}", session.display_name(&right));
                let Some(input) = read_line("1/2, t = tie, s = skip, b = back, q = quit: ")?
                else {
                    return save_and_quit(&mut session);
                };
                match parse_pair_input(&input) {
                    Some(PairInput::Judge(reply)) => {
                        session.judge(reply).context("applying judgment")?;
                    }
                    Some(PairInput::Quit) => return save_and_quit(&mut session),
                    None => println!("Unrecognized input {input:?}."),
                }
            }
            Step::AwaitBatch { members } => {
                println!();
                println!("[{:>5.1}%] Keep your favorites:", session.progress());
                for (i, id) in members.iter().enumerate() {
                    println!("  {}) {}", i + 1, session.display_name(id));
                }
                let Some(input) =
                    read_line("numbers (comma-separated), p = pass, b = back, q = quit: ")?
                else {
                    return save_and_quit(&mut session);
                };
                match parse_batch_input(&input, members.len()) {
                    Ok(BatchInput::Pick(picks)) => {
                        let ids: Vec<CandidateId> =
                            picks.iter().map(|&i| members[i].clone()).collect();
                        session
                            .judge_batch(BatchReply::Picked(ids))
                            .context("applying batch pick")?;
                    }
                    Ok(BatchInput::Pass) => {
                        session
                            .judge_batch(BatchReply::Pass)
                            .context("applying pass")?;
                    }
                    Ok(BatchInput::Back) => {
                        session
                            .judge_batch(BatchReply::Back)
                            .context("stepping back")?;
                    }
                    Ok(BatchInput::Quit) => return save_and_quit(&mut session),
                    Err(message) => println!("{message}"),
                }
            }
            Step::Done => break,
        }
        print_notices(&mut session);
    }

    let doc = session
        .finish()
        .context("driver reported done without a ranking")?;
    print_ranking(&session, &doc);
    print_notices(&mut session);
    Ok(())
}

fn save_and_quit<S: StateStore>(session: &mut Session<S>) -> Result<()> {
    session.flush();
    print_notices(session);
    println!("Saved at {:.0}%. Run again to resume.", session.progress());
    Ok(())
}

fn print_ranking<S: StateStore>(session: &Session<S>, doc: &RankingDoc) {
    println!();
    if session.kind() == DriverKind::Picker {
        println!("Favorites:");
    } else {
        println!("Final ranking:");
    }
    let ranks = doc.display_ranks();
    for (i, id) in doc.order.iter().enumerate() {
        let name = session.display_name(id);
        if let Some(rating) = doc.ratings.get(id) {
            let delta = session
                .rating_delta(id)
                .map(|d| format!(" {d:+}"))
                .unwrap_or_default();
            println!("{:>3}. {name}  [{rating}{delta}]", ranks[i]);
        } else {
            println!("{:>3}. {name}", ranks[i]);
        }
    }
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// Report progress of the saved session, if any.
///
/// # Errors
/// Fails only on stdout errors.
pub fn run_status<S: StateStore>(roster: Roster, store: S) -> Result<()> {
    let Some(mut session) = Session::resume(roster, store) else {
        println!("No resumable session.");
        return Ok(());
    };
    println!("Driver:      {}", session.kind());
    println!("Progress:    {:.1}%", session.progress());
    println!("Candidates:  {}", session.candidate_count());
    println!("Pairs known: {}", session.unique_pairs());
    println!("Undo depth:  {}", session.undo_depth());
    println!("Seed:        {}", session.seed());

    let standing = session.live_ranking();
    println!("Current standing (top {}):", standing.len().min(10));
    for (i, id) in standing.iter().take(10).enumerate() {
        println!("  {:>2}. {}", i + 1, session.display_name(id));
    }
    print_notices(&mut session);
    Ok(())
}

// ---------------------------------------------------------------------------
// tiers
// ---------------------------------------------------------------------------

/// Walk the tier cutoff classifier over the finished ranking and persist
/// the assignment back into the ranking document.
///
/// # Errors
/// Fails when no finished ranking exists, the document no longer matches
/// the roster, or on I/O errors.
pub fn run_tiers<S: StateStore>(roster: &Roster, mut store: S, labels: Vec<String>) -> Result<()> {
    let Some(blob) = store.get(RANKING_KEY)? else {
        bail!("no finished ranking; complete a run first");
    };
    let mut doc = RankingDoc::from_json(&blob)?;
    doc.validate(roster)
        .context("saved ranking no longer matches the roster")?;

    let total = doc.order.len();
    let mut assigner = TierAssigner::new(doc.order.clone(), labels);
    loop {
        if assigner.remaining() == 0 || assigner.is_complete() {
            break;
        }
        // current_label is Some while the walk is incomplete.
        let label = assigner.current_label().unwrap_or_default().to_owned();
        println!();
        println!("{} of {total} still unassigned. Next up:", assigner.remaining());
        for id in assigner.preview(3) {
            println!("  - {}", roster.display_name(id));
        }
        let Some(input) = read_line(&format!(
            "how many go into {label}? (number, b = back, d = done): "
        ))?
        else {
            break;
        };
        match input.to_ascii_lowercase().as_str() {
            "b" | "back" => {
                if !assigner.step_back() {
                    println!("Already at the first tier.");
                }
            }
            "d" | "done" => break,
            _ => match input.parse::<usize>() {
                Ok(count) => {
                    let taken = assigner.assign(count);
                    println!("{label}: {taken} placed.");
                }
                Err(_) => println!("Unrecognized input {input:?}."),
            },
        }
    }

    let assignment = assigner.finish();
    println!();
    for bucket in &assignment.tiers {
        let names: Vec<&str> = bucket
            .members
            .iter()
            .map(|id| roster.display_name(id))
            .collect();
        println!("{:>9}: {}", bucket.label, names.join(", "));
    }

    doc.tiers = Some(assignment);
    let json = doc.to_json()?;
    store.set(RANKING_KEY, &json)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
