//! Randomized checks of the driver contracts.
//!
//! Each property drives a whole run with a scripted oracle over random
//! rosters, orderings, and reply sequences:
//!
//! 1. **Permutation**: every finished merge ranking is a permutation of the
//!    input, under clean verdicts and under interleaved skips.
//! 2. **Correctness**: a perfectly consistent oracle makes the merge driver
//!    reproduce its order exactly.
//! 3. **Budget**: at power-of-two sizes the merge driver never prompts more
//!    than the worst-case comparison bound.
//! 4. **Cache symmetry**: lookups in both directions are exact inverses and
//!    ties read identically either way.
//! 5. **Picker conservation**: every id sits in exactly one state
//!    collection after every pick or pass.
//!
//! Failures shrink to a minimal roster and reply sequence.

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::cache::ComparisonCache;
use crate::candidate::CandidateId;
use crate::driver::{Driver, DriverKind, Finish, Intensity, Shuffler, Step};
use crate::judgment::Verdict;
use crate::progress::merge_comparison_bound;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn roster(n: usize) -> Vec<CandidateId> {
    (0..n)
        .map(|i| CandidateId::new(&format!("c{i:02}")).unwrap())
        .collect()
}

fn verdict_by_position(order: &[CandidateId], l: &CandidateId, r: &CandidateId) -> Verdict {
    let pos = |id: &CandidateId| order.iter().position(|o| o == id).unwrap();
    if pos(l) < pos(r) {
        Verdict::Left
    } else {
        Verdict::Right
    }
}

/// Run a pairwise driver to completion with a consistent oracle, skipping
/// whenever the next mask byte says so. Returns the ranking and how many
/// judgments were prompted.
fn drive_pairwise(
    kind: DriverKind,
    initial: Vec<CandidateId>,
    order: &[CandidateId],
    skip_mask: &[bool],
) -> (Vec<CandidateId>, usize) {
    let mut shuffler = Shuffler::new(7);
    let mut driver = Driver::new(kind, initial, Intensity::Balanced, &mut shuffler);
    let mut cache = ComparisonCache::new();
    let mut prompts = 0usize;
    let mut steps = 0usize;
    loop {
        steps += 1;
        assert!(steps <= 20_000, "driver failed to terminate");
        match driver.poll(&cache, &mut shuffler) {
            Step::AwaitPair { left, right } => {
                let skip = skip_mask.get(prompts).copied().unwrap_or(false);
                prompts += 1;
                if skip {
                    driver.skip(&mut cache).unwrap();
                } else {
                    let v = verdict_by_position(order, &left, &right);
                    driver.resolve(v, &mut cache).unwrap();
                }
            }
            Step::AwaitBatch { .. } => unreachable!("pairwise driver batched"),
            Step::Done => break,
        }
    }
    let Some(finish) = driver.finish() else {
        panic!("done without a product");
    };
    let (Finish::Ranked(ranked) | Finish::Favorites(ranked)) = finish;
    (ranked, prompts)
}

fn assert_permutation(got: &[CandidateId], expected: &[CandidateId]) {
    let mut g: Vec<_> = got.iter().map(CandidateId::as_str).collect();
    let mut e: Vec<_> = expected.iter().map(CandidateId::as_str).collect();
    g.sort_unstable();
    e.sort_unstable();
    assert_eq!(g, e);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_merge_sorts_any_permutation(
        n in 1usize..=16,
        seed in any::<u64>(),
    ) {
        let order = roster(n);
        let mut initial = order.clone();
        Shuffler::new(seed).shuffle(&mut initial);

        let (ranked, _) = drive_pairwise(DriverKind::Merge, initial, &order, &[]);
        prop_assert_eq!(ranked, order);
    }

    #[test]
    fn prop_merge_bound_holds_at_powers_of_two(
        exp in 1u32..=4,
        seed in any::<u64>(),
    ) {
        let n = 1usize << exp;
        let order = roster(n);
        let mut initial = order.clone();
        Shuffler::new(seed).shuffle(&mut initial);

        let (ranked, prompts) = drive_pairwise(DriverKind::Merge, initial, &order, &[]);
        prop_assert_eq!(ranked, order);
        prop_assert!(
            prompts <= merge_comparison_bound(n),
            "{} prompts exceeds bound {} at n={}",
            prompts,
            merge_comparison_bound(n),
            n
        );
    }

    #[test]
    fn prop_merge_with_skips_stays_a_permutation(
        n in 2usize..=12,
        seed in any::<u64>(),
        mask in prop::collection::vec(any::<bool>(), 64),
    ) {
        let order = roster(n);
        let mut initial = order.clone();
        Shuffler::new(seed).shuffle(&mut initial);

        let (ranked, _) = drive_pairwise(DriverKind::Merge, initial, &order, &mask);
        assert_permutation(&ranked, &order);
    }

    #[test]
    fn prop_elo_finishes_with_a_permutation(
        n in 1usize..=10,
        seed in any::<u64>(),
    ) {
        let order = roster(n);
        let mut initial = order.clone();
        Shuffler::new(seed).shuffle(&mut initial);

        let (ranked, _) = drive_pairwise(DriverKind::Elo, initial, &order, &[]);
        assert_permutation(&ranked, &order);
    }

    #[test]
    fn prop_cache_symmetry(
        ops in prop::collection::vec(
            (0usize..8, 0usize..8, 0u8..3, any::<bool>()),
            1..40,
        ),
    ) {
        let ids = roster(8);
        let mut cache = ComparisonCache::new();
        for (a, b, v, swap) in ops {
            let verdict = match v {
                0 => Verdict::Left,
                1 => Verdict::Tie,
                _ => Verdict::Right,
            };
            let (x, y) = if swap { (b, a) } else { (a, b) };
            cache.record(&ids[x], &ids[y], verdict);
        }
        for a in &ids {
            for b in &ids {
                let fwd = cache.lookup(a, b);
                let rev = cache.lookup(b, a);
                prop_assert_eq!(fwd, rev.map(Verdict::invert));
                prop_assert_eq!(cache.is_tie(a, b), cache.is_tie(b, a));
            }
        }
    }

    #[test]
    fn prop_picker_conserves_every_id(
        n in 1usize..=12,
        seed in any::<u64>(),
        masks in prop::collection::vec(any::<u8>(), 200),
    ) {
        let all = roster(n);
        let expected: BTreeSet<_> = all.iter().cloned().collect();
        let mut shuffler = Shuffler::new(seed);
        let mut driver = Driver::new(
            DriverKind::Picker,
            all.clone(),
            Intensity::Balanced,
            &mut shuffler,
        );
        let cache = ComparisonCache::new();

        let mut turn = 0usize;
        loop {
            match driver.poll(&cache, &mut shuffler) {
                Step::AwaitBatch { members } => {
                    let mask = masks.get(turn).copied().unwrap_or(1);
                    turn += 1;
                    if turn >= masks.len() {
                        // Reply budget spent; the run just stays suspended.
                        break;
                    }
                    if mask == 0xff {
                        driver.pass_batch().unwrap();
                    } else {
                        let picked: Vec<_> = members
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| mask & (1 << (i % 8)) != 0)
                            .map(|(_, id)| id.clone())
                            .collect();
                        driver.resolve_batch(&picked).unwrap();
                    }
                    let live: BTreeSet<_> =
                        driver.live_ranking().into_iter().collect();
                    prop_assert_eq!(driver.live_ranking().len(), n);
                    prop_assert_eq!(&live, &expected);
                }
                Step::Done => break,
                Step::AwaitPair { .. } => unreachable!("picker paired"),
            }
        }
        // Whatever happened, nothing was duplicated or dropped.
        let live: BTreeSet<_> = driver.live_ranking().into_iter().collect();
        prop_assert_eq!(driver.live_ranking().len(), n);
        prop_assert_eq!(live, expected);
    }
}
