//! Progress estimation math.
//!
//! Pure functions shared by the drivers. The merge driver's denominator is
//! a worst-case comparison bound derived from the candidate count; the ELO
//! and favorites drivers report plain done/total ratios. All percentages
//! are clamped to 100 so an estimate can run a little hot but never read
//! as unfinished-past-finished.

/// `⌈log2 n⌉` for `n ≥ 1`, with `⌈log2 1⌉ = 0`.
#[must_use]
pub fn ceil_log2(n: usize) -> u32 {
    n.next_power_of_two().trailing_zeros()
}

/// Upper bound on distinct judgments a merge sort of `n` candidates will
/// request: `n·⌈log2 n⌉ − (2^⌈log2 n⌉ − 1)`. Zero for `n ≤ 1`.
#[must_use]
pub fn merge_comparison_bound(n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let k = ceil_log2(n);
    n * (k as usize) - ((1usize << k) - 1)
}

/// Merge-driver completion percentage: unique judged pairs over the
/// comparison bound, clamped to 100. A single candidate is already sorted.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn merge_percent(unique_pairs: usize, n: usize) -> f64 {
    if n <= 1 {
        return 100.0;
    }
    let bound = merge_comparison_bound(n);
    ((unique_pairs as f64 / bound as f64) * 100.0).min(100.0)
}

/// Plain done/total percentage clamped to 100; an empty budget counts as
/// complete.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio_percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((done as f64 / total as f64) * 100.0).min(100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
