//! Verdicts and oracle replies.
//!
//! A [`Verdict`] is the durable outcome of one pairwise comparison and is
//! what the cache stores. A [`Reply`] is what the judging oracle hands back
//! for one prompt and may also be a control action (skip, back) that never
//! becomes part of the record.

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateId;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of comparing an ordered pair `(left, right)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The left candidate wins.
    Left,
    /// Neither wins; the pair is equivalent.
    Tie,
    /// The right candidate wins.
    Right,
}

impl Verdict {
    /// The same outcome seen from the swapped pair `(right, left)`.
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Tie => Self::Tie,
            Self::Right => Self::Left,
        }
    }

    /// Actual scores `(s_left, s_right)` for rating updates: a win is 1,
    /// a loss 0, a tie a half point each.
    #[must_use]
    pub const fn scores(self) -> (f64, f64) {
        match self {
            Self::Left => (1.0, 0.0),
            Self::Tie => (0.5, 0.5),
            Self::Right => (0.0, 1.0),
        }
    }

    /// Whether this verdict is a tie.
    #[must_use]
    pub const fn is_tie(self) -> bool {
        matches!(self, Self::Tie)
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Oracle reply to a pairwise prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// A real judgment to record.
    Verdict(Verdict),
    /// Defer this pair; present something else and come back to it later.
    Skip,
    /// Revert the most recent recorded judgment.
    Back,
}

/// Oracle reply to a batch (favorites) prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchReply {
    /// The members of the batch the oracle favors. May be empty.
    Picked(Vec<CandidateId>),
    /// Defer the whole batch.
    Pass,
    /// Revert the most recent recorded judgment.
    Back,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
