//! Error taxonomy for ranking sessions.
//!
//! Only [`RankError::InvalidInput`] is fatal to a session. Corrupt persisted
//! state is repaired in place (unknown ids filtered, cursors clamped) and a
//! store failure is logged and surfaced as a notice — neither ever aborts an
//! in-memory run. Oracle skip/back are control outcomes carried by the reply
//! enums, not errors.

use std::fmt;

/// Errors produced by rosters, drivers, sessions, and the export layer.
///
/// Each variant is self-contained: the receiver should understand what
/// happened and what to do next without extra context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankError {
    /// Empty or malformed candidate input. Aborts session init.
    InvalidInput {
        /// Human-readable explanation, naming the offending value when known.
        reason: String,
    },

    /// A persisted blob that cannot be decoded at all.
    ///
    /// Callers recover by discarding the blob and starting fresh; partial
    /// damage (unknown ids, bad cursors) never produces this — it is
    /// repaired field by field instead.
    CorruptState {
        /// What failed to decode.
        detail: String,
    },

    /// A reply arrived that the driver cannot apply in its current state,
    /// e.g. a verdict with no pending pair or a pick with no pending batch.
    InvalidReply {
        /// What was wrong with the reply.
        detail: String,
    },

    /// A key-value store operation failed. Logged and surfaced as a notice;
    /// never aborts the in-memory algorithm.
    Persistence {
        /// The store operation that failed (`get`, `set`, `remove`).
        op: &'static str,
        /// Underlying failure text.
        detail: String,
    },

    /// An export document carried an unexpected schema string.
    SchemaMismatch {
        /// The schema this build understands.
        expected: String,
        /// The schema found in the document.
        found: String,
    },

    /// An imported document referenced a candidate the live roster does not
    /// contain. The whole import is rejected.
    UnknownCandidate {
        /// The unknown id.
        id: String,
    },

    /// JSON encoding failed.
    Serialize {
        /// Underlying failure text.
        detail: String,
    },
}

impl RankError {
    /// Shorthand constructor for [`RankError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand constructor for [`RankError::InvalidReply`].
    pub fn invalid_reply(detail: impl Into<String>) -> Self {
        Self::InvalidReply {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::CorruptState { detail } => write!(f, "corrupt saved state: {detail}"),
            Self::InvalidReply { detail } => write!(f, "reply not applicable: {detail}"),
            Self::Persistence { op, detail } => write!(f, "store {op} failed: {detail}"),
            Self::SchemaMismatch { expected, found } => {
                write!(f, "schema mismatch: expected {expected:?}, found {found:?}")
            }
            Self::UnknownCandidate { id } => {
                write!(f, "unknown candidate id {id:?} — import rejected")
            }
            Self::Serialize { detail } => write!(f, "serialize error: {detail}"),
        }
    }
}

impl std::error::Error for RankError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
