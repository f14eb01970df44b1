//! Snapshot stack backing the back/undo action.
//!
//! A snapshot is a full clone of everything a judgment can mutate, pushed
//! right before each judgment is requested. Undo pops the snapshot for the
//! pending judgment and restores the one beneath it, so the bottom entry is
//! the pristine pre-run state and is the floor undo can reach. Restoration
//! hands back an owned clone that must wholesale-replace the live state,
//! never be merged into it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Most snapshots retained; pushing beyond this discards the oldest.
pub const MAX_SNAPSHOTS: usize = 2000;

/// A bounded stack of state snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStack<T> {
    snapshots: VecDeque<T>,
}

impl<T: Clone> SnapshotStack<T> {
    /// Empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::new(),
        }
    }

    /// Push a snapshot, discarding the oldest when the cap is reached.
    pub fn push(&mut self, snapshot: T) {
        if self.snapshots.len() >= MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Pop the snapshot for the pending judgment and return a clone of the
    /// one beneath it, which stays on the stack as the new top. Returns
    /// `None` when fewer than two snapshots are held, i.e. there is nothing
    /// earlier to restore.
    pub fn undo(&mut self) -> Option<T> {
        if self.snapshots.len() < 2 {
            return None;
        }
        self.snapshots.pop_back();
        self.snapshots.back().cloned()
    }

    /// The current top, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.snapshots.back()
    }

    /// Number of snapshots held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Mutable traversal, oldest first. Used to reconcile loaded snapshots
    /// against the live candidate set.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.snapshots.iter_mut()
    }

    /// Re-apply the cap after deserializing, dropping oldest entries.
    pub fn truncate_to_cap(&mut self) {
        while self.snapshots.len() > MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
    }
}

impl<T: Clone> Default for SnapshotStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
