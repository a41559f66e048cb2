//! Undo/redo history of whole-schema snapshots
//!
//! Entries are `Option<Schema>` so "no schema yet" is itself undoable.
//! View changes and position-only writes never go through here.

use serde::{Deserialize, Serialize};

use crate::core::schema::Schema;

type Snapshot = Option<Schema>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    /// Oldest snapshots are dropped beyond this many
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.trim();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Records the state that is about to be replaced and clears redo
    pub fn commit(&mut self, previous: Snapshot) {
        self.undo.push(previous);
        self.redo.clear();
        self.trim();
    }

    /// Swaps `current` for the most recent undo snapshot
    ///
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop()?;
        self.redo.push(current);
        tracing::debug!("Undo ({} left)", self.undo.len());
        Some(previous)
    }

    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push(current);
        self.trim();
        tracing::debug!("Redo ({} left)", self.redo.len());
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn trim(&mut self) {
        if let Some(limit) = self.limit
            && self.undo.len() > limit
        {
            let excess = self.undo.len() - limit;
            self.undo.drain(0..excess);
        }
    }
}
