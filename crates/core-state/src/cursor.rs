//! Multi-cursor model addressed by node identity.
//!
//! Cursors name nodes, never raw line indices; every navigation command
//! resolves the referenced node against the current projection (or the
//! forest, for structural moves) at dispatch time. A cursor whose node has
//! vanished from the forest is stale: it stays in the set, observable by the
//! user, and simply fails to match anything until cleared.

use core_tree::NodeId;
use serde::{Deserialize, Serialize};

/// One cursor: a node reference plus an intra-line offset.
///
/// `offset` is reserved for future intra-line positioning and is always 0 in
/// this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub node: NodeId,
    pub offset: usize,
}

impl Cursor {
    pub fn at(node: NodeId) -> Self {
        Self { node, offset: 0 }
    }
}

/// Ordered cursor sequence plus the active index.
///
/// Invariant: `active < cursors.len()` whenever the set is non-empty. All
/// commands that address "the cursor" operate on the active entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSet {
    cursors: Vec<Cursor>,
    active: usize,
}

impl CursorSet {
    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> Option<Cursor> {
        self.cursors.get(self.active).copied()
    }

    pub fn add(&mut self, cursor: Cursor) {
        self.cursors.push(cursor);
    }

    /// Remove by index; out-of-bounds is a no-op. The active index tracks the
    /// surviving entry where possible and re-clamps otherwise.
    pub fn remove(&mut self, index: usize) {
        if index >= self.cursors.len() {
            return;
        }
        self.cursors.remove(index);
        if index < self.active {
            self.active -= 1;
        }
        if !self.cursors.is_empty() && self.active >= self.cursors.len() {
            self.active = self.cursors.len() - 1;
        }
        if self.cursors.is_empty() {
            self.active = 0;
        }
    }

    /// Replace the whole set. Always resets the active index to 0 (policy,
    /// not accident: bulk replacement invalidates any prior active choice).
    pub fn set_all(&mut self, cursors: Vec<Cursor>) {
        self.cursors = cursors;
        self.active = 0;
    }

    /// Select the active cursor; ignored when out of bounds.
    pub fn set_active(&mut self, index: usize) {
        if index < self.cursors.len() {
            self.active = index;
        }
    }

    /// Re-target the cursor at `index` (default: the active one) to `node`
    /// with offset 0. No-op when the set is empty or the index is invalid.
    pub fn move_to(&mut self, node: NodeId, index: Option<usize>) {
        let idx = index.unwrap_or(self.active);
        if let Some(slot) = self.cursors.get_mut(idx) {
            *slot = Cursor::at(node);
        }
    }
}
