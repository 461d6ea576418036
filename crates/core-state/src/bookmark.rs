//! Ordered bookmarks with cyclic next/prev navigation.
//!
//! A bookmark stores only the node id. The visible line it corresponds to is
//! recomputed at navigation time from the current projection's id -> line
//! map, so fold and filter changes can never leave navigation chasing a
//! cached index. Bookmarks whose node is currently hidden (folded away or
//! filtered out) or stale (gone after a reparse) are skipped by navigation
//! but kept in the registry so the user can see and clear them.

use core_fold::Projection;
use core_tree::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub node: NodeId,
}

/// Insertion-ordered marker sequence. Cyclic navigation scans registry
/// order, not line order: `next` returns the first bookmark below the
/// current line and wraps to the first resolvable entry; `prev` mirrors it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRegistry {
    marks: Vec<Bookmark>,
}

impl BookmarkRegistry {
    pub fn marks(&self) -> &[Bookmark] {
        &self.marks
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.marks.iter().any(|b| b.node == node)
    }

    /// Remove the bookmark for `node` if present, otherwise append one.
    /// Returns true when a bookmark was added.
    pub fn toggle(&mut self, node: NodeId) -> bool {
        if let Some(pos) = self.marks.iter().position(|b| b.node == node) {
            self.marks.remove(pos);
            false
        } else {
            self.marks.push(Bookmark { node });
            true
        }
    }

    /// First bookmark (registry order) whose recomputed line is strictly
    /// below `current`; wraps to the first resolvable bookmark. `None` when
    /// the registry is empty or no bookmark is visible. A `current` of
    /// `None` (unresolved cursor) behaves as "before the first line".
    pub fn next(&self, projection: &Projection, current: Option<usize>) -> Option<NodeId> {
        let mut resolved = self
            .marks
            .iter()
            .filter_map(|b| projection.line_of(b.node).map(|line| (b.node, line)));
        let mut first = None;
        for (node, line) in &mut resolved {
            if first.is_none() {
                first = Some(node);
            }
            if current.is_none_or(|c| line > c) {
                return Some(node);
            }
        }
        first
    }

    /// Last bookmark (registry order) whose recomputed line is strictly
    /// above `current`; wraps to the last resolvable bookmark.
    pub fn prev(&self, projection: &Projection, current: Option<usize>) -> Option<NodeId> {
        let resolved: Vec<(NodeId, usize)> = self
            .marks
            .iter()
            .filter_map(|b| projection.line_of(b.node).map(|line| (b.node, line)))
            .collect();
        resolved
            .iter()
            .rev()
            .find(|(_, line)| current.is_some_and(|c| *line < c))
            .or_else(|| resolved.last())
            .map(|(node, _)| *node)
    }
}
