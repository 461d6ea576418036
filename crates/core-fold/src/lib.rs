//! core-fold: fold/unfold transforms and the flatten projection.
//!
//! Fold state lives on the nodes themselves (`core-tree` arena flags); this
//! crate owns the transforms over that state and the derived, never-stored
//! view of it: the ordered list of visible lines. All transforms go through
//! `&mut Forest` handed out by the single-writer reducer, so "pure transform
//! returning a new forest" maps to in-place flag flips under exclusive
//! ownership. Node identity is untouched by every function here; ids change
//! only on reparse.

use std::collections::HashMap;

use core_tree::{Forest, NodeId};
use tracing::trace;

// -------------------------------------------------------------------------------------------------
// Fold transforms
// -------------------------------------------------------------------------------------------------

/// Flip the fold flag of exactly one node. Unresolved ids are a no-op.
pub fn toggle_fold(forest: &mut Forest, id: NodeId) {
    let folded = forest.folded(id);
    if forest.set_folded(id, !folded) {
        trace!(target: "fold", %id, folded = !folded, "toggle");
    }
}

/// Fold every node that has children; leaves stay unfolded (a folded leaf has
/// no visible effect anyway, and this keeps the flag meaningful).
pub fn fold_all(forest: &mut Forest) {
    for id in all_ids(forest) {
        let has_children = forest.get(id).is_some_and(|n| !n.is_leaf());
        forest.set_folded(id, has_children);
    }
}

/// Unfold every node.
pub fn unfold_all(forest: &mut Forest) {
    for id in all_ids(forest) {
        forest.set_folded(id, false);
    }
}

/// Force every strict ancestor of `target` open so the target becomes visible
/// in the flatten. The target's own fold flag is preserved (its children may
/// stay hidden). Unresolved targets leave the forest unchanged.
pub fn unfold_to_node(forest: &mut Forest, target: NodeId) {
    let path = forest.ancestor_path(target);
    let Some((_, ancestors)) = path.split_last() else {
        return;
    };
    for &id in ancestors {
        forest.set_folded(id, false);
    }
}

fn all_ids(forest: &Forest) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(forest.len());
    let mut stack: Vec<NodeId> = forest.roots().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        out.push(id);
        if let Some(node) = forest.get(id) {
            stack.extend(node.children().iter().rev());
        }
    }
    out
}

// -------------------------------------------------------------------------------------------------
// Flatten projection
// -------------------------------------------------------------------------------------------------

/// One visible line of the projection: a node reference, its structural
/// depth, and its 0-based position in the visible sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenedLine {
    pub id: NodeId,
    pub depth: usize,
    pub line: usize,
}

/// Pre-order walk of the forest that descends into a node's children only
/// while the node is unfolded. Line indices follow visitation order from 0.
pub fn flatten(forest: &Forest) -> Vec<FlattenedLine> {
    let mut out = Vec::new();
    for &root in forest.roots() {
        flatten_node(forest, root, 0, &mut out);
    }
    out
}

fn flatten_node(forest: &Forest, id: NodeId, depth: usize, out: &mut Vec<FlattenedLine>) {
    let Some(node) = forest.get(id) else { return };
    out.push(FlattenedLine {
        id,
        depth,
        line: out.len(),
    });
    if !node.folded() {
        for &child in node.children() {
            flatten_node(forest, child, depth + 1, out);
        }
    }
}

/// The addressable list of visible lines plus a reverse id -> line index.
///
/// Rebuilt whenever the forest or the filter changes; cursors and bookmarks
/// resolve node ids against the latest instance instead of caching line
/// numbers. Filtering runs on the already fold-aware flattened sequence, so a
/// filtered-out ancestor never resurrects hidden descendants, and the
/// surviving lines are renumbered contiguously.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    lines: Vec<FlattenedLine>,
    line_of: HashMap<NodeId, usize>,
}

impl Projection {
    /// Flatten, apply the optional case-insensitive substring filter, and
    /// index the result. An empty filter string matches every line.
    pub fn build(forest: &Forest, filter: Option<&str>) -> Self {
        let mut lines = flatten(forest);
        if let Some(needle) = filter.filter(|f| !f.is_empty()) {
            let needle = needle.to_lowercase();
            lines.retain(|fl| {
                forest
                    .get(fl.id)
                    .is_some_and(|n| n.text().to_lowercase().contains(&needle))
            });
            for (i, fl) in lines.iter_mut().enumerate() {
                fl.line = i;
            }
        }
        let line_of = lines.iter().map(|fl| (fl.id, fl.line)).collect();
        Self { lines, line_of }
    }

    pub fn lines(&self) -> &[FlattenedLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, line: usize) -> Option<&FlattenedLine> {
        self.lines.get(line)
    }

    /// Current visible line of a node, if the node is visible at all.
    pub fn line_of(&self, id: NodeId) -> Option<usize> {
        self.line_of.get(&id).copied()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
