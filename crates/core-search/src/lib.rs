//! core-search: substring search over the whole forest.
//!
//! A pure query: case-insensitive substring match over every node's text,
//! reaching inside folded subtrees. Making matches visible (unfolding the
//! path to each hit) is the state machine's documented policy, not this
//! crate's concern.

use std::collections::HashSet;

use core_tree::{Forest, NodeId};
use tracing::debug;

/// Ids of every node whose text contains `query`, ignoring case and fold
/// state. The empty query matches every node.
pub fn search(forest: &Forest, query: &str) -> HashSet<NodeId> {
    let needle = query.to_lowercase();
    let mut results = HashSet::new();
    let mut stack: Vec<NodeId> = forest.roots().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let Some(node) = forest.get(id) else { continue };
        if node.text().to_lowercase().contains(&needle) {
            results.insert(id);
        }
        stack.extend(node.children().iter().rev());
    }
    debug!(target: "search", query_len = query.len(), hits = results.len(), "search");
    results
}
