//! core-tree: indentation parser, serializer, and the arena forest.
//!
//! The forest is the single source of truth for document structure. Nodes live
//! in a flat arena (`Vec<Node>`) and are addressed by `NodeId` handles, so the
//! fold layer can flip visibility flags without deep copies while every handle
//! minted during one parse stays valid until the next reparse.
//!
//! Identity model:
//! * A `NodeId` is `{session, slot}`. The slot indexes the arena; the session
//!   tags which parse produced the node.
//! * Sessions are caller-owned (the state machine increments a counter per
//!   reparse). There is no process-global id source, so repeated parses stay
//!   deterministic and testable.
//! * Resolving an id from an older session fails the session check and returns
//!   `None`. Stale cursors and bookmarks therefore degrade to no-ops instead
//!   of aliasing an unrelated slot.
//!
//! Parsing never rejects input: indentation levels come from floor division by
//! the indent unit, and a level stack resolves any decrease to the nearest
//! enclosing level. Blank lines are skipped entirely. Folding is a view
//! concern; `serialize` always emits the full tree.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

// -------------------------------------------------------------------------------------------------
// NodeId
// -------------------------------------------------------------------------------------------------

/// Stable handle for one node of a [`Forest`].
///
/// Ids are unique across the process as long as every forest gets a distinct
/// session number. Equality across forests from different sessions is always
/// false, which is exactly the staleness semantics navigation wants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    session: u32,
    slot: u32,
}

impl NodeId {
    pub fn session(&self) -> u32 {
        self.session
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}.{}", self.session, self.slot)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}.{}", self.session, self.slot)
    }
}

// -------------------------------------------------------------------------------------------------
// Node + Forest
// -------------------------------------------------------------------------------------------------

/// One outline line: trimmed text, fold flag, and structural links.
///
/// `folded` is meaningful only when `children` is non-empty; a folded leaf has
/// no visible effect and the flatten layer ignores it.
#[derive(Debug, Clone)]
pub struct Node {
    text: String,
    folded: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn text(&self) -> &str {
        &self.text
    }
    pub fn folded(&self) -> bool {
        self.folded
    }
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Ordered sequence of root nodes plus the arena backing them.
///
/// Ownership is a strict tree: every non-root node has exactly one parent and
/// appears in exactly one child list. The arena is append-only for the life of
/// a session; a reparse builds a fresh forest under a new session number.
#[derive(Debug, Clone)]
pub struct Forest {
    session: u32,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Forest {
    /// Forest with no nodes (session 0). Useful as the initial editor state
    /// before any document text arrives.
    pub fn empty() -> Self {
        Self {
            session: 0,
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn session(&self) -> u32 {
        self.session
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of nodes in the whole forest.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve a handle. Ids from other sessions (stale after a reparse) and
    /// out-of-range slots resolve to `None`.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.session != self.session {
            return None;
        }
        self.nodes.get(id.slot as usize)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.children.first().copied())
    }

    /// Fold flag of a node; unresolved ids read as unfolded.
    pub fn folded(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.folded)
    }

    /// Set the fold flag on one node. No-op (returning false) for unresolved
    /// ids. The flag is stored even on leaves; flatten ignores it there.
    pub fn set_folded(&mut self, id: NodeId, folded: bool) -> bool {
        if id.session != self.session {
            return false;
        }
        match self.nodes.get_mut(id.slot as usize) {
            Some(n) => {
                n.folded = folded;
                true
            }
            None => false,
        }
    }

    /// Root-to-node chain of ids (inclusive of `id` itself), e.g. for
    /// breadcrumb rendering. Empty when `id` does not resolve.
    pub fn ancestor_path(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut path = vec![id];
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            path.push(p);
            cur = p;
        }
        path.reverse();
        path
    }

    /// Structural depth of a node (roots are depth 0). `None` for stale ids.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestor_path(id).len() - 1)
    }

    fn alloc(&mut self, text: String, parent: Option<NodeId>) -> NodeId {
        let id = NodeId {
            session: self.session,
            slot: self.nodes.len() as u32,
        };
        self.nodes.push(Node {
            text,
            folded: false,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p.slot as usize].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}

// -------------------------------------------------------------------------------------------------
// Parser
// -------------------------------------------------------------------------------------------------

/// Indentation parser for one session.
///
/// `indent_size` is the number of spaces per level; `expand_tab` replaces each
/// literal tab with `indent_size` spaces before measuring. A line's level is
/// `floor(leading_whitespace / indent_size)`; irregular indentation is always
/// resolved to some valid level via the level stack, never rejected.
#[derive(Debug, Clone, Copy)]
pub struct Parser {
    session: u32,
    indent_size: usize,
    expand_tab: bool,
}

impl Parser {
    pub fn new(session: u32, indent_size: usize, expand_tab: bool) -> Self {
        Self {
            session,
            // An indent unit of 0 would make every line a root via division
            // by zero; clamp to 1.
            indent_size: indent_size.max(1),
            expand_tab,
        }
    }

    /// Parse indented text into a fresh forest. Blank (all-whitespace) lines
    /// do not become nodes and do not affect level bookkeeping.
    pub fn parse(&self, text: &str) -> Forest {
        let mut forest = Forest {
            session: self.session,
            nodes: Vec::new(),
            roots: Vec::new(),
        };
        // (node, level) pairs; top of stack is the innermost open ancestor.
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let tab = " ".repeat(self.indent_size);

        for raw in text.lines() {
            let expanded;
            let line: &str = if self.expand_tab && raw.contains('\t') {
                expanded = raw.replace('\t', &tab);
                &expanded
            } else {
                raw
            };
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            let indent = line.chars().count() - trimmed.chars().count();
            let level = indent / self.indent_size;

            while stack.last().is_some_and(|&(_, l)| l >= level) {
                stack.pop();
            }
            let parent = stack.last().map(|&(id, _)| id);
            let id = forest.alloc(trimmed.trim_end().to_string(), parent);
            stack.push((id, level));
        }

        debug!(
            target: "tree.parse",
            session = self.session,
            nodes = forest.len(),
            roots = forest.roots.len(),
            "parsed"
        );
        forest
    }
}

/// Serialize the full forest back to indented text: pre-order, each node as
/// `indent_size * depth` spaces plus its text plus a newline. Fold state is a
/// view concern and is ignored here.
pub fn serialize(forest: &Forest, indent_size: usize) -> String {
    let mut out = String::new();
    for &root in forest.roots() {
        serialize_node(forest, root, 0, indent_size, &mut out);
    }
    out
}

fn serialize_node(forest: &Forest, id: NodeId, depth: usize, indent_size: usize, out: &mut String) {
    let Some(node) = forest.get(id) else { return };
    for _ in 0..depth * indent_size {
        out.push(' ');
    }
    out.push_str(node.text());
    out.push('\n');
    for &child in node.children() {
        serialize_node(forest, child, depth + 1, indent_size, out);
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
