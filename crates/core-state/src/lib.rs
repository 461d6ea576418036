//! Editor state: the aggregate document/session state and the single reducer
//! that mutates it.
//!
//! Everything observable about one open outline session lives in
//! [`EditorState`]: the forest, the derived projection, cursors, bookmarks,
//! search and filter state, and the view flags. Every mutation, whether a
//! host message (reparse, config change), a resolved key command, or a panel
//! toggle, arrives as a tagged [`Action`] through [`reduce`], the sole writer. The
//! reducer is total: every action is handled, impossible references degrade
//! to no-ops, and dispatch order gives a total order over all mutations, so
//! any session can be replayed deterministically from its action sequence.
//!
//! The projection stored here is derived state, never the source of truth:
//! the reducer rebuilds it whenever the forest or the filter changes, and
//! cursors/bookmarks resolve node ids against the latest instance.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use core_fold::{Projection, fold_all, toggle_fold, unfold_all, unfold_to_node};
use core_keymap::{Command, Keymap, KeyOutcome, KeyToken, Matcher, default_bindings};
use core_search::search;
use core_tree::{Forest, NodeId, Parser, serialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod bookmark;
mod cursor;

pub use bookmark::{Bookmark, BookmarkRegistry};
pub use cursor::{Cursor, CursorSet};

// -------------------------------------------------------------------------------------------------
// State
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
}

/// The single process-wide mutable state for one open document session.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub forest: Forest,
    /// Derived visible-line list; rebuilt by the reducer on every forest or
    /// filter change.
    pub projection: Projection,
    pub cursors: CursorSet,
    pub mode: Mode,
    pub search_query: String,
    pub search_results: HashSet<NodeId>,
    pub bookmarks: BookmarkRegistry,
    pub zen_mode: bool,
    pub filter_text: String,
    pub show_search: bool,
    pub show_filter: bool,
    pub indent_size: usize,
    pub expand_tab: bool,
    pub light_highlight: bool,
    /// Session number handed to the next reparse; every reparse mints fresh
    /// node ids under a new session.
    next_session: u32,
}

impl EditorState {
    pub fn new(indent_size: usize, expand_tab: bool, light_highlight: bool) -> Self {
        Self {
            forest: Forest::empty(),
            projection: Projection::default(),
            cursors: CursorSet::default(),
            mode: Mode::Normal,
            search_query: String::new(),
            search_results: HashSet::new(),
            bookmarks: BookmarkRegistry::default(),
            zen_mode: false,
            filter_text: String::new(),
            show_search: false,
            show_filter: false,
            indent_size: indent_size.max(1),
            expand_tab,
            light_highlight,
            next_session: 1,
        }
    }

    /// Visible line of the active cursor, if it resolves in the current
    /// projection.
    pub fn active_cursor_line(&self) -> Option<usize> {
        self.cursors
            .active()
            .and_then(|c| self.projection.line_of(c.node))
    }

    /// Root-to-cursor chain of ids for breadcrumb rendering; empty when the
    /// active cursor is unset or stale.
    pub fn breadcrumb(&self) -> Vec<NodeId> {
        self.cursors
            .active()
            .map(|c| self.forest.ancestor_path(c.node))
            .unwrap_or_default()
    }

    /// Capture the two fields the host persists across a suspend. Fold
    /// state, filter, and search are intentionally not part of the snapshot
    /// and reset to defaults each session.
    pub fn suspend(&self) -> SessionSnapshot {
        SessionSnapshot {
            cursors: self.cursors.clone(),
            bookmarks: self.bookmarks.clone(),
        }
    }

    fn refresh_projection(&mut self) {
        let filter = (!self.filter_text.is_empty()).then_some(self.filter_text.as_str());
        self.projection = Projection::build(&self.forest, filter);
    }

    fn reparse(&mut self, text: &str) {
        let parser = Parser::new(self.next_session, self.indent_size, self.expand_tab);
        self.next_session += 1;
        self.forest = parser.parse(text);
        self.refresh_projection();
    }
}

/// Persisted-session contract: exactly `{cursors, bookmarks}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub cursors: CursorSet,
    pub bookmarks: BookmarkRegistry,
}

// -------------------------------------------------------------------------------------------------
// Actions + reducer
// -------------------------------------------------------------------------------------------------

/// Every mutation of [`EditorState`], tagged. Cursor-relative commands carry
/// no payload; the reducer resolves the active cursor at dispatch time so
/// resolution always uses the state the action lands on.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Document text arrived (initial load or external change): full reparse
    /// under a fresh session. Existing cursors/bookmarks stay and go stale.
    SetText(String),
    MoveCursor { node: NodeId, index: Option<usize> },
    AddCursor(Cursor),
    RemoveCursor(usize),
    SetCursors(Vec<Cursor>),
    SetActiveCursor(usize),
    SetMode(Mode),
    MoveDown,
    MoveUp,
    GoToParent,
    GoToFirstChild,
    ToggleFoldAtCursor,
    ToggleFold(NodeId),
    FoldAll,
    UnfoldAll,
    UnfoldToNode(NodeId),
    /// Store the query; a non-empty query runs the search and unfolds the
    /// path to every match (documented policy of this state machine, not of
    /// the search function). An empty query clears the result set.
    SetSearch(String),
    SetFilter(String),
    SetShowSearch(bool),
    SetShowFilter(bool),
    ToggleZen,
    ToggleBookmarkAtCursor,
    NextBookmark,
    PrevBookmark,
    SetIndentSize(usize),
    SetExpandTab(bool),
    SetLightHighlight(bool),
    /// Host resume: restore the persisted cursor set and bookmarks.
    RestoreSession(SessionSnapshot),
}

/// The single mutation entry point: total over every action, no action is
/// ever invalid. Takes the state by value and returns the successor, so the
/// previous state is consumed and the reducer remains the sole writer.
pub fn reduce(mut state: EditorState, action: Action) -> EditorState {
    match action {
        Action::SetText(text) => {
            state.reparse(&text);
            debug!(
                target: "state",
                nodes = state.forest.len(),
                visible = state.projection.len(),
                "set_text"
            );
        }
        Action::MoveCursor { node, index } => state.cursors.move_to(node, index),
        Action::AddCursor(c) => state.cursors.add(c),
        Action::RemoveCursor(i) => state.cursors.remove(i),
        Action::SetCursors(cs) => state.cursors.set_all(cs),
        Action::SetActiveCursor(i) => state.cursors.set_active(i),
        Action::SetMode(m) => state.mode = m,
        Action::MoveDown => {
            if let Some(line) = state.active_cursor_line()
                && let Some(next) = state.projection.get(line + 1)
            {
                state.cursors.move_to(next.id, None);
            }
        }
        Action::MoveUp => {
            if let Some(line) = state.active_cursor_line()
                && line > 0
                && let Some(prev) = state.projection.get(line - 1)
            {
                state.cursors.move_to(prev.id, None);
            }
        }
        Action::GoToParent => {
            // Structural move: independent of projection and fold state.
            if let Some(c) = state.cursors.active()
                && let Some(parent) = state.forest.parent(c.node)
            {
                state.cursors.move_to(parent, None);
            }
        }
        Action::GoToFirstChild => {
            // Does not auto-unfold: the cursor may land on a currently
            // invisible child, valid in the forest until the view opens it.
            if let Some(c) = state.cursors.active()
                && let Some(child) = state.forest.first_child(c.node)
            {
                state.cursors.move_to(child, None);
            }
        }
        Action::ToggleFoldAtCursor => {
            if let Some(c) = state.cursors.active() {
                toggle_fold(&mut state.forest, c.node);
                state.refresh_projection();
            }
        }
        Action::ToggleFold(id) => {
            toggle_fold(&mut state.forest, id);
            state.refresh_projection();
        }
        Action::FoldAll => {
            fold_all(&mut state.forest);
            state.refresh_projection();
        }
        Action::UnfoldAll => {
            unfold_all(&mut state.forest);
            state.refresh_projection();
        }
        Action::UnfoldToNode(id) => {
            unfold_to_node(&mut state.forest, id);
            state.refresh_projection();
        }
        Action::SetSearch(query) => {
            if query.is_empty() {
                state.search_results.clear();
            } else {
                state.search_results = search(&state.forest, &query);
                for &id in &state.search_results {
                    unfold_to_node(&mut state.forest, id);
                }
                state.refresh_projection();
                debug!(
                    target: "state",
                    hits = state.search_results.len(),
                    "search_unfolded"
                );
            }
            state.search_query = query;
        }
        Action::SetFilter(text) => {
            state.filter_text = text;
            state.refresh_projection();
        }
        Action::SetShowSearch(v) => state.show_search = v,
        Action::SetShowFilter(v) => state.show_filter = v,
        Action::ToggleZen => state.zen_mode = !state.zen_mode,
        Action::ToggleBookmarkAtCursor => {
            if let Some(c) = state.cursors.active() {
                let added = state.bookmarks.toggle(c.node);
                debug!(target: "state", node = %c.node, added, "bookmark_toggle");
            }
        }
        Action::NextBookmark => {
            let current = state.active_cursor_line();
            if let Some(node) = state.bookmarks.next(&state.projection, current) {
                state.cursors.set_all(vec![Cursor::at(node)]);
            }
        }
        Action::PrevBookmark => {
            let current = state.active_cursor_line();
            if let Some(node) = state.bookmarks.prev(&state.projection, current) {
                state.cursors.set_all(vec![Cursor::at(node)]);
            }
        }
        Action::SetIndentSize(size) => {
            let size = size.max(1);
            if size != state.indent_size {
                // Renormalize through the serializer so structure survives
                // the unit change; ids are reminted (reparse semantics).
                state.indent_size = size;
                let text = serialize(&state.forest, size);
                state.reparse(&text);
            }
        }
        Action::SetExpandTab(v) => state.expand_tab = v,
        Action::SetLightHighlight(v) => state.light_highlight = v,
        Action::RestoreSession(snapshot) => {
            state.cursors = snapshot.cursors;
            state.bookmarks = snapshot.bookmarks;
        }
    }
    state
}

// -------------------------------------------------------------------------------------------------
// Editor facade: keymap in front of the reducer
// -------------------------------------------------------------------------------------------------

/// Construction-time options mirroring the host configuration record.
#[derive(Debug, Clone, Copy)]
pub struct EditorOptions {
    pub indent_size: usize,
    pub expand_tab: bool,
    pub light_highlight: bool,
    /// Chord buffer reset delay; `None` disables the timeout.
    pub keymap_timeout: Option<Duration>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            expand_tab: true,
            light_highlight: false,
            keymap_timeout: Some(Duration::from_millis(1000)),
        }
    }
}

// A disabled timeout is modeled as a deadline far enough out to never lapse
// within a session.
const NO_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// One open document session: the state machine plus the chord matcher that
/// feeds it. Key events come in raw; resolved commands are mapped onto
/// actions and dispatched, so the reducer stays the only writer.
#[derive(Debug)]
pub struct Editor {
    state: EditorState,
    matcher: Matcher<Command>,
}

impl Editor {
    pub fn new(options: EditorOptions) -> Self {
        Self::with_keymap(options, Keymap::build(default_bindings()))
    }

    pub fn with_keymap(options: EditorOptions, keymap: Keymap<Command>) -> Self {
        let timeout = options.keymap_timeout.unwrap_or(NO_TIMEOUT);
        Self {
            state: EditorState::new(
                options.indent_size,
                options.expand_tab,
                options.light_highlight,
            ),
            matcher: Matcher::new(keymap, timeout),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// In-flight chord prefix, read-only (which-key hinting).
    pub fn key_buffer(&self) -> &[KeyToken] {
        self.matcher.buffer()
    }

    /// Dispatch one action through the reducer.
    pub fn dispatch(&mut self, action: Action) {
        // reduce consumes the previous state; swap a placeholder in while it runs.
        let fresh = self.placeholder();
        let state = std::mem::replace(&mut self.state, fresh);
        self.state = reduce(state, action);
    }

    /// Empty state carrying the live state's own options.
    fn placeholder(&self) -> EditorState {
        EditorState::new(
            self.state.indent_size,
            self.state.expand_tab,
            self.state.light_highlight,
        )
    }

    /// Feed one key event. Returns the command that resolved, if any, after
    /// its action has been applied.
    pub fn handle_key(&mut self, token: KeyToken, now: Instant) -> Option<Command> {
        match self.matcher.on_key(token, now) {
            KeyOutcome::Matched(cmd) => {
                self.dispatch(self.command_action(cmd));
                Some(cmd)
            }
            KeyOutcome::Pending | KeyOutcome::Reset(_) => None,
        }
    }

    /// Let a lapsed chord timeout fire. Returns true when the buffer was
    /// cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.matcher.tick(now)
    }

    fn command_action(&self, cmd: Command) -> Action {
        match cmd {
            Command::ToggleFold => Action::ToggleFoldAtCursor,
            Command::FoldAll => Action::FoldAll,
            Command::UnfoldAll => Action::UnfoldAll,
            Command::MoveDown => Action::MoveDown,
            Command::MoveUp => Action::MoveUp,
            Command::GoToParent => Action::GoToParent,
            Command::GoToFirstChild => Action::GoToFirstChild,
            Command::SearchMode => Action::SetShowSearch(true),
            Command::ToggleSearch => Action::SetShowSearch(!self.state.show_search),
            Command::ToggleZen => Action::ToggleZen,
            Command::ToggleFilter => Action::SetShowFilter(!self.state.show_filter),
            Command::ToggleBookmark => Action::ToggleBookmarkAtCursor,
            Command::NextBookmark => Action::NextBookmark,
            Command::PrevBookmark => Action::PrevBookmark,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "root\n  child1\n    grandchild\n  child2";

    fn loaded() -> EditorState {
        let state = EditorState::new(2, true, false);
        reduce(state, Action::SetText(DOC.into()))
    }

    fn text_at(state: &EditorState, line: usize) -> &str {
        let id = state.projection.get(line).unwrap().id;
        state.forest.get(id).unwrap().text()
    }

    fn cursor_on(state: &EditorState) -> &str {
        let c = state.cursors.active().unwrap();
        state.forest.get(c.node).unwrap().text()
    }

    fn with_cursor_at(mut state: EditorState, line: usize) -> EditorState {
        let id = state.projection.get(line).unwrap().id;
        state = reduce(state, Action::SetCursors(vec![Cursor::at(id)]));
        state
    }

    #[test]
    fn set_text_builds_projection() {
        let state = loaded();
        assert_eq!(state.projection.len(), 4);
        assert_eq!(text_at(&state, 0), "root");
        assert_eq!(text_at(&state, 3), "child2");
    }

    #[test]
    fn move_down_and_up_follow_the_projection() {
        let mut state = with_cursor_at(loaded(), 0);
        state = reduce(state, Action::MoveDown);
        assert_eq!(cursor_on(&state), "child1");
        state = reduce(state, Action::MoveUp);
        assert_eq!(cursor_on(&state), "root");
        // Boundary: already at the top.
        state = reduce(state, Action::MoveUp);
        assert_eq!(cursor_on(&state), "root");
    }

    #[test]
    fn move_skips_over_folded_subtree() {
        let mut state = with_cursor_at(loaded(), 1); // child1
        state = reduce(state, Action::ToggleFoldAtCursor);
        state = reduce(state, Action::MoveDown);
        assert_eq!(cursor_on(&state), "child2", "grandchild is hidden");
    }

    #[test]
    fn stale_cursor_makes_navigation_a_no_op() {
        let mut state = with_cursor_at(loaded(), 2);
        // External change: reparse invalidates every id.
        state = reduce(state, Action::SetText("alpha\nbeta".into()));
        let before = state.cursors.clone();
        state = reduce(state, Action::MoveDown);
        assert_eq!(state.cursors, before, "stale cursor left in place");
        assert_eq!(state.active_cursor_line(), None);
    }

    #[test]
    fn hidden_cursor_cannot_move_but_parent_still_works() {
        let mut state = with_cursor_at(loaded(), 2); // grandchild
        let root = state.projection.get(0).unwrap().id;
        state = reduce(state, Action::ToggleFold(root));
        assert_eq!(state.active_cursor_line(), None);
        let held = state.cursors.clone();
        state = reduce(state, Action::MoveDown);
        assert_eq!(state.cursors, held);
        // Structural navigation ignores fold state.
        state = reduce(state, Action::GoToParent);
        assert_eq!(cursor_on(&state), "child1");
    }

    #[test]
    fn first_child_does_not_auto_unfold() {
        let mut state = with_cursor_at(loaded(), 1); // child1
        state = reduce(state, Action::ToggleFoldAtCursor);
        state = reduce(state, Action::GoToFirstChild);
        assert_eq!(cursor_on(&state), "grandchild");
        assert_eq!(state.active_cursor_line(), None, "valid but invisible");
    }

    #[test]
    fn search_unfolds_every_match() {
        let mut state = loaded();
        state = reduce(state, Action::FoldAll);
        assert_eq!(state.projection.len(), 1);
        state = reduce(state, Action::SetSearch("grand".into()));
        assert_eq!(state.search_results.len(), 1);
        let hit = *state.search_results.iter().next().unwrap();
        assert!(
            state.projection.line_of(hit).is_some(),
            "match visible after search"
        );
    }

    #[test]
    fn empty_search_clears_results_without_touching_folds() {
        let mut state = loaded();
        state = reduce(state, Action::FoldAll);
        state = reduce(state, Action::SetSearch("child".into()));
        assert!(!state.search_results.is_empty());
        state = reduce(state, Action::SetSearch(String::new()));
        assert!(state.search_results.is_empty());
        assert_eq!(state.search_query, "");
    }

    #[test]
    fn filter_renumbers_visible_lines() {
        let mut state = loaded();
        state = reduce(state, Action::SetFilter("child".into()));
        assert_eq!(state.projection.len(), 3);
        assert_eq!(text_at(&state, 0), "child1");
        state = reduce(state, Action::SetFilter(String::new()));
        assert_eq!(state.projection.len(), 4);
    }

    #[test]
    fn bookmark_cycle_retargets_the_cursor() {
        let mut state = with_cursor_at(loaded(), 0);
        for line in [1usize, 3] {
            state = with_cursor_at(state, line);
            state = reduce(state, Action::ToggleBookmarkAtCursor);
        }
        state = with_cursor_at(state, 0);
        state = reduce(state, Action::NextBookmark);
        assert_eq!(cursor_on(&state), "child1");
        state = reduce(state, Action::NextBookmark);
        assert_eq!(cursor_on(&state), "child2");
        state = reduce(state, Action::NextBookmark);
        assert_eq!(cursor_on(&state), "child1", "wraps to first");
        assert_eq!(state.cursors.active_index(), 0);
    }

    #[test]
    fn indent_size_change_preserves_structure_with_fresh_ids() {
        let mut state = loaded();
        let old_root = state.projection.get(0).unwrap().id;
        state = reduce(state, Action::SetIndentSize(4));
        assert_eq!(state.projection.len(), 4);
        assert_eq!(text_at(&state, 2), "grandchild");
        assert!(!state.forest.contains(old_root), "ids reminted");
        assert_eq!(serialize(&state.forest, 4).lines().nth(1), Some("    child1"));
    }

    #[test]
    fn session_snapshot_round_trips_and_restores_only_two_fields() {
        let mut state = with_cursor_at(loaded(), 1);
        state = reduce(state, Action::ToggleBookmarkAtCursor);
        state = reduce(state, Action::ToggleZen);
        state = reduce(state, Action::SetFilter("child".into()));

        let snapshot = state.suspend();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        // Fresh session: same document, defaults everywhere else.
        let mut resumed = EditorState::new(2, true, false);
        resumed = reduce(resumed, Action::SetText(DOC.into()));
        resumed = reduce(resumed, Action::RestoreSession(decoded));
        assert_eq!(resumed.cursors, snapshot.cursors);
        assert_eq!(resumed.bookmarks, snapshot.bookmarks);
        assert!(!resumed.zen_mode);
        assert_eq!(resumed.filter_text, "");
    }

    #[test]
    fn breadcrumb_tracks_the_active_cursor() {
        let state = with_cursor_at(loaded(), 2);
        let crumb: Vec<&str> = state
            .breadcrumb()
            .into_iter()
            .map(|id| state.forest.get(id).unwrap().text())
            .collect();
        assert_eq!(crumb, vec!["root", "child1", "grandchild"]);
    }

    #[test]
    fn editor_resolves_leader_chord_into_a_fold() {
        let mut ed = Editor::new(EditorOptions::default());
        ed.dispatch(Action::SetText(DOC.into()));
        let root = ed.state().projection.get(0).unwrap().id;
        ed.dispatch(Action::SetCursors(vec![Cursor::at(root)]));

        let t0 = Instant::now();
        assert_eq!(ed.handle_key(KeyToken::Char(' '), t0), None);
        assert_eq!(ed.key_buffer().len(), 1);
        assert_eq!(ed.handle_key(KeyToken::Char('c'), t0), None);
        assert_eq!(
            ed.handle_key(KeyToken::Char('a'), t0),
            Some(Command::ToggleFold)
        );
        assert!(ed.key_buffer().is_empty());
        assert_eq!(ed.state().projection.len(), 1, "root folded");
    }

    #[test]
    fn editor_options_survive_dispatch() {
        let mut ed = Editor::new(EditorOptions {
            indent_size: 4,
            expand_tab: false,
            light_highlight: true,
            keymap_timeout: None,
        });
        ed.dispatch(Action::SetText("a\n    b".into()));
        ed.dispatch(Action::MoveDown);
        assert_eq!(ed.state().indent_size, 4);
        assert!(!ed.state().expand_tab);
        assert!(ed.state().light_highlight);
        assert_eq!(ed.state().projection.len(), 2, "parsed with the configured unit");
    }

    #[test]
    fn editor_single_keys_navigate() {
        let mut ed = Editor::new(EditorOptions::default());
        ed.dispatch(Action::SetText(DOC.into()));
        let root = ed.state().projection.get(0).unwrap().id;
        ed.dispatch(Action::SetCursors(vec![Cursor::at(root)]));
        let t0 = Instant::now();
        ed.handle_key(KeyToken::Char('j'), t0);
        ed.handle_key(KeyToken::Char('j'), t0);
        ed.handle_key(KeyToken::Char('k'), t0);
        let c = ed.state().cursors.active().unwrap();
        assert_eq!(ed.state().forest.get(c.node).unwrap().text(), "child1");
    }
}
