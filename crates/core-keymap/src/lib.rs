//! core-keymap: chorded key sequences compiled into a trie.
//!
//! Design principles:
//! - Pure and deterministic: resolution depends only on the accumulated
//!   buffer; timeouts are modeled as an explicit deadline checked against a
//!   caller-supplied `Instant`, never a background timer thread.
//! - Leader sequences of arbitrary depth (`<space> c a` vs `<space> c f`)
//!   share trie prefixes; single-key bindings (`j`, `k`) coexist at the root.
//! - A dead end discards the whole partial sequence; the next keystroke
//!   starts fresh. Partial state is never replayed token by token.
//! - The in-flight buffer is exposed read-only for which-key style hinting.
//! - No side effects: logging only at TRACE/DEBUG for traversal and resets.

use std::time::{Duration, Instant};

use smallvec::SmallVec;
use tracing::{debug, trace};

// -------------------------------------------------------------------------------------------------
// Key tokens
// -------------------------------------------------------------------------------------------------

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModMask: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Esc,
    Enter,
    Tab,
    F(u8),
    Up,
    Down,
    Left,
    Right,
}

/// Logical key identity fed to the matcher one event at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Char(char),
    Named(NamedKey),
    Chord { base: Box<KeyToken>, mods: ModMask },
}

impl KeyToken {
    pub fn chord(base: KeyToken, mods: ModMask) -> Self {
        Self::Chord {
            base: Box::new(base),
            mods,
        }
    }

    /// Escape is the cancel signal: it clears the buffer and aborts the
    /// current sequence instead of participating in matching.
    pub fn is_cancel(&self) -> bool {
        matches!(self, KeyToken::Named(NamedKey::Esc))
    }
}

// -------------------------------------------------------------------------------------------------
// Commands + default bindings
// -------------------------------------------------------------------------------------------------

/// Editor commands the stock keymap resolves to. Kept here (rather than in
/// the state crate) so the trie and its bindings stay testable in isolation;
/// the state machine maps these onto its own actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleFold,
    FoldAll,
    UnfoldAll,
    MoveDown,
    MoveUp,
    GoToParent,
    GoToFirstChild,
    SearchMode,
    ToggleSearch,
    ToggleZen,
    ToggleFilter,
    ToggleBookmark,
    NextBookmark,
    PrevBookmark,
}

/// One chord sequence mapped to an action.
#[derive(Debug, Clone)]
pub struct Binding<A> {
    pub sequence: Vec<KeyToken>,
    pub action: A,
}

impl<A> Binding<A> {
    pub fn new(sequence: Vec<KeyToken>, action: A) -> Self {
        Self { sequence, action }
    }
}

/// Stock binding table: space-leader fold/search/zen/filter chords, vim-style
/// single-key navigation, and F2-family bookmark keys.
pub fn default_bindings() -> Vec<Binding<Command>> {
    use KeyToken as K;
    let leader = || K::Char(' ');
    vec![
        Binding::new(vec![leader(), K::Char('c'), K::Char('a')], Command::ToggleFold),
        Binding::new(vec![leader(), K::Char('c'), K::Char('f')], Command::FoldAll),
        Binding::new(vec![leader(), K::Char('c'), K::Char('o')], Command::UnfoldAll),
        Binding::new(vec![leader(), K::Char('s')], Command::ToggleSearch),
        Binding::new(vec![leader(), K::Char('z')], Command::ToggleZen),
        Binding::new(vec![leader(), K::Char('b')], Command::ToggleFilter),
        Binding::new(vec![K::Char('j')], Command::MoveDown),
        Binding::new(vec![K::Char('k')], Command::MoveUp),
        Binding::new(vec![K::Char('h')], Command::GoToParent),
        Binding::new(vec![K::Char('l')], Command::GoToFirstChild),
        Binding::new(vec![K::Char('/')], Command::SearchMode),
        Binding::new(
            vec![K::chord(K::Named(NamedKey::F(2)), ModMask::CTRL)],
            Command::ToggleBookmark,
        ),
        Binding::new(vec![K::Named(NamedKey::F(2))], Command::NextBookmark),
        Binding::new(
            vec![K::chord(K::Named(NamedKey::F(2)), ModMask::SHIFT)],
            Command::PrevBookmark,
        ),
    ]
}

// -------------------------------------------------------------------------------------------------
// Trie
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Edge {
    token: KeyToken,
    next: usize,
}

#[derive(Debug, Clone)]
struct TrieNode {
    terminal: Option<usize>, // index into bindings vec
    edges: SmallVec<[Edge; 4]>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            terminal: None,
            edges: SmallVec::new(),
        }
    }
}

/// Chord sequences compiled into a trie. Internal nodes branch per token;
/// terminal nodes name a binding. Where one binding's sequence is a strict
/// prefix of another's, the terminal fires immediately on arrival (a leaf
/// outranks its own subtree; the build logs the shadowing).
#[derive(Debug)]
pub struct Keymap<A> {
    nodes: Vec<TrieNode>,
    bindings: Vec<Binding<A>>,
}

enum Walk {
    Terminal(usize),
    Prefix,
    DeadEnd,
}

impl<A> Keymap<A> {
    pub fn build(bindings: Vec<Binding<A>>) -> Self {
        let mut map = Keymap {
            nodes: vec![TrieNode::new()],
            bindings,
        };
        for (idx, b) in map.bindings.iter().enumerate() {
            let mut cur = 0usize;
            for token in &b.sequence {
                let next = if let Some(e) = map.nodes[cur].edges.iter().find(|e| e.token == *token)
                {
                    e.next
                } else {
                    let new_idx = map.nodes.len();
                    map.nodes.push(TrieNode::new());
                    map.nodes[cur].edges.push(Edge {
                        token: token.clone(),
                        next: new_idx,
                    });
                    new_idx
                };
                cur = next;
            }
            if map.nodes[cur].terminal.is_some() {
                // Later binding overrides earlier for the same sequence.
                trace!(target: "keymap", binding_index = idx, node = cur, "terminal_override");
            }
            if !map.nodes[cur].edges.is_empty() {
                trace!(target: "keymap", binding_index = idx, node = cur, "terminal_shadows_subtree");
            }
            map.nodes[cur].terminal = Some(idx);
        }
        map
    }

    /// Walk the trie with the entire buffer in order.
    fn walk(&self, buffer: &[KeyToken]) -> Walk {
        let mut node = 0usize;
        for (i, token) in buffer.iter().enumerate() {
            match self.nodes[node].edges.iter().find(|e| e.token == *token) {
                Some(e) => {
                    node = e.next;
                    trace!(target: "keymap", step = i, node, "advance");
                }
                None => return Walk::DeadEnd,
            }
            if let Some(b) = self.nodes[node].terminal {
                // Terminal mid-buffer only happens transiently; the matcher
                // clears the buffer on every resolution so the landing token
                // is always the last one.
                if i + 1 == buffer.len() {
                    return Walk::Terminal(b);
                }
            }
        }
        Walk::Prefix
    }
}

// -------------------------------------------------------------------------------------------------
// Matcher
// -------------------------------------------------------------------------------------------------

/// Outcome of feeding one key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome<A> {
    /// A full chord resolved; buffer cleared, pending timeout cancelled.
    Matched(A),
    /// The buffer is a strict prefix of at least one binding; waiting.
    Pending,
    /// The sequence was discarded (cancel, dead end, or timeout expiry).
    Reset(ResetReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Cancel,
    DeadEnd,
    Timeout,
}

/// Stateful consumer of key tokens. Owns the accumulated buffer and a single
/// pending deadline: every key clears-then-reschedules the deadline in the
/// same step, so a stale reset can never fire against a buffer the user is
/// still extending.
#[derive(Debug)]
pub struct Matcher<A> {
    keymap: Keymap<A>,
    buffer: Vec<KeyToken>,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl<A: Clone> Matcher<A> {
    pub fn new(keymap: Keymap<A>, timeout: Duration) -> Self {
        Self {
            keymap,
            buffer: Vec::new(),
            deadline: None,
            timeout,
        }
    }

    /// In-flight sequence, read-only (which-key hinting).
    pub fn buffer(&self) -> &[KeyToken] {
        &self.buffer
    }

    /// Clear the sequence and cancel the pending deadline.
    pub fn cancel(&mut self) {
        self.buffer.clear();
        self.deadline = None;
    }

    /// Fire the timeout if its deadline has passed. Returns true when the
    /// buffer was cleared. Hosts call this from their idle/tick path.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d && !self.buffer.is_empty() => {
                debug!(target: "keymap", dropped = self.buffer.len(), "timeout_reset");
                self.cancel();
                true
            }
            _ => false,
        }
    }

    /// Feed one key event observed at `now`.
    pub fn on_key(&mut self, token: KeyToken, now: Instant) -> KeyOutcome<A> {
        // A deadline that lapsed before this key conceptually fired already:
        // the buffered prefix is gone and this token starts a fresh sequence.
        self.tick(now);

        if token.is_cancel() {
            self.cancel();
            return KeyOutcome::Reset(ResetReason::Cancel);
        }

        self.buffer.push(token);
        self.deadline = Some(now + self.timeout);

        match self.keymap.walk(&self.buffer) {
            Walk::Terminal(idx) => {
                let action = self.keymap.bindings[idx].action.clone();
                debug!(target: "keymap", consumed = self.buffer.len(), "matched");
                self.cancel();
                KeyOutcome::Matched(action)
            }
            Walk::Prefix => {
                trace!(target: "keymap", depth = self.buffer.len(), "pending");
                KeyOutcome::Pending
            }
            Walk::DeadEnd => {
                debug!(target: "keymap", dropped = self.buffer.len(), "dead_end_reset");
                self.cancel();
                KeyOutcome::Reset(ResetReason::DeadEnd)
            }
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

    fn key(c: char) -> KeyToken {
        KeyToken::Char(c)
    }

    /// Trie {a: {b: "X"}, c: "Y"} from two bindings.
    fn tiny_matcher() -> Matcher<&'static str> {
        let map = Keymap::build(vec![
            Binding::new(vec![key('a'), key('b')], "X"),
            Binding::new(vec![key('c')], "Y"),
        ]);
        Matcher::new(map, Duration::from_millis(1000))
    }

    #[test]
    fn single_key_binding_fires() {
        let mut m = tiny_matcher();
        let t0 = Instant::now();
        assert_eq!(m.on_key(key('c'), t0), KeyOutcome::Matched("Y"));
        assert!(m.buffer().is_empty());
    }

    #[test]
    fn two_key_chord_fires_after_prefix() {
        let mut m = tiny_matcher();
        let t0 = Instant::now();
        assert_eq!(m.on_key(key('a'), t0), KeyOutcome::Pending);
        assert_eq!(m.buffer(), &[key('a')]);
        assert_eq!(m.on_key(key('b'), t0), KeyOutcome::Matched("X"));
        assert!(m.buffer().is_empty());
    }

    #[test]
    fn dead_end_discards_sequence_then_recovers() {
        let mut m = tiny_matcher();
        let t0 = Instant::now();
        assert_eq!(m.on_key(key('a'), t0), KeyOutcome::Pending);
        assert_eq!(
            m.on_key(key('z'), t0),
            KeyOutcome::Reset(ResetReason::DeadEnd),
            "no action fires; partial state discarded, not retried"
        );
        assert!(m.buffer().is_empty());
        assert_eq!(m.on_key(key('c'), t0), KeyOutcome::Matched("Y"));
    }

    #[test]
    fn escape_cancels_pending_sequence() {
        let mut m = tiny_matcher();
        let t0 = Instant::now();
        m.on_key(key('a'), t0);
        assert_eq!(
            m.on_key(KeyToken::Named(NamedKey::Esc), t0),
            KeyOutcome::Reset(ResetReason::Cancel)
        );
        assert!(m.buffer().is_empty());
    }

    #[test]
    fn timeout_clears_buffer_between_keys() {
        let mut m = tiny_matcher();
        let t0 = Instant::now();
        assert_eq!(m.on_key(key('a'), t0), KeyOutcome::Pending);
        let late = t0 + Duration::from_millis(1500);
        assert!(m.tick(late), "lapsed deadline clears the buffer");
        assert!(m.buffer().is_empty());
        // 'b' alone is now a dead end: the old prefix is gone.
        assert_eq!(m.on_key(key('b'), late), KeyOutcome::Reset(ResetReason::DeadEnd));
    }

    #[test]
    fn lapsed_deadline_expires_on_next_key_without_tick() {
        let mut m = tiny_matcher();
        let t0 = Instant::now();
        m.on_key(key('a'), t0);
        // No tick call; the next key itself observes the expiry first.
        let late = t0 + Duration::from_millis(2000);
        assert_eq!(m.on_key(key('c'), late), KeyOutcome::Matched("Y"));
    }

    #[test]
    fn each_key_reschedules_the_deadline() {
        let map = Keymap::build(vec![Binding::new(vec![key('a'), key('b'), key('c')], "deep")]);
        let mut m = Matcher::new(map, Duration::from_millis(100));
        let t0 = Instant::now();
        m.on_key(key('a'), t0);
        let t1 = t0 + Duration::from_millis(80);
        m.on_key(key('b'), t1); // re-arms; old deadline (t0+100) must not fire
        let t2 = t1 + Duration::from_millis(80);
        assert!(!m.tick(t1 + Duration::from_millis(30)), "re-armed deadline still live");
        assert_eq!(m.on_key(key('c'), t2), KeyOutcome::Matched("deep"));
    }

    #[test]
    fn leader_sequences_share_prefixes() {
        let map = Keymap::build(default_bindings());
        let mut m = Matcher::new(map, Duration::from_millis(1000));
        let t0 = Instant::now();
        assert_eq!(m.on_key(key(' '), t0), KeyOutcome::Pending);
        assert_eq!(m.on_key(key('c'), t0), KeyOutcome::Pending);
        assert_eq!(m.on_key(key('a'), t0), KeyOutcome::Matched(Command::ToggleFold));
        // Same prefix, different tail.
        m.on_key(key(' '), t0);
        m.on_key(key('c'), t0);
        assert_eq!(m.on_key(key('f'), t0), KeyOutcome::Matched(Command::FoldAll));
    }

    #[test]
    fn single_keys_coexist_with_chords_at_root() {
        let map = Keymap::build(default_bindings());
        let mut m = Matcher::new(map, Duration::from_millis(1000));
        let t0 = Instant::now();
        assert_eq!(m.on_key(key('j'), t0), KeyOutcome::Matched(Command::MoveDown));
        assert_eq!(m.on_key(key(' '), t0), KeyOutcome::Pending);
        assert_eq!(m.on_key(key('z'), t0), KeyOutcome::Matched(Command::ToggleZen));
        assert_eq!(m.on_key(key('k'), t0), KeyOutcome::Matched(Command::MoveUp));
    }

    #[test]
    fn modified_function_keys_are_distinct_tokens() {
        let map = Keymap::build(default_bindings());
        let mut m = Matcher::new(map, Duration::from_millis(1000));
        let t0 = Instant::now();
        let f2 = KeyToken::Named(NamedKey::F(2));
        assert_eq!(m.on_key(f2.clone(), t0), KeyOutcome::Matched(Command::NextBookmark));
        assert_eq!(
            m.on_key(KeyToken::chord(f2.clone(), ModMask::SHIFT), t0),
            KeyOutcome::Matched(Command::PrevBookmark)
        );
        assert_eq!(
            m.on_key(KeyToken::chord(f2, ModMask::CTRL), t0),
            KeyOutcome::Matched(Command::ToggleBookmark)
        );
    }

    #[test]
    fn unknown_key_at_root_resets_without_effect() {
        let map = Keymap::build(default_bindings());
        let mut m = Matcher::new(map, Duration::from_millis(1000));
        assert_eq!(
            m.on_key(key('q'), Instant::now()),
            KeyOutcome::Reset(ResetReason::DeadEnd)
        );
        assert!(m.buffer().is_empty());
    }
}
