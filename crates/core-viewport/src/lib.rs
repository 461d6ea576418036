//! core-viewport: virtualized window computation.
//!
//! Maps a pixel scroll offset, viewport height, and item count to the
//! inclusive index range the host must actually render, padded by an
//! overscan margin. Purely arithmetic; the projection supplies only its
//! length. All outputs are clamped non-negative and in-bounds, including the
//! degenerate `N = 0`, `H = 0`, and `s = 0` cases.

use tracing::trace;

/// Inclusive render range plus absolute-positioning metrics.
///
/// `start`/`end` are only meaningful when `len() > 0`; an empty window
/// (no items) reports `len() == 0` and zero heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First rendered item index.
    pub start: usize,
    /// Last rendered item index (inclusive).
    pub end: usize,
    /// Full scrollable height in pixels (`item_count * item_height`).
    pub total_height: usize,
    /// Pixel offset of `start` for absolute positioning of the rendered slice.
    pub offset_y: usize,
}

impl Window {
    /// Number of items in the window.
    pub fn len(&self) -> usize {
        if self.total_height == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices to render, in order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + use<> {
        let (start, count) = (self.start, self.len());
        (start..).take(count)
    }
}

/// Compute the window for `item_count` rows of fixed `item_height` pixels,
/// scrolled to `scroll_top` within a viewport of `viewport_height` pixels,
/// overscanning `overscan` rows on each side.
///
/// `start = max(0, floor(s/h) - O)`, `end = min(N-1, ceil((s+H)/h) + O)`.
/// A zero `item_height` is clamped to 1 to keep the arithmetic total.
pub fn compute_window(
    item_count: usize,
    item_height: usize,
    scroll_top: usize,
    viewport_height: usize,
    overscan: usize,
) -> Window {
    if item_count == 0 {
        return Window {
            start: 0,
            end: 0,
            total_height: 0,
            offset_y: 0,
        };
    }
    let h = item_height.max(1);
    let start = (scroll_top / h).saturating_sub(overscan);
    let start = start.min(item_count - 1);
    let end = (scroll_top + viewport_height).div_ceil(h) + overscan;
    let end = end.min(item_count - 1);
    let win = Window {
        start,
        end,
        total_height: item_count * h,
        offset_y: start * h,
    };
    trace!(
        target: "viewport",
        item_count,
        scroll_top,
        start = win.start,
        end = win.end,
        "window"
    );
    win
}
