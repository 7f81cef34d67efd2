//! View handles consumed by the synchronization engine.
//!
//! The engine never touches a concrete widget. Both panes are reached through
//! these traits, so any toolkit (or a test double) can host the engine.

/// Which pane a scroll notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollSource {
    Buffer,
    Rendered,
}

impl ScrollSource {
    /// The other pane.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buffer => Self::Rendered,
            Self::Rendered => Self::Buffer,
        }
    }
}

/// Vertical scroll state shared by both panes.
///
/// All values are pixels. `scroll_top` is measured from the top of the
/// scrollable content.
pub trait ScrollSurface {
    /// Current scroll offset.
    fn scroll_top(&self) -> f64;

    /// Write a new scroll offset. Implementations may clamp.
    fn set_scroll_top(&mut self, offset: f64);

    /// Total height of the scrollable content.
    fn scroll_height(&self) -> f64;

    /// Height of the visible area.
    fn client_height(&self) -> f64;

    /// Largest valid scroll offset.
    fn max_scroll(&self) -> f64 {
        let max = self.scroll_height() - self.client_height();
        if max.is_finite() { max.max(0.0) } else { 0.0 }
    }
}

/// A visual block covering one buffer line (possibly soft-wrapped).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineBlock {
    /// One-based buffer line.
    pub line: usize,
    /// Top offset of the block in content pixels.
    pub top: f64,
    /// Block height in pixels.
    pub height: f64,
}

/// The editable, line-addressed pane.
pub trait BufferView: ScrollSurface {
    /// The line block at or before the given content offset.
    fn line_block_at_offset(&self, offset: f64) -> LineBlock;

    /// Metrics of a one-based line. Out-of-range lines are clamped.
    fn line_block(&self, line: usize) -> LineBlock;

    /// Number of lines in the buffer (at least 1).
    fn total_lines(&self) -> usize;
}

/// An element of the rendered pane tagged with the buffer line it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedElement {
    /// Source line annotation (one-based).
    pub line: f64,
    /// Static layout offset from the top of the scrollable content.
    ///
    /// Cheap to read but may lag the live layout slightly.
    pub layout_top: f64,
}

/// The read-only, pixel-addressed pane.
pub trait RenderedView: ScrollSurface {
    /// Viewport-relative top of the scroll container.
    fn container_top(&self) -> f64;

    /// All annotated elements in document order.
    fn annotated_elements(&self) -> Vec<AnnotatedElement>;

    /// Live viewport-relative top of the element at `index` in
    /// [`RenderedView::annotated_elements`].
    ///
    /// This may force a layout pass on real toolkits, so the line map builder
    /// only calls it for elements near the viewport.
    fn measure_element_top(&self, index: usize) -> f64;
}
