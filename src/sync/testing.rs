//! Test doubles for the view traits.

use std::cell::Cell;

use crate::sync::view::{
    AnnotatedElement, BufferView, LineBlock, RenderedView, ScrollSurface,
};

/// A rendered pane with fixed annotated elements.
#[derive(Debug)]
pub struct FakeRendered {
    pub elements: Vec<AnnotatedElement>,
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
    pub container_top: f64,
    /// Difference between live and static layout offsets.
    pub live_shift: f64,
    pub measure_calls: Cell<usize>,
    pub writes: Vec<f64>,
}

impl FakeRendered {
    pub fn new(elements: Vec<(f64, f64)>, scroll_height: f64, client_height: f64) -> Self {
        Self {
            elements: elements
                .into_iter()
                .map(|(line, layout_top)| AnnotatedElement { line, layout_top })
                .collect(),
            scroll_top: 0.0,
            scroll_height,
            client_height,
            container_top: 0.0,
            live_shift: 0.0,
            measure_calls: Cell::new(0),
            writes: Vec::new(),
        }
    }
}

impl ScrollSurface for FakeRendered {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64) {
        self.scroll_top = offset.clamp(0.0, self.max_scroll());
        self.writes.push(self.scroll_top);
    }

    fn scroll_height(&self) -> f64 {
        self.scroll_height
    }

    fn client_height(&self) -> f64 {
        self.client_height
    }
}

impl RenderedView for FakeRendered {
    fn container_top(&self) -> f64 {
        self.container_top
    }

    fn annotated_elements(&self) -> Vec<AnnotatedElement> {
        self.elements.clone()
    }

    fn measure_element_top(&self, index: usize) -> f64 {
        self.measure_calls.set(self.measure_calls.get() + 1);
        let layout_top = self.elements.get(index).map_or(0.0, |e| e.layout_top);
        layout_top + self.live_shift - self.scroll_top + self.container_top
    }
}

/// A buffer pane with uniform line height and no wrapping.
#[derive(Debug)]
pub struct FakeBuffer {
    pub lines: usize,
    pub line_height: f64,
    pub client_height: f64,
    pub scroll_top: f64,
    pub writes: Vec<f64>,
}

impl FakeBuffer {
    pub const fn new(lines: usize, line_height: f64, client_height: f64) -> Self {
        Self {
            lines,
            line_height,
            client_height,
            scroll_top: 0.0,
            writes: Vec::new(),
        }
    }
}

impl ScrollSurface for FakeBuffer {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64) {
        self.scroll_top = offset.clamp(0.0, self.max_scroll());
        self.writes.push(self.scroll_top);
    }

    fn scroll_height(&self) -> f64 {
        self.lines as f64 * self.line_height
    }

    fn client_height(&self) -> f64 {
        self.client_height
    }
}

impl BufferView for FakeBuffer {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn line_block_at_offset(&self, offset: f64) -> LineBlock {
        let index = (offset.max(0.0) / self.line_height).floor() as usize;
        self.line_block(index + 1)
    }

    fn line_block(&self, line: usize) -> LineBlock {
        let line = line.clamp(1, self.total_lines());
        LineBlock {
            line,
            top: (line - 1) as f64 * self.line_height,
            height: self.line_height,
        }
    }

    fn total_lines(&self) -> usize {
        self.lines.max(1)
    }
}
