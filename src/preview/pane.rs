use crate::preview::layout::{PreviewBlock, PreviewLayout, PreviewMetrics, layout};
use crate::sync::view::{AnnotatedElement, RenderedView, ScrollSurface};

/// Rendered markdown pane with source-line annotations.
#[derive(Debug)]
pub struct PreviewPane {
    source: String,
    metrics: PreviewMetrics,
    layout: PreviewLayout,
    scroll_top: f64,
    container_top: f64,
    live_shift: f64,
}

impl PreviewPane {
    pub fn from_source(source: &str, metrics: PreviewMetrics) -> Self {
        Self {
            source: source.to_string(),
            layout: layout(source, &metrics),
            metrics,
            scroll_top: 0.0,
            container_top: 0.0,
            live_shift: 0.0,
        }
    }

    /// Re-parse and re-layout after the source changed.
    pub fn set_source(&mut self, source: &str) {
        source.clone_into(&mut self.source);
        self.relayout();
    }

    /// Change the wrap width, e.g. after the pane was resized.
    pub fn set_chars_per_row(&mut self, chars_per_row: usize) {
        self.metrics.chars_per_row = chars_per_row;
        self.relayout();
    }

    pub fn set_client_height(&mut self, client_height: f64) {
        self.metrics.client_height = client_height;
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll());
    }

    /// Viewport offset of the scroll container.
    pub const fn set_container_top(&mut self, container_top: f64) {
        self.container_top = container_top;
    }

    /// Offset live measurements from the static layout, as happens when
    /// late content (fonts, images) settles after layout was recorded.
    pub const fn set_live_shift(&mut self, live_shift: f64) {
        self.live_shift = live_shift;
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn blocks(&self) -> &[PreviewBlock] {
        &self.layout.blocks
    }

    pub const fn metrics(&self) -> PreviewMetrics {
        self.metrics
    }

    fn relayout(&mut self) {
        self.layout = layout(&self.source, &self.metrics);
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll());
    }
}

impl ScrollSurface for PreviewPane {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64) {
        let offset = if offset.is_finite() { offset } else { 0.0 };
        self.scroll_top = offset.clamp(0.0, self.max_scroll());
    }

    fn scroll_height(&self) -> f64 {
        self.layout.content_height
    }

    fn client_height(&self) -> f64 {
        self.metrics.client_height
    }
}

impl RenderedView for PreviewPane {
    fn container_top(&self) -> f64 {
        self.container_top
    }

    fn annotated_elements(&self) -> Vec<AnnotatedElement> {
        self.layout
            .blocks
            .iter()
            .map(|block| AnnotatedElement {
                line: block.source_line as f64,
                layout_top: block.top,
            })
            .collect()
    }

    fn measure_element_top(&self, index: usize) -> f64 {
        let top = self.layout.blocks.get(index).map_or(0.0, |block| block.top);
        top + self.live_shift - self.scroll_top + self.container_top
    }
}
