use ropey::Rope;

use crate::sync::view::{BufferView, LineBlock, ScrollSurface};

/// Row geometry for the text pane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorMetrics {
    /// Height of one visual row in pixels.
    pub row_height: f64,
    /// Characters per visual row before a line soft-wraps.
    pub wrap_columns: usize,
    /// Height of the visible area in pixels.
    pub client_height: f64,
}

impl Default for EditorMetrics {
    fn default() -> Self {
        Self {
            row_height: 20.0,
            wrap_columns: 80,
            client_height: 600.0,
        }
    }
}

/// A rope-backed text pane with soft-wrapped lines.
///
/// Every buffer line occupies one or more rows. Block tops are kept as a
/// prefix sum so offset lookups are a binary search.
pub struct EditorPane {
    rope: Rope,
    metrics: EditorMetrics,
    /// `tops[i]` is the top of zero-based line `i`; the last element is the
    /// content height.
    tops: Vec<f64>,
    scroll_top: f64,
}

impl EditorPane {
    pub fn from_text(text: &str, metrics: EditorMetrics) -> Self {
        let mut pane = Self {
            rope: Rope::from_str(text),
            metrics,
            tops: Vec::new(),
            scroll_top: 0.0,
        };
        pane.relayout();
        pane
    }

    /// Replace the whole text. The scroll offset is kept but clamped.
    pub fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.relayout();
    }

    /// Change the wrap width, e.g. after the pane was resized.
    pub fn set_wrap_columns(&mut self, wrap_columns: usize) {
        self.metrics.wrap_columns = wrap_columns;
        self.relayout();
    }

    pub fn set_client_height(&mut self, client_height: f64) {
        self.metrics.client_height = client_height;
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll());
    }

    pub const fn metrics(&self) -> EditorMetrics {
        self.metrics
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Content of a zero-based line without its line ending.
    pub fn line_at(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(line_idx).to_string();
        Some(line.trim_end_matches('\n').trim_end_matches('\r').to_string())
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Number of visual rows a zero-based line occupies.
    pub fn rows_for_line(&self, line_idx: usize) -> usize {
        let chars = self.line_at(line_idx).map_or(0, |line| line.chars().count());
        let columns = self.metrics.wrap_columns.max(1);
        chars.div_ceil(columns).max(1)
    }

    fn relayout(&mut self) {
        let lines = self.rope.len_lines();
        let mut tops = Vec::with_capacity(lines + 1);
        let mut top = 0.0;
        for line_idx in 0..lines {
            tops.push(top);
            top += self.rows_for_line(line_idx) as f64 * self.metrics.row_height;
        }
        tops.push(top);
        self.tops = tops;
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll());
    }

    fn block_for_index(&self, line_idx: usize) -> LineBlock {
        let last = self.tops.len().saturating_sub(2);
        let line_idx = line_idx.min(last);
        let top = self.tops.get(line_idx).copied().unwrap_or(0.0);
        let bottom = self.tops.get(line_idx + 1).copied().unwrap_or(top);
        LineBlock {
            line: line_idx + 1,
            top,
            height: bottom - top,
        }
    }
}

impl ScrollSurface for EditorPane {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64) {
        let offset = if offset.is_finite() { offset } else { 0.0 };
        self.scroll_top = offset.clamp(0.0, self.max_scroll());
    }

    fn scroll_height(&self) -> f64 {
        self.tops.last().copied().unwrap_or(0.0)
    }

    fn client_height(&self) -> f64 {
        self.metrics.client_height
    }
}

impl BufferView for EditorPane {
    fn line_block_at_offset(&self, offset: f64) -> LineBlock {
        // First line whose bottom lies below the offset.
        let lines = self.tops.len().saturating_sub(1);
        let line_idx = self.tops[1..].partition_point(|&bottom| bottom <= offset);
        self.block_for_index(line_idx.min(lines.saturating_sub(1)))
    }

    fn line_block(&self, line: usize) -> LineBlock {
        self.block_for_index(line.saturating_sub(1))
    }

    fn total_lines(&self) -> usize {
        self.rope.len_lines().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(wrap_columns: usize) -> EditorMetrics {
        EditorMetrics {
            row_height: 10.0,
            wrap_columns,
            client_height: 30.0,
        }
    }

    #[test]
    fn test_empty_pane_has_one_line() {
        let pane = EditorPane::from_text("", metrics(80));
        assert_eq!(pane.total_lines(), 1);
        assert_eq!(pane.scroll_height(), 10.0);
        assert_eq!(pane.line_block(1).height, 10.0);
    }

    #[test]
    fn test_long_lines_soft_wrap() {
        let pane = EditorPane::from_text("short\n0123456789abcdefghij\nend", metrics(8));
        assert_eq!(pane.rows_for_line(1), 3);
        assert_eq!(
            pane.line_block(2),
            LineBlock {
                line: 2,
                top: 10.0,
                height: 30.0
            }
        );
        assert_eq!(pane.line_block(3).top, 40.0);
        assert_eq!(pane.scroll_height(), 50.0);
    }

    #[test]
    fn test_line_block_at_offset_finds_wrapped_block() {
        let pane = EditorPane::from_text("a\n0123456789abcdefghij\nb", metrics(8));
        assert_eq!(pane.line_block_at_offset(0.0).line, 1);
        assert_eq!(pane.line_block_at_offset(10.0).line, 2);
        assert_eq!(pane.line_block_at_offset(39.9).line, 2);
        assert_eq!(pane.line_block_at_offset(40.0).line, 3);
        assert_eq!(pane.line_block_at_offset(1e6).line, 3);
        assert_eq!(pane.line_block_at_offset(-5.0).line, 1);
    }

    #[test]
    fn test_line_block_clamps_out_of_range_lines() {
        let pane = EditorPane::from_text("a\nb\nc", metrics(80));
        assert_eq!(pane.line_block(0).line, 1);
        assert_eq!(pane.line_block(99).line, 3);
    }

    #[test]
    fn test_set_scroll_top_clamps_to_range() {
        let mut pane = EditorPane::from_text("1\n2\n3\n4\n5\n6", metrics(80));
        pane.set_scroll_top(1000.0);
        assert_eq!(pane.scroll_top(), 30.0);
        pane.set_scroll_top(-4.0);
        assert_eq!(pane.scroll_top(), 0.0);
        pane.set_scroll_top(f64::NAN);
        assert_eq!(pane.scroll_top(), 0.0);
    }

    #[test]
    fn test_set_text_relayouts_and_clamps_scroll() {
        let mut pane = EditorPane::from_text("1\n2\n3\n4\n5\n6", metrics(80));
        pane.set_scroll_top(30.0);
        pane.set_text("only\ntwo");
        assert_eq!(pane.total_lines(), 2);
        assert_eq!(pane.scroll_top(), 0.0);
        assert_eq!(pane.line_at(1), Some("two".to_string()));
    }

    #[test]
    fn test_narrower_wrap_grows_content() {
        let mut pane = EditorPane::from_text("0123456789", metrics(80));
        assert_eq!(pane.scroll_height(), 10.0);
        pane.set_wrap_columns(5);
        assert_eq!(pane.scroll_height(), 20.0);
    }

    #[test]
    fn test_trailing_newline_adds_empty_line() {
        let pane = EditorPane::from_text("hello\n", metrics(80));
        assert_eq!(pane.line_count(), 2);
        assert_eq!(pane.line_at(1), Some(String::new()));
    }
}
