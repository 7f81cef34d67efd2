//! Block layout of markdown source with comrak.
//!
//! Produces a flat, document-ordered list of blocks with stacked pixel
//! offsets. Each block carries the source line comrak reports for it.

use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, parse_document};

/// Kind of a laid-out block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    CodeBlock,
    HtmlBlock,
    ListItem,
    BlockQuote,
    TableRow,
    ThematicBreak,
}

impl BlockKind {
    /// Containers are annotated at their start but take their height from
    /// their children.
    pub const fn is_container(self) -> bool {
        matches!(self, Self::ListItem | Self::BlockQuote)
    }
}

/// A block in the rendered layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewBlock {
    pub kind: BlockKind,
    /// One-based source line of the block's first character.
    pub source_line: usize,
    pub top: f64,
    pub height: f64,
}

/// Typography used to size blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewMetrics {
    /// Height of one text row.
    pub row_height: f64,
    /// Characters per row before text wraps.
    pub chars_per_row: usize,
    /// Vertical space after each block.
    pub block_gap: f64,
    /// Height of the visible area.
    pub client_height: f64,
}

impl Default for PreviewMetrics {
    fn default() -> Self {
        Self {
            row_height: 24.0,
            chars_per_row: 72,
            block_gap: 12.0,
            client_height: 600.0,
        }
    }
}

/// Result of laying out a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewLayout {
    pub blocks: Vec<PreviewBlock>,
    pub content_height: f64,
}

/// Parse `source` and lay out its blocks.
pub fn layout(source: &str, metrics: &PreviewMetrics) -> PreviewLayout {
    let _timer = crate::perf::time("preview.layout");
    let arena = Arena::new();
    let options = create_options();
    let root = parse_document(&arena, source, &options);

    let mut state = LayoutState {
        metrics,
        blocks: Vec::new(),
        cursor: 0.0,
    };
    state.visit(root);
    tracing::debug!(blocks = state.blocks.len(), height = state.cursor, "preview laid out");
    PreviewLayout {
        blocks: state.blocks,
        content_height: state.cursor,
    }
}

fn create_options() -> Options {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.description_lists = true;

    options
}

struct LayoutState<'m> {
    metrics: &'m PreviewMetrics,
    blocks: Vec<PreviewBlock>,
    cursor: f64,
}

impl LayoutState<'_> {
    fn visit<'a>(&mut self, node: &'a AstNode<'a>) {
        let data = node.data.borrow();
        let line = data.sourcepos.start.line;
        match &data.value {
            NodeValue::Heading(heading) => {
                let rows = self.wrapped_rows(&extract_text(node));
                let height = rows as f64 * self.metrics.row_height * heading_scale(heading.level);
                self.push_leaf(BlockKind::Heading(heading.level), line, height, true);
            }
            NodeValue::Paragraph => {
                let rows = self.wrapped_rows(&extract_text(node));
                self.push_rows(BlockKind::Paragraph, line, rows, true);
            }
            NodeValue::CodeBlock(code) => {
                // One extra row for the fence frame.
                let rows = code.literal.lines().count().max(1) + 1;
                self.push_rows(BlockKind::CodeBlock, line, rows, true);
            }
            NodeValue::HtmlBlock(html) => {
                let rows = html.literal.lines().count().max(1);
                self.push_rows(BlockKind::HtmlBlock, line, rows, true);
            }
            NodeValue::ThematicBreak => {
                self.push_rows(BlockKind::ThematicBreak, line, 1, true);
            }
            NodeValue::TableRow(_) => {
                self.push_rows(BlockKind::TableRow, line, 1, false);
            }
            NodeValue::Table(_) => {
                self.visit_children(node);
                self.cursor += self.metrics.block_gap;
            }
            NodeValue::Item(_) | NodeValue::TaskItem(_) => {
                self.push_container(BlockKind::ListItem, line, node);
            }
            NodeValue::BlockQuote => {
                self.push_container(BlockKind::BlockQuote, line, node);
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children<'a>(&mut self, node: &'a AstNode<'a>) {
        for child in node.children() {
            self.visit(child);
        }
    }

    fn push_rows(&mut self, kind: BlockKind, line: usize, rows: usize, gap: bool) {
        let height = rows as f64 * self.metrics.row_height;
        self.push_leaf(kind, line, height, gap);
    }

    fn push_leaf(&mut self, kind: BlockKind, line: usize, height: f64, gap: bool) {
        self.blocks.push(PreviewBlock {
            kind,
            source_line: line,
            top: self.cursor,
            height,
        });
        self.cursor += height;
        if gap {
            self.cursor += self.metrics.block_gap;
        }
    }

    fn push_container<'a>(&mut self, kind: BlockKind, line: usize, node: &'a AstNode<'a>) {
        let index = self.blocks.len();
        let top = self.cursor;
        self.blocks.push(PreviewBlock {
            kind,
            source_line: line,
            top,
            height: 0.0,
        });
        self.visit_children(node);
        self.blocks[index].height = self.cursor - top;
    }

    fn wrapped_rows(&self, text: &str) -> usize {
        let columns = self.metrics.chars_per_row.max(1);
        text.split('\n')
            .map(|segment| segment.chars().count().div_ceil(columns).max(1))
            .sum::<usize>()
            .max(1)
    }
}

const fn heading_scale(level: u8) -> f64 {
    match level {
        1 => 2.0,
        2 => 1.5,
        3 => 1.25,
        _ => 1.0,
    }
}

fn extract_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        extract_text_recursive(child, &mut text);
    }
    text
}

fn extract_text_recursive<'a>(node: &'a AstNode<'a>, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => text.push_str(t),
        NodeValue::Code(code) => text.push_str(&code.literal),
        NodeValue::SoftBreak => text.push(' '),
        NodeValue::LineBreak => text.push('\n'),
        _ => {
            for child in node.children() {
                extract_text_recursive(child, text);
            }
        }
    }
}
