//! Reference rendered pane.
//!
//! Lays out markdown with comrak and annotates each block with its source
//! line, the way a real preview tags elements for scroll sync.

mod layout;
mod pane;

pub use layout::{BlockKind, PreviewBlock, PreviewLayout, PreviewMetrics, layout};
pub use pane::PreviewPane;
