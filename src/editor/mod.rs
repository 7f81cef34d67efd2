//! Reference text pane.
//!
//! Provides a rope-backed buffer view with soft-wrapped line blocks so the
//! synchronization engine can run without a GUI toolkit.

mod pane;

pub use pane::{EditorMetrics, EditorPane};
