// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. sync::SyncRequest)
    clippy::module_name_repetitions
)]

//! # Panesync
//!
//! Scroll synchronization for two-pane editors.
//!
//! Keeps a line-addressed source pane and a pixel-addressed rendered pane
//! aligned while either one scrolls:
//! - Piecewise-linear line map built from source-line annotations
//! - Feedback-free coordination with an active-source lock
//! - Throttled, frame-batched scroll writes
//! - Optional background thread for the interpolation
//! - Eased programmatic jumps
//!
//! ## Architecture
//!
//! The engine only talks to panes through the [`sync::BufferView`] and
//! [`sync::RenderedView`] traits. The host drives it with timestamps:
//! scroll notifications, content changes and one `on_frame` call per
//! display refresh.
//!
//! ## Modules
//!
//! - [`sync`]: Line map, interpolation, offload worker and coordinator
//! - [`config`]: Options and config file layering
//! - [`editor`]: Reference text pane backed by a rope
//! - [`preview`]: Reference markdown pane laid out with comrak
//! - [`perf`]: Stage timings and the sync decision log
//! - [`error`]: Error types

pub mod config;
pub mod editor;
pub mod error;
pub mod perf;
pub mod preview;
pub mod sync;

pub use error::SyncError;
