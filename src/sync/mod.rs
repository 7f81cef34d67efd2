//! Scroll synchronization engine.
//!
//! Keeps a line-addressed buffer pane and a pixel-addressed rendered pane
//! aligned while either one is scrolled:
//! - [`line_map`]: builds the line → offset map from rendered annotations
//! - [`interpolate`]: converts between the two addressing systems
//! - [`offload`]: optional worker thread running the conversion
//! - [`coordinator`]: routes scroll notifications, owns the feedback lock,
//!   throttles and frame-batches writes
//! - [`smoothing`]: eased programmatic jumps

pub mod coordinator;
pub mod debounce;
pub mod interpolate;
pub mod line_map;
pub mod offload;
pub mod smoothing;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{ActiveSource, NotificationOutcome, SyncCoordinator, SyncStats};
pub use interpolate::{Axis, PaneExtent, SyncRequest, SyncTarget, resolve};
pub use line_map::{LineMap, LineMapBuilder, LineMapEntry};
pub use offload::{OffloadRequest, OffloadResponse, OffloadWorker};
pub use view::{AnnotatedElement, BufferView, LineBlock, RenderedView, ScrollSource, ScrollSurface};

/// Which way a position is being mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDirection {
    BufferToRendered,
    RenderedToBuffer,
}

impl SyncDirection {
    /// Both directions, in slot order.
    pub const ALL: [Self; 2] = [Self::BufferToRendered, Self::RenderedToBuffer];

    /// The direction driven by scrolling `source`.
    pub const fn from_source(source: ScrollSource) -> Self {
        match source {
            ScrollSource::Buffer => Self::BufferToRendered,
            ScrollSource::Rendered => Self::RenderedToBuffer,
        }
    }

    /// Pane whose scroll position is read.
    pub const fn source(self) -> ScrollSource {
        match self {
            Self::BufferToRendered => ScrollSource::Buffer,
            Self::RenderedToBuffer => ScrollSource::Rendered,
        }
    }

    /// Pane whose scroll position is written.
    pub const fn target(self) -> ScrollSource {
        self.source().opposite()
    }

    /// Stable slot index for per-direction state.
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::BufferToRendered => 0,
            Self::RenderedToBuffer => 1,
        }
    }
}
