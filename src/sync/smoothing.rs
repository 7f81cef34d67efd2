//! Eased scrolling for programmatic jumps.

use crate::sync::view::ScrollSource;

/// Cubic ease-out: fast start, gentle landing.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

/// An in-progress animated scroll of one pane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation {
    pane: ScrollSource,
    from: f64,
    to: f64,
    start_ms: u64,
    duration_ms: u64,
}

impl ScrollAnimation {
    pub const fn new(pane: ScrollSource, from: f64, to: f64, start_ms: u64, duration_ms: u64) -> Self {
        Self {
            pane,
            from,
            to,
            start_ms,
            duration_ms,
        }
    }

    /// The pane being driven.
    pub const fn pane(&self) -> ScrollSource {
        self.pane
    }

    pub const fn target(&self) -> f64 {
        self.to
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now_ms: u64) -> f64 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.start_ms) as f64;
        (elapsed / self.duration_ms as f64).min(1.0)
    }

    /// Eased offset at `now_ms`. Lands exactly on the target when done.
    pub fn offset_at(&self, now_ms: u64) -> f64 {
        let t = self.progress(now_ms);
        if t >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * ease_out_cubic(t)
    }

    pub fn is_finished(&self, now_ms: u64) -> bool {
        self.progress(now_ms) >= 1.0
    }
}
