//! Piecewise-linear conversion between buffer lines and rendered offsets.
//!
//! Everything here is pure: for a given map and request the result is
//! bit-for-bit reproducible, which is what lets the offload worker and the
//! synchronous path stand in for each other.

use crate::sync::line_map::{LineMap, LineMapEntry};
use crate::sync::SyncDirection;

/// Coordinate axis of a [`LineMapEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Line,
    Y,
}

impl Axis {
    const fn of(self, entry: &LineMapEntry) -> f64 {
        match self {
            Self::Line => entry.line,
            Self::Y => entry.y,
        }
    }
}

impl LineMap {
    /// Map `value` on the `input` axis to the `output` axis.
    ///
    /// Values outside the map clamp to the first or last entry. An exact hit
    /// returns that entry's output (the first one when several entries share
    /// the input value).
    pub fn interpolate(&self, value: f64, input: Axis, output: Axis) -> f64 {
        let entries = self.entries();
        let idx = entries.partition_point(|e| input.of(e) < value);

        if idx == entries.len() {
            return output.of(&self.last());
        }
        let p2 = &entries[idx];
        if idx == 0 || input.of(p2) == value {
            return output.of(p2);
        }
        let p1 = &entries[idx - 1];

        let span = input.of(p2) - input.of(p1);
        if span <= 0.0 {
            return output.of(p1);
        }
        let ratio = (value - input.of(p1)) / span;
        output.of(p1) + ratio * (output.of(p2) - output.of(p1))
    }

    /// Fractional buffer line shown at rendered offset `y`.
    pub fn line_at(&self, y: f64) -> f64 {
        self.interpolate(y, Axis::Y, Axis::Line)
    }

    /// Rendered offset of a fractional buffer line.
    pub fn y_at(&self, line: f64) -> f64 {
        self.interpolate(line, Axis::Line, Axis::Y)
    }
}

/// Scroll geometry of one pane at the time a request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaneExtent {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl PaneExtent {
    pub fn max_scroll(&self) -> f64 {
        let max = self.scroll_height - self.client_height;
        if max.is_finite() { max.max(0.0) } else { 0.0 }
    }

    /// Scroll position as a share of the scrollable range, in `[0, 1]`.
    /// A pane that cannot scroll sits at 0.
    pub fn scroll_fraction(&self) -> f64 {
        let max = self.max_scroll();
        if max <= 0.0 || !self.scroll_top.is_finite() {
            return 0.0;
        }
        (self.scroll_top / max).clamp(0.0, 1.0)
    }
}

/// A request to map a position from one pane into the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncRequest {
    /// Per-direction sequence number used to drop superseded results.
    pub seq: u64,
    pub direction: SyncDirection,
    /// Fractional line for `BufferToRendered`, pixel offset for
    /// `RenderedToBuffer`.
    pub value: f64,
    pub buffer: PaneExtent,
    pub rendered: PaneExtent,
}

/// Where a resolved request lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncTarget {
    /// Rendered pane offset in pixels.
    Rendered(f64),
    /// Fractional buffer line; the caller converts it with the buffer's
    /// line metrics.
    Line(f64),
    /// Buffer offset in pixels.
    Buffer(f64),
}

impl SyncTarget {
    pub const fn value(self) -> f64 {
        match self {
            Self::Rendered(v) | Self::Line(v) | Self::Buffer(v) => v,
        }
    }

    pub fn is_finite(self) -> bool {
        self.value().is_finite()
    }
}

/// Compute the target of a sync request.
///
/// With annotations the position is interpolated through the map: a
/// rendered offset for `BufferToRendered`, a fractional buffer line for
/// `RenderedToBuffer`. A degenerate map (no annotations) maps the source
/// pane's scroll fraction onto the target pane's scroll range.
pub fn resolve(map: &LineMap, request: &SyncRequest) -> SyncTarget {
    if map.is_degenerate() {
        return resolve_proportional(request);
    }
    match request.direction {
        SyncDirection::BufferToRendered => SyncTarget::Rendered(map.y_at(request.value)),
        SyncDirection::RenderedToBuffer => SyncTarget::Line(map.line_at(request.value)),
    }
}

fn resolve_proportional(request: &SyncRequest) -> SyncTarget {
    match request.direction {
        SyncDirection::BufferToRendered => SyncTarget::Rendered(
            request.buffer.scroll_fraction() * request.rendered.max_scroll(),
        ),
        SyncDirection::RenderedToBuffer => SyncTarget::Buffer(
            request.rendered.scroll_fraction() * request.buffer.max_scroll(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::line_map::LineMapEntry;

    fn sample_map() -> LineMap {
        LineMap::from_points(
            vec![
                LineMapEntry::new(1.0, 0.0),
                LineMapEntry::new(10.0, 500.0),
                LineMapEntry::new(50.0, 2000.0),
            ],
            50,
            2000.0,
        )
    }

    /// Buffer: 50 lines of 20px in a 400px viewport (max 600). Rendered:
    /// 2300px in a 300px viewport (max 2000).
    fn request(direction: SyncDirection, value: f64) -> SyncRequest {
        SyncRequest {
            seq: 1,
            direction,
            value,
            buffer: PaneExtent {
                scroll_top: 0.0,
                scroll_height: 1000.0,
                client_height: 400.0,
            },
            rendered: PaneExtent {
                scroll_top: 0.0,
                scroll_height: 2300.0,
                client_height: 300.0,
            },
        }
    }

    #[test]
    fn test_line_to_y_inside_bracket() {
        assert_eq!(sample_map().y_at(25.0), 1062.5);
    }

    #[test]
    fn test_y_to_line_inside_bracket() {
        assert_eq!(sample_map().line_at(250.0), 5.5);
    }

    #[test]
    fn test_exact_entry_hits_return_entry() {
        let map = sample_map();
        assert_eq!(map.y_at(10.0), 500.0);
        assert_eq!(map.line_at(2000.0), 50.0);
    }

    #[test]
    fn test_values_below_map_clamp_to_first_entry() {
        let map = sample_map();
        assert_eq!(map.y_at(-3.0), 0.0);
        assert_eq!(map.line_at(-40.0), 1.0);
    }

    #[test]
    fn test_values_above_map_clamp_to_last_entry() {
        let map = sample_map();
        assert_eq!(map.y_at(80.0), 2000.0);
        assert_eq!(map.line_at(9000.0), 50.0);
    }

    #[test]
    fn test_tied_offsets_resolve_to_first_line() {
        let map = LineMap::from_points(
            vec![
                LineMapEntry::new(1.0, 0.0),
                LineMapEntry::new(3.0, 100.0),
                LineMapEntry::new(4.0, 100.0),
                LineMapEntry::new(8.0, 300.0),
            ],
            8,
            300.0,
        );
        assert_eq!(map.line_at(100.0), 3.0);
        // Between the tie and the next entry, interpolation starts from the
        // last tied entry.
        assert_eq!(map.line_at(200.0), 6.0);
    }

    #[test]
    fn test_single_entry_map_returns_origin() {
        let map = LineMap::default();
        assert_eq!(map.y_at(12.0), 0.0);
        assert_eq!(map.line_at(500.0), 1.0);
    }

    #[test]
    fn test_nan_input_clamps_to_an_entry() {
        let map = sample_map();
        let y = map.y_at(f64::NAN);
        assert!(map.entries().iter().any(|e| e.y == y));
    }

    #[test]
    fn test_resolve_uses_interpolation_for_real_maps() {
        let map = sample_map();
        assert_eq!(
            resolve(&map, &request(SyncDirection::BufferToRendered, 25.0)),
            SyncTarget::Rendered(1062.5)
        );
        assert_eq!(
            resolve(&map, &request(SyncDirection::RenderedToBuffer, 250.0)),
            SyncTarget::Line(5.5)
        );
    }

    #[test]
    fn test_resolve_proportional_follows_scroll_fraction() {
        let map = LineMap::default();
        // Buffer at 300 of 600 is halfway; rendered max is 2000.
        let mut req = request(SyncDirection::BufferToRendered, 16.0);
        req.buffer.scroll_top = 300.0;
        assert_eq!(resolve(&map, &req), SyncTarget::Rendered(1000.0));

        // Rendered at 500 of 2000 is a quarter; buffer max is 600.
        let mut req = request(SyncDirection::RenderedToBuffer, 500.0);
        req.rendered.scroll_top = 500.0;
        assert_eq!(resolve(&map, &req), SyncTarget::Buffer(150.0));
    }

    #[test]
    fn test_resolve_proportional_ignores_line_position() {
        let map = LineMap::default();
        // The top visible line never reaches the last line, but a buffer
        // scrolled to its end is at 100%.
        let mut req = request(SyncDirection::BufferToRendered, 31.0);
        req.buffer.scroll_top = 600.0;
        assert_eq!(resolve(&map, &req), SyncTarget::Rendered(2000.0));
    }

    #[test]
    fn test_resolve_proportional_handles_unscrollable_panes() {
        let map = LineMap::default();
        let mut req = request(SyncDirection::RenderedToBuffer, 10.0);
        req.rendered.scroll_top = 10.0;
        req.rendered.scroll_height = 100.0;
        assert_eq!(resolve(&map, &req), SyncTarget::Buffer(0.0));

        let mut req = request(SyncDirection::BufferToRendered, 1.0);
        req.buffer.scroll_top = 5.0;
        req.buffer.scroll_height = 200.0;
        assert_eq!(resolve(&map, &req), SyncTarget::Rendered(0.0));

        let mut req = request(SyncDirection::BufferToRendered, 1.0);
        req.buffer.scroll_top = f64::NAN;
        assert_eq!(resolve(&map, &req), SyncTarget::Rendered(0.0));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn strictly_increasing_map() -> impl Strategy<Value = LineMap> {
            proptest::collection::vec((1..40u32, 1..400u32), 1..60).prop_map(|steps| {
                let mut line = 1.0;
                let mut y = 0.0;
                let mut points = vec![LineMapEntry::new(line, y)];
                for (dl, dy) in steps {
                    line += f64::from(dl);
                    y += f64::from(dy);
                    points.push(LineMapEntry::new(line, y));
                }
                let total = line as usize;
                LineMap::from_points(points, total, y)
            })
        }

        proptest! {
            #[test]
            fn round_trip_through_y_returns_line(map in strictly_increasing_map()) {
                for entry in map.entries() {
                    let y = map.y_at(entry.line);
                    let line = map.line_at(y);
                    prop_assert!((line - entry.line).abs() < 1e-9);
                }
            }

            #[test]
            fn interpolation_stays_within_map_bounds(
                map in strictly_increasing_map(),
                value in -100.0..5000.0f64,
            ) {
                let y = map.y_at(value);
                prop_assert!(y >= map.first().y && y <= map.last().y);
                let line = map.line_at(value);
                prop_assert!(line >= map.first().line && line <= map.last().line);
            }

            #[test]
            fn interpolation_is_monotonic(
                map in strictly_increasing_map(),
                a in 0.0..2000.0f64,
                b in 0.0..2000.0f64,
            ) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(map.y_at(lo) <= map.y_at(hi));
                prop_assert!(map.line_at(lo) <= map.line_at(hi));
            }
        }
    }
}
