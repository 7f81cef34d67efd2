//! Line map construction.
//!
//! The rendered pane tags block elements with the buffer line they came from.
//! [`LineMapBuilder`] turns those tags into a sanitized, piecewise-linear
//! [`LineMap`] from buffer lines to rendered content offsets.

use serde::{Deserialize, Serialize};

use crate::perf::{self, SyncEvent};
use crate::sync::view::RenderedView;

/// One point of the line map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineMapEntry {
    /// One-based buffer line; fractional values address part of a tall block.
    pub line: f64,
    /// Offset from the top of the rendered content (not the viewport).
    pub y: f64,
}

impl LineMapEntry {
    pub const fn new(line: f64, y: f64) -> Self {
        Self { line, y }
    }
}

/// The anchor every map starts with.
pub const ORIGIN: LineMapEntry = LineMapEntry::new(1.0, 0.0);

/// A sanitized line map.
///
/// Invariants:
/// - never empty, and `entries()[0] == ORIGIN`
/// - `line` strictly increases and `y` never decreases between neighbours
///
/// A map is immutable once built; rebuilds produce a new map.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMap {
    entries: Vec<LineMapEntry>,
}

impl Default for LineMap {
    fn default() -> Self {
        Self {
            entries: vec![ORIGIN],
        }
    }
}

impl LineMap {
    /// Sanitize raw annotated points into a map.
    ///
    /// Points are sorted by line; points that do not advance the line or that
    /// would move `y` backwards are dropped. The first point is anchored at
    /// [`ORIGIN`], and a trailing `{total_lines, scroll_height}` point is
    /// appended when the annotations stop short of the end of the buffer.
    pub fn from_points(
        mut points: Vec<LineMapEntry>,
        total_lines: usize,
        scroll_height: f64,
    ) -> Self {
        points.retain(|p| p.line.is_finite() && p.y.is_finite());
        points.sort_by(|a, b| a.line.total_cmp(&b.line));

        let mut kept: Vec<LineMapEntry> = Vec::with_capacity(points.len() + 2);
        for point in points {
            if let Some(last) = kept.last()
                && (point.line <= last.line || point.y < last.y)
            {
                continue;
            }
            kept.push(point);
        }

        let annotated = !kept.is_empty();
        match kept.first_mut() {
            Some(first) if first.line <= 1.0 => *first = ORIGIN,
            _ => kept.insert(0, ORIGIN),
        }
        // Anchoring a sub-1 first line can leave a follower at or below line 1.
        kept.dedup_by(|next, prev| next.line <= prev.line);

        if annotated
            && let Some(last) = kept.last().copied()
        {
            let total = total_lines.max(1) as f64;
            if scroll_height.is_finite() && scroll_height > last.y && last.line < total {
                kept.push(LineMapEntry::new(total, scroll_height));
            }
        }

        Self { entries: kept }
    }

    /// Wrap entries that are already sanitized (e.g. a snapshot received
    /// from another thread). Empty input yields the default map.
    pub(crate) fn from_sanitized(entries: Vec<LineMapEntry>) -> Self {
        if entries.is_empty() {
            return Self::default();
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[LineMapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a map holds at least the origin.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the map holds only the origin, i.e. the rendered pane had no
    /// usable annotations. Callers fall back to proportional scrolling.
    pub fn is_degenerate(&self) -> bool {
        self.entries.len() < 2
    }

    pub fn first(&self) -> LineMapEntry {
        self.entries[0]
    }

    pub fn last(&self) -> LineMapEntry {
        self.entries[self.entries.len() - 1]
    }
}

/// Builds line maps from a rendered view.
#[derive(Debug, Clone, Copy)]
pub struct LineMapBuilder {
    visibility_margin: f64,
}

impl LineMapBuilder {
    /// `visibility_margin` is the distance (px) around the viewport inside
    /// which elements are measured live; farther elements use their static
    /// layout offset.
    pub const fn new(visibility_margin: f64) -> Self {
        Self { visibility_margin }
    }

    pub fn build<R>(&self, view: &R, total_lines: usize) -> LineMap
    where
        R: RenderedView + ?Sized,
    {
        let _timer = perf::time("line_map.build");
        let elements = view.annotated_elements();
        let scroll_top = view.scroll_top();
        let container_top = view.container_top();
        let margin = self.visibility_margin.max(0.0);
        let near = (scroll_top - margin)..=(scroll_top + view.client_height() + margin);

        let mut measured = 0_usize;
        let points = elements
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let y = if near.contains(&element.layout_top) {
                    measured += 1;
                    view.measure_element_top(index) - container_top + scroll_top
                } else {
                    element.layout_top
                };
                LineMapEntry::new(element.line, y)
            })
            .collect::<Vec<_>>();

        let map = LineMap::from_points(points, total_lines, view.scroll_height());
        tracing::debug!(
            elements = elements.len(),
            measured,
            entries = map.len(),
            "line map rebuilt"
        );
        perf::record(&SyncEvent::MapRebuilt {
            elements: elements.len(),
            measured,
            entries: map.len(),
        });
        map
    }
}
