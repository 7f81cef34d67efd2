//! The synchronization coordinator.
//!
//! [`SyncCoordinator`] owns both panes, the current line map and the
//! active-source lock. The host feeds it scroll notifications and display
//! refresh callbacks with millisecond timestamps; the coordinator decides
//! which pane drives, computes the other pane's target (inline or on the
//! offload worker) and writes at most one offset per pane per frame.

use std::sync::Arc;

use crate::config::SyncOptions;
use crate::error::SyncError;
use crate::perf::{self, SyncEvent};
use crate::sync::SyncDirection;
use crate::sync::debounce::{RebuildDebouncer, Throttle};
use crate::sync::interpolate::{PaneExtent, SyncRequest, SyncTarget, resolve};
use crate::sync::line_map::{LineMap, LineMapBuilder};
use crate::sync::offload::{OffloadResponse, OffloadWorker};
use crate::sync::smoothing::ScrollAnimation;
use crate::sync::view::{BufferView, RenderedView, ScrollSource};

/// Distance (px) from either end of a pane that counts as "at the edge".
pub const EDGE_SNAP_PX: f64 = 2.0;

/// The pane currently driving synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveSource {
    #[default]
    None,
    Buffer,
    Rendered,
}

impl From<ScrollSource> for ActiveSource {
    fn from(source: ScrollSource) -> Self {
        match source {
            ScrollSource::Buffer => Self::Buffer,
            ScrollSource::Rendered => Self::Rendered,
        }
    }
}

/// Feedback lock with a quiet-period release.
#[derive(Debug, Clone)]
struct SourceLock {
    active: ActiveSource,
    last_event_ms: u64,
    quiet_ms: u64,
}

impl SourceLock {
    const fn new(quiet_ms: u64) -> Self {
        Self {
            active: ActiveSource::None,
            last_event_ms: 0,
            quiet_ms,
        }
    }

    fn is_held_by(&self, source: ScrollSource) -> bool {
        self.active == ActiveSource::from(source)
    }

    fn expire(&mut self, now_ms: u64) {
        if self.active != ActiveSource::None
            && now_ms.saturating_sub(self.last_event_ms) >= self.quiet_ms
        {
            tracing::debug!(released = ?self.active, "active source released");
            self.active = ActiveSource::None;
        }
    }

    fn acquire(&mut self, source: ScrollSource, now_ms: u64) {
        let next = ActiveSource::from(source);
        if self.active != next {
            tracing::debug!(from = ?self.active, to = ?next, "active source changed");
        }
        self.active = next;
        self.last_event_ms = now_ms;
    }
}

/// What happened to a scroll notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The other pane holds the lock; this was an echo of our own write.
    Ignored,
    /// A sync computation will run on the next frame.
    Scheduled,
    /// Collapsed into a trailing computation.
    Throttled,
}

/// A sync request waiting for an offload result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSyncRequest {
    pub seq: u64,
    pub direction: SyncDirection,
    pub issued_at_ms: u64,
}

/// Counters for observing the coordinator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub buffer_writes: u64,
    pub rendered_writes: u64,
    pub ignored_notifications: u64,
    pub below_threshold: u64,
    pub stale_results: u64,
    pub offload_results: u64,
    pub inline_results: u64,
    pub map_rebuilds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingWrite {
    offset: f64,
    /// Edge snaps bypass the pixel threshold.
    exact: bool,
}

/// Keeps a buffer pane and a rendered pane scrolled to the same content.
///
/// Single-threaded: every method takes the host's current timestamp, and
/// pane writes only happen inside [`Self::on_frame`] (or a jump). The
/// optional offload worker is the only other thread involved.
pub struct SyncCoordinator<B, R> {
    buffer: B,
    rendered: R,
    options: SyncOptions,
    builder: LineMapBuilder,
    line_map: Arc<LineMap>,
    lock: SourceLock,
    throttles: [Throttle; 2],
    scheduled: [bool; 2],
    writes: [Option<PendingWrite>; 2],
    in_flight: [Option<PendingSyncRequest>; 2],
    last_seq: [u64; 2],
    offload: Option<OffloadWorker>,
    offload_failed: bool,
    rebuild: RebuildDebouncer,
    content_dirty: bool,
    animation: Option<ScrollAnimation>,
    now_ms: u64,
    stats: SyncStats,
}

impl<B, R> std::fmt::Debug for SyncCoordinator<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("active", &self.lock.active)
            .field("map_entries", &self.line_map.len())
            .field("offload", &self.offload.is_some())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<B, R> SyncCoordinator<B, R>
where
    B: BufferView,
    R: RenderedView,
{
    /// Create a coordinator. The line map starts as the origin only; call
    /// [`Self::rebuild_line_map`] or [`Self::mark_content_dirty`] once the
    /// rendered pane has content.
    ///
    /// When `options.use_offload` is set a worker thread is started; if that
    /// fails the coordinator logs a warning and runs everything inline.
    /// Out-of-range options are logged and replaced (see
    /// [`SyncOptions::sanitized`]); a zero lock quiet period would let the
    /// pane we just wrote drive the sync straight back.
    pub fn new(buffer: B, rendered: R, options: SyncOptions) -> Self {
        if let Err(err) = options.validate() {
            tracing::warn!(error = %err, "invalid sync options, using nearest valid values");
        }
        let options = options.sanitized();
        let use_offload = options.use_offload;
        let mut coordinator = Self {
            buffer,
            rendered,
            builder: LineMapBuilder::new(options.visibility_margin),
            line_map: Arc::new(LineMap::default()),
            lock: SourceLock::new(options.lock_quiet_ms),
            throttles: [
                Throttle::new(options.throttle_interval_ms),
                Throttle::new(options.throttle_interval_ms),
            ],
            scheduled: [false; 2],
            writes: [None; 2],
            in_flight: [None; 2],
            last_seq: [0; 2],
            offload: None,
            offload_failed: false,
            rebuild: RebuildDebouncer::new(options.rebuild_debounce_ms),
            content_dirty: false,
            animation: None,
            now_ms: 0,
            stats: SyncStats::default(),
            options,
        };
        if use_offload {
            match OffloadWorker::spawn(&coordinator.line_map) {
                Ok(worker) => coordinator.offload = Some(worker),
                Err(err) => coordinator.disable_offload(&err),
            }
        }
        coordinator
    }

    /// Use a caller-provided worker (e.g. one served on a host thread).
    #[must_use]
    pub fn with_offload_worker(mut self, worker: OffloadWorker) -> Self {
        self.offload_failed = false;
        match worker.update_map(&self.line_map) {
            Ok(()) => self.offload = Some(worker),
            Err(err) => self.disable_offload(&err),
        }
        self
    }

    pub const fn buffer(&self) -> &B {
        &self.buffer
    }

    pub const fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub const fn rendered(&self) -> &R {
        &self.rendered
    }

    pub const fn rendered_mut(&mut self) -> &mut R {
        &mut self.rendered
    }

    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Current map snapshot.
    pub fn line_map(&self) -> Arc<LineMap> {
        Arc::clone(&self.line_map)
    }

    pub const fn active_source(&self) -> ActiveSource {
        self.lock.active
    }

    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    pub const fn is_offload_active(&self) -> bool {
        self.offload.is_some()
    }

    pub const fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub const fn is_content_dirty(&self) -> bool {
        self.content_dirty
    }

    /// The outstanding offload request for `direction`, if any.
    pub const fn pending_request(&self, direction: SyncDirection) -> Option<PendingSyncRequest> {
        self.in_flight[direction.index()]
    }

    /// Sequence number of the most recent request issued for `direction`.
    pub const fn latest_seq(&self, direction: SyncDirection) -> u64 {
        self.last_seq[direction.index()]
    }

    pub fn on_buffer_scroll(&mut self, now_ms: u64) -> NotificationOutcome {
        self.on_scroll(ScrollSource::Buffer, now_ms)
    }

    pub fn on_rendered_scroll(&mut self, now_ms: u64) -> NotificationOutcome {
        self.on_scroll(ScrollSource::Rendered, now_ms)
    }

    /// Handle a scroll notification from `source`.
    pub fn on_scroll(&mut self, source: ScrollSource, now_ms: u64) -> NotificationOutcome {
        self.now_ms = now_ms;
        self.lock.expire(now_ms);
        if self.lock.is_held_by(source.opposite()) {
            self.stats.ignored_notifications += 1;
            tracing::trace!(?source, "scroll ignored while the other pane drives");
            return NotificationOutcome::Ignored;
        }
        self.take_lock(source, now_ms);

        let slot = SyncDirection::from_source(source).index();
        if self.throttles[slot].admit(now_ms) {
            self.scheduled[slot] = true;
            NotificationOutcome::Scheduled
        } else {
            NotificationOutcome::Throttled
        }
    }

    /// Rendered content changed; rebuild the map once things settle.
    pub fn mark_content_dirty(&mut self, now_ms: u64) {
        self.content_dirty = true;
        self.rebuild.queue(now_ms);
    }

    /// A pane was resized. Layout offsets move, so the map is treated as
    /// dirty, but bursts collapse into one rebuild.
    pub fn on_resize(&mut self, now_ms: u64) {
        self.mark_content_dirty(now_ms);
    }

    /// Rebuild the line map now and hand the snapshot to the worker.
    pub fn rebuild_line_map(&mut self) -> Arc<LineMap> {
        let map = Arc::new(self.builder.build(&self.rendered, self.buffer.total_lines()));
        self.line_map = Arc::clone(&map);
        self.content_dirty = false;
        self.rebuild.cancel();
        self.stats.map_rebuilds += 1;

        let sent = self.offload.as_ref().map(|worker| worker.update_map(&map));
        if let Some(Err(err)) = sent {
            self.disable_offload(&err);
        }

        // Re-align with the new layout, driven by whichever pane is active
        // (the buffer when neither is).
        let direction = match self.lock.active {
            ActiveSource::Rendered => SyncDirection::RenderedToBuffer,
            ActiveSource::Buffer | ActiveSource::None => SyncDirection::BufferToRendered,
        };
        self.scheduled[direction.index()] = true;
        map
    }

    /// Display refresh boundary. Runs due timers, applies worker results,
    /// advances animations, computes scheduled syncs and performs at most one
    /// write per pane. Returns the number of writes.
    pub fn on_frame(&mut self, now_ms: u64) -> usize {
        self.now_ms = now_ms;
        self.lock.expire(now_ms);

        if self.rebuild.take_ready(now_ms) && self.content_dirty {
            self.rebuild_line_map();
        }
        for direction in SyncDirection::ALL {
            if self.throttles[direction.index()].take_trailing(now_ms) {
                self.scheduled[direction.index()] = true;
            }
        }

        self.drain_offload();
        self.step_animation(now_ms);

        for direction in SyncDirection::ALL {
            if std::mem::take(&mut self.scheduled[direction.index()]) {
                self.run_sync(direction);
            }
        }
        self.flush_writes()
    }

    /// Scroll the buffer so `line` is at the top, easing when smoothing is
    /// enabled. The rendered pane follows on every animation frame.
    pub fn jump_buffer_to_line(&mut self, line: usize, now_ms: u64) {
        let total = self.buffer.total_lines().max(1);
        let block = self.buffer.line_block(line.clamp(1, total));
        self.animate(ScrollSource::Buffer, block.top, now_ms);
    }

    /// Scroll the rendered pane to `offset`, easing when smoothing is enabled.
    pub fn jump_rendered_to(&mut self, offset: f64, now_ms: u64) {
        self.animate(ScrollSource::Rendered, offset, now_ms);
    }

    /// Stop a running animation where it is.
    pub fn cancel_animation(&mut self) {
        self.animation = None;
    }

    fn animate(&mut self, pane: ScrollSource, to: f64, now_ms: u64) {
        self.now_ms = now_ms;
        let max = self.max_scroll_of(pane);
        let to = if to.is_finite() { to.clamp(0.0, max) } else { 0.0 };
        let from = self.scroll_top_of(pane);
        // A programmatic jump always takes the lock.
        self.take_lock(pane, now_ms);

        let duration = self.options.smoothing_duration_ms;
        if duration == 0 || (to - from).abs() <= self.options.pixel_threshold {
            self.animation = None;
            self.set_scroll_top_of(pane, to);
            self.scheduled[SyncDirection::from_source(pane).index()] = true;
            return;
        }
        tracing::debug!(?pane, from, to, duration, "animated jump started");
        self.animation = Some(ScrollAnimation::new(pane, from, to, now_ms, duration));
    }

    fn step_animation(&mut self, now_ms: u64) {
        let Some(animation) = self.animation else {
            return;
        };
        let pane = animation.pane();
        self.set_scroll_top_of(pane, animation.offset_at(now_ms));
        self.take_lock(pane, now_ms);
        self.scheduled[SyncDirection::from_source(pane).index()] = true;
        if animation.is_finished(now_ms) {
            self.animation = None;
        }
    }

    /// Give `source` the lock. Work computed for the other direction would
    /// write into `source`, so it is dropped; a result still on its way back
    /// from the worker is then discarded as stale.
    fn take_lock(&mut self, source: ScrollSource, now_ms: u64) {
        self.lock.acquire(source, now_ms);
        let reverse = SyncDirection::from_source(source.opposite()).index();
        if let Some(pending) = self.in_flight[reverse].take() {
            tracing::trace!(seq = pending.seq, ?source, "superseded by direction change");
        }
        self.writes[reverse] = None;
    }

    fn run_sync(&mut self, direction: SyncDirection) {
        let _timer = perf::time("sync.run");
        let slot = direction.index();
        if self.lock.is_held_by(direction.target()) {
            return;
        }
        if let Some(offset) = self.edge_snap(direction) {
            // Supersede any in-flight request so a late result cannot undo
            // the snap.
            self.in_flight[slot] = None;
            self.queue_write(direction, offset, true);
            return;
        }

        self.last_seq[slot] += 1;
        let request = SyncRequest {
            seq: self.last_seq[slot],
            direction,
            value: self.source_position(direction),
            buffer: PaneExtent {
                scroll_top: self.buffer.scroll_top(),
                scroll_height: self.buffer.scroll_height(),
                client_height: self.buffer.client_height(),
            },
            rendered: PaneExtent {
                scroll_top: self.rendered.scroll_top(),
                scroll_height: self.rendered.scroll_height(),
                client_height: self.rendered.client_height(),
            },
        };

        let submitted = self.offload.as_ref().map(|worker| worker.submit(request));
        match submitted {
            Some(Ok(())) => {
                self.in_flight[slot] = Some(PendingSyncRequest {
                    seq: request.seq,
                    direction,
                    issued_at_ms: self.now_ms,
                });
                return;
            }
            Some(Err(err)) => self.disable_offload(&err),
            None => {}
        }

        let target = resolve(&self.line_map, &request);
        self.stats.inline_results += 1;
        self.accept_target(direction, target);
    }

    fn drain_offload(&mut self) {
        loop {
            let Some(worker) = &self.offload else {
                return;
            };
            match worker.try_recv() {
                Ok(None) => return,
                Ok(Some(OffloadResponse::SyncResult {
                    seq,
                    direction,
                    target,
                })) => self.accept_offload_result(seq, direction, target),
                Ok(Some(OffloadResponse::Failed { seq, message, .. })) => {
                    self.disable_offload(&SyncError::OffloadFailed(format!(
                        "request {seq}: {message}"
                    )));
                    return;
                }
                Err(err) => {
                    self.disable_offload(&err);
                    return;
                }
            }
        }
    }

    fn accept_offload_result(&mut self, seq: u64, direction: SyncDirection, target: SyncTarget) {
        let slot = direction.index();
        match self.in_flight[slot] {
            Some(pending) if pending.seq == seq => {
                self.in_flight[slot] = None;
                self.stats.offload_results += 1;
                self.accept_target(direction, target);
            }
            _ => {
                self.stats.stale_results += 1;
                let latest = self.last_seq[slot];
                tracing::trace!(seq, latest, ?direction, "discarding superseded offload result");
                perf::record(&SyncEvent::Stale {
                    direction,
                    seq,
                    latest,
                });
            }
        }
    }

    /// Permanently switch to inline computation. In-flight requests are
    /// recomputed inline.
    fn disable_offload(&mut self, err: &SyncError) {
        let had_worker = self.offload.take().is_some();
        if had_worker || !self.offload_failed {
            tracing::warn!(error = %err, "offload disabled, interpolating inline");
            perf::record(&SyncEvent::OffloadDisabled {
                reason: &err.to_string(),
            });
        }
        self.offload_failed = true;
        for direction in SyncDirection::ALL {
            if self.in_flight[direction.index()].take().is_some() {
                self.scheduled[direction.index()] = true;
            }
        }
    }

    /// Convert a resolved target into the target pane's pixels and queue it.
    fn accept_target(&mut self, direction: SyncDirection, target: SyncTarget) {
        let offset = match target {
            SyncTarget::Rendered(offset) | SyncTarget::Buffer(offset) => offset,
            SyncTarget::Line(line) => self.buffer_offset_for_line(line),
        };
        if !offset.is_finite() {
            return;
        }
        let max = self.max_scroll_of(direction.target());
        self.queue_write(direction, offset.clamp(0.0, max), false);
    }

    fn queue_write(&mut self, direction: SyncDirection, offset: f64, exact: bool) {
        self.writes[direction.index()] = Some(PendingWrite { offset, exact });
    }

    fn flush_writes(&mut self) -> usize {
        let _timer = perf::time("sync.flush");
        let mut applied = 0;
        for direction in SyncDirection::ALL {
            let Some(write) = self.writes[direction.index()].take() else {
                continue;
            };
            let target = direction.target();
            if self.lock.is_held_by(target) {
                continue;
            }
            let current = self.scroll_top_of(target);
            let delta = (write.offset - current).abs();
            let needed = if write.exact {
                delta > 0.0 || current.is_nan()
            } else {
                delta > self.options.pixel_threshold || current.is_nan()
            };
            if !needed {
                self.stats.below_threshold += 1;
                continue;
            }
            self.set_scroll_top_of(target, write.offset);
            match target {
                ScrollSource::Buffer => self.stats.buffer_writes += 1,
                ScrollSource::Rendered => self.stats.rendered_writes += 1,
            }
            perf::record(&SyncEvent::Write {
                pane: target,
                offset: write.offset,
                previous: current,
                exact: write.exact,
            });
            applied += 1;
        }
        applied
    }

    /// Snap target when the source sits at either end of its range.
    fn edge_snap(&self, direction: SyncDirection) -> Option<f64> {
        let source = direction.source();
        let top = self.scroll_top_of(source);
        let max = self.max_scroll_of(source);
        if top <= EDGE_SNAP_PX {
            Some(0.0)
        } else if top >= max - EDGE_SNAP_PX {
            Some(self.max_scroll_of(direction.target()))
        } else {
            None
        }
    }

    /// Position of the source pane in its own addressing system: a
    /// fractional line for the buffer, pixels for the rendered pane.
    fn source_position(&self, direction: SyncDirection) -> f64 {
        match direction.source() {
            ScrollSource::Rendered => self.rendered.scroll_top(),
            ScrollSource::Buffer => {
                let top = self.buffer.scroll_top();
                let total = self.buffer.total_lines().max(1);
                let block = self.buffer.line_block_at_offset(top);
                let fraction = if block.height.is_finite() && block.height > 0.0 {
                    ((top - block.top) / block.height).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let line = block.line.clamp(1, total) as f64 + fraction;
                line.min(total as f64)
            }
        }
    }

    /// Buffer pixel offset of a fractional line, clamped to the buffer.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn buffer_offset_for_line(&self, line: f64) -> f64 {
        let total = self.buffer.total_lines().max(1);
        let line = if line.is_finite() {
            line.clamp(1.0, total as f64)
        } else {
            1.0
        };
        let base = line.floor();
        let block = self.buffer.line_block(base as usize);
        let height = if block.height.is_finite() {
            block.height.max(0.0)
        } else {
            0.0
        };
        block.top + (line - base) * height
    }

    fn scroll_top_of(&self, pane: ScrollSource) -> f64 {
        match pane {
            ScrollSource::Buffer => self.buffer.scroll_top(),
            ScrollSource::Rendered => self.rendered.scroll_top(),
        }
    }

    fn max_scroll_of(&self, pane: ScrollSource) -> f64 {
        match pane {
            ScrollSource::Buffer => self.buffer.max_scroll(),
            ScrollSource::Rendered => self.rendered.max_scroll(),
        }
    }

    fn set_scroll_top_of(&mut self, pane: ScrollSource, offset: f64) {
        match pane {
            ScrollSource::Buffer => self.buffer.set_scroll_top(offset),
            ScrollSource::Rendered => self.rendered.set_scroll_top(offset),
        }
    }
}
