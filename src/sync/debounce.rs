//! Time-based coalescing helpers.
//!
//! Both helpers take explicit millisecond timestamps from the host loop so
//! they stay deterministic and easy to drive from tests.

/// Coalesces bursts of "content changed" / resize notifications into a single
/// line map rebuild once things settle.
#[derive(Debug, Clone)]
pub struct RebuildDebouncer {
    delay_ms: u64,
    pending_since: Option<u64>,
}

impl RebuildDebouncer {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending_since: None,
        }
    }

    /// Queue (or re-arm) a rebuild.
    pub const fn queue(&mut self, now_ms: u64) {
        self.pending_since = Some(now_ms);
    }

    /// True once the debounce window has elapsed since the last `queue`.
    /// Clears the pending state when it fires.
    pub fn take_ready(&mut self, now_ms: u64) -> bool {
        let Some(queued_at) = self.pending_since else {
            return false;
        };
        if now_ms.saturating_sub(queued_at) >= self.delay_ms {
            self.pending_since = None;
            true
        } else {
            false
        }
    }

    pub const fn cancel(&mut self) {
        self.pending_since = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}

/// Limits a handler to one run per interval.
///
/// The first call in a quiet period runs immediately (leading edge). Calls
/// inside the interval are collapsed into a single trailing run that becomes
/// due once the interval has elapsed.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: u64,
    last_run: Option<u64>,
    trailing: bool,
}

impl Throttle {
    pub const fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_run: None,
            trailing: false,
        }
    }

    /// Returns true if the handler should run now. Otherwise a trailing run
    /// is recorded.
    pub fn admit(&mut self, now_ms: u64) -> bool {
        if self.is_open(now_ms) {
            self.last_run = Some(now_ms);
            self.trailing = false;
            true
        } else {
            self.trailing = true;
            false
        }
    }

    /// Returns true (once) when a collapsed trailing run is due.
    pub fn take_trailing(&mut self, now_ms: u64) -> bool {
        if self.trailing && self.is_open(now_ms) {
            self.last_run = Some(now_ms);
            self.trailing = false;
            true
        } else {
            false
        }
    }

    pub const fn has_trailing(&self) -> bool {
        self.trailing
    }

    fn is_open(&self, now_ms: u64) -> bool {
        self.last_run
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_debouncer_waits_for_quiet_period() {
        let mut debouncer = RebuildDebouncer::new(100);
        debouncer.queue(0);
        assert!(!debouncer.take_ready(50));
        assert!(debouncer.is_pending());
        assert!(debouncer.take_ready(100));
        assert!(!debouncer.is_pending());
        assert!(!debouncer.take_ready(500));
    }

    #[test]
    fn test_rebuild_debouncer_requeue_extends_window() {
        let mut debouncer = RebuildDebouncer::new(100);
        debouncer.queue(0);
        debouncer.queue(80);
        assert!(!debouncer.take_ready(150));
        assert!(debouncer.take_ready(180));
    }

    #[test]
    fn test_rebuild_debouncer_cancel() {
        let mut debouncer = RebuildDebouncer::new(10);
        debouncer.queue(0);
        debouncer.cancel();
        assert!(!debouncer.take_ready(100));
    }

    #[test]
    fn test_throttle_leading_edge_runs_immediately() {
        let mut throttle = Throttle::new(16);
        assert!(throttle.admit(0));
        assert!(!throttle.has_trailing());
    }

    #[test]
    fn test_throttle_collapses_burst_into_one_trailing_run() {
        let mut throttle = Throttle::new(16);
        assert!(throttle.admit(0));
        assert!(!throttle.admit(4));
        assert!(!throttle.admit(8));
        assert!(!throttle.admit(12));
        assert!(!throttle.take_trailing(15));
        assert!(throttle.take_trailing(16));
        assert!(!throttle.take_trailing(40));
    }

    #[test]
    fn test_throttle_reopens_after_interval() {
        let mut throttle = Throttle::new(16);
        assert!(throttle.admit(0));
        assert!(throttle.admit(16));
        assert!(throttle.admit(100));
    }

    #[test]
    fn test_throttle_zero_interval_never_throttles() {
        let mut throttle = Throttle::new(0);
        assert!(throttle.admit(5));
        assert!(throttle.admit(5));
    }
}
