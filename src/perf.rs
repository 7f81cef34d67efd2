//! Sync timing and the decision log.
//!
//! Two independent switches:
//! - timing: [`time`] guards accumulate per-stage durations, read back with
//!   [`timing_report`]
//! - decision log: every [`SyncEvent`] is appended to a file opened with
//!   [`open_decision_log`], one line each, stamped with the time since the
//!   log was opened
//!
//! Both are process-wide so the coordinator, the map builder and the
//! preview layout can report without threading a handle through.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Instant;

use crate::sync::{ScrollSource, SyncDirection};

static TIMING: AtomicBool = AtomicBool::new(false);
static STATE: LazyLock<Mutex<State>> = LazyLock::new(|| Mutex::new(State::default()));

#[derive(Debug, Default)]
struct State {
    timings: BTreeMap<&'static str, Timing>,
    log: Option<DecisionLog>,
}

#[derive(Debug)]
struct DecisionLog {
    opened: Instant,
    writer: BufWriter<File>,
}

fn state() -> MutexGuard<'static, State> {
    match STATE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Accumulated durations of one named stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    pub count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl Timing {
    fn add(&mut self, elapsed_ms: f64) {
        self.count += 1;
        self.total_ms += elapsed_ms;
        self.max_ms = self.max_ms.max(elapsed_ms);
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

/// Guard returned by [`time`]; records the stage when dropped.
#[must_use = "the stage is timed until the guard is dropped"]
#[derive(Debug)]
pub struct Timer {
    stage: &'static str,
    start: Option<Instant>,
}

impl Drop for Timer {
    fn drop(&mut self) {
        let Some(start) = self.start else {
            return;
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::trace!(target: "panesync::perf", stage = self.stage, elapsed_ms, "timed");
        state().timings.entry(self.stage).or_default().add(elapsed_ms);
    }
}

pub fn set_timing(enabled: bool) {
    TIMING.store(enabled, Ordering::Relaxed);
}

pub fn is_timing() -> bool {
    TIMING.load(Ordering::Relaxed)
}

/// Time `stage` until the returned guard drops. Free when timing is off.
pub fn time(stage: &'static str) -> Timer {
    Timer {
        stage,
        start: is_timing().then(Instant::now),
    }
}

/// Stages timed so far, by name.
pub fn timing_report() -> Vec<(&'static str, Timing)> {
    state()
        .timings
        .iter()
        .map(|(stage, timing)| (*stage, *timing))
        .collect()
}

/// A sync decision worth keeping for offline inspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncEvent<'a> {
    /// A pane's scroll offset was written.
    Write {
        pane: ScrollSource,
        offset: f64,
        previous: f64,
        exact: bool,
    },
    /// A worker result arrived for a request that is no longer current.
    Stale {
        direction: SyncDirection,
        seq: u64,
        latest: u64,
    },
    /// The worker is gone; everything runs inline from now on.
    OffloadDisabled { reason: &'a str },
    MapRebuilt {
        elements: usize,
        measured: usize,
        entries: usize,
    },
}

impl fmt::Display for SyncEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write {
                pane,
                offset,
                previous,
                exact,
            } => write!(
                f,
                "write pane={pane:?} offset={offset:.2} previous={previous:.2} exact={exact}"
            ),
            Self::Stale {
                direction,
                seq,
                latest,
            } => write!(f, "stale direction={direction:?} seq={seq} latest={latest}"),
            Self::OffloadDisabled { reason } => write!(f, "offload-disabled reason={reason:?}"),
            Self::MapRebuilt {
                elements,
                measured,
                entries,
            } => write!(
                f,
                "map-rebuilt elements={elements} measured={measured} entries={entries}"
            ),
        }
    }
}

/// Start (or stop, with `None`) the decision log.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn open_decision_log(path: Option<&Path>) -> std::io::Result<()> {
    let mut state = state();
    state.log = None;
    if let Some(path) = path {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "# panesync decisions")?;
        writer.flush()?;
        state.log = Some(DecisionLog {
            opened: Instant::now(),
            writer,
        });
    }
    Ok(())
}

pub fn is_decision_log_open() -> bool {
    state().log.is_some()
}

/// Append `event` to the decision log, if one is open. Write errors close
/// the log.
pub fn record(event: &SyncEvent<'_>) {
    let mut state = state();
    let Some(log) = state.log.as_mut() else {
        return;
    };
    let elapsed_ms = log.opened.elapsed().as_secs_f64() * 1000.0;
    let written = writeln!(log.writer, "{elapsed_ms:>10.3} {event}")
        .and_then(|()| log.writer.flush());
    if let Err(err) = written {
        tracing::warn!(error = %err, "decision log closed after a write error");
        state.log = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_timer_records_only_while_timing() {
        set_timing(false);
        drop(time("test.untimed"));
        set_timing(true);
        drop(time("test.timed"));
        drop(time("test.timed"));
        set_timing(false);

        let report = timing_report();
        assert!(report.iter().all(|(stage, _)| *stage != "test.untimed"));
        let (_, timed) = report
            .iter()
            .find(|(stage, _)| *stage == "test.timed")
            .unwrap();
        assert_eq!(timed.count, 2);
        assert!(timed.max_ms <= timed.total_ms);
        assert!(timed.mean_ms() <= timed.max_ms);
    }

    #[test]
    fn test_events_format_as_key_value_lines() {
        let write = SyncEvent::Write {
            pane: ScrollSource::Rendered,
            offset: 120.0,
            previous: 95.5,
            exact: false,
        };
        assert_eq!(
            write.to_string(),
            "write pane=Rendered offset=120.00 previous=95.50 exact=false"
        );
        let stale = SyncEvent::Stale {
            direction: SyncDirection::BufferToRendered,
            seq: 3,
            latest: 5,
        };
        assert_eq!(stale.to_string(), "stale direction=BufferToRendered seq=3 latest=5");
    }

    #[test]
    fn test_decision_log_writes_events() {
        let temp_file = NamedTempFile::new().unwrap();
        open_decision_log(Some(temp_file.path())).unwrap();
        assert!(is_decision_log_open());
        record(&SyncEvent::MapRebuilt {
            elements: 12,
            measured: 4,
            entries: 13,
        });
        record(&SyncEvent::OffloadDisabled {
            reason: "offload worker disconnected",
        });
        open_decision_log(None).unwrap();
        assert!(!is_decision_log_open());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.starts_with("# panesync decisions"));
        assert!(content.contains("map-rebuilt elements=12 measured=4 entries=13"));
        assert!(content.contains("offload-disabled reason=\"offload worker disconnected\""));
    }
}
