//! Background compute offload.
//!
//! A dedicated thread owns its own copy of the latest line map and answers
//! sync requests with [`resolve`]. Nothing is shared: map snapshots and
//! requests are moved in, results are moved out. The coordinator polls for
//! results without blocking and correlates them by per-direction sequence
//! number.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::error::{Result, SyncError};
use crate::sync::SyncDirection;
use crate::sync::interpolate::{SyncRequest, SyncTarget, resolve};
use crate::sync::line_map::{LineMap, LineMapEntry};

/// Name of the worker thread.
pub const THREAD_NAME: &str = "panesync-offload";

/// Messages sent to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum OffloadRequest {
    /// Replace the worker's map. Only the latest map is retained.
    UpdateMap(Vec<LineMapEntry>),
    /// Compute the target for a request.
    Sync(SyncRequest),
    /// Stop the worker loop.
    Shutdown,
}

/// Messages sent back by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum OffloadResponse {
    SyncResult {
        seq: u64,
        direction: SyncDirection,
        target: SyncTarget,
    },
    Failed {
        seq: u64,
        direction: SyncDirection,
        message: String,
    },
}

/// Handle to a running offload worker.
pub struct OffloadWorker {
    requests: Sender<OffloadRequest>,
    responses: Receiver<OffloadResponse>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for OffloadWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadWorker")
            .field("threaded", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl OffloadWorker {
    /// Start the worker thread and hand it `initial` as its first map.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(initial: &LineMap) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(&request_rx, &response_tx))
            .map_err(SyncError::OffloadSpawn)?;
        tracing::debug!(thread = THREAD_NAME, "offload worker started");

        let worker = Self {
            requests: request_tx,
            responses: response_rx,
            handle: Some(handle),
        };
        worker.update_map(initial)?;
        Ok(worker)
    }

    /// Wrap channels whose other ends are served elsewhere, e.g. by [`run`]
    /// on a host-managed thread.
    pub fn from_channels(
        requests: Sender<OffloadRequest>,
        responses: Receiver<OffloadResponse>,
    ) -> Self {
        Self {
            requests,
            responses,
            handle: None,
        }
    }

    /// Send a new map snapshot.
    ///
    /// # Errors
    /// Returns [`SyncError::OffloadDisconnected`] if the worker is gone.
    pub fn update_map(&self, map: &LineMap) -> Result<()> {
        self.send(OffloadRequest::UpdateMap(map.entries().to_vec()))
    }

    /// Queue a sync request.
    ///
    /// # Errors
    /// Returns [`SyncError::OffloadDisconnected`] if the worker is gone.
    pub fn submit(&self, request: SyncRequest) -> Result<()> {
        self.send(OffloadRequest::Sync(request))
    }

    /// Take the next available response without blocking.
    ///
    /// # Errors
    /// Returns [`SyncError::OffloadDisconnected`] once the worker has exited
    /// and all of its responses have been drained.
    pub fn try_recv(&self) -> Result<Option<OffloadResponse>> {
        match self.responses.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SyncError::OffloadDisconnected),
        }
    }

    fn send(&self, request: OffloadRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| SyncError::OffloadDisconnected)
    }
}

impl Drop for OffloadWorker {
    fn drop(&mut self) {
        let _ = self.requests.send(OffloadRequest::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!(thread = THREAD_NAME, "offload worker panicked");
        }
    }
}

/// The worker loop. Returns when [`OffloadRequest::Shutdown`] arrives or
/// either channel closes.
pub fn run(requests: &Receiver<OffloadRequest>, responses: &Sender<OffloadResponse>) {
    let mut map = LineMap::default();
    while let Ok(request) = requests.recv() {
        let response = match request {
            OffloadRequest::UpdateMap(entries) => {
                map = LineMap::from_sanitized(entries);
                continue;
            }
            OffloadRequest::Shutdown => break,
            OffloadRequest::Sync(request) => answer(&map, &request),
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    tracing::debug!(thread = THREAD_NAME, "offload worker stopped");
}

fn answer(map: &LineMap, request: &SyncRequest) -> OffloadResponse {
    if !request.value.is_finite() {
        return OffloadResponse::Failed {
            seq: request.seq,
            direction: request.direction,
            message: format!("non-finite input {}", request.value),
        };
    }
    let target = resolve(map, request);
    if target.is_finite() {
        OffloadResponse::SyncResult {
            seq: request.seq,
            direction: request.direction,
            target,
        }
    } else {
        OffloadResponse::Failed {
            seq: request.seq,
            direction: request.direction,
            message: format!("non-finite target for input {}", request.value),
        }
    }
}
