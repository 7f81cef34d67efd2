//! Error types for engine setup.
//!
//! The synchronization hot path never fails; it degrades. These errors only
//! surface from setup calls and from the offload channel, where the
//! coordinator turns them into a permanent synchronous fallback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to start offload worker: {0}")]
    OffloadSpawn(#[source] std::io::Error),

    #[error("offload worker disconnected")]
    OffloadDisconnected,

    #[error("offload worker failed: {0}")]
    OffloadFailed(String),

    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
