//! Error types shared across the crate

use thiserror::Error;

/// Failures raised by a key-value backend or while encoding collections.
///
/// These never reach the presentation layer: the storage adapter logs them
/// and falls back to "no data" or "not persisted".
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures returned by [`crate::state::TimerBoard`] operations.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("no timer named `{0}`")]
    UnknownTimer(String),

    #[error("failed to lock {0}")]
    Poisoned(&'static str),
}
