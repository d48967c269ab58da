//! Protocol error types.

use thiserror::Error;

/// Errors from frame encoding and decoding.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload was not a valid JSON frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
