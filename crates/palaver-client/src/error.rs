//! Client error types.

use thiserror::Error;

/// Errors surfaced by transport implementations.
///
/// None of these are fatal to a session: a failed publish is swallowed by
/// the driver and the optimistic local state stands.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has not been connected yet.
    #[error("not connected")]
    NotConnected,

    /// The transport rejected an outbound payload.
    #[error("publish rejected: {reason}")]
    PublishRejected {
        /// Description of the rejection.
        reason: String,
    },

    /// Subscribing to a topic failed.
    #[error("subscribe failed: {reason}")]
    SubscribeFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The transport has been torn down.
    #[error("transport closed")]
    Closed,
}
