//! The publish/subscribe collaborator contract.
//!
//! The core treats the transport as a black box exchanging JSON text
//! payloads on named topics. Implementations own connection and
//! reconnection; the session only ever sees delivered payloads and
//! fire-and-forget publishes.

use async_trait::async_trait;

use crate::error::TransportError;

/// Callback invoked with each raw payload arriving on a subscription.
///
/// The transport must invoke handlers one payload at a time per session;
/// the session relies on that sequential delivery and takes no locks.
pub type PayloadHandler = Box<dyn Fn(String) + Send + Sync>;

/// Generic publish/subscribe transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Register a handler for every payload published to `topic`.
    async fn subscribe(&self, topic: &str, handler: PayloadHandler)
    -> Result<(), TransportError>;

    /// Publish a payload to `topic`. Best effort; the caller decides what a
    /// failure means.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;

    /// Tear the connection down.
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Topic namespace used by the session driver.
pub mod topics {
    /// Broadcast topic carrying every room's traffic.
    pub const ROOM_TRAFFIC: &str = "/topic/message";

    /// Command topic accepting all frame kinds plus roster-sync requests.
    pub const COMMANDS: &str = "/app/sendMessage";

    /// Private roster feed for one user's session.
    pub fn private_roster(username: &str) -> String {
        format!("/user/{username}/queue/members")
    }

    /// Broadcast roster feed for one room.
    pub fn room_roster(room_id: &str) -> String {
        format!("/topic/{room_id}/members")
    }
}
