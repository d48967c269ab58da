//! Session events and actions.

use palaver_proto::{CorrelationId, Frame};

/// Everything that can happen to a session: user intents, inbound frames,
/// roster pushes, and lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport came up; announce presence and optimistically join the
    /// roster.
    Connected,

    /// User submitted a chat line.
    SendChat {
        /// Message text.
        text: String,
    },

    /// User replaced an earlier message's text.
    EditMessage {
        /// Target message.
        correlation_id: CorrelationId,
        /// Replacement text.
        text: String,
    },

    /// User retracted an earlier message.
    RecallMessage {
        /// Target message.
        correlation_id: CorrelationId,
    },

    /// User removed an earlier message outright.
    DeleteMessage {
        /// Target message.
        correlation_id: CorrelationId,
    },

    /// User toggled the reveal override on a flagged message.
    ToggleReveal {
        /// Target message.
        correlation_id: CorrelationId,
    },

    /// A frame arrived on the room-traffic topic.
    FrameReceived(Frame),

    /// The private per-session roster feed pushed an authoritative list.
    PrivateRoster {
        /// Member display names.
        names: Vec<String>,
    },

    /// The per-room broadcast roster feed pushed an authoritative list.
    RoomRoster {
        /// Room the push is scoped to.
        room_id: String,
        /// Member display names.
        names: Vec<String>,
    },

    /// User logged out; say goodbye and stop accepting inbound frames.
    Logout,
}

/// I/O the driver must perform on the session's behalf.
///
/// Publishes are fire-and-forget: the session has already applied its
/// optimistic mutation by the time an action is returned, and a transport
/// failure must not undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Publish a frame on the command topic.
    Publish(Frame),

    /// Ask the relay to re-push the authoritative member list.
    RequestRosterSync {
        /// Room whose roster should be re-pushed.
        room_id: String,
    },
}
