//! The JSON frame envelope shared by both directions of the channel.

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Frame discriminator carried in the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameKind {
    /// Conversational message.
    #[default]
    Chat,
    /// A participant entered the room.
    Join,
    /// A participant left the room.
    Leave,
    /// In-place replacement of an earlier message's text.
    Edit,
    /// Terminal retraction of an earlier message.
    Recall,
    /// Removal of an earlier message from the timeline.
    Delete,
    /// Server-originated display text.
    System,
}

/// One wire frame.
///
/// A frame missing `type` or `content` still decodes (`type` defaults to
/// `CHAT`, `content` to empty) because legacy peers omit them. `polite` is
/// the moderation service's verdict and only ever appears inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Display name of the originating participant.
    #[serde(default)]
    pub sender: String,

    /// Free text, possibly carrying a bracket tag (see [`crate::Tagged`]).
    #[serde(default)]
    pub content: String,

    /// Frame discriminator.
    #[serde(rename = "type", default)]
    pub kind: FrameKind,

    /// Room the frame belongs to. Absent on legacy frames; frames without a
    /// room are dropped by any room-scoped consumer.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub room_id: Option<String>,

    /// Politeness verdict from the remote moderation service. `Some(false)`
    /// means the message renders hidden by default.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub polite: Option<bool>,
}

impl Frame {
    /// Build a frame of the given kind.
    pub fn new(
        kind: FrameKind,
        sender: impl Into<String>,
        room_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            kind,
            room_id: Some(room_id.into()),
            polite: None,
        }
    }

    /// A CHAT frame.
    pub fn chat(
        sender: impl Into<String>,
        room_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(FrameKind::Chat, sender, room_id, content)
    }

    /// The JOIN announcement published when entering a room.
    pub fn join(sender: impl Into<String>, room_id: impl Into<String>) -> Self {
        let sender = sender.into();
        let content = format!("{sender} has joined");
        Self::new(FrameKind::Join, sender, room_id, content)
    }

    /// The LEAVE announcement published on logout or teardown.
    pub fn leave(sender: impl Into<String>, room_id: impl Into<String>) -> Self {
        let sender = sender.into();
        let content = format!("{sender} has left");
        Self::new(FrameKind::Leave, sender, room_id, content)
    }

    /// Serialize to the JSON text the transport carries.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a frame from JSON text.
    pub fn decode(payload: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Wrap a payload that is not valid frame JSON as a content-only frame.
    ///
    /// Room-scoped consumers will drop the result (it carries no room), but
    /// it is a displayable frame rather than a hard error.
    pub fn wrap_raw(payload: impl Into<String>) -> Self {
        Self {
            sender: String::new(),
            content: payload.into(),
            kind: FrameKind::Chat,
            room_id: None,
            polite: None,
        }
    }
}

/// Request for the authoritative member list of a room, published on the
/// command topic alongside ordinary frames.
///
/// Unknown fields are rejected so a consumer of the shared command topic can
/// tell this apart from a full frame, which always carries more keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RosterSyncRequest {
    /// Room whose membership should be re-pushed.
    pub room_id: String,
}

impl RosterSyncRequest {
    /// Serialize to JSON text.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON text.
    pub fn decode(payload: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(payload)?)
    }
}
