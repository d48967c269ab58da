//! Wire-level types for the Palaver chat protocol.
//!
//! The broadcast channel carries `{sender, content, type, roomId}` JSON text
//! frames with no room for structured metadata, so message mutations
//! (edit/recall/delete) ride inside the `content` field as bracket-tagged
//! text. This crate owns the frame envelope and that tagged-content codec.

mod cid;
mod error;
mod frame;
mod tag;

pub use cid::CorrelationId;
pub use error::FrameError;
pub use frame::{Frame, FrameKind, RosterSyncRequest};
pub use tag::Tagged;
