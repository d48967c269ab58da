//! Deterministic session state for the Palaver chat client.
//!
//! Everything in this crate is sans-IO: the timeline, the membership roster
//! and the moderation filter mutate only when the caller hands them events,
//! and all timing (the optimistic-echo window) is measured against instants
//! supplied through the [`env::Environment`] abstraction. This keeps every
//! ordering- and timing-sensitive behavior reproducible under test.

pub mod env;
pub mod moderation;
pub mod roster;
pub mod timeline;

pub use env::{Environment, new_correlation_id};
pub use moderation::Lexicon;
pub use roster::MemberRoster;
pub use timeline::{
    ECHO_WINDOW, MessageKind, MessageRecord, ModerationState, PendingSend, Reconciliation, Timeline,
};
