//! Palaver chat client runtime.
//!
//! This crate turns the best-effort broadcast channel into a room-scoped,
//! mutation-capable conversation stream with optimistic local rendering.
//!
//! ## Architecture
//!
//! ```text
//! palaver-client
//!   ├─ ChatSession     (sans-IO state machine: events in, actions out)
//!   ├─ SessionDriver   (pumps inbound payloads, executes actions)
//!   ├─ Transport       (publish/subscribe collaborator contract)
//!   └─ SystemEnv       (production time + entropy)
//! ```
//!
//! The session never performs I/O: user intents and inbound frames go in as
//! [`SessionEvent`]s, publishes come out as [`SessionAction`]s, and the
//! driver executes them against the transport. A failed publish is logged
//! and swallowed - the optimistic local mutation stands either way.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod event;
mod session;
mod system_env;
pub mod transport;

pub use driver::SessionDriver;
pub use error::TransportError;
pub use event::{SessionAction, SessionEvent};
pub use session::{ChatSession, SessionConfig};
pub use system_env::SystemEnv;
pub use transport::{PayloadHandler, Transport, topics};
