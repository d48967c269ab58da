//! Correlation ids.

use serde::{Deserialize, Serialize};

/// Client-generated opaque token linking a locally sent message to its
/// eventual server echo and to later mutation frames targeting it.
///
/// Ids are trusted as unique for the lifetime of a session; no collision
/// detection is performed anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an id received off the wire.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id from 128 bits of entropy, rendered as lowercase hex.
    pub fn from_entropy(bits: u128) -> Self {
        Self(format!("{bits:032x}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
