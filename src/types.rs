//! Basic type definitions for the lost & found server
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based unique connection identifier
//! - `ItemId`: UUID-based unique item report identifier

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of trailing characters of a session id used as its chat tag
const CHAT_TAG_LEN: usize = 6;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe session identification.
/// Also recorded on every item as its reporter, so it is serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short tag shown to a chat partner instead of the full id
    pub fn chat_tag(&self) -> String {
        let full = self.0.simple().to_string();
        full[full.len() - CHAT_TAG_LEN..].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Create a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
