//! Error types for the lost & found server
//!
//! Separates fatal startup errors from the per-request errors that are
//! reported back to the client as `ERROR` lines.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::{ItemId, SessionId};

/// Application-level errors
///
/// These abort startup or end the process; they are never shown to clients.
#[derive(Debug, Error)]
pub enum AppError {
    /// Listening socket could not be bound (fatal)
    #[error("Could not bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Report contents rejected by validation
///
/// The connection stays open; the message goes back as an `ERROR` line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more required fields were absent
    #[error("Missing item details (name, color, location, description).")]
    MissingField(&'static str),

    /// A required field was present but blank
    #[error("Item {0} must not be empty.")]
    EmptyField(&'static str),

    /// Location outside the allowed set
    #[error("Invalid location. Please choose from: {}", allowed.join(", "))]
    UnknownLocation {
        location: String,
        allowed: Vec<String>,
    },
}

/// Malformed input on the wire
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Command not recognised in Command mode
    #[error("Unknown command. Available: REPORT_LOST <json>, REPORT_FOUND <json>, GET_MY_ITEMS, GET_ALL_ITEMS")]
    UnknownCommand(String),

    /// `REPORT_<something>` other than LOST / FOUND
    #[error("Invalid report type.")]
    UnknownReportType(String),

    /// Report command without a payload
    #[error("Invalid report command. Missing item data.")]
    MissingItemData,

    /// Payload is not a JSON object of strings
    #[error("Invalid item data format (not JSON).")]
    MalformedJson(String),

    /// Line is not valid UTF-8
    #[error("Invalid data encoding. Please use UTF-8.")]
    InvalidUtf8,

    /// Line exceeded the configured maximum length
    #[error("Line too long (maximum {max} bytes).")]
    LineTooLong { max: usize },
}

/// Item Store lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No item with the given id
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// An item cannot be matched with itself
    #[error("Item {0} cannot be matched with itself")]
    SelfMatch(ItemId),

    /// One of the items is already matched with a different item
    #[error("Item {0} is already matched")]
    AlreadyMatched(ItemId),
}

/// Persistence failures
///
/// Logged by the store; the in-memory collection stays authoritative.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Message send errors
///
/// Either way the peer is unreachable and its session is dropped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The peer stopped reading and its outbound buffer filled up
    #[error("Outbound buffer full")]
    BufferFull,
}

/// Reasons a pairing could not be committed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    /// Session is gone or already chatting
    #[error("Session {0} is not available for chat")]
    SessionUnavailable(SessionId),

    /// Both sides would be the same session
    #[error("Session {0} cannot be paired with itself")]
    SelfPair(SessionId),

    /// Item Store refused the match
    #[error(transparent)]
    Store(#[from] StoreError),
}
