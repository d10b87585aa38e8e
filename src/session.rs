//! Session state machine
//!
//! A session is either in `Command` mode (reports and queries) or in `Chat`
//! mode with exactly one partner. Keeping the partner inside the `Chat`
//! variant makes "chat iff partner set" hold by construction.
//!
//! ```text
//! Command --paired--> Chat{partner}
//! Chat --exit / partner gone--> Command
//! any --disconnect--> removed from the registry
//! ```

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{ProtocolError, SendError};
use crate::message::{ClientCommand, ServerMessage, EXIT_CHAT};
use crate::types::SessionId;

/// Protocol mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Command,
    Chat { partner: SessionId },
}

/// What a received line means in the session's current mode
#[derive(Debug)]
pub enum SessionInput {
    /// Command-mode line, parsed or rejected
    Command(Result<ClientCommand, ProtocolError>),
    /// Chat-mode exit token
    ExitChat,
    /// Chat-mode text to relay
    ChatText(String),
    /// Nothing to do (blank chat line)
    Ignore,
}

/// Interpret a received line according to `mode`
pub fn interpret(mode: SessionMode, line: &str) -> SessionInput {
    let line = line.trim();
    match mode {
        SessionMode::Command => SessionInput::Command(ClientCommand::parse(line)),
        SessionMode::Chat { .. } => {
            if line.eq_ignore_ascii_case(EXIT_CHAT) {
                SessionInput::ExitChat
            } else if line.is_empty() {
                SessionInput::Ignore
            } else {
                SessionInput::ChatText(line.to_string())
            }
        }
    }
}

/// Server-side state for one connected peer
///
/// Owned by the `ConnectionRegistry` while the peer is connected; the mode
/// is only changed through the registry's pairing operations.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Remote address, for logging
    pub peer_addr: String,
    /// Server → Client message channel
    sender: mpsc::Sender<ServerMessage>,
    mode: SessionMode,
}

impl Session {
    /// Create a new session in Command mode
    pub fn new(id: SessionId, peer_addr: String, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            peer_addr,
            sender,
            mode: SessionMode::Command,
        }
    }

    /// Queue a message for this session's peer without waiting
    ///
    /// Returns an error if the peer disconnected or has stopped reading.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::BufferFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Handle for sending after the registry entry is no longer borrowed
    pub fn sender(&self) -> mpsc::Sender<ServerMessage> {
        self.sender.clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn partner(&self) -> Option<SessionId> {
        match self.mode {
            SessionMode::Chat { partner } => Some(partner),
            SessionMode::Command => None,
        }
    }

    pub fn is_in_command_mode(&self) -> bool {
        self.mode == SessionMode::Command
    }

    pub(crate) fn enter_chat(&mut self, partner: SessionId) {
        self.mode = SessionMode::Chat { partner };
    }

    pub(crate) fn leave_chat(&mut self) {
        self.mode = SessionMode::Command;
    }
}
