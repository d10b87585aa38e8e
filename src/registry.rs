//! Connection Registry
//!
//! Maps a session id to its live session state. The map itself is never
//! handed out: callers get lookups, snapshots, and the pairing operations
//! that keep the partner relation symmetric.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::PairError;
use crate::message::ServerMessage;
use crate::session::{Session, SessionMode};
use crate::types::SessionId;

/// Point-in-time view of one registered session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub mode: SessionMode,
    pub sender: mpsc::Sender<ServerMessage>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<SessionId, Session>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly connected session
    pub fn register(&mut self, session: Session) {
        debug!("Registering session {} ({})", session.id, session.peer_addr);
        self.sessions.insert(session.id, session);
    }

    /// Remove a session, returning it if it was registered
    ///
    /// Does not touch the partner; end the chat first.
    pub fn unregister(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn lookup(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn is_registered(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Registered and able to start a chat
    pub fn is_available(&self, id: SessionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|session| session.is_in_command_mode())
    }

    /// Copy of every registered session's id, mode and sender
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .values()
            .map(|session| SessionSnapshot {
                id: session.id,
                mode: session.mode(),
                sender: session.sender(),
            })
            .collect()
    }

    /// Put two available sessions into chat with each other
    ///
    /// Both are re-checked here; nothing changes unless both are registered
    /// and in Command mode.
    pub fn pair(&mut self, a: SessionId, b: SessionId) -> Result<(), PairError> {
        if a == b {
            return Err(PairError::SelfPair(a));
        }
        for id in [a, b] {
            if !self.is_available(id) {
                return Err(PairError::SessionUnavailable(id));
            }
        }
        if let Some(session) = self.sessions.get_mut(&a) {
            session.enter_chat(b);
        }
        if let Some(session) = self.sessions.get_mut(&b) {
            session.enter_chat(a);
        }
        Ok(())
    }

    /// Return `id` and its partner to Command mode
    ///
    /// Returns the partner that was unlinked, or `None` if `id` was not
    /// chatting. The partner is reset only while it still points back at `id`.
    pub fn unpair(&mut self, id: SessionId) -> Option<SessionId> {
        let session = self.sessions.get_mut(&id)?;
        let partner = session.partner()?;
        session.leave_chat();

        if let Some(other) = self.sessions.get_mut(&partner) {
            if other.partner() == Some(id) {
                other.leave_chat();
            }
        }
        Some(partner)
    }

    /// Remove every session, e.g. at shutdown
    pub fn drain(&mut self) -> Vec<Session> {
        self.sessions.drain().map(|(_, session)| session).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
