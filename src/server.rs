//! MatchServer Actor implementation
//!
//! The central actor that owns the Item Store and the Connection Registry.
//! Every command is handled to completion before the next one is received,
//! so each handler is a single critical section over all shared state.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{PairError, ProtocolError};
use crate::item::{Item, ItemReport, ReportKind};
use crate::matcher;
use crate::message::{ClientCommand, ServerMessage};
use crate::registry::ConnectionRegistry;
use crate::relay::{self, EndReason};
use crate::session::{self, Session, SessionInput};
use crate::store::ItemStore;
use crate::types::SessionId;

const SHUTDOWN_NOTICE: &str = "The server is shutting down. Goodbye.";

/// Commands sent from connection handlers to the MatchServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        session_id: SessionId,
        peer_addr: String,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Connection closed (EOF, reset, idle limit, or shutdown)
    Disconnect { session_id: SessionId },
    /// One line of UTF-8 input
    Line { session_id: SessionId, line: String },
    /// Input that could not be turned into a line
    Rejected {
        session_id: SessionId,
        error: ProtocolError,
    },
    /// Persist, notify every session, and drop all sessions
    Shutdown { done: oneshot::Sender<()> },
}

/// The matching-and-relay actor
pub struct MatchServer {
    /// Connected sessions: SessionId -> Session
    registry: ConnectionRegistry,
    /// All item reports
    store: ItemStore,
    welcome_message: String,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl MatchServer {
    /// Create a new MatchServer with the given store and command receiver
    pub fn new(
        store: ItemStore,
        welcome_message: String,
        receiver: mpsc::Receiver<ServerCommand>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            store,
            welcome_message,
            receiver,
        }
    }

    /// Run the MatchServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("MatchServer started with {} items", self.store.len());

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        if let Err(e) = self.store.persist() {
            error!("Error saving items on exit: {}", e);
        }
        info!("MatchServer stopped");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                session_id,
                peer_addr,
                sender,
            } => {
                self.handle_connect(session_id, peer_addr, sender);
            }
            ServerCommand::Disconnect { session_id } => {
                self.handle_disconnect(session_id);
            }
            ServerCommand::Line { session_id, line } => {
                self.handle_line(session_id, line);
            }
            ServerCommand::Rejected { session_id, error } => {
                self.reply(session_id, error.into());
            }
            ServerCommand::Shutdown { done } => {
                self.handle_shutdown();
                let _ = done.send(());
            }
        }
    }

    /// Handle new connection: register, then greet
    fn handle_connect(
        &mut self,
        session_id: SessionId,
        peer_addr: String,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        info!("Session {} connected from {}", session_id, peer_addr);
        self.registry
            .register(Session::new(session_id, peer_addr, sender));

        self.reply(session_id, ServerMessage::Welcome(self.welcome_message.clone()));
        self.reply(
            session_id,
            ServerMessage::Locations(self.store.locations().to_vec()),
        );
        debug!("Total sessions: {}", self.registry.len());
    }

    /// Handle disconnection: end any chat, then forget the session
    fn handle_disconnect(&mut self, session_id: SessionId) {
        relay::end_chat(&mut self.registry, session_id, EndReason::Disconnected);
        if self.registry.unregister(session_id).is_some() {
            info!("Session {} disconnected", session_id);
        }
        debug!("Total sessions: {}", self.registry.len());
    }

    /// Interpret a line according to the session's current mode
    fn handle_line(&mut self, session_id: SessionId, line: String) {
        let Some(mode) = self.registry.lookup(session_id).map(|s| s.mode()) else {
            debug!("Line from unregistered session {} dropped", session_id);
            return;
        };

        match session::interpret(mode, &line) {
            SessionInput::Command(Ok(command)) => {
                self.handle_client_command(session_id, command);
            }
            SessionInput::Command(Err(e)) => {
                debug!("Rejected command from {}: {:?}", session_id, e);
                self.reply(session_id, e.into());
            }
            SessionInput::ExitChat => {
                info!("Session {} left the chat", session_id);
                self.reply(session_id, ServerMessage::info("You are exiting the chat..."));
                relay::end_chat(&mut self.registry, session_id, EndReason::Exited);
            }
            SessionInput::ChatText(text) => {
                debug!("Chat from {}: {:?}", session_id, text);
                relay::relay(&mut self.registry, session_id, text);
            }
            SessionInput::Ignore => {}
        }
    }

    fn handle_client_command(&mut self, session_id: SessionId, command: ClientCommand) {
        match command {
            ClientCommand::Report { kind, report } => {
                self.handle_report(session_id, kind, report);
            }
            ClientCommand::GetMyItems => {
                let lines = self
                    .store
                    .items_of(session_id)
                    .iter()
                    .map(Item::own_summary)
                    .collect();
                self.reply(session_id, ServerMessage::YourItems(lines));
            }
            ClientCommand::GetAllItems => {
                let lines = self
                    .store
                    .all_items()
                    .iter()
                    .map(Item::public_summary)
                    .collect();
                self.reply(session_id, ServerMessage::AllItems(lines));
                info!("Session {} requested all items", session_id);
            }
        }
    }

    /// Store a report, then try to pair it
    fn handle_report(&mut self, session_id: SessionId, kind: ReportKind, report: ItemReport) {
        let item = match self.store.add_item(session_id, kind, report) {
            Ok(item) => item,
            Err(e) => {
                debug!("Invalid report from {}: {}", session_id, e);
                self.reply(session_id, e.into());
                return;
            }
        };

        info!(
            "Session {} reported: {} ({}) at {}",
            session_id, item.name, item.status, item.location
        );
        self.reply(
            session_id,
            ServerMessage::Success(format!("Item {} reported successfully.", item.id)),
        );

        let Some(candidate) = matcher::find_match(&self.store, &self.registry, &item).cloned() else {
            self.reply(
                session_id,
                ServerMessage::info("No immediate match found. We'll keep an eye out!"),
            );
            return;
        };

        info!("Item {} matched with {}", item.id, candidate.id);
        let result = relay::pair(
            &mut self.registry,
            &mut self.store,
            session_id,
            candidate.reporter,
            item.id,
            candidate.id,
        );

        if let Err(e) = result {
            warn!(
                "Could not start chat for {} and {}: {}",
                item.id, candidate.id, e
            );
            self.notify_deferred(session_id, &item, &candidate, &e);
        }
    }

    /// Tell both reporters about a match that could not be committed yet
    fn notify_deferred(
        &mut self,
        session_id: SessionId,
        item: &Item,
        candidate: &Item,
        reason: &PairError,
    ) {
        debug!("Pairing deferred: {:?}", reason);
        self.reply(
            session_id,
            ServerMessage::info(format!(
                "Your item '{}' has a potential match (ID: {}). The other user will be notified if available.",
                item.name, candidate.id
            )),
        );

        if self.registry.is_available(candidate.reporter) {
            self.reply(
                candidate.reporter,
                ServerMessage::info(format!(
                    "Your reported item '{}' (ID: {}) has a new potential match (ID: {}).",
                    candidate.name, candidate.id, item.id
                )),
            );
        }
    }

    /// Persist, send the shutdown notice to everyone, and drop all sessions
    fn handle_shutdown(&mut self) {
        info!("Saving items before shutdown...");
        if let Err(e) = self.store.persist() {
            error!("Error saving items at shutdown: {}", e);
        }

        let sessions = self.registry.snapshot();
        info!("Notifying {} sessions of shutdown", sessions.len());
        for session in &sessions {
            match session
                .sender
                .try_send(ServerMessage::ServerShutdown(SHUTDOWN_NOTICE.to_string()))
            {
                Ok(()) => debug!("Notified session {} of shutdown", session.id),
                Err(e) => warn!("Could not notify session {}: {}", session.id, e),
            }
        }

        // Dropping every sender closes the connections
        self.registry.drain();
    }

    /// Send to a registered session, evicting it if it cannot take the message
    fn reply(&mut self, session_id: SessionId, msg: ServerMessage) {
        let Some(session) = self.registry.lookup(session_id) else {
            debug!("Reply to unregistered session {} dropped", session_id);
            return;
        };
        if let Err(e) = session.send(msg) {
            warn!("Could not reply to {}: {}, evicting it", session_id, e);
            relay::evict(&mut self.registry, session_id);
        }
    }
}
