//! Chat Relay
//!
//! Pairs two sessions, forwards chat text between them, and ends chats
//! symmetrically. Sends never wait: a peer that is gone or has stopped
//! reading is evicted, and the remaining side is told its partner left.

use tracing::{debug, info, warn};

use crate::error::{PairError, SendError};
use crate::message::ServerMessage;
use crate::registry::ConnectionRegistry;
use crate::store::ItemStore;
use crate::types::{ItemId, SessionId};

/// Why a chat is being ended, from the point of view of `session`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `session` sent the exit token
    Exited,
    /// `session` itself disconnected or became unreachable
    Disconnected,
    /// `session`'s partner could not be reached
    PartnerUnreachable,
}

const LEFT_SELF: &str = "You have left the chat. Returning to main menu.";
const LEFT_OTHER: &str = "The other user has left the chat. Returning to main menu.";
const PARTNER_GONE: &str = "Your chat partner has disconnected. Returning to main menu.";

/// Link the reporters of two matched items and start their chat
///
/// `a` reported `item_a`, `b` reported `item_b`. Both sessions are
/// re-checked by the registry immediately before the commit; on any error
/// nothing has changed. Both sides are told about the match before either
/// one is evicted for being unreachable.
pub fn pair(
    registry: &mut ConnectionRegistry,
    store: &mut ItemStore,
    a: SessionId,
    b: SessionId,
    item_a: ItemId,
    item_b: ItemId,
) -> Result<(), PairError> {
    registry.pair(a, b)?;
    if let Err(e) = store.mark_matched(item_a, item_b) {
        registry.unpair(a);
        return Err(e.into());
    }

    info!(
        "Chat session started between {} and {} for items {} & {}",
        a, b, item_a, item_b
    );

    let mut unreachable = Vec::new();
    for (session, counterpart_item) in [(a, item_b), (b, item_a)] {
        if notify_paired(registry, session, counterpart_item).is_err() {
            unreachable.push(session);
        }
    }

    for session in unreachable {
        warn!("Could not notify {} of pairing, ending chat", session);
        evict(registry, session);
    }
    Ok(())
}

fn notify_paired(
    registry: &ConnectionRegistry,
    session: SessionId,
    counterpart_item: ItemId,
) -> Result<(), SendError> {
    let Some(target) = registry.lookup(session) else {
        return Err(SendError::ChannelClosed);
    };
    target.send(ServerMessage::MatchFound(format!(
        "You have been matched with another user regarding item ID {}!",
        counterpart_item
    )))?;
    target.send(ServerMessage::info(
        "You are now connected for a chat. Type your message and press Enter.",
    ))?;
    target.send(ServerMessage::info(
        "Type '/exit_chat' to end the chat and return to the main menu.",
    ))
}

/// Forward chat text from `from` to its partner
///
/// Ends the chat for both sides and evicts the partner if it is gone or
/// not reading.
pub fn relay(registry: &mut ConnectionRegistry, from: SessionId, text: String) {
    let Some(partner) = registry.lookup(from).and_then(|s| s.partner()) else {
        debug!("Session {} is not chatting, nothing to relay", from);
        return;
    };

    let sent = match registry.lookup(partner) {
        Some(target) => target.send(ServerMessage::ChatMsg {
            tag: from.chat_tag(),
            text,
        }),
        None => Err(SendError::ChannelClosed),
    };

    if let Err(e) = sent {
        warn!("Chat partner {} of {} unreachable ({}), ending chat", partner, from, e);
        end_chat(registry, from, EndReason::PartnerUnreachable);
        registry.unregister(partner);
    }
}

/// End the chat `session` is in, if any
///
/// Idempotent: returns `false` and sends nothing when `session` is not in
/// Chat mode. Item status is never touched. A side that cannot take its
/// notice is unregistered.
pub fn end_chat(registry: &mut ConnectionRegistry, session: SessionId, reason: EndReason) -> bool {
    let Some(partner) = registry.unpair(session) else {
        return false;
    };

    let (own_notice, partner_notice) = match reason {
        EndReason::Exited => (Some(LEFT_SELF), Some(LEFT_OTHER)),
        EndReason::Disconnected => (None, Some(PARTNER_GONE)),
        EndReason::PartnerUnreachable => (Some(PARTNER_GONE), None),
    };

    for (target, notice) in [(session, own_notice), (partner, partner_notice)] {
        let Some(notice) = notice else { continue };
        let Some(peer) = registry.lookup(target) else {
            debug!("Session {} already gone, skipping chat-ended notice", target);
            continue;
        };
        if let Err(e) = peer.send(ServerMessage::ChatEnded(notice.to_string())) {
            warn!("Could not send chat-ended notice to {}: {}, dropping it", target, e);
            registry.unregister(target);
        }
    }

    info!("Chat session ended between {} and {} ({:?})", session, partner, reason);
    true
}

/// Drop a session that is gone or not reading
///
/// Its chat partner, if any, is told and returned to Command mode. Any
/// worker still attached to the session finds itself unregistered.
pub fn evict(registry: &mut ConnectionRegistry, session: SessionId) {
    end_chat(registry, session, EndReason::Disconnected);
    if registry.unregister(session).is_some() {
        info!("Session {} evicted", session);
    }
}
