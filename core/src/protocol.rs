//! Wire protocol between the queue server and the client.
//!
//! # Message Protocol
//!
//! Every frame is a JSON object tagged by `type`, with the body under
//! `payload`.
//!
//! **Server → Client:**
//! ```json
//! { "type": "ticketCalled", "payload": { "ticket": { "id": 4, "eventid": 9, "state": "Called", "participants": [] } } }
//! { "type": "ticketSummaries", "payload": { "eventid": 9, "position": 3, "waiting": 12, "called": 2 } }
//! { "type": "loginFailed", "payload": { "passwordRequired": true } }
//! ```
//!
//! **Client → Server:**
//! ```json
//! { "type": "login", "payload": { "username": "alice", "password": "secret" } }
//! { "type": "unsubscribeEvent", "payload": { "eventid": 9 } }
//! { "type": "disconnect" }
//! ```

use crate::types::{EventId, Ticket, TicketMessage, TicketMessageKind, UserTicketSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// Errors raised while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is not valid JSON or does not match any known message
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// A value could not be serialized
    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// Messages that can be demultiplexed by kind.
pub trait Routable {
    /// Discriminant used to select subscribers
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Kind of this message
    fn kind(&self) -> Self::Kind;
}

/// Body of every ticket-scoped server message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPayload {
    /// Replacement ticket snapshot
    pub ticket: Ticket,
}

/// Body of a `loginFailed` message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFailure {
    /// `true`: the user exists and needs a password.
    /// `false`: the user name is already taken.
    #[serde(rename = "passwordRequired")]
    pub password_required: bool,
}

/// Inbound push message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Ticket (re-)activated
    TicketActivated(TicketPayload),
    /// Ticket called
    TicketCalled(TicketPayload),
    /// Call accepted
    TicketAccepted(TicketPayload),
    /// Iteration skipped
    TicketSkipped(TicketPayload),
    /// Call expired
    TicketExpired(TicketPayload),
    /// Ticket returned
    TicketDeleted(TicketPayload),
    /// Queue summary for one event
    TicketSummaries(UserTicketSummary),
    /// Login rejected
    LoginFailed(LoginFailure),
    /// Connection status changed
    Connected(bool),
    /// Identification status changed
    Identified(bool),
}

/// Discriminant of [`ServerMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `ticketActivated`
    TicketActivated,
    /// `ticketCalled`
    TicketCalled,
    /// `ticketAccepted`
    TicketAccepted,
    /// `ticketSkipped`
    TicketSkipped,
    /// `ticketExpired`
    TicketExpired,
    /// `ticketDeleted`
    TicketDeleted,
    /// `ticketSummaries`
    TicketSummaries,
    /// `loginFailed`
    LoginFailed,
    /// `connected`
    Connected,
    /// `identified`
    Identified,
}

impl From<TicketMessageKind> for MessageKind {
    fn from(kind: TicketMessageKind) -> Self {
        match kind {
            TicketMessageKind::Activated => Self::TicketActivated,
            TicketMessageKind::Called => Self::TicketCalled,
            TicketMessageKind::Accepted => Self::TicketAccepted,
            TicketMessageKind::Skipped => Self::TicketSkipped,
            TicketMessageKind::Expired => Self::TicketExpired,
            TicketMessageKind::Deleted => Self::TicketDeleted,
        }
    }
}

impl ServerMessage {
    /// The ticket-scoped view of this message, if it is one
    #[must_use]
    pub fn ticket_message(&self) -> Option<TicketMessage> {
        let (kind, payload) = match self {
            Self::TicketActivated(p) => (TicketMessageKind::Activated, p),
            Self::TicketCalled(p) => (TicketMessageKind::Called, p),
            Self::TicketAccepted(p) => (TicketMessageKind::Accepted, p),
            Self::TicketSkipped(p) => (TicketMessageKind::Skipped, p),
            Self::TicketExpired(p) => (TicketMessageKind::Expired, p),
            Self::TicketDeleted(p) => (TicketMessageKind::Deleted, p),
            Self::TicketSummaries(_)
            | Self::LoginFailed(_)
            | Self::Connected(_)
            | Self::Identified(_) => return None,
        };
        Some(TicketMessage::new(kind, payload.ticket.clone()))
    }

    /// The ticket snapshot carried by a ticket-scoped message
    #[must_use]
    pub const fn ticket(&self) -> Option<&Ticket> {
        match self {
            Self::TicketActivated(p)
            | Self::TicketCalled(p)
            | Self::TicketAccepted(p)
            | Self::TicketSkipped(p)
            | Self::TicketExpired(p)
            | Self::TicketDeleted(p) => Some(&p.ticket),
            Self::TicketSummaries(_)
            | Self::LoginFailed(_)
            | Self::Connected(_)
            | Self::Identified(_) => None,
        }
    }

    /// The summary carried by a `ticketSummaries` message
    #[must_use]
    pub const fn summary(&self) -> Option<&UserTicketSummary> {
        match self {
            Self::TicketSummaries(summary) => Some(summary),
            _ => None,
        }
    }
}

impl From<TicketMessage> for ServerMessage {
    fn from(message: TicketMessage) -> Self {
        let payload = TicketPayload {
            ticket: message.ticket,
        };
        match message.kind {
            TicketMessageKind::Activated => Self::TicketActivated(payload),
            TicketMessageKind::Called => Self::TicketCalled(payload),
            TicketMessageKind::Accepted => Self::TicketAccepted(payload),
            TicketMessageKind::Skipped => Self::TicketSkipped(payload),
            TicketMessageKind::Expired => Self::TicketExpired(payload),
            TicketMessageKind::Deleted => Self::TicketDeleted(payload),
        }
    }
}

impl Routable for ServerMessage {
    type Kind = MessageKind;

    fn kind(&self) -> MessageKind {
        match self {
            Self::TicketActivated(_) => MessageKind::TicketActivated,
            Self::TicketCalled(_) => MessageKind::TicketCalled,
            Self::TicketAccepted(_) => MessageKind::TicketAccepted,
            Self::TicketSkipped(_) => MessageKind::TicketSkipped,
            Self::TicketExpired(_) => MessageKind::TicketExpired,
            Self::TicketDeleted(_) => MessageKind::TicketDeleted,
            Self::TicketSummaries(_) => MessageKind::TicketSummaries,
            Self::LoginFailed(_) => MessageKind::LoginFailed,
            Self::Connected(_) => MessageKind::Connected,
            Self::Identified(_) => MessageKind::Identified,
        }
    }
}

/// Password that never shows up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Wrap a password
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// The raw password
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Outbound command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Identify the session
    Login {
        /// User name
        username: String,
        /// Password (may be empty for first-time users)
        password: Password,
    },
    /// Close the session
    Disconnect,
    /// Pass on the current call
    Skip {
        /// Ticket being skipped
        ticket: Ticket,
    },
    /// Accept the current call
    Confirm {
        /// Ticket being confirmed
        ticket: Ticket,
    },
    /// Start (or resume) receiving pushes for an event
    SubscribeEvent {
        /// Event id
        #[serde(rename = "eventid")]
        event_id: EventId,
    },
    /// Leave the queue for an event
    UnsubscribeEvent {
        /// Event id
        #[serde(rename = "eventid")]
        event_id: EventId,
    },
}

/// Decode one inbound frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the frame is not a known message.
pub fn decode_server_message(frame: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Encode one inbound frame (used by test servers and demos).
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_server_message(message: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Encode one outbound command.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_command(command: &ClientCommand) -> Result<String, ProtocolError> {
    serde_json::to_string(command).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode one outbound command (used by test servers).
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the frame is not a known command.
pub fn decode_command(frame: &str) -> Result<ClientCommand, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
