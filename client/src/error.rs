//! Error types for the client.

use thiserror::Error;
use ticketline_core::protocol::ProtocolError;
use ticketline_core::types::{EventId, TicketKey};

/// Why a login did not reach the identified state
///
/// The display text doubles as the user-facing status line.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    /// The account exists and needs a password
    #[error("Password required")]
    PasswordRequired,

    /// The name is taken by someone else
    #[error("User exists already")]
    UserAlreadyExists,

    /// The server did not answer in time
    #[error("Login timed out")]
    Timeout,

    /// The session shut down while waiting
    #[error("Session closed")]
    SessionClosed,
}

/// Errors returned by [`TicketsClient`](crate::TicketsClient) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A subscription for this event is already tracked
    #[error("Already subscribed to event {0}")]
    AlreadySubscribed(EventId),

    /// No tracked subscription holds this ticket
    #[error("Unknown {0}")]
    UnknownTicket(TicketKey),

    /// An inbound frame could not be decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Login failed
    #[error(transparent)]
    Login(#[from] LoginError),
}

/// Invalid configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Environment variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}
