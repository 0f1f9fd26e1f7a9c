//! Outbound half of the session transport.
//!
//! The transport itself (socket, framing, reconnect backoff) lives outside the
//! core. The core only needs a way to hand it typed commands; inbound traffic
//! is pushed into the client by the shell that owns the connection.

use crate::protocol::ClientCommand;
use thiserror::Error;

/// Errors that can occur when handing a command to the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No connection is currently established
    #[error("Transport is disconnected")]
    Disconnected,

    /// The transport was shut down and accepts no more commands
    #[error("Transport closed")]
    Closed,

    /// The command could not be encoded
    #[error("Failed to encode command: {0}")]
    Encode(String),
}

/// Outbound command channel to the server.
///
/// `send` only enqueues: delivery is ordered and reliable once the connection
/// is established, and no reply is awaited. Authoritative results arrive later
/// as push messages.
pub trait Transport: Send + Sync {
    /// Enqueue a command for the server
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the command cannot be enqueued.
    fn send(&self, command: ClientCommand) -> Result<(), TransportError>;
}
