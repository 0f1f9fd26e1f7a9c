//! Channel-backed transport.
//!
//! The client never touches the socket. [`ChannelTransport`] hands each
//! outbound command to an unbounded channel; the shell that owns the
//! connection drains the receiver, encodes each command with
//! [`encode_command`](ticketline_core::protocol::encode_command), and writes
//! the frame.

use std::sync::atomic::{AtomicBool, Ordering};
use ticketline_core::protocol::ClientCommand;
use ticketline_core::transport::{Transport, TransportError};
use tokio::sync::mpsc;

/// Outbound half of a command channel
#[derive(Debug)]
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<ClientCommand>,
    connected: AtomicBool,
}

impl ChannelTransport {
    /// Create a transport and the receiver the connection shell drains
    ///
    /// The transport starts connected.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                connected: AtomicBool::new(true),
            },
            receiver,
        )
    }

    /// Record link state; commands are refused while disconnected
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Current link state
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, command: ClientCommand) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.sender
            .send(command)
            .map_err(|_| TransportError::Closed)
    }
}
