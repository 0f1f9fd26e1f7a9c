//! # Ticketline
//!
//! Client side of a queue-ticket protocol: a user holds tickets for
//! scheduled events, and the server pushes each ticket through
//! activation, calls, confirmation and return.
//!
//! ## Components
//!
//! - **Ticket state machine** ([`ticket`]): one reducer per tracked ticket,
//!   applying server messages and firing notifier calls
//! - **Summary aggregator** ([`summary`]): latest queue summary per event
//! - **Session controller** ([`session`]): login/logout, resubscription after
//!   reconnect, connected/identified signals
//! - **Subscriptions** ([`subscriptions`]): router registrations feeding each
//!   ticket store
//! - **[`TicketsClient`]**: the facade tying them together
//!
//! ## Example
//!
//! ```ignore
//! let (transport, mut outbound) = ChannelTransport::channel();
//! let client = TicketsClient::new(
//!     ClientEnvironment {
//!         notifier: Arc::new(LoggingNotifier),
//!         transport: Arc::new(transport),
//!         clock: Arc::new(SystemClock),
//!     },
//!     &ClientConfig::from_env()?,
//! );
//!
//! client.connection_changed(true);
//! client.login("alice", "secret").await?;
//! client.subscribe_event(subscription)?;
//!
//! // For every frame read from the socket
//! client.handle_frame(&frame).ok();
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod notifier;
pub mod reconnect;
pub mod session;
pub mod subscriptions;
pub mod summary;
pub mod ticket;
pub mod transport;

pub use client::{ClientEnvironment, TicketsClient};
pub use config::ClientConfig;
pub use error::{ClientError, ConfigError, LoginError};
pub use notifier::LoggingNotifier;
pub use reconnect::{ReconnectPolicy, reconnect_with_backoff};
pub use session::{SessionController, SessionState};
pub use summary::SummaryAggregator;
pub use ticket::TicketState;
pub use transport::ChannelTransport;

/// Metric names emitted by the client
pub mod metrics {
    use metrics::{describe_counter, describe_gauge};

    pub use metrics::{counter, gauge};

    /// Frames that failed to decode
    pub const MALFORMED_FRAMES: &str = "ticketline.client.malformed_frames";

    /// Tickets currently tracked
    pub const TRACKED_TICKETS: &str = "ticketline.client.tracked_tickets";

    /// Login attempts
    pub const LOGIN_ATTEMPTS: &str = "ticketline.session.login_attempts";

    /// Failed logins, labelled by `reason`
    pub const LOGIN_FAILURES: &str = "ticketline.session.login_failures";

    /// Register descriptions for client and runtime metrics.
    pub fn describe_metrics() {
        ticketline_runtime::metrics::describe_metrics();
        describe_counter!(MALFORMED_FRAMES, "Inbound frames that failed to decode");
        describe_gauge!(TRACKED_TICKETS, "Tickets currently tracked");
        describe_counter!(LOGIN_ATTEMPTS, "Login attempts");
        describe_counter!(LOGIN_FAILURES, "Logins that did not reach identification");
    }
}
