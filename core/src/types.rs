//! Domain types for the queue client.
//!
//! A [`Ticket`] is identified by the pair `(ticket id, event id)`. Ticket ids
//! are only unique within one event, so every lookup and every message filter
//! uses both halves of the [`TicketKey`].

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a ticket, unique only within its event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    /// Create a `TicketId` from its raw value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a scheduled event
///
/// Also used as the key for the local reminder scheduled when a ticket is called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Create an `EventId` from its raw value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full identity of a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketKey {
    /// Ticket id
    pub ticket_id: TicketId,
    /// Parent event id
    pub event_id: EventId,
}

impl TicketKey {
    /// Creates a new `TicketKey`
    #[must_use]
    pub const fn new(ticket_id: TicketId, event_id: EventId) -> Self {
        Self {
            ticket_id,
            event_id,
        }
    }

    /// True if `ticket` carries exactly this identity
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.id == self.ticket_id && ticket.event_id == self.event_id
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket {} of event {}", self.ticket_id, self.event_id)
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// Lifecycle state of a ticket
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Registered, not yet activated by the server
    #[default]
    Pending,
    /// Waiting in line for the current iteration
    Activated,
    /// Called by the server, awaiting the user's answer
    Called,
    /// The user accepted the call
    Confirmed,
    /// The user skipped the call; back in line for the next iteration
    Skipped,
    /// The call went unanswered; back in line for the next iteration
    Expired,
    /// Returned to the server (terminal)
    Deleted,
}

impl TicketStatus {
    /// True for the terminal state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// The state this one behaves as for transitions
    ///
    /// `Skipped` and `Expired` tickets wait in line exactly like
    /// `Activated` ones.
    #[must_use]
    pub const fn settled(self) -> Self {
        match self {
            Self::Skipped | Self::Expired => Self::Activated,
            other => other,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Activated => "Activated",
            Self::Called => "Called",
            Self::Confirmed => "Confirmed",
            Self::Skipped => "Skipped",
            Self::Expired => "Expired",
            Self::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

/// Snapshot of a ticket as sent by the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id
    pub id: TicketId,
    /// Parent event
    #[serde(rename = "eventid")]
    pub event_id: EventId,
    /// Lifecycle state
    #[serde(default)]
    pub state: TicketStatus,
    /// Participant identifiers, in server order
    #[serde(default)]
    pub participants: Vec<String>,
}

impl Ticket {
    /// Creates a pending ticket without participants
    #[must_use]
    pub const fn new(id: TicketId, event_id: EventId) -> Self {
        Self {
            id,
            event_id,
            state: TicketStatus::Pending,
            participants: Vec::new(),
        }
    }

    /// Builder: set the state
    #[must_use]
    pub fn with_state(mut self, state: TicketStatus) -> Self {
        self.state = state;
        self
    }

    /// Builder: set the participants
    #[must_use]
    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    /// Identity of this ticket
    #[must_use]
    pub const fn key(&self) -> TicketKey {
        TicketKey::new(self.id, self.event_id)
    }
}

/// A ticket bound to the event it queues for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    /// Human readable event title
    pub description: String,
    /// Event id
    #[serde(rename = "eventid")]
    pub event_id: EventId,
    /// The user's ticket for this event
    pub ticket: Ticket,
}

impl EventSubscription {
    /// Creates a new `EventSubscription`
    #[must_use]
    pub fn new(description: impl Into<String>, ticket: Ticket) -> Self {
        Self {
            description: description.into(),
            event_id: ticket.event_id,
            ticket,
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Kind of a ticket-scoped push message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketMessageKind {
    /// Ticket (re-)activated for the current iteration
    Activated,
    /// Ticket called
    Called,
    /// Call accepted
    Accepted,
    /// Iteration skipped
    Skipped,
    /// Call expired
    Expired,
    /// Ticket returned
    Deleted,
}

impl TicketMessageKind {
    /// Every kind, in protocol order
    pub const ALL: [Self; 6] = [
        Self::Activated,
        Self::Called,
        Self::Accepted,
        Self::Skipped,
        Self::Expired,
        Self::Deleted,
    ];

    /// State the ticket enters when a message of this kind is applied
    ///
    /// `Skipped` and `Expired` put the ticket back in line for the next
    /// iteration.
    #[must_use]
    pub const fn resulting_status(self) -> TicketStatus {
        match self {
            Self::Activated | Self::Skipped | Self::Expired => TicketStatus::Activated,
            Self::Called => TicketStatus::Called,
            Self::Accepted => TicketStatus::Confirmed,
            Self::Deleted => TicketStatus::Deleted,
        }
    }

    /// Whether a message of this kind directly follows a ticket in `from`
    ///
    /// `Skipped` and `Expired` sources count as `Activated`.
    #[must_use]
    pub const fn is_legal_from(self, from: TicketStatus) -> bool {
        use TicketStatus::{Activated, Called, Confirmed, Pending};

        match self {
            Self::Activated | Self::Skipped | Self::Expired => {
                matches!(from.settled(), Pending | Activated | Called | Confirmed)
            },
            Self::Called => matches!(from.settled(), Activated),
            Self::Accepted => matches!(from.settled(), Called),
            Self::Deleted => true,
        }
    }

    /// Whether a message of this kind may be applied to a ticket in `from`
    ///
    /// Besides the direct transitions this accepts a message that follows
    /// an `Activated` the client never saw (a call arriving for a ticket
    /// subscribed while offline). A repeat of the current state is not
    /// treated as such a gap.
    #[must_use]
    pub fn is_reachable_from(self, from: TicketStatus) -> bool {
        if self.is_legal_from(from) {
            return true;
        }
        let from = from.settled();
        self.resulting_status() != from
            && Self::Activated.is_legal_from(from)
            && self.is_legal_from(TicketStatus::Activated)
    }
}

impl fmt::Display for TicketMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Activated => "activated",
            Self::Called => "called",
            Self::Accepted => "accepted",
            Self::Skipped => "skipped",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A ticket-scoped push message
///
/// Consumed immediately by the router; never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketMessage {
    /// Replacement snapshot
    pub ticket: Ticket,
    /// What happened
    pub kind: TicketMessageKind,
}

impl TicketMessage {
    /// Creates a new `TicketMessage`
    #[must_use]
    pub const fn new(kind: TicketMessageKind, ticket: Ticket) -> Self {
        Self { ticket, kind }
    }
}

/// Per-event queue position summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTicketSummary {
    /// Event this summary belongs to
    #[serde(rename = "eventid")]
    pub event_id: EventId,
    /// 1-based place in line, if the user is queued
    #[serde(default)]
    pub position: Option<u32>,
    /// Tickets currently queued for the event
    #[serde(default)]
    pub waiting: u32,
    /// Tickets called in the current iteration
    #[serde(default)]
    pub called: u32,
}

impl UserTicketSummary {
    /// Creates an empty summary for `event_id`
    #[must_use]
    pub const fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            position: None,
            waiting: 0,
            called: 0,
        }
    }
}
