//! Ticket state machine.
//!
//! One [`TicketReducer`] instance runs per event subscription. It applies the
//! server's push messages to the ticket snapshot, keeps the user-facing
//! "last message" pair current, and emits the notifier calls each
//! transition requires.
//!
//! | Kind      | New state | Side effect                                          |
//! |-----------|-----------|------------------------------------------------------|
//! | Activated | Activated | notify "Ticket (re-)activated"                       |
//! | Called    | Called    | vibrate, schedule reminder keyed by event, attention |
//! | Accepted  | Confirmed | notify "Ticket accepted"                             |
//! | Skipped   | Activated | notify "Ticket skipped"                              |
//! | Expired   | Activated | notify "Ticket has expired"                          |
//! | Deleted   | Deleted   | cancel, notify "Ticket returned"                     |
//!
//! A message whose kind is not legal from the current state is dropped and
//! the view stays as it was, unless the only thing missing is the
//! activation of the current iteration: then the message is applied with
//! its usual effects. Once the ticket is cancelled only a repeated
//! `Deleted` is accepted, as a silent snapshot update.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use ticketline_core::effect::Effect;
use ticketline_core::environment::Clock;
use ticketline_core::notifier::{CALLED_VIBRATION_PATTERN, Notifier, NotifierCall};
use ticketline_core::protocol::ClientCommand;
use ticketline_core::reducer::Reducer;
use ticketline_core::transport::Transport;
use ticketline_core::types::{
    EventId, EventSubscription, Ticket, TicketKey, TicketMessage, TicketMessageKind, TicketStatus,
};
use ticketline_core::{SmallVec, smallvec};

/// Title shown while the user is being called
pub const CALLED_TITLE: &str = "Let's go";

/// Body of the called notification and of the scheduled reminder
pub const CALLED_BODY: &str = "Please confirm. Will you be ready in 10 minutes?";

/// Prefix `label` with the wall-clock time, as shown in last-message titles
#[must_use]
pub fn stamp(now: DateTime<Utc>, label: &str) -> String {
    format!("{} - {label}", now.format("%H:%M:%S"))
}

/// State of one tracked ticket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketState {
    /// The subscription, holding the latest ticket snapshot
    pub subscription: EventSubscription,
    /// Time-stamped headline of the latest change
    pub last_message_title: String,
    /// Explanation of the latest change
    pub last_message: String,
    /// Set once the server returned the ticket
    pub cancelled: bool,
    /// Set when the subscription is torn down; nothing applies afterwards
    pub closed: bool,
}

impl TicketState {
    /// Initial state for a fresh subscription
    #[must_use]
    pub fn registered(subscription: EventSubscription, now: DateTime<Utc>) -> Self {
        let last_message = format!(
            "You'll be called 10 minutes before Your Event \"{}\" starts!",
            subscription.description
        );
        Self {
            subscription,
            last_message_title: stamp(now, "Ticket registered"),
            last_message,
            cancelled: false,
            closed: false,
        }
    }

    /// Current ticket snapshot
    #[must_use]
    pub const fn ticket(&self) -> &Ticket {
        &self.subscription.ticket
    }

    /// Identity of the tracked ticket
    #[must_use]
    pub const fn key(&self) -> TicketKey {
        self.subscription.ticket.key()
    }

    /// Event the ticket belongs to
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.subscription.event_id
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        self.subscription.ticket.state
    }

    /// True while the user is being called
    #[must_use]
    pub fn is_called(&self) -> bool {
        self.status() == TicketStatus::Called
    }

    /// True once the user accepted the call
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status() == TicketStatus::Confirmed
    }

    /// Event description
    #[must_use]
    pub fn event_title(&self) -> &str {
        &self.subscription.description
    }

    /// Participants on the ticket, in server order
    #[must_use]
    pub fn participants(&self) -> &[String] {
        &self.subscription.ticket.participants
    }
}

/// Actions for the ticket state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TicketAction {
    /// A push message routed to this ticket
    Received(TicketMessage),
    /// The user is not ready; ask the server to skip this iteration
    Skip,
    /// The user accepts the call
    Confirm,
    /// Tear the subscription down
    Close,
}

/// Dependencies of the ticket state machine
#[derive(Clone)]
pub struct TicketEnvironment {
    /// Native capabilities
    pub notifier: Arc<dyn Notifier>,
    /// Outbound command channel
    pub transport: Arc<dyn Transport>,
    /// Wall clock for message titles
    pub clock: Arc<dyn Clock>,
}

impl TicketEnvironment {
    /// Creates a new `TicketEnvironment`
    #[must_use]
    pub fn new(
        notifier: Arc<dyn Notifier>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifier,
            transport,
            clock,
        }
    }
}

/// Reducer for one ticket
#[derive(Clone, Copy, Debug, Default)]
pub struct TicketReducer;

impl TicketReducer {
    fn receive(
        state: &mut TicketState,
        message: TicketMessage,
        env: &TicketEnvironment,
    ) -> SmallVec<[Effect<TicketAction>; 4]> {
        let key = state.key();
        let kind = message.kind;

        if !key.matches(&message.ticket) {
            tracing::debug!(%key, other = %message.ticket.key(), "Message for another ticket, dropping");
            return SmallVec::new();
        }

        if state.cancelled {
            if kind == TicketMessageKind::Deleted {
                state.subscription.ticket = message.ticket;
            } else {
                tracing::debug!(%key, %kind, "Ticket already returned, ignoring");
            }
            return SmallVec::new();
        }

        let from = state.status();
        if !kind.is_reachable_from(from) {
            tracing::warn!(%key, %kind, %from, "Illegal ticket transition, dropping");
            return SmallVec::new();
        }
        if !kind.is_legal_from(from) {
            tracing::info!(%key, %kind, %from, "Activation was missed, resynchronising");
        }

        let mut ticket = message.ticket;
        let to = kind.resulting_status();
        if ticket.state != to {
            tracing::debug!(%key, %kind, reported = %ticket.state, "Snapshot state disagrees with message kind");
            ticket.state = to;
        }
        state.subscription.ticket = ticket;
        tracing::debug!(%key, %from, %to, "Ticket transition");

        let now = env.clock.now();
        let title = state.subscription.description.clone();
        let (label, body) = match kind {
            TicketMessageKind::Called => {
                state.last_message_title = stamp(now, CALLED_TITLE);
                state.last_message = CALLED_BODY.to_string();
                return smallvec![
                    Effect::notify(
                        &env.notifier,
                        NotifierCall::Vibrate {
                            pattern: CALLED_VIBRATION_PATTERN.to_vec(),
                        },
                    ),
                    Effect::notify(
                        &env.notifier,
                        NotifierCall::ScheduleReminder {
                            key: key.event_id,
                            body: CALLED_BODY.to_string(),
                        },
                    ),
                    Effect::notify(&env.notifier, NotifierCall::Attention),
                ];
            },
            TicketMessageKind::Activated => (
                "Ticket (re-)activated",
                format!("You will be called 10 minutes before Your Event \"{title}\" starts!"),
            ),
            TicketMessageKind::Accepted => (
                "Ticket accepted",
                format!("We expect you in 10 minutes at {title}!"),
            ),
            TicketMessageKind::Skipped => ("Ticket skipped", next_iteration(&title)),
            TicketMessageKind::Expired => ("Ticket has expired", next_iteration(&title)),
            TicketMessageKind::Deleted => {
                state.cancelled = true;
                (
                    "Ticket returned",
                    format!("You're no longer waiting for {title}!"),
                )
            },
        };

        state.last_message_title = stamp(now, label);
        state.last_message = body;
        smallvec![Effect::notify(
            &env.notifier,
            NotifierCall::Notify {
                title: state.last_message_title.clone(),
                body: state.last_message.clone(),
            },
        )]
    }

    fn answer(
        state: &mut TicketState,
        env: &TicketEnvironment,
        label: &str,
        body: &str,
        command: ClientCommand,
    ) -> SmallVec<[Effect<TicketAction>; 4]> {
        if state.cancelled {
            tracing::debug!(key = %state.key(), "Ticket already returned, not answering");
            return SmallVec::new();
        }
        state.last_message_title = stamp(env.clock.now(), label);
        state.last_message = body.to_string();
        smallvec![Effect::command(&env.transport, command)]
    }
}

fn next_iteration(title: &str) -> String {
    format!(
        "You will be called 10 minutes before the next iteration of Your Event \"{title}\" starts!"
    )
}

impl Reducer for TicketReducer {
    type State = TicketState;
    type Action = TicketAction;
    type Environment = TicketEnvironment;

    fn reduce(
        &self,
        state: &mut TicketState,
        action: TicketAction,
        env: &TicketEnvironment,
    ) -> SmallVec<[Effect<TicketAction>; 4]> {
        if state.closed {
            tracing::debug!(key = %state.key(), ?action, "Subscription closed, discarding");
            return SmallVec::new();
        }

        match action {
            TicketAction::Received(message) => Self::receive(state, message, env),
            TicketAction::Skip => {
                let ticket = state.ticket().clone();
                Self::answer(
                    state,
                    env,
                    "I'm Not ready yet",
                    "I skipped my invitation to the next iteration",
                    ClientCommand::Skip { ticket },
                )
            },
            TicketAction::Confirm => {
                let ticket = state.ticket().clone();
                Self::answer(
                    state,
                    env,
                    "Confirmed",
                    "Yes, i'll be there",
                    ClientCommand::Confirm { ticket },
                )
            },
            TicketAction::Close => {
                state.closed = true;
                SmallVec::new()
            },
        }
    }
}
