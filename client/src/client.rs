//! The client facade.
//!
//! [`TicketsClient`] wires the pieces together: inbound frames go through
//! one [`EventRouter`] to the session controller, the per-event ticket
//! stores and the summary aggregator; user operations go to the matching
//! store, whose effects reach the notifier and the transport.

use crate::config::ClientConfig;
use crate::error::{ClientError, LoginError};
use crate::metrics as names;
use crate::session::{SessionAction, SessionController, SessionEnvironment, SessionState};
use crate::subscriptions::TicketTracker;
use crate::summary::SummaryAggregator;
use crate::ticket::{TicketAction, TicketEnvironment, TicketReducer, TicketState};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use ticketline_core::environment::Clock;
use ticketline_core::notifier::Notifier;
use ticketline_core::protocol::{Password, ServerMessage, decode_server_message};
use ticketline_core::transport::Transport;
use ticketline_core::types::{EventId, EventSubscription, Ticket, UserTicketSummary};
use ticketline_runtime::{EventRouter, Store, Subscription};
use tokio::sync::watch;

/// Injected capabilities
#[derive(Clone)]
pub struct ClientEnvironment {
    /// Native capabilities
    pub notifier: Arc<dyn Notifier>,
    /// Outbound command channel
    pub transport: Arc<dyn Transport>,
    /// Wall clock
    pub clock: Arc<dyn Clock>,
}

/// Queue client for one user session
pub struct TicketsClient {
    router: EventRouter<ServerMessage>,
    session: Arc<SessionController>,
    summaries: Arc<SummaryAggregator>,
    tickets: Mutex<BTreeMap<EventId, TicketTracker>>,
    environment: TicketEnvironment,
    broadcast_capacity: usize,
    _session_routes: Vec<Subscription<ServerMessage>>,
}

impl TicketsClient {
    /// Creates a disconnected client
    #[must_use]
    pub fn new(environment: ClientEnvironment, config: &ClientConfig) -> Self {
        let router = EventRouter::new();
        let session = Arc::new(SessionController::new(
            config.username.clone(),
            SessionEnvironment {
                transport: Arc::clone(&environment.transport),
                login_timeout: config.login_timeout(),
            },
            config.broadcast_capacity,
        ));
        let session_routes = session.bind(&router);

        Self {
            router,
            session,
            summaries: Arc::new(SummaryAggregator::new()),
            tickets: Mutex::new(BTreeMap::new()),
            environment: TicketEnvironment::new(
                environment.notifier,
                environment.transport,
                environment.clock,
            ),
            broadcast_capacity: config.broadcast_capacity,
            _session_routes: session_routes,
        }
    }

    fn tickets(&self) -> MutexGuard<'_, BTreeMap<EventId, TicketTracker>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Deliver one inbound message
    ///
    /// Every handler has run when this returns. Returns the number of
    /// deliveries; zero means nobody was interested.
    pub fn handle_server_message(&self, message: &ServerMessage) -> usize {
        self.router.dispatch(message)
    }

    /// Decode and deliver one inbound frame
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the frame does not decode. The
    /// frame is skipped; the session is unaffected.
    pub fn handle_frame(&self, frame: &str) -> Result<usize, ClientError> {
        match decode_server_message(frame) {
            Ok(message) => Ok(self.handle_server_message(&message)),
            Err(error) => {
                names::counter!(names::MALFORMED_FRAMES).increment(1);
                tracing::debug!(%error, "Skipping malformed frame");
                Err(error.into())
            },
        }
    }

    /// Record a link status change reported out of band
    pub fn connection_changed(&self, connected: bool) {
        self.session.connection_changed(connected);
    }

    // ------------------------------------------------------------------
    // Tickets
    // ------------------------------------------------------------------

    /// Start tracking the ticket of `subscription`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadySubscribed`] if the event is tracked.
    pub fn subscribe_event(&self, subscription: EventSubscription) -> Result<(), ClientError> {
        let event_id = subscription.event_id;
        {
            let mut tickets = self.tickets();
            if tickets.contains_key(&event_id) {
                return Err(ClientError::AlreadySubscribed(event_id));
            }

            let state = TicketState::registered(subscription, self.environment.clock.now());
            let store = Store::with_broadcast_capacity(
                state,
                TicketReducer,
                self.environment.clone(),
                self.broadcast_capacity,
            );
            let tracker = TicketTracker::bind(&self.router, store, Arc::clone(&self.summaries));
            tickets.insert(event_id, tracker);
        }

        names::gauge!(names::TRACKED_TICKETS).increment(1.0);
        self.session.apply(SessionAction::EventSubscribed(event_id));
        Ok(())
    }

    fn answer(&self, ticket: &Ticket, action: TicketAction) -> Result<(), ClientError> {
        let store = self
            .tickets()
            .get(&ticket.event_id)
            .filter(|tracker| tracker.key() == ticket.key())
            .map(|tracker| tracker.store().clone())
            .ok_or(ClientError::UnknownTicket(ticket.key()))?;
        store.send(action);
        Ok(())
    }

    /// Tell the server the user is not ready for this call
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownTicket`] if the ticket is not tracked.
    pub fn skip(&self, ticket: &Ticket) -> Result<(), ClientError> {
        self.answer(ticket, TicketAction::Skip)
    }

    /// Accept the call
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnknownTicket`] if the ticket is not tracked.
    pub fn confirm(&self, ticket: &Ticket) -> Result<(), ClientError> {
        self.answer(ticket, TicketAction::Confirm)
    }

    fn release(&self, event_id: EventId) -> bool {
        let Some(tracker) = self.tickets().remove(&event_id) else {
            return false;
        };
        tracker.teardown();
        names::gauge!(names::TRACKED_TICKETS).decrement(1.0);
        true
    }

    /// Leave the event's queue
    ///
    /// Once this returns no message changes the ticket. Idempotent: returns
    /// `false` if the event was not tracked.
    pub fn unsubscribe_event(&self, event_id: EventId) -> bool {
        let released = self.release(event_id);
        if released {
            self.session.apply(SessionAction::EventUnsubscribed(event_id));
        }
        released
    }

    /// Dismiss a ticket locally without telling the server
    ///
    /// Used to acknowledge a returned ticket. Idempotent.
    pub fn close(&self, event_id: EventId) -> bool {
        let released = self.release(event_id);
        if released {
            self.session.apply(SessionAction::EventClosed(event_id));
        }
        released
    }

    /// Snapshot of the ticket tracked for `event_id`
    #[must_use]
    pub fn ticket(&self, event_id: EventId) -> Option<TicketState> {
        self.tickets().get(&event_id).map(TicketTracker::state)
    }

    /// Snapshots of every tracked ticket, by event id
    #[must_use]
    pub fn tickets_snapshot(&self) -> Vec<TicketState> {
        self.tickets().values().map(TicketTracker::state).collect()
    }

    /// Latest summary for `event_id`
    #[must_use]
    pub fn summary(&self, event_id: EventId) -> Option<UserTicketSummary> {
        self.summaries.summary(event_id)
    }

    /// Summary change signal
    #[must_use]
    pub fn summaries_changed(&self) -> watch::Receiver<u64> {
        self.summaries.subscribe()
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Log in and wait for the server's verdict
    ///
    /// # Errors
    ///
    /// See [`SessionController::login`].
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), LoginError> {
        names::counter!(names::LOGIN_ATTEMPTS).increment(1);
        let result = self
            .session
            .login(username, Password::new(password))
            .await;
        if let Err(error) = &result {
            names::counter!(names::LOGIN_FAILURES, "reason" => error.to_string()).increment(1);
        }
        result
    }

    /// Clear identification, drop every tracked ticket and disconnect
    ///
    /// Tickets do not outlive the session: nothing is resubscribed after
    /// the next login.
    pub fn logout(&self) {
        let tickets = std::mem::take(&mut *self.tickets());
        for tracker in tickets.into_values() {
            tracker.teardown();
            names::gauge!(names::TRACKED_TICKETS).decrement(1.0);
        }
        self.session.logout();
    }

    /// One-line session status
    #[must_use]
    pub fn status_text(&self) -> String {
        self.session.status_text()
    }

    /// Snapshot of the session state
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.session.state()
    }

    /// True after an explicit logout until the next login
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.session.is_stopped()
    }

    /// Link status signal
    #[must_use]
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.session.connected()
    }

    /// Identification signal
    #[must_use]
    pub fn identified(&self) -> watch::Receiver<bool> {
        self.session.identified()
    }
}

impl std::fmt::Debug for TicketsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketsClient")
            .field("tickets", &self.tickets().len())
            .field("routes", &self.router.len())
            .finish_non_exhaustive()
    }
}
