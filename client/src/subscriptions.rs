//! Binding tracked tickets to the router.
//!
//! A [`TicketTracker`] owns one ticket store plus the router registrations
//! feeding it: one per ticket message kind, filtered on the full
//! `(ticket id, event id)` identity, and one summary route filtered on the
//! event id.

use crate::summary::SummaryAggregator;
use crate::ticket::{TicketAction, TicketEnvironment, TicketReducer, TicketState};
use std::sync::Arc;
use ticketline_core::protocol::{MessageKind, ServerMessage};
use ticketline_core::types::{EventId, TicketKey, TicketMessageKind};
use ticketline_runtime::{EventRouter, Store, Subscription};

/// Ticket store type
pub type TicketStore = Store<TicketState, TicketAction, TicketEnvironment, TicketReducer>;

/// One live ticket subscription
pub struct TicketTracker {
    store: TicketStore,
    summaries: Arc<SummaryAggregator>,
    routes: Vec<Subscription<ServerMessage>>,
}

impl TicketTracker {
    /// Register routes for the ticket held by `store`
    #[must_use]
    pub fn bind(
        router: &EventRouter<ServerMessage>,
        store: TicketStore,
        summaries: Arc<SummaryAggregator>,
    ) -> Self {
        let key = store.state(TicketState::key);
        let event_id = key.event_id;
        summaries.track(event_id);

        let mut routes: Vec<Subscription<ServerMessage>> = TicketMessageKind::ALL
            .into_iter()
            .map(|kind| {
                let store = store.clone();
                router.subscribe(
                    MessageKind::from(kind),
                    move |message: &ServerMessage| message.ticket().is_some_and(|t| key.matches(t)),
                    move |message: &ServerMessage| {
                        if let Some(message) = message.ticket_message() {
                            store.send(TicketAction::Received(message));
                        }
                    },
                )
            })
            .collect();

        let sink = Arc::clone(&summaries);
        routes.push(router.subscribe(
            MessageKind::TicketSummaries,
            move |message: &ServerMessage| {
                message
                    .summary()
                    .is_some_and(|summary| summary.event_id == event_id)
            },
            move |message: &ServerMessage| {
                if let Some(summary) = message.summary() {
                    sink.on_summary(summary.clone());
                }
            },
        ));

        tracing::debug!(%key, routes = routes.len(), "Ticket tracked");
        Self {
            store,
            summaries,
            routes,
        }
    }

    /// Identity of the tracked ticket
    #[must_use]
    pub fn key(&self) -> TicketKey {
        self.store.state(TicketState::key)
    }

    /// Event of the tracked ticket
    #[must_use]
    pub fn event_id(&self) -> EventId {
        self.store.state(TicketState::event_id)
    }

    /// The ticket store
    #[must_use]
    pub const fn store(&self) -> &TicketStore {
        &self.store
    }

    /// Snapshot of the ticket state
    #[must_use]
    pub fn state(&self) -> TicketState {
        self.store.state(Clone::clone)
    }

    /// Stop tracking
    ///
    /// Closes the store first, under its write lock, so a delivery that
    /// already selected this ticket finds it closed. Then the routes and the
    /// cached summary are released.
    pub fn teardown(self) {
        let key = self.key();
        self.store.send(TicketAction::Close);
        drop(self.routes);
        self.summaries.remove(key.event_id);
        tracing::debug!(%key, "Ticket released");
    }
}

impl std::fmt::Debug for TicketTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketTracker")
            .field("key", &self.key())
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ticketline_core::environment::Clock;
    use ticketline_core::types::TicketStatus;
    use ticketline_testing::fixtures::{server_message, subscription, summary};
    use ticketline_testing::{RecordingNotifier, RecordingTransport, test_clock};

    fn tracked(
        router: &EventRouter<ServerMessage>,
        summaries: &Arc<SummaryAggregator>,
        notifier: Arc<RecordingNotifier>,
    ) -> TicketTracker {
        let clock = test_clock();
        let state = TicketState::registered(subscription("Concert", 1, 9), clock.now());
        let env = TicketEnvironment::new(notifier, Arc::new(RecordingTransport::new()), Arc::new(clock));
        TicketTracker::bind(
            router,
            Store::new(state, TicketReducer, env),
            Arc::clone(summaries),
        )
    }

    #[test]
    fn routes_every_kind_and_the_summary() {
        let router = EventRouter::new();
        let summaries = Arc::new(SummaryAggregator::new());
        let tracker = tracked(&router, &summaries, Arc::new(RecordingNotifier::new()));

        assert_eq!(router.len(), 7);

        router.dispatch(&server_message(TicketMessageKind::Activated, 1, 9));
        router.dispatch(&summary(9, 2, 5));

        assert_eq!(tracker.state().status(), TicketStatus::Activated);
        assert_eq!(summaries.summary(EventId::new(9)).unwrap().position, Some(2));
    }

    #[test]
    fn same_ticket_id_in_other_event_is_not_delivered() {
        let router = EventRouter::new();
        let summaries = Arc::new(SummaryAggregator::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let tracker = tracked(&router, &summaries, notifier.clone());

        assert_eq!(
            router.dispatch(&server_message(TicketMessageKind::Activated, 1, 10)),
            0
        );
        assert_eq!(router.dispatch(&summary(10, 1, 1)), 0);

        assert_eq!(tracker.state().status(), TicketStatus::Pending);
        assert!(notifier.calls().is_empty());
    }

    #[test]
    fn teardown_releases_everything() {
        let router = EventRouter::new();
        let summaries = Arc::new(SummaryAggregator::new());
        let tracker = tracked(&router, &summaries, Arc::new(RecordingNotifier::new()));
        router.dispatch(&summary(9, 2, 5));
        let store = tracker.store().clone();

        tracker.teardown();

        assert!(router.is_empty());
        assert_eq!(summaries.summary(EventId::new(9)), None);
        assert!(store.state(|s| s.closed));

        // A late delivery straight into the store changes nothing
        store.send(TicketAction::Received(
            server_message(TicketMessageKind::Activated, 1, 9)
                .ticket_message()
                .unwrap(),
        ));
        assert_eq!(store.state(TicketState::status), TicketStatus::Pending);
    }
}
