//! Integration tests for ticket tracking through the client facade
//!
//! Frames enter through `TicketsClient::handle_server_message` /
//! `handle_frame` exactly as a connection shell would deliver them.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::harness;
use proptest::prelude::*;
use ticketline::ClientError;
use ticketline::ticket::CALLED_BODY;
use ticketline_core::protocol::ClientCommand;
use ticketline_core::types::{EventId, TicketMessageKind, TicketStatus};
use ticketline_testing::fixtures::{server_message, subscription, summary, ticket};
use ticketline_testing::{RecordingNotifier, TEST_CLOCK_PREFIX};
use tokio_test::{assert_err, assert_ok};

const EVENT: u64 = 9;

fn status(client: &ticketline::TicketsClient) -> TicketStatus {
    client.ticket(EventId::new(EVENT)).unwrap().status()
}

#[test]
fn called_ticket_vibrates_and_schedules_reminder() {
    let h = harness();
    assert_ok!(h.client.subscribe_event(subscription("Concert", 1, EVENT)));

    h.client
        .handle_server_message(&server_message(TicketMessageKind::Activated, 1, EVENT));
    h.notifier.clear();
    h.client
        .handle_server_message(&server_message(TicketMessageKind::Called, 1, EVENT));

    let state = h.client.ticket(EventId::new(EVENT)).unwrap();
    assert!(state.is_called());
    assert_eq!(state.last_message_title, format!("{TEST_CLOCK_PREFIX}Let's go"));
    assert_eq!(h.notifier.vibrations(), vec![vec![1000, 500, 2000]]);
    assert_eq!(
        h.notifier.reminders(),
        vec![(EventId::new(EVENT), CALLED_BODY.to_string())]
    );
    assert_eq!(h.notifier.foreground_requests(), 1);
    assert_eq!(h.notifier.wake_requests(), 0);
}

#[test]
fn called_ticket_wakes_a_dark_display() {
    let h = common::harness_with(
        RecordingNotifier::with_display_off(),
        std::time::Duration::from_secs(5),
    );
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    h.client
        .handle_server_message(&server_message(TicketMessageKind::Activated, 1, EVENT));
    h.client
        .handle_server_message(&server_message(TicketMessageKind::Called, 1, EVENT));

    assert_eq!(h.notifier.wake_requests(), 1);
    assert_eq!(h.notifier.foreground_requests(), 0);
}

#[test]
fn duplicate_deleted_fires_cancellation_once() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    for _ in 0..3 {
        h.client
            .handle_server_message(&server_message(TicketMessageKind::Deleted, 1, EVENT));
    }

    let state = h.client.ticket(EventId::new(EVENT)).unwrap();
    assert!(state.cancelled);
    assert_eq!(state.status(), TicketStatus::Deleted);
    let returned: Vec<_> = h
        .notifier
        .notifications()
        .into_iter()
        .filter(|(title, _)| title.ends_with("Ticket returned"))
        .collect();
    assert_eq!(returned.len(), 1);
}

#[test]
fn same_ticket_id_in_another_event_is_never_delivered() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    let delivered = h
        .client
        .handle_server_message(&server_message(TicketMessageKind::Activated, 1, EVENT + 1));

    assert_eq!(delivered, 0);
    assert_eq!(status(&h.client), TicketStatus::Pending);
    assert!(h.notifier.calls().is_empty());
}

#[test]
fn nothing_changes_after_unsubscribe() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();
    h.client
        .handle_server_message(&server_message(TicketMessageKind::Activated, 1, EVENT));
    h.notifier.clear();

    assert!(h.client.unsubscribe_event(EventId::new(EVENT)));
    assert!(!h.client.unsubscribe_event(EventId::new(EVENT)));

    assert_eq!(
        h.client
            .handle_server_message(&server_message(TicketMessageKind::Called, 1, EVENT)),
        0
    );
    assert_eq!(h.client.handle_server_message(&summary(EVENT, 1, 1)), 0);
    assert!(h.client.ticket(EventId::new(EVENT)).is_none());
    assert!(h.client.summary(EventId::new(EVENT)).is_none());
    assert!(h.notifier.calls().is_empty());

    let unsubscribes = h
        .transport
        .sent()
        .into_iter()
        .filter(|c| matches!(c, ClientCommand::UnsubscribeEvent { .. }))
        .count();
    assert_eq!(unsubscribes, 1);
}

#[test]
fn close_releases_without_telling_the_server() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();
    h.client
        .handle_server_message(&server_message(TicketMessageKind::Deleted, 1, EVENT));

    assert!(h.client.close(EventId::new(EVENT)));

    assert!(h.client.ticket(EventId::new(EVENT)).is_none());
    assert!(h.client.session().active_events.is_empty());
    assert!(
        !h.transport
            .sent()
            .iter()
            .any(|c| matches!(c, ClientCommand::UnsubscribeEvent { .. }))
    );
}

#[test]
fn summaries_are_cached_per_event() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    h.client.handle_server_message(&summary(EVENT, 4, 10));
    h.client.handle_server_message(&summary(EVENT, 3, 9));

    let latest = h.client.summary(EventId::new(EVENT)).unwrap();
    assert_eq!(latest.position, Some(3));
    assert_eq!(latest.waiting, 9);
}

#[test]
fn skip_and_confirm_need_a_tracked_ticket() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    assert_ok!(h.client.confirm(&ticket(1, EVENT)));
    assert_eq!(
        h.client.skip(&ticket(2, EVENT)),
        Err(ClientError::UnknownTicket(ticket(2, EVENT).key()))
    );
    assert_err!(h.client.subscribe_event(subscription("Concert", 1, EVENT)));

    let state = h.client.ticket(EventId::new(EVENT)).unwrap();
    assert_eq!(state.last_message, "Yes, i'll be there");
    assert!(h.transport.sent().contains(&ClientCommand::Confirm {
        ticket: ticket(1, EVENT)
    }));
}

#[test]
fn malformed_frames_are_skipped() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    assert!(matches!(
        h.client.handle_frame("{not json"),
        Err(ClientError::Protocol(_))
    ));
    assert!(h.client.handle_frame(r#"{"type":"ticketTeleported","payload":{}}"#).is_err());

    let frame = serde_json::json!({
        "type": "ticketActivated",
        "payload": { "ticket": { "id": 1, "eventid": EVENT, "state": "Activated", "participants": ["bob"] } }
    })
    .to_string();
    assert_eq!(h.client.handle_frame(&frame), Ok(1));

    let state = h.client.ticket(EventId::new(EVENT)).unwrap();
    assert_eq!(state.status(), TicketStatus::Activated);
    assert_eq!(state.participants(), ["bob".to_string()]);
}

#[test]
fn call_reaches_a_ticket_that_missed_its_activation() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    h.client
        .handle_server_message(&server_message(TicketMessageKind::Called, 1, EVENT));
    assert_eq!(status(&h.client), TicketStatus::Called);
    assert_eq!(h.notifier.vibrations(), vec![vec![1000, 500, 2000]]);
    assert_eq!(h.notifier.reminders().len(), 1);

    h.client
        .handle_server_message(&server_message(TicketMessageKind::Accepted, 1, EVENT));
    assert_eq!(status(&h.client), TicketStatus::Confirmed);
}

#[test]
fn skipped_and_expired_frames_decode_and_requeue() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Concert", 1, EVENT))
        .unwrap();

    for (kind, state, label) in [
        ("ticketSkipped", "Skipped", "Ticket skipped"),
        ("ticketExpired", "Expired", "Ticket has expired"),
    ] {
        h.client
            .handle_server_message(&server_message(TicketMessageKind::Called, 1, EVENT));
        let frame = serde_json::json!({
            "type": kind,
            "payload": { "ticket": { "id": 1, "eventid": EVENT, "state": state, "participants": [] } }
        })
        .to_string();

        assert_eq!(h.client.handle_frame(&frame), Ok(1));
        let ticket = h.client.ticket(EventId::new(EVENT)).unwrap();
        assert_eq!(ticket.status(), TicketStatus::Activated);
        assert_eq!(ticket.last_message_title, format!("{TEST_CLOCK_PREFIX}{label}"));
    }
}

fn kind_strategy() -> impl Strategy<Value = TicketMessageKind> {
    prop::sample::select(TicketMessageKind::ALL.to_vec())
}

proptest! {
    /// Whatever the server sends, the observed states form a legal path
    #[test]
    fn observed_states_form_a_legal_path(kinds in prop::collection::vec(kind_strategy(), 1..40)) {
        let h = harness();
        h.client.subscribe_event(subscription("Concert", 1, EVENT)).unwrap();

        let mut previous = TicketStatus::Pending;
        for kind in kinds {
            h.client.handle_server_message(&server_message(kind, 1, EVENT));
            let current = status(&h.client);

            if previous == TicketStatus::Deleted {
                prop_assert_eq!(current, TicketStatus::Deleted);
            } else if current != previous || kind.is_reachable_from(previous) {
                prop_assert!(kind.is_reachable_from(previous), "{kind} applied from {previous}");
                prop_assert!(
                    kind != TicketMessageKind::Accepted || previous == TicketStatus::Called,
                    "confirmed without a call from {previous}"
                );
                prop_assert_eq!(current, kind.resulting_status());
            }
            previous = current;
        }

        let cancellations = h
            .notifier
            .notifications()
            .into_iter()
            .filter(|(title, _)| title.ends_with("Ticket returned"))
            .count();
        prop_assert!(cancellations <= 1);
    }
}
