//! Integration tests for login, logout and reconnect behaviour

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{harness, harness_with, until_sent};
use std::sync::Arc;
use std::time::Duration;
use ticketline::LoginError;
use ticketline_core::protocol::{ClientCommand, Password, ServerMessage};
use ticketline_core::types::{EventId, TicketMessageKind, TicketStatus};
use ticketline_testing::RecordingNotifier;
use ticketline_testing::fixtures::{login_failed, server_message, subscription};

fn is_login(command: &ClientCommand) -> bool {
    matches!(command, ClientCommand::Login { .. })
}

#[tokio::test]
async fn wrong_password_reports_password_required() {
    let h = harness();
    let client = Arc::clone(&h.client);
    let login = tokio::spawn(async move { client.login("alice", "wrong").await });

    until_sent(&h.transport, is_login).await;
    h.client
        .handle_frame(r#"{"type":"loginFailed","payload":{"passwordRequired":true}}"#)
        .unwrap();

    assert_eq!(login.await.unwrap(), Err(LoginError::PasswordRequired));
    assert_eq!(h.client.status_text(), "Password required");
    assert!(!*h.client.identified().borrow());
}

#[tokio::test]
async fn taken_name_reports_user_exists() {
    let h = harness();
    let client = Arc::clone(&h.client);
    let login = tokio::spawn(async move { client.login("bob", "").await });

    until_sent(&h.transport, is_login).await;
    h.client.handle_server_message(&login_failed(false));

    assert_eq!(login.await.unwrap(), Err(LoginError::UserAlreadyExists));
    assert_eq!(h.client.status_text(), "User exists already");
}

#[tokio::test]
async fn successful_login_identifies_once() {
    let h = harness();
    let mut identified = h.client.identified();
    h.client.connection_changed(true);

    let client = Arc::clone(&h.client);
    let login = tokio::spawn(async move { client.login("alice", "secret").await });

    until_sent(&h.transport, is_login).await;
    assert!(h.transport.sent().contains(&ClientCommand::Login {
        username: "alice".into(),
        password: Password::new("secret"),
    }));
    h.client
        .handle_server_message(&ServerMessage::Identified(true));

    assert_eq!(login.await.unwrap(), Ok(()));
    identified.changed().await.unwrap();
    assert!(*identified.borrow_and_update());
    assert_eq!(h.client.status_text(), "Connected as alice");
    assert!(!identified.has_changed().unwrap());
}

#[tokio::test]
async fn a_new_attempt_clears_the_previous_failure() {
    let h = harness();

    let client = Arc::clone(&h.client);
    let first = tokio::spawn(async move { client.login("alice", "wrong").await });
    until_sent(&h.transport, is_login).await;
    h.client.handle_server_message(&login_failed(true));
    assert_eq!(first.await.unwrap(), Err(LoginError::PasswordRequired));
    h.transport.drain();

    let client = Arc::clone(&h.client);
    let second = tokio::spawn(async move { client.login("alice", "right").await });
    until_sent(&h.transport, is_login).await;
    assert_eq!(h.client.status_text(), "Disconnected (alice)");

    h.client.handle_server_message(&ServerMessage::Identified(true));
    assert_eq!(second.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn unanswered_login_times_out() {
    let h = harness_with(RecordingNotifier::new(), Duration::from_secs(1));

    let started = std::time::Instant::now();
    let result = h.client.login("alice", "secret").await;

    assert_eq!(result, Err(LoginError::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(h.client.status_text(), "Login timed out");
}

#[test]
fn active_subscriptions_survive_a_reconnect() {
    let h = harness();
    h.client.connection_changed(true);
    for event in [1, 2] {
        h.client
            .subscribe_event(subscription("Event", 10 + event, event))
            .unwrap();
    }

    h.client.connection_changed(false);
    h.transport.drain();
    h.client.connection_changed(true);

    let resent = h.transport.drain();
    assert_eq!(
        resent,
        vec![
            ClientCommand::SubscribeEvent {
                event_id: EventId::new(1)
            },
            ClientCommand::SubscribeEvent {
                event_id: EventId::new(2)
            },
        ]
    );

    for event in [1, 2] {
        h.client
            .handle_server_message(&server_message(TicketMessageKind::Activated, 10 + event, event));
        assert_eq!(
            h.client.ticket(EventId::new(event)).unwrap().status(),
            TicketStatus::Activated
        );
    }
}

#[test]
fn in_band_connection_frames_drive_the_session() {
    let h = harness();
    h.client
        .subscribe_event(subscription("Event", 1, 5))
        .unwrap();
    assert!(h.transport.sent().is_empty());

    h.client
        .handle_frame(r#"{"type":"connected","payload":true}"#)
        .unwrap();

    assert!(*h.client.connected().borrow());
    assert_eq!(
        h.transport.sent(),
        vec![ClientCommand::SubscribeEvent {
            event_id: EventId::new(5)
        }]
    );
}

#[test]
fn logout_disconnects_and_stops() {
    let h = harness();
    h.client.connection_changed(true);
    h.client
        .handle_server_message(&ServerMessage::Identified(true));

    h.client
        .subscribe_event(subscription("Event", 1, 5))
        .unwrap();

    h.client.logout();

    assert!(h.client.is_stopped());
    assert!(!*h.client.connected().borrow());
    assert!(!*h.client.identified().borrow());
    assert_eq!(h.client.status_text(), "Disconnected (alice)");
    assert_eq!(h.transport.sent().last(), Some(&ClientCommand::Disconnect));
    assert!(h.client.ticket(EventId::new(5)).is_none());
    assert!(h.client.session().active_events.is_empty());
}

#[test]
fn tickets_do_not_outlive_the_session() {
    let h = harness();
    h.client.connection_changed(true);
    h.client
        .subscribe_event(subscription("Event", 1, 5))
        .unwrap();
    h.client.logout();
    h.transport.drain();

    h.client.connection_changed(true);

    assert!(*h.client.connected().borrow());
    assert!(h.transport.sent().is_empty());
    assert_eq!(
        h.client
            .handle_server_message(&server_message(TicketMessageKind::Called, 1, 5)),
        0
    );
}
