//! Shared fixtures for client integration tests.

#![allow(dead_code)] // Not every test binary uses every helper

use std::sync::Arc;
use std::time::Duration;
use ticketline::{ClientConfig, ClientEnvironment, TicketsClient};
use ticketline_core::protocol::ClientCommand;
use ticketline_testing::{RecordingNotifier, RecordingTransport, test_clock};

pub struct Harness {
    pub client: Arc<TicketsClient>,
    pub notifier: Arc<RecordingNotifier>,
    pub transport: Arc<RecordingTransport>,
}

pub fn harness() -> Harness {
    harness_with(RecordingNotifier::new(), Duration::from_secs(5))
}

pub fn harness_with(notifier: RecordingNotifier, login_timeout: Duration) -> Harness {
    let notifier = Arc::new(notifier);
    let transport = Arc::new(RecordingTransport::new());
    let config = ClientConfig {
        username: "alice".into(),
        login_timeout_secs: login_timeout.as_secs().max(1),
        ..ClientConfig::default()
    };
    let client = TicketsClient::new(
        ClientEnvironment {
            notifier: notifier.clone(),
            transport: transport.clone(),
            clock: Arc::new(test_clock()),
        },
        &config,
    );
    Harness {
        client: Arc::new(client),
        notifier,
        transport,
    }
}

/// Wait until the transport has seen a command matching `predicate`
pub async fn until_sent<P>(transport: &RecordingTransport, predicate: P)
where
    P: Fn(&ClientCommand) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !transport.sent().iter().any(&predicate) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("command was never sent");
}
