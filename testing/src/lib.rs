//! # Ticketline Testing
//!
//! Testing utilities and helpers for the ticketline queue client.
//!
//! This crate provides:
//! - Mock implementations of the environment traits (`Clock`, `Notifier`,
//!   `Transport`)
//! - Fixtures for tickets and server messages
//! - The [`ReducerTest`] Given-When-Then builder and effect assertions
//!
//! ## Example
//!
//! ```ignore
//! use ticketline_testing::{fixtures, RecordingNotifier, test_clock};
//!
//! #[test]
//! fn called_ticket_vibrates() {
//!     let notifier = Arc::new(RecordingNotifier::new());
//!     let store = tracker_store(notifier.clone(), test_clock());
//!
//!     store.send(fixtures::message(TicketMessageKind::Called, 1, 9).into());
//!
//!     assert_eq!(notifier.vibrations(), vec![vec![1000, 500, 2000]]);
//! }
//! ```

use chrono::{DateTime, Utc};
use ticketline_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use ticketline_core::notifier::{Notifier, NotifierCall, NotifierError};
    use ticketline_core::protocol::ClientCommand;
    use ticketline_core::transport::{Transport, TransportError};
    use ticketline_core::types::EventId;

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::set`].
    ///
    /// # Example
    ///
    /// ```
    /// use ticketline_testing::mocks::FixedClock;
    /// use ticketline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2);
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *lock(&self.time) = time;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *lock(&self.time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 09:30:15 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T09:30:15Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Title prefix produced by [`test_clock`]
    pub const TEST_CLOCK_PREFIX: &str = "09:30:15 - ";

    /// Notifier that records every call it receives
    ///
    /// `Attention` is not a primitive call: it records whichever of
    /// `request_wake`/`request_foreground` it resolved to.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        calls: Mutex<Vec<NotifierCall>>,
        wakes: Mutex<u32>,
        display_off: Mutex<bool>,
    }

    impl RecordingNotifier {
        /// Create a notifier with the display on
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a notifier whose display reports as off
        #[must_use]
        pub fn with_display_off() -> Self {
            let notifier = Self::default();
            notifier.set_display_off(true);
            notifier
        }

        /// Switch the simulated display state
        pub fn set_display_off(&self, off: bool) {
            *lock(&self.display_off) = off;
        }

        /// Every recorded call, in order
        #[must_use]
        pub fn calls(&self) -> Vec<NotifierCall> {
            lock(&self.calls).clone()
        }

        /// `(title, body)` of every `notify` call
        #[must_use]
        pub fn notifications(&self) -> Vec<(String, String)> {
            lock(&self.calls)
                .iter()
                .filter_map(|call| match call {
                    NotifierCall::Notify { title, body } => Some((title.clone(), body.clone())),
                    _ => None,
                })
                .collect()
        }

        /// Patterns of every `vibrate` call
        #[must_use]
        pub fn vibrations(&self) -> Vec<Vec<u32>> {
            lock(&self.calls)
                .iter()
                .filter_map(|call| match call {
                    NotifierCall::Vibrate { pattern } => Some(pattern.clone()),
                    _ => None,
                })
                .collect()
        }

        /// `(key, body)` of every scheduled reminder
        #[must_use]
        pub fn reminders(&self) -> Vec<(EventId, String)> {
            lock(&self.calls)
                .iter()
                .filter_map(|call| match call {
                    NotifierCall::ScheduleReminder { key, body } => Some((*key, body.clone())),
                    _ => None,
                })
                .collect()
        }

        /// Number of `request_foreground` calls
        #[must_use]
        pub fn foreground_requests(&self) -> usize {
            lock(&self.calls)
                .iter()
                .filter(|call| matches!(call, NotifierCall::RequestForeground))
                .count()
        }

        /// Number of `request_wake` calls
        #[must_use]
        pub fn wake_requests(&self) -> u32 {
            *lock(&self.wakes)
        }

        /// Forget everything recorded so far
        pub fn clear(&self) {
            lock(&self.calls).clear();
            *lock(&self.wakes) = 0;
        }

        fn record(&self, call: NotifierCall) -> Result<(), NotifierError> {
            lock(&self.calls).push(call);
            Ok(())
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) -> Result<(), NotifierError> {
            self.record(NotifierCall::Notify {
                title: title.to_string(),
                body: body.to_string(),
            })
        }

        fn vibrate(&self, pattern: &[u32]) -> Result<(), NotifierError> {
            self.record(NotifierCall::Vibrate {
                pattern: pattern.to_vec(),
            })
        }

        fn schedule_reminder(&self, key: EventId, body: &str) -> Result<(), NotifierError> {
            self.record(NotifierCall::ScheduleReminder {
                key,
                body: body.to_string(),
            })
        }

        fn request_foreground(&self) -> Result<(), NotifierError> {
            self.record(NotifierCall::RequestForeground)
        }

        fn is_display_off(&self) -> bool {
            *lock(&self.display_off)
        }

        fn request_wake(&self) -> Result<(), NotifierError> {
            *lock(&self.wakes) += 1;
            Ok(())
        }
    }

    /// Notifier whose every call fails
    #[derive(Debug, Default)]
    pub struct FailingNotifier {
        attempts: Mutex<u32>,
    }

    impl FailingNotifier {
        /// Create a failing notifier
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of calls attempted
        #[must_use]
        pub fn attempts(&self) -> u32 {
            *lock(&self.attempts)
        }

        fn fail(&self, what: &str) -> Result<(), NotifierError> {
            *lock(&self.attempts) += 1;
            Err(NotifierError::Failed(format!("{what} is broken")))
        }
    }

    impl Notifier for FailingNotifier {
        fn notify(&self, _title: &str, _body: &str) -> Result<(), NotifierError> {
            self.fail("notify")
        }

        fn vibrate(&self, _pattern: &[u32]) -> Result<(), NotifierError> {
            self.fail("vibrate")
        }

        fn schedule_reminder(&self, _key: EventId, _body: &str) -> Result<(), NotifierError> {
            self.fail("schedule_reminder")
        }

        fn request_foreground(&self) -> Result<(), NotifierError> {
            self.fail("request_foreground")
        }

        fn request_wake(&self) -> Result<(), NotifierError> {
            self.fail("request_wake")
        }
    }

    /// Transport that records outbound commands
    ///
    /// Starts connected. While disconnected, `send` fails with
    /// [`TransportError::Disconnected`] and nothing is recorded.
    #[derive(Debug)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<ClientCommand>>,
        connected: Mutex<bool>,
    }

    impl Default for RecordingTransport {
        fn default() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                connected: Mutex::new(true),
            }
        }
    }

    impl RecordingTransport {
        /// Create a connected transport
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Simulate link loss or recovery
        pub fn set_connected(&self, connected: bool) {
            *lock(&self.connected) = connected;
        }

        /// Commands sent so far, in order
        #[must_use]
        pub fn sent(&self) -> Vec<ClientCommand> {
            lock(&self.sent).clone()
        }

        /// Take and clear the recorded commands
        pub fn drain(&self) -> Vec<ClientCommand> {
            std::mem::take(&mut *lock(&self.sent))
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, command: ClientCommand) -> Result<(), TransportError> {
            if !*lock(&self.connected) {
                return Err(TransportError::Disconnected);
            }
            lock(&self.sent).push(command);
            Ok(())
        }
    }
}

/// Builders for tickets and server messages.
pub mod fixtures {
    use ticketline_core::protocol::{LoginFailure, ServerMessage};
    use ticketline_core::types::{
        EventId, EventSubscription, Ticket, TicketId, TicketMessage, TicketMessageKind,
        TicketStatus, UserTicketSummary,
    };

    /// A pending ticket with no participants
    #[must_use]
    pub const fn ticket(id: u64, event: u64) -> Ticket {
        Ticket::new(TicketId::new(id), EventId::new(event))
    }

    /// A subscription to `event` described as `description`
    #[must_use]
    pub fn subscription(description: &str, id: u64, event: u64) -> EventSubscription {
        EventSubscription::new(description, ticket(id, event))
    }

    /// A ticket message whose snapshot already carries the resulting status
    #[must_use]
    pub fn message(kind: TicketMessageKind, id: u64, event: u64) -> TicketMessage {
        TicketMessage::new(kind, ticket(id, event).with_state(kind.resulting_status()))
    }

    /// Same as [`message`], wrapped as a server frame
    #[must_use]
    pub fn server_message(kind: TicketMessageKind, id: u64, event: u64) -> ServerMessage {
        message(kind, id, event).into()
    }

    /// A ticket snapshot in `status`
    #[must_use]
    pub fn ticket_in(status: TicketStatus, id: u64, event: u64) -> Ticket {
        ticket(id, event).with_state(status)
    }

    /// A summary frame for `event`
    #[must_use]
    pub fn summary(event: u64, position: u32, waiting: u32) -> ServerMessage {
        let mut summary = UserTicketSummary::new(EventId::new(event));
        summary.position = Some(position);
        summary.waiting = waiting;
        ServerMessage::TicketSummaries(summary)
    }

    /// A `loginFailed` frame
    #[must_use]
    pub const fn login_failed(password_required: bool) -> ServerMessage {
        ServerMessage::LoginFailed(LoginFailure { password_required })
    }
}

// Re-export commonly used items
pub use mocks::{
    FailingNotifier, FixedClock, RecordingNotifier, RecordingTransport, TEST_CLOCK_PREFIX,
    test_clock,
};
