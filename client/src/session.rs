//! Session lifecycle.
//!
//! ```text
//! Disconnected ──▶ Connected ──▶ Identified
//!      ▲               │              │
//!      └───────────────┴──────────────┘  (transport loss)
//! ```
//!
//! The transport reconnects on its own and reports link changes. Each time
//! the session re-enters `Connected` it re-issues `subscribeEvent` for every
//! active event, so tracked tickets keep receiving messages without the
//! caller doing anything.
//!
//! [`SessionController`] owns the session store and is the single writer of
//! the `connected` / `identified` watch signals.

use crate::error::LoginError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use ticketline_core::effect::Effect;
use ticketline_core::protocol::{ClientCommand, MessageKind, Password, ServerMessage};
use ticketline_core::reducer::Reducer;
use ticketline_core::transport::Transport;
use ticketline_core::types::EventId;
use ticketline_core::{SmallVec, smallvec};
use ticketline_runtime::{EventRouter, Store, StoreError, Subscription};
use tokio::sync::watch;

/// Extra time `login` waits past the timeout before giving up on the store
const LOGIN_GRACE: Duration = Duration::from_secs(1);

/// A recorded login failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginFailureReason {
    /// The server wants a password
    PasswordRequired,
    /// The name is taken
    UserAlreadyExists,
    /// No answer within the login timeout
    Timeout,
}

impl From<LoginFailureReason> for LoginError {
    fn from(reason: LoginFailureReason) -> Self {
        match reason {
            LoginFailureReason::PasswordRequired => Self::PasswordRequired,
            LoginFailureReason::UserAlreadyExists => Self::UserAlreadyExists,
            LoginFailureReason::Timeout => Self::Timeout,
        }
    }
}

/// Session state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Link is up
    pub connected: bool,
    /// Logged in
    pub identified: bool,
    /// Name of the last login
    pub username: String,
    /// Outcome of the last failed login, cleared by the next attempt
    pub failure: Option<LoginFailureReason>,
    /// Set by an explicit logout, cleared by the next login
    pub stopped: bool,
    /// Events to re-subscribe after a reconnect
    pub active_events: BTreeSet<EventId>,
    /// Counter distinguishing login attempts
    pub login_attempt: u64,
}

impl SessionState {
    /// Creates a disconnected session for `username`
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// One-line status for display
    #[must_use]
    pub fn status_text(&self) -> String {
        if let Some(reason) = self.failure {
            return LoginError::from(reason).to_string();
        }
        if self.identified {
            format!("Connected as {}", self.username)
        } else {
            format!("Disconnected ({})", self.username)
        }
    }
}

/// Actions for the session reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// The user asked to log in
    LoginRequested {
        /// Name to log in as
        username: String,
        /// Secret, never logged
        password: Password,
    },
    /// The server refused the login
    LoginFailed {
        /// True if the account needs a password
        password_required: bool,
    },
    /// The login timer for `attempt` fired
    LoginTimedOut {
        /// Attempt the timer belongs to
        attempt: u64,
    },
    /// Link status reported by the transport
    ConnectionChanged(bool),
    /// Identification status reported by the server
    IdentificationChanged(bool),
    /// A ticket subscription was added
    EventSubscribed(EventId),
    /// The user left the event's queue
    EventUnsubscribed(EventId),
    /// The user dismissed a returned ticket
    EventClosed(EventId),
    /// The user logged out
    Logout,
}

impl SessionAction {
    /// Action for an in-band session frame
    #[must_use]
    pub const fn from_message(message: &ServerMessage) -> Option<Self> {
        match message {
            ServerMessage::LoginFailed(failure) => Some(Self::LoginFailed {
                password_required: failure.password_required,
            }),
            ServerMessage::Connected(up) => Some(Self::ConnectionChanged(*up)),
            ServerMessage::Identified(identified) => Some(Self::IdentificationChanged(*identified)),
            _ => None,
        }
    }
}

/// Dependencies of the session reducer
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Outbound command channel
    pub transport: Arc<dyn Transport>,
    /// How long a login may stay unanswered
    pub login_timeout: Duration,
}

/// Reducer for the session lifecycle
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionReducer;

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut SessionState,
        action: SessionAction,
        env: &SessionEnvironment,
    ) -> SmallVec<[Effect<SessionAction>; 4]> {
        match action {
            SessionAction::LoginRequested { username, password } => {
                state.login_attempt += 1;
                state.username.clone_from(&username);
                state.failure = None;
                state.stopped = false;
                tracing::info!(%username, attempt = state.login_attempt, "Logging in");

                smallvec![
                    Effect::command(&env.transport, ClientCommand::Login { username, password }),
                    Effect::Delay {
                        duration: env.login_timeout,
                        action: Box::new(SessionAction::LoginTimedOut {
                            attempt: state.login_attempt,
                        }),
                    },
                ]
            },
            SessionAction::LoginFailed { password_required } => {
                let reason = if password_required {
                    LoginFailureReason::PasswordRequired
                } else {
                    LoginFailureReason::UserAlreadyExists
                };
                tracing::info!(username = %state.username, ?reason, "Login refused");
                state.failure = Some(reason);
                state.identified = false;
                SmallVec::new()
            },
            SessionAction::LoginTimedOut { attempt } => {
                if attempt == state.login_attempt && !state.identified && state.failure.is_none() {
                    tracing::warn!(username = %state.username, attempt, "Login timed out");
                    state.failure = Some(LoginFailureReason::Timeout);
                }
                SmallVec::new()
            },
            SessionAction::ConnectionChanged(true) => {
                if state.connected {
                    return SmallVec::new();
                }
                state.connected = true;
                tracing::info!(events = state.active_events.len(), "Connected, resubscribing");
                state
                    .active_events
                    .iter()
                    .map(|event_id| {
                        Effect::command(
                            &env.transport,
                            ClientCommand::SubscribeEvent {
                                event_id: *event_id,
                            },
                        )
                    })
                    .collect()
            },
            SessionAction::ConnectionChanged(false) => {
                if state.connected {
                    tracing::info!("Disconnected");
                }
                state.connected = false;
                state.identified = false;
                SmallVec::new()
            },
            SessionAction::IdentificationChanged(identified) => {
                if identified {
                    tracing::info!(username = %state.username, "Identified");
                    state.failure = None;
                }
                state.identified = identified;
                SmallVec::new()
            },
            SessionAction::EventSubscribed(event_id) => {
                if state.active_events.insert(event_id) && state.connected {
                    smallvec![Effect::command(
                        &env.transport,
                        ClientCommand::SubscribeEvent { event_id },
                    )]
                } else {
                    SmallVec::new()
                }
            },
            SessionAction::EventUnsubscribed(event_id) => {
                if state.active_events.remove(&event_id) {
                    smallvec![Effect::command(
                        &env.transport,
                        ClientCommand::UnsubscribeEvent { event_id },
                    )]
                } else {
                    SmallVec::new()
                }
            },
            SessionAction::EventClosed(event_id) => {
                state.active_events.remove(&event_id);
                SmallVec::new()
            },
            SessionAction::Logout => {
                tracing::info!(
                    username = %state.username,
                    events = state.active_events.len(),
                    "Logging out"
                );
                state.login_attempt += 1;
                state.connected = false;
                state.identified = false;
                state.active_events.clear();
                state.failure = None;
                state.stopped = true;
                smallvec![Effect::command(&env.transport, ClientCommand::Disconnect)]
            },
        }
    }
}

/// Session store type
pub type SessionStore = Store<SessionState, SessionAction, SessionEnvironment, SessionReducer>;

/// Drives the session store and publishes its status signals
pub struct SessionController {
    store: SessionStore,
    connected: watch::Sender<bool>,
    identified: watch::Sender<bool>,
    login_timeout: Duration,
}

impl SessionController {
    /// Creates a disconnected session
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        environment: SessionEnvironment,
        broadcast_capacity: usize,
    ) -> Self {
        let login_timeout = environment.login_timeout;
        Self {
            store: Store::with_broadcast_capacity(
                SessionState::new(username),
                SessionReducer,
                environment,
                broadcast_capacity,
            ),
            connected: watch::Sender::new(false),
            identified: watch::Sender::new(false),
            login_timeout,
        }
    }

    /// Route the in-band session frames to this controller
    #[must_use = "dropping the subscriptions detaches the session"]
    pub fn bind(self: &Arc<Self>, router: &EventRouter<ServerMessage>) -> Vec<Subscription<ServerMessage>> {
        [
            MessageKind::LoginFailed,
            MessageKind::Connected,
            MessageKind::Identified,
        ]
        .into_iter()
        .map(|kind| {
            let session = Arc::clone(self);
            router.subscribe(
                kind,
                |_| true,
                move |message| {
                    if let Some(action) = SessionAction::from_message(message) {
                        session.apply(action);
                    }
                },
            )
        })
        .collect()
    }

    /// Apply `action` and publish the resulting status
    pub fn apply(&self, action: SessionAction) {
        self.store.send(action);
        self.publish();
    }

    fn publish(&self) {
        let (connected, identified) = self.store.state(|s| (s.connected, s.identified));
        self.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
        self.identified.send_if_modified(|current| {
            let changed = *current != identified;
            *current = identified;
            changed
        });
    }

    /// Log in and wait for the server's verdict
    ///
    /// Resolves once: on identification, on refusal, or when the login
    /// timeout expires. Overlapping calls are not supported.
    ///
    /// # Errors
    ///
    /// - [`LoginError::PasswordRequired`] / [`LoginError::UserAlreadyExists`]
    ///   when the server refuses
    /// - [`LoginError::Timeout`] when it does not answer in time
    /// - [`LoginError::SessionClosed`] if the session store shut down
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: Password,
    ) -> Result<(), LoginError> {
        let attempt = self.store.state(|s| s.login_attempt) + 1;
        let action = SessionAction::LoginRequested {
            username: username.into(),
            password,
        };

        let outcome = self
            .store
            .send_and_wait_for(
                action,
                move |action| match action {
                    SessionAction::IdentificationChanged(true)
                    | SessionAction::LoginFailed { .. } => true,
                    SessionAction::LoginTimedOut { attempt: fired } => *fired == attempt,
                    _ => false,
                },
                self.login_timeout.saturating_add(LOGIN_GRACE),
            )
            .await;
        self.publish();

        match outcome {
            Ok(SessionAction::IdentificationChanged(true)) => Ok(()),
            Ok(SessionAction::LoginFailed {
                password_required: true,
            }) => Err(LoginError::PasswordRequired),
            Ok(SessionAction::LoginFailed {
                password_required: false,
            }) => Err(LoginError::UserAlreadyExists),
            Ok(_) | Err(StoreError::Timeout) => {
                self.apply(SessionAction::LoginTimedOut { attempt });
                Err(LoginError::Timeout)
            },
            Err(StoreError::ChannelClosed) => Err(LoginError::SessionClosed),
        }
    }

    /// Clear identification and disconnect
    pub fn logout(&self) {
        self.apply(SessionAction::Logout);
    }

    /// Record a link status change reported out of band
    pub fn connection_changed(&self, connected: bool) {
        self.apply(SessionAction::ConnectionChanged(connected));
    }

    /// Snapshot of the session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.store.state(Clone::clone)
    }

    /// One-line status for display
    #[must_use]
    pub fn status_text(&self) -> String {
        self.store.state(SessionState::status_text)
    }

    /// True after an explicit logout until the next login
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.store.state(|s| s.stopped)
    }

    /// Link status signal
    #[must_use]
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Identification signal
    #[must_use]
    pub fn identified(&self) -> watch::Receiver<bool> {
        self.identified.subscribe()
    }
}
