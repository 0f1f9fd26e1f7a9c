//! # Ticketline Runtime
//!
//! Runtime implementation for the ticketline queue client.
//!
//! ## Core Components
//!
//! - **Store**: Owns one reducer's state, applies actions and executes the
//!   effects they produce
//! - **`EventRouter`**: Delivers inbound server messages to the subscribers
//!   whose filter matches
//!
//! ## Example
//!
//! ```ignore
//! use ticketline_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Apply an action (effects run before `send` returns)
//! store.send(Action::DoSomething);
//!
//! // Read state
//! let value = store.state(|s| s.some_field);
//! ```

use std::sync::Arc;
use ticketline_core::{effect::Effect, reducer::Reducer};

/// Metric names and descriptions
pub mod metrics;

/// Message demultiplexing
pub mod router;

pub use router::{EventRouter, Subscription, SubscriptionId};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is applied.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Store module - The runtime for reducers
pub mod store {
    use super::{Arc, Effect, Reducer, StoreError};
    use crate::metrics as names;
    use std::sync::{PoisonError, RwLock};
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast;

    /// Default capacity of the action broadcast channel
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 16;

    struct StoreInner<S, A, E, R> {
        state: RwLock<S>,
        reducer: R,
        environment: E,
        action_broadcast: broadcast::Sender<A>,
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind a `RwLock`; readers never block each other)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution
    ///
    /// `send` is synchronous: the reducer runs, then every effect it returned
    /// runs, all before the write lock is released. Side effects therefore
    /// happen exactly once per applied action and in the same order as the
    /// state updates. Notifier and transport implementations must not call
    /// back into the store that invoked them.
    ///
    /// Every applied action is also broadcast to observers
    /// ([`subscribe_actions`](Store::subscribe_actions)).
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        inner: Arc<StoreInner<S, A, E, R>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Clone + Send + std::fmt::Debug + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a new store with a custom action broadcast capacity
        ///
        /// Observers that fall more than `capacity` actions behind skip the
        /// oldest ones.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                inner: Arc::new(StoreInner {
                    state: RwLock::new(initial_state),
                    reducer,
                    environment,
                    action_broadcast,
                }),
            }
        }

        /// Apply an action
        ///
        /// Runs the reducer and executes its effects before returning.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub fn send(&self, action: A) {
            names::counter!(names::STORE_ACTIONS).increment(1);
            tracing::trace!(?action, "Processing action");

            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            let start = Instant::now();
            let effects = self
                .inner
                .reducer
                .reduce(&mut *state, action.clone(), &self.inner.environment);
            names::histogram!(names::REDUCER_DURATION).record(start.elapsed().as_secs_f64());

            tracing::trace!("Reducer completed, returned {} effects", effects.len());
            for effect in effects {
                self.execute_effect(effect);
            }

            // No receivers is not an error
            let _ = self.inner.action_broadcast.send(action);
        }

        /// Send an action and wait for a matching action
        ///
        /// Subscribes to the action broadcast BEFORE sending, so a reply
        /// applied while `send` is still running cannot be missed. The
        /// subscription is dropped when this method returns.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action within `timeout`
        /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.inner.action_broadcast.subscribe();

            self.send(action);

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to every action applied by this store
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.inner.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let status = store.state(|s| s.status);
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self
                .inner
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            f(&*state)
        }

        /// The injected environment
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.inner.environment
        }

        /// Execute one effect
        ///
        /// Notifier and transport failures are logged and counted, never
        /// propagated.
        fn execute_effect(&self, effect: Effect<A>) {
            match effect {
                Effect::None => {
                    names::counter!(names::EFFECTS_EXECUTED, "type" => "none").increment(1);
                },
                Effect::Sequential(effects) => {
                    names::counter!(names::EFFECTS_EXECUTED, "type" => "sequential").increment(1);
                    for effect in effects {
                        self.execute_effect(effect);
                    }
                },
                Effect::Notify { notifier, call } => {
                    names::counter!(names::EFFECTS_EXECUTED, "type" => "notify").increment(1);
                    if let Err(error) = call.apply(notifier.as_ref()) {
                        names::counter!(names::NOTIFIER_FAILURES, "call" => call.name())
                            .increment(1);
                        tracing::warn!(call = call.name(), %error, "Notifier call failed, ignoring");
                    }
                },
                Effect::Command { transport, command } => {
                    names::counter!(names::EFFECTS_EXECUTED, "type" => "command").increment(1);
                    tracing::debug!(?command, "Sending command");
                    if let Err(error) = transport.send(command) {
                        names::counter!(names::TRANSPORT_FAILURES).increment(1);
                        tracing::warn!(%error, "Transport rejected command");
                    }
                },
                Effect::Delay { duration, action } => {
                    names::counter!(names::EFFECTS_EXECUTED, "type" => "delay").increment(1);
                    match tokio::runtime::Handle::try_current() {
                        Ok(handle) => {
                            let store = self.clone();
                            handle.spawn(async move {
                                tokio::time::sleep(duration).await;
                                tracing::trace!("Effect::Delay elapsed, sending action");
                                store.send(*action);
                            });
                        },
                        Err(_) => {
                            tracing::warn!(?action, "No async runtime, dropping delayed action");
                        },
                    }
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    mod tests {
        use super::*;
        use std::sync::Mutex;
        use ticketline_core::effect::Effect;
        use ticketline_core::notifier::{Notifier, NotifierCall, NotifierError};
        use ticketline_core::types::EventId;
        use ticketline_core::{SmallVec, smallvec};

        #[derive(Default)]
        struct BrokenNotifier {
            attempts: Mutex<u32>,
        }

        impl Notifier for BrokenNotifier {
            fn notify(&self, _title: &str, _body: &str) -> Result<(), NotifierError> {
                *self.attempts.lock().unwrap() += 1;
                Err(NotifierError::Unavailable("toast".into()))
            }

            fn vibrate(&self, _pattern: &[u32]) -> Result<(), NotifierError> {
                Err(NotifierError::Unavailable("vibration".into()))
            }

            fn schedule_reminder(&self, _key: EventId, _body: &str) -> Result<(), NotifierError> {
                Err(NotifierError::Unavailable("reminders".into()))
            }

            fn request_foreground(&self) -> Result<(), NotifierError> {
                Err(NotifierError::Unavailable("background mode".into()))
            }
        }

        #[derive(Clone, Debug, PartialEq)]
        enum TestAction {
            Bump,
            Alert,
            BumpLater,
        }

        struct TestEnv {
            notifier: Arc<dyn Notifier>,
        }

        struct TestReducer;

        impl Reducer for TestReducer {
            type State = u32;
            type Action = TestAction;
            type Environment = TestEnv;

            fn reduce(
                &self,
                state: &mut u32,
                action: TestAction,
                env: &TestEnv,
            ) -> SmallVec<[Effect<TestAction>; 4]> {
                match action {
                    TestAction::Bump => {
                        *state += 1;
                        smallvec![Effect::None]
                    },
                    TestAction::Alert => {
                        *state += 10;
                        smallvec![
                            Effect::notify(
                                &env.notifier,
                                NotifierCall::Notify {
                                    title: "t".into(),
                                    body: "b".into(),
                                }
                            ),
                            Effect::notify(&env.notifier, NotifierCall::RequestForeground),
                        ]
                    },
                    TestAction::BumpLater => smallvec![Effect::Delay {
                        duration: Duration::from_millis(5),
                        action: Box::new(TestAction::Bump),
                    }],
                }
            }
        }

        fn store(notifier: Arc<dyn Notifier>) -> Store<u32, TestAction, TestEnv, TestReducer> {
            Store::new(0, TestReducer, TestEnv { notifier })
        }

        #[test]
        fn notifier_failures_do_not_affect_state() {
            let notifier = Arc::new(BrokenNotifier::default());
            let store = store(notifier.clone());

            store.send(TestAction::Alert);
            store.send(TestAction::Bump);

            assert_eq!(store.state(|s| *s), 11);
            assert_eq!(*notifier.attempts.lock().unwrap(), 1);
        }

        #[test]
        fn delay_without_runtime_is_dropped() {
            let store = store(Arc::new(BrokenNotifier::default()));
            store.send(TestAction::BumpLater);
            assert_eq!(store.state(|s| *s), 0);
        }

        #[tokio::test]
        async fn delay_feeds_action_back() {
            let store = store(Arc::new(BrokenNotifier::default()));

            let applied = store
                .send_and_wait_for(
                    TestAction::BumpLater,
                    |a| *a == TestAction::Bump,
                    Duration::from_secs(1),
                )
                .await
                .unwrap();

            assert_eq!(applied, TestAction::Bump);
            assert_eq!(store.state(|s| *s), 1);
        }
    }
}

pub use store::Store;
