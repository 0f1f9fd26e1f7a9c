//! # Ticketline Core
//!
//! Core traits and types for the ticketline queue client.
//!
//! A ticket is a user's place in line for a scheduled event. The server pushes
//! typed messages as the ticket moves through its lifecycle; the client applies
//! them through reducers and fires device side effects through an injected
//! notifier capability.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state for a feature (one ticket, one session)
//! - **Action**: All possible inputs to a reducer (server pushes, user commands)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (notifier calls, outbound commands, delays)
//! - **Environment**: Injected dependencies via traits ([`Clock`](environment::Clock),
//!   [`Notifier`](notifier::Notifier), [`Transport`](transport::Transport))
//!
//! ## Example
//!
//! ```ignore
//! use ticketline_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
//!
//! impl Reducer for TicketReducer {
//!     type State = TicketState;
//!     type Action = TicketAction;
//!     type Environment = TicketEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut TicketState,
//!         action: TicketAction,
//!         env: &TicketEnvironment,
//!     ) -> SmallVec<[Effect<TicketAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Notifier capability (haptics, reminders, foreground requests)
pub mod notifier;

/// Wire protocol: inbound server messages and outbound client commands
pub mod protocol;

/// Outbound transport capability
pub mod transport;

/// Domain types: tickets, events, summaries
pub mod types;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// Reducers never call the notifier or transport directly. Every
        /// side effect is returned as an [`Effect`] so the runtime decides
        /// when and how it runs.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values returned by reducers. The runtime executes them right
/// after the state update that produced them, in the order they were returned.
pub mod effect {
    use crate::notifier::{Notifier, NotifierCall};
    use crate::protocol::ClientCommand;
    use crate::transport::Transport;
    use std::sync::Arc;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that delayed effects feed back into the store
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in order
        Sequential(Vec<Effect<Action>>),

        /// Invoke the device notifier capability
        ///
        /// Failures are swallowed by the runtime and never reach the reducer.
        Notify {
            /// Capability to invoke
            notifier: Arc<dyn Notifier>,
            /// The call to make
            call: NotifierCall,
        },

        /// Send a command to the server
        Command {
            /// Outbound channel
            transport: Arc<dyn Transport>,
            /// Command to send
            command: ClientCommand,
        },

        /// Delayed action (timeouts)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },
    }

    // Manual Debug implementation since trait objects don't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Notify { call, .. } => {
                    f.debug_struct("Effect::Notify").field("call", call).finish_non_exhaustive()
                },
                Effect::Command { command, .. } => f
                    .debug_struct("Effect::Command")
                    .field("command", command)
                    .finish_non_exhaustive(),
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Chain effects to run in order
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Build a notifier effect
        #[must_use]
        pub fn notify(notifier: &Arc<dyn Notifier>, call: NotifierCall) -> Effect<Action> {
            Effect::Notify {
                notifier: Arc::clone(notifier),
                call,
            }
        }

        /// Build an outbound command effect
        #[must_use]
        pub fn command(transport: &Arc<dyn Transport>, command: ClientCommand) -> Effect<Action> {
            Effect::Command {
                transport: Arc::clone(transport),
                command,
            }
        }

        /// Notifier calls contained in this effect, in execution order
        ///
        /// Flattens nested [`Effect::Sequential`] blocks.
        #[must_use]
        pub fn notifier_calls(&self) -> Vec<&NotifierCall> {
            match self {
                Effect::Notify { call, .. } => vec![call],
                Effect::Sequential(effects) => {
                    effects.iter().flat_map(Effect::notifier_calls).collect()
                },
                Effect::None | Effect::Command { .. } | Effect::Delay { .. } => Vec::new(),
            }
        }

        /// Outbound commands contained in this effect, in execution order
        #[must_use]
        pub fn commands(&self) -> Vec<&ClientCommand> {
            match self {
                Effect::Command { command, .. } => vec![command],
                Effect::Sequential(effects) => effects.iter().flat_map(Effect::commands).collect(),
                Effect::None | Effect::Notify { .. } | Effect::Delay { .. } => Vec::new(),
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::notifier::{NoopNotifier, Notifier, NotifierCall};
    use std::sync::Arc;

    #[test]
    fn notifier_calls_flatten_sequential_blocks() {
        let notifier: Arc<dyn Notifier> = Arc::new(NoopNotifier);
        let effect: Effect<()> = Effect::chain(vec![
            Effect::notify(&notifier, NotifierCall::RequestForeground),
            Effect::None,
            Effect::chain(vec![Effect::notify(
                &notifier,
                NotifierCall::Vibrate {
                    pattern: vec![1, 2],
                },
            )]),
        ]);

        let calls = effect.notifier_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], &NotifierCall::RequestForeground);
    }
}
