//! Device notifier capability.
//!
//! The ticket state machine never talks to the device. It returns
//! [`Effect::Notify`](crate::effect::Effect::Notify) descriptions carrying a
//! [`NotifierCall`], and the runtime applies them to whichever [`Notifier`]
//! was selected when the client was composed:
//!
//! - a native integration (haptics, local reminders, foreground requests),
//! - [`NoopNotifier`] for environments without the capability,
//! - a recording mock in tests.
//!
//! Every call is fire-and-forget. A failing notifier is logged and ignored by
//! the runtime; it can never change ticket state.

use crate::types::EventId;
use thiserror::Error;

/// Vibration pattern requested when a ticket is called, in milliseconds
/// (vibrate, pause, vibrate).
pub const CALLED_VIBRATION_PATTERN: [u32; 3] = [1000, 500, 2000];

/// Errors a notifier implementation may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifierError {
    /// The capability does not exist in this runtime
    #[error("Notifier capability unavailable: {0}")]
    Unavailable(String),

    /// The native call failed
    #[error("Notifier call failed: {0}")]
    Failed(String),
}

/// Device integration invoked on ticket transitions.
///
/// Implementations must not block for long: calls run inline with the state
/// update that triggered them.
pub trait Notifier: Send + Sync {
    /// Show a short message (toast / banner)
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] if the message could not be shown.
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifierError>;

    /// Vibrate with the given pattern (durations in milliseconds)
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] if the device cannot vibrate.
    fn vibrate(&self, pattern: &[u32]) -> Result<(), NotifierError>;

    /// Schedule a local reminder, replacing any reminder with the same key
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] if the reminder could not be scheduled.
    fn schedule_reminder(&self, key: EventId, body: &str) -> Result<(), NotifierError>;

    /// Bring the application to the foreground
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] if the request was rejected.
    fn request_foreground(&self) -> Result<(), NotifierError>;

    /// Whether the device display is currently off
    ///
    /// Defaults to `false` for runtimes that cannot tell.
    fn is_display_off(&self) -> bool {
        false
    }

    /// Wake the device display
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] if the display could not be woken.
    fn request_wake(&self) -> Result<(), NotifierError> {
        Ok(())
    }
}

/// A single notifier invocation, as described by a reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierCall {
    /// Short message
    Notify {
        /// Title line
        title: String,
        /// Body text
        body: String,
    },
    /// Haptic alert
    Vibrate {
        /// Durations in milliseconds
        pattern: Vec<u32>,
    },
    /// Local reminder
    ScheduleReminder {
        /// Reminder key (the event id)
        key: EventId,
        /// Reminder text
        body: String,
    },
    /// Foreground the application
    RequestForeground,
    /// Get the user's attention: wake the display when it is off, otherwise
    /// bring the application to the foreground
    Attention,
}

impl NotifierCall {
    /// Apply this call to a notifier
    ///
    /// # Errors
    ///
    /// Propagates the notifier's [`NotifierError`].
    pub fn apply(&self, notifier: &dyn Notifier) -> Result<(), NotifierError> {
        match self {
            Self::Notify { title, body } => notifier.notify(title, body),
            Self::Vibrate { pattern } => notifier.vibrate(pattern),
            Self::ScheduleReminder { key, body } => notifier.schedule_reminder(*key, body),
            Self::RequestForeground => notifier.request_foreground(),
            Self::Attention => {
                if notifier.is_display_off() {
                    notifier.request_wake()
                } else {
                    notifier.request_foreground()
                }
            },
        }
    }

    /// Short name for logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Notify { .. } => "notify",
            Self::Vibrate { .. } => "vibrate",
            Self::ScheduleReminder { .. } => "schedule_reminder",
            Self::RequestForeground => "request_foreground",
            Self::Attention => "attention",
        }
    }
}

/// Notifier for environments without device integration.
///
/// Every call succeeds and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _title: &str, _body: &str) -> Result<(), NotifierError> {
        Ok(())
    }

    fn vibrate(&self, _pattern: &[u32]) -> Result<(), NotifierError> {
        Ok(())
    }

    fn schedule_reminder(&self, _key: EventId, _body: &str) -> Result<(), NotifierError> {
        Ok(())
    }

    fn request_foreground(&self) -> Result<(), NotifierError> {
        Ok(())
    }
}
