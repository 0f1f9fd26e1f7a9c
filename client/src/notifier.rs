//! Notifier that writes every call to the log.
//!
//! Selected at composition time where no native capability exists (headless
//! shells, the demo binary).

use ticketline_core::notifier::{Notifier, NotifierError};
use ticketline_core::types::EventId;

/// Logs each capability call at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifierError> {
        tracing::info!(title, body, "Notify");
        Ok(())
    }

    fn vibrate(&self, pattern: &[u32]) -> Result<(), NotifierError> {
        tracing::info!(?pattern, "Vibrate");
        Ok(())
    }

    fn schedule_reminder(&self, key: EventId, body: &str) -> Result<(), NotifierError> {
        tracing::info!(%key, body, "Reminder scheduled");
        Ok(())
    }

    fn request_foreground(&self) -> Result<(), NotifierError> {
        tracing::info!("Foreground requested");
        Ok(())
    }
}
