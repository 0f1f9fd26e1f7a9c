//! Latest queue summary per event.
//!
//! Summaries are independent of the ticket stream: each one replaces the
//! previous value for its event and nothing else is kept. Only events that
//! are currently tracked accept summaries, so a summary delivered while its
//! event is being torn down cannot resurrect the entry.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use ticketline_core::types::{EventId, UserTicketSummary};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Summaries {
    tracked: HashSet<EventId>,
    latest: HashMap<EventId, UserTicketSummary>,
}

/// Per-event summary cache
///
/// Single writer (the router), any number of readers.
#[derive(Debug)]
pub struct SummaryAggregator {
    inner: RwLock<Summaries>,
    version: watch::Sender<u64>,
}

impl Default for SummaryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryAggregator {
    /// Creates an empty aggregator
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Summaries::default()),
            version: watch::Sender::new(0),
        }
    }

    /// Start accepting summaries for `event_id`
    pub fn track(&self, event_id: EventId) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .tracked
            .insert(event_id);
    }

    /// Replace the cached summary for its event
    ///
    /// Returns `false` if the event is not tracked.
    pub fn on_summary(&self, summary: UserTicketSummary) -> bool {
        let event_id = summary.event_id;
        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if !inner.tracked.contains(&event_id) {
                tracing::debug!(%event_id, "Summary for untracked event, dropping");
                return false;
            }
            inner.latest.insert(event_id, summary);
        }
        self.version.send_modify(|version| *version += 1);
        true
    }

    /// Latest summary for `event_id`
    #[must_use]
    pub fn summary(&self, event_id: EventId) -> Option<UserTicketSummary> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .get(&event_id)
            .cloned()
    }

    /// Stop tracking `event_id` and forget its summary
    pub fn remove(&self, event_id: EventId) -> Option<UserTicketSummary> {
        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            inner.tracked.remove(&event_id);
            inner.latest.remove(&event_id)
        };
        if removed.is_some() {
            self.version.send_modify(|version| *version += 1);
        }
        removed
    }

    /// Change signal; the value counts updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn summary(event: u64, waiting: u32) -> UserTicketSummary {
        let mut summary = UserTicketSummary::new(EventId::new(event));
        summary.waiting = waiting;
        summary
    }

    #[test]
    fn last_summary_wins() {
        let aggregator = SummaryAggregator::new();
        aggregator.track(EventId::new(1));

        assert!(aggregator.on_summary(summary(1, 5)));
        assert!(aggregator.on_summary(summary(1, 3)));

        assert_eq!(aggregator.summary(EventId::new(1)).unwrap().waiting, 3);
        assert_eq!(aggregator.summary(EventId::new(2)), None);
    }

    #[test]
    fn untracked_events_are_ignored() {
        let aggregator = SummaryAggregator::new();
        assert!(!aggregator.on_summary(summary(7, 1)));
        assert_eq!(aggregator.summary(EventId::new(7)), None);
    }

    #[test]
    fn removed_event_stays_removed() {
        let aggregator = SummaryAggregator::new();
        aggregator.track(EventId::new(1));
        aggregator.on_summary(summary(1, 5));

        assert!(aggregator.remove(EventId::new(1)).is_some());
        assert!(!aggregator.on_summary(summary(1, 4)));
        assert_eq!(aggregator.summary(EventId::new(1)), None);
    }

    #[tokio::test]
    async fn readers_are_told_about_changes() {
        let aggregator = SummaryAggregator::new();
        let mut changes = aggregator.subscribe();
        aggregator.track(EventId::new(1));

        aggregator.on_summary(summary(1, 5));
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), 1);
    }
}
