//! Event router: delivers inbound messages to matching subscribers.
//!
//! A subscription is a `(kind, predicate, handler)` triple. For every
//! dispatched message the router selects the live subscriptions registered
//! for the message's kind whose predicate accepts it, and calls their
//! handlers in subscription order.
//!
//! # Guarantees
//!
//! - **Fan-out**: any number of subscriptions may share a kind; each matching
//!   one receives the message exactly once.
//! - **Ordering**: `dispatch` delivers synchronously, so subscribers observe
//!   messages in the order the caller dispatches them.
//! - **Teardown**: once [`EventRouter::unsubscribe`] returns, no new delivery
//!   to that subscription starts, including deliveries for a message whose
//!   dispatch is already in progress.
//!
//! Handlers run outside the router lock and may subscribe or unsubscribe.
//!
//! # Example
//!
//! ```ignore
//! let router = EventRouter::<ServerMessage>::new();
//!
//! let subscription = router.subscribe(
//!     MessageKind::TicketCalled,
//!     move |msg| msg.ticket().is_some_and(|t| key.matches(t)),
//!     move |msg| tracker.apply(msg),
//! );
//!
//! router.dispatch(&message);
//! drop(subscription); // releases the registration
//! ```

use crate::metrics as names;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use ticketline_core::protocol::Routable;

type Predicate<M> = Arc<dyn Fn(&M) -> bool + Send + Sync>;
type Handler<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Identifier of one router registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Route<M: Routable> {
    kind: M::Kind,
    predicate: Predicate<M>,
    handler: Handler<M>,
    live: Arc<AtomicBool>,
}

struct RouterInner<M: Routable> {
    next_id: u64,
    routes: BTreeMap<SubscriptionId, Route<M>>,
}

impl<M: Routable> RouterInner<M> {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        self.routes.remove(&id).is_some_and(|route| {
            route.live.store(false, Ordering::Release);
            true
        })
    }
}

fn lock<M: Routable>(inner: &Mutex<RouterInner<M>>) -> MutexGuard<'_, RouterInner<M>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Demultiplexes messages by kind and predicate.
///
/// Cloning yields another handle to the same registrations.
pub struct EventRouter<M: Routable> {
    inner: Arc<Mutex<RouterInner<M>>>,
}

impl<M: Routable> Clone for EventRouter<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Routable> Default for EventRouter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Routable> fmt::Debug for EventRouter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl<M: Routable> EventRouter<M> {
    /// Creates an empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RouterInner {
                next_id: 0,
                routes: BTreeMap::new(),
            })),
        }
    }

    /// Register interest in messages of `kind` accepted by `predicate`
    ///
    /// The returned guard owns the registration: dropping it (or calling
    /// [`Subscription::cancel`]) unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<P, H>(&self, kind: M::Kind, predicate: P, handler: H) -> Subscription<M>
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
        H: Fn(&M) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.routes.insert(
            id,
            Route {
                kind,
                predicate: Arc::new(predicate),
                handler: Arc::new(handler),
                live: Arc::new(AtomicBool::new(true)),
            },
        );
        tracing::trace!(%id, ?kind, "Subscribed");

        Subscription {
            id,
            router: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a registration
    ///
    /// Idempotent: returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = lock(&self.inner).remove(id);
        if removed {
            tracing::trace!(%id, "Unsubscribed");
        }
        removed
    }

    /// Deliver `message` to every matching live subscription
    ///
    /// Returns the number of deliveries made. A message nobody wants is
    /// dropped silently; that is routine while subscriptions come and go.
    pub fn dispatch(&self, message: &M) -> usize {
        let kind = message.kind();

        let targets: Vec<(Handler<M>, Arc<AtomicBool>)> = {
            let inner = lock(&self.inner);
            inner
                .routes
                .values()
                .filter(|route| route.kind == kind && (route.predicate)(message))
                .map(|route| (Arc::clone(&route.handler), Arc::clone(&route.live)))
                .collect()
        };

        let mut delivered = 0;
        for (handler, live) in targets {
            // Unsubscribed by an earlier handler of this same dispatch
            if !live.load(Ordering::Acquire) {
                continue;
            }
            handler(message);
            delivered += 1;
        }

        if delivered == 0 {
            names::counter!(names::ROUTER_DROPPED).increment(1);
            tracing::debug!(?kind, "No live subscription matched, dropping message");
        } else {
            names::counter!(names::ROUTER_DELIVERED).increment(delivered as u64);
        }

        delivered
    }

    /// Number of registrations
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).routes.len()
    }

    /// True if there are no registrations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registrations for `kind`
    #[must_use]
    pub fn subscriber_count(&self, kind: M::Kind) -> usize {
        lock(&self.inner)
            .routes
            .values()
            .filter(|route| route.kind == kind)
            .count()
    }
}

/// Owned router registration.
///
/// Unsubscribes on drop. Holds only a weak reference, so it never keeps a
/// router alive.
pub struct Subscription<M: Routable> {
    id: SubscriptionId,
    router: Weak<Mutex<RouterInner<M>>>,
}

impl<M: Routable> Subscription<M> {
    /// Identifier of this registration
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unsubscribe now
    pub fn cancel(self) {
        // Drop does the work
    }
}

impl<M: Routable> Drop for Subscription<M> {
    fn drop(&mut self) {
        if let Some(inner) = self.router.upgrade() {
            lock(&inner).remove(self.id);
        }
    }
}

impl<M: Routable> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
