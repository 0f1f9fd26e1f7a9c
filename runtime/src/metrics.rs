//! Metric names emitted by the runtime.
//!
//! The runtime only records through the `metrics` facade. Installing an
//! exporter is left to the application embedding the client; without one,
//! every call is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! // Once, at startup, after installing a recorder
//! ticketline_runtime::metrics::describe_metrics();
//! ```

use metrics::{describe_counter, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Actions applied by any store
pub const STORE_ACTIONS: &str = "ticketline.store.actions";

/// Reducer execution time
pub const REDUCER_DURATION: &str = "ticketline.store.reducer.duration_seconds";

/// Effects executed, labelled by `type`
pub const EFFECTS_EXECUTED: &str = "ticketline.effects.executed";

/// Notifier calls that failed and were swallowed, labelled by `call`
pub const NOTIFIER_FAILURES: &str = "ticketline.effects.notifier_failures";

/// Outbound commands the transport refused
pub const TRANSPORT_FAILURES: &str = "ticketline.effects.transport_failures";

/// Deliveries made by the router
pub const ROUTER_DELIVERED: &str = "ticketline.router.delivered";

/// Messages that matched no live subscription
pub const ROUTER_DROPPED: &str = "ticketline.router.dropped";

/// Register descriptions for every runtime metric.
pub fn describe_metrics() {
    describe_counter!(STORE_ACTIONS, "Total number of actions applied by stores");
    describe_histogram!(REDUCER_DURATION, "Time taken to execute reducers");
    describe_counter!(EFFECTS_EXECUTED, "Total number of effects executed");
    describe_counter!(
        NOTIFIER_FAILURES,
        "Notifier calls that failed and were ignored"
    );
    describe_counter!(
        TRANSPORT_FAILURES,
        "Outbound commands rejected by the transport"
    );
    describe_counter!(ROUTER_DELIVERED, "Messages delivered to subscribers");
    describe_counter!(
        ROUTER_DROPPED,
        "Messages that matched no live subscription"
    );
}
