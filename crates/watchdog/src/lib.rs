//! Watchdog library: persistent per-address activity subscriptions with
//! reconnect backoff, account-state reconciliation, and outbound-movement
//! alerting. The binary in `main.rs` remains available for development/CI
//! use but production embeds the watchdog in the API process so monitoring
//! state and the query surface share one store.

pub mod alert;
pub mod analysis;
pub mod worker;

pub use alert::{AlertError, AlertSink, LogAlertSink, WebhookAlertSink};
pub use analysis::{analyze_activity, find_outbound_movement, OutboundMovement, OUTFLOW_THRESHOLD};
pub use worker::{
    fetch_snapshot, BackoffPolicy, BackoffState, Watchdog, WatchdogError,
    DEFAULT_PROPAGATION_DELAY,
};
