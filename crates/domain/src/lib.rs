//! Domain-level building blocks shared across the API, gateway, and watchdog
//! crates: the typed ledger data model, the transfer-detection algorithm, the
//! process-lifetime monitor store, and the configuration/telemetry/risk
//! services every binary wires up the same way.

pub mod config;
pub mod detect;
pub mod model;
pub mod services;
pub mod store;

pub use detect::detect;
pub use model::{
    AccountSnapshot, Address, AddressFormatError, AssetKind, BoundedLog, MonitorEntry,
    MonitorStatus, TokenBalance, TokenHolding, TransactionRecord, VerificationResult,
};
pub use store::{InMemoryMonitorStore, MonitorStore};
