//! Typed ledger data model. Raw gateway responses are parsed into these
//! records at the boundary; everything downstream operates on them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

/// Base units per native unit. Balance arrays arrive in base units and all
/// user-facing amounts are decimal native units.
pub const NATIVE_SCALE: f64 = 1_000_000_000.0;

/// Maximum entries retained by the per-address activity and alert logs.
pub const LOG_CAPACITY: usize = 50;

/// Errors emitted when externally supplied addresses fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressFormatError {
    #[error("address must not be empty")]
    Empty,
}

/// Opaque ledger address. Only equality matters; no internal structure is
/// assumed beyond "non-empty string".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Validates and canonicalizes an externally supplied address.
    pub fn parse(value: &str) -> Result<Self, AddressFormatError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AddressFormatError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

/// A token balance attached to a transaction record, keyed by the owning
/// address and the asset identifier. Amounts are already decimal.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    pub owner: Address,
    pub asset_id: String,
    pub ui_amount: f64,
    pub decimals: u8,
}

/// A fetched transaction. Immutable once parsed at the gateway boundary.
///
/// `pre_balances`/`post_balances` are base-unit native balances parallel to
/// `account_keys`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub signature: String,
    pub account_keys: Vec<Address>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
    /// On-chain error flag: the transaction executed but reverted.
    pub failed: bool,
    pub block_time: Option<i64>,
}

impl TransactionRecord {
    /// Native balance diff (post minus pre) for the account at `index`, in
    /// decimal native units. `None` when the balance arrays do not cover the
    /// index.
    pub fn native_diff(&self, index: usize) -> Option<f64> {
        let pre = *self.pre_balances.get(index)?;
        let post = *self.post_balances.get(index)?;
        Some((post as f64 - pre as f64) / NATIVE_SCALE)
    }
}

/// Asset classification for a verified transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Native,
    Token,
}

/// Outcome of a transfer verification. Exactly one variant is live.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    Verified {
        /// Decimal amount credited to the receiver.
        amount: f64,
        asset: AssetKind,
        asset_id: Option<String>,
        block_time: Option<i64>,
    },
    NotVerified {
        reason: String,
    },
}

impl VerificationResult {
    pub fn not_verified(reason: impl Into<String>) -> Self {
        Self::NotVerified {
            reason: reason.into(),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// A non-zero token holding in an account snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    pub asset_id: String,
    pub amount: f64,
    pub decimals: u8,
}

/// Latest known account state for a monitored address. Zero-amount holdings
/// are excluded at the gateway.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AccountSnapshot {
    pub native_balance: f64,
    pub holdings: Vec<TokenHolding>,
}

/// Monitoring lifecycle status for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum MonitorStatus {
    #[strum(serialize = "Monitoring")]
    Monitoring,
    #[strum(serialize = "Active Movement")]
    #[serde(rename = "Active Movement")]
    ActiveMovement,
}

/// FIFO log bounded at [`LOG_CAPACITY`] entries. Pushing beyond capacity
/// evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct BoundedLog(VecDeque<String>);

impl BoundedLog {
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.0.len() == LOG_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(entry.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn oldest(&self) -> Option<&str> {
        self.0.front().map(String::as_str)
    }

    pub fn newest(&self) -> Option<&str> {
        self.0.back().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Per-address monitoring state. Created when monitoring starts and mutated
/// only through the store's per-entry update contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorEntry {
    pub address: Address,
    pub status: MonitorStatus,
    pub risk_label: String,
    pub activity: BoundedLog,
    pub alerts: BoundedLog,
    pub snapshot: AccountSnapshot,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitorEntry {
    pub fn new(address: Address) -> Self {
        let now = Utc::now();
        Self {
            address,
            status: MonitorStatus::Monitoring,
            risk_label: "Unknown".to_string(),
            activity: BoundedLog::default(),
            alerts: BoundedLog::default(),
            snapshot: AccountSnapshot::default(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
