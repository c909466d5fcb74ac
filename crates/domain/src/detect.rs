//! Transfer detection over pre/post balance diffs.
//!
//! Verification is deliberately loose: a strictly positive receiver-side diff
//! is the signal. The sender's own delta is not inspected, since fee payers
//! and intermediate routing make it unreliable.

use std::collections::HashMap;

use crate::model::{Address, AssetKind, TransactionRecord, VerificationResult};

/// Classifies whether `record` credited `receiver` with a native or token
/// transfer. Native transfers are checked first and short-circuit; among
/// several qualifying token balances the first in iteration order wins.
///
/// Never faults: malformed balance data maps to a `NotVerified` reason.
pub fn detect(
    record: &TransactionRecord,
    sender: &Address,
    receiver: &Address,
) -> VerificationResult {
    if record.failed {
        return VerificationResult::not_verified("transaction failed on-chain");
    }

    if let Some(result) = detect_native(record, sender, receiver) {
        return result;
    }

    if let Some(result) = detect_token(record, receiver) {
        return result;
    }

    VerificationResult::not_verified("no significant transfer found")
}

fn detect_native(
    record: &TransactionRecord,
    sender: &Address,
    receiver: &Address,
) -> Option<VerificationResult> {
    // Both parties must appear among the account keys for the native check
    // to apply; otherwise fall through to the token check.
    record.account_keys.iter().position(|key| key == sender)?;
    let receiver_idx = record
        .account_keys
        .iter()
        .position(|key| key == receiver)?;

    match record.native_diff(receiver_idx) {
        Some(diff) if diff > 0.0 => Some(VerificationResult::Verified {
            amount: diff,
            asset: AssetKind::Native,
            asset_id: None,
            block_time: record.block_time,
        }),
        Some(_) => None,
        None => Some(VerificationResult::not_verified(format!(
            "error: native balances missing for account index {receiver_idx}"
        ))),
    }
}

fn detect_token(record: &TransactionRecord, receiver: &Address) -> Option<VerificationResult> {
    let pre: HashMap<(&str, &str), f64> = record
        .pre_token_balances
        .iter()
        .map(|balance| {
            (
                (balance.owner.as_str(), balance.asset_id.as_str()),
                balance.ui_amount,
            )
        })
        .collect();

    for balance in &record.post_token_balances {
        if balance.owner != *receiver {
            continue;
        }
        let before = pre
            .get(&(balance.owner.as_str(), balance.asset_id.as_str()))
            .copied()
            .unwrap_or(0.0);
        let diff = balance.ui_amount - before;
        if diff > 0.0 {
            return Some(VerificationResult::Verified {
                amount: diff,
                asset: AssetKind::Token,
                asset_id: Some(balance.asset_id.clone()),
                block_time: record.block_time,
            });
        }
    }

    None
}
