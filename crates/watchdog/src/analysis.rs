//! Post-notification transaction analysis: decide whether funds left the
//! monitored address and raise an alert naming the likely receiver.

use metrics::counter;
use tracing::{debug, warn};

use chain_sentinel_domain::model::{Address, MonitorStatus, TransactionRecord};
use chain_sentinel_domain::services::risk::RiskLookup;
use chain_sentinel_domain::store::MonitorStore;
use chain_sentinel_gateway::LedgerGateway;

use crate::alert::AlertSink;
use crate::worker::WatchdogError;

/// Minimum outbound native diff (in decimal units) considered a movement
/// rather than fee noise.
pub const OUTFLOW_THRESHOLD: f64 = 0.001;

/// An outbound native movement attributed to a counterparty.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMovement {
    pub amount: f64,
    pub receiver: Address,
}

/// Scans per-account native diffs. A drop of at least [`OUTFLOW_THRESHOLD`]
/// on `address` paired with the largest-gaining counterparty is reported as
/// an outbound movement; the gained amount is the reported figure.
pub fn find_outbound_movement(
    record: &TransactionRecord,
    address: &Address,
) -> Option<OutboundMovement> {
    let own_idx = record.account_keys.iter().position(|key| key == address)?;
    let own_diff = record.native_diff(own_idx)?;
    if own_diff > -OUTFLOW_THRESHOLD {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for idx in 0..record.account_keys.len() {
        if idx == own_idx {
            continue;
        }
        let Some(diff) = record.native_diff(idx) else {
            continue;
        };
        if diff > 0.0 && best.map_or(true, |(_, best_diff)| diff > best_diff) {
            best = Some((idx, diff));
        }
    }

    let (receiver_idx, amount) = best?;
    Some(OutboundMovement {
        amount,
        receiver: record.account_keys[receiver_idx].clone(),
    })
}

/// Re-fetches the transaction behind a notification and, when it moved funds
/// out of `address`, records the alert and forwards it to the sink.
///
/// Returns `Ok(true)` when an alert was raised. Gateway failures propagate so
/// the caller can log them; nothing here is fatal to the subscription loop.
pub async fn analyze_activity(
    gateway: &dyn LedgerGateway,
    store: &dyn MonitorStore,
    risk: &RiskLookup,
    sink: &dyn AlertSink,
    address: &Address,
    signature: &str,
) -> Result<bool, WatchdogError> {
    let Some(record) = gateway.get_transaction(signature).await? else {
        debug!(%address, signature, "transaction not found during analysis");
        return Ok(false);
    };

    if record.failed {
        debug!(%address, signature, "transaction failed on-chain; nothing to analyze");
        return Ok(false);
    }

    let Some(movement) = find_outbound_movement(&record, address) else {
        return Ok(false);
    };

    let risk_label = risk.lookup(&movement.receiver);
    let message = format!(
        "Funds moved from {} to {}. Amount: {}. Risk: {}. Sig: {}",
        address, movement.receiver, movement.amount, risk_label, signature
    );

    store.upsert(address, {
        let message = message.clone();
        let risk_label = risk_label.clone();
        Box::new(move |entry| {
            entry.status = MonitorStatus::ActiveMovement;
            entry.risk_label = risk_label;
            entry.alerts.push(message);
            entry.touch();
        })
    });
    counter!("watchdog_alerts_total").increment(1);
    warn!(
        %address,
        receiver = %movement.receiver,
        amount = movement.amount,
        risk = %risk_label,
        "outbound movement detected"
    );

    if let Err(err) = sink.notify(&message).await {
        warn!(error = %err, "alert delivery failed");
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use chain_sentinel_domain::model::TokenHolding;
    use chain_sentinel_domain::store::InMemoryMonitorStore;
    use chain_sentinel_gateway::GatewayResult;

    use crate::alert::AlertError;

    fn record(keys: &[&str], pre: &[u64], post: &[u64]) -> TransactionRecord {
        TransactionRecord {
            signature: "sig1".into(),
            account_keys: keys.iter().map(|k| Address::new(*k)).collect(),
            pre_balances: pre.to_vec(),
            post_balances: post.to_vec(),
            pre_token_balances: Vec::new(),
            post_token_balances: Vec::new(),
            failed: false,
            block_time: Some(1_700_000_000),
        }
    }

    struct StaticGateway {
        record: Option<TransactionRecord>,
    }

    #[async_trait]
    impl LedgerGateway for StaticGateway {
        async fn get_transaction(
            &self,
            _signature: &str,
        ) -> GatewayResult<Option<TransactionRecord>> {
            Ok(self.record.clone())
        }

        async fn get_native_balance(&self, _address: &Address) -> GatewayResult<f64> {
            Ok(0.0)
        }

        async fn get_token_holdings(
            &self,
            _address: &Address,
        ) -> GatewayResult<Vec<TokenHolding>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CapturingSink {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertSink for CapturingSink {
        async fn notify(&self, message: &str) -> Result<(), AlertError> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[test]
    fn movement_requires_significant_own_drop() {
        // 0.0005 lost to fees only.
        let record = record(&["a", "b"], &[1_000_000_000, 0], &[999_500_000, 500_000]);
        assert_eq!(find_outbound_movement(&record, &"a".into()), None);
    }

    #[test]
    fn largest_gaining_counterparty_is_the_receiver() {
        let record = record(
            &["a", "b", "c"],
            &[5_000_000_000, 1_000_000_000, 1_000_000_000],
            &[0, 3_000_000_000, 4_000_000_000],
        );
        let movement = find_outbound_movement(&record, &"a".into()).expect("movement found");
        assert_eq!(movement.receiver, Address::new("c"));
        assert_eq!(movement.amount, 3.0);
    }

    #[test]
    fn no_gaining_counterparty_means_no_movement() {
        let record = record(
            &["a", "b"],
            &[5_000_000_000, 1_000_000_000],
            &[2_000_000_000, 1_000_000_000],
        );
        assert_eq!(find_outbound_movement(&record, &"a".into()), None);
    }

    #[test]
    fn unmonitored_key_yields_nothing() {
        let record = record(&["b", "c"], &[5, 5], &[1, 9]);
        assert_eq!(find_outbound_movement(&record, &"a".into()), None);
    }

    #[tokio::test]
    async fn outbound_movement_raises_one_alert() {
        let address = Address::new("a");
        let gateway = StaticGateway {
            record: Some(record(
                &["a", "b", "c"],
                &[5_000_000_000, 1_000_000_000, 2_000_000_000],
                &[2_500_000_000, 3_500_000_000, 2_000_000_000],
            )),
        };
        let store = InMemoryMonitorStore::default();
        store.upsert(&address, Box::new(|_| {}));
        let risk = RiskLookup::from_entries(HashMap::from([(
            "Big Exchange".to_string(),
            "b".to_string(),
        )]));
        let sink = CapturingSink::default();

        let alerted = analyze_activity(&gateway, &store, &risk, &sink, &address, "sig1")
            .await
            .expect("analysis succeeds");
        assert!(alerted);

        let entry = store.get(&address).unwrap();
        assert_eq!(entry.status, MonitorStatus::ActiveMovement);
        assert_eq!(entry.risk_label, "High Risk: Big Exchange");
        assert_eq!(entry.alerts.len(), 1);
        let alert = entry.alerts.newest().unwrap();
        assert!(alert.contains("Funds moved from a to b"));
        assert!(alert.contains("Risk: High Risk: Big Exchange"));

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], alert);
    }

    #[tokio::test]
    async fn failed_or_missing_transactions_do_not_alert() {
        let address = Address::new("a");
        let store = InMemoryMonitorStore::default();
        let risk = RiskLookup::empty();
        let sink = CapturingSink::default();

        let missing = StaticGateway { record: None };
        assert!(
            !analyze_activity(&missing, &store, &risk, &sink, &address, "sig1")
                .await
                .unwrap()
        );

        let mut failed = record(
            &["a", "b"],
            &[5_000_000_000, 0],
            &[0, 5_000_000_000],
        );
        failed.failed = true;
        let failed = StaticGateway {
            record: Some(failed),
        };
        assert!(
            !analyze_activity(&failed, &store, &risk, &sink, &address, "sig1")
                .await
                .unwrap()
        );

        assert!(sink.messages.lock().unwrap().is_empty());
    }
}
