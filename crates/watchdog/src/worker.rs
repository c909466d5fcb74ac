//! Watchdog core: the monitored-address set, per-address subscription loops
//! with reconnect backoff, and account-state reconciliation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::{counter, gauge};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use chain_sentinel_domain::config::ConfigError;
use chain_sentinel_domain::model::{AccountSnapshot, Address};
use chain_sentinel_domain::services::risk::RiskLookup;
use chain_sentinel_domain::services::telemetry::TelemetryError;
use chain_sentinel_domain::store::MonitorStore;
use chain_sentinel_gateway::{
    ActivityNotification, ActivitySource, GatewayError, GatewayResult, LedgerGateway,
};

use crate::alert::{AlertError, AlertSink};
use crate::analysis::analyze_activity;

#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("alert sink error: {0}")]
    Alert(#[from] AlertError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reconnect pacing: the delay doubles after every failed cycle up to `cap`
/// and resets once a subscription is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            initial,
            cap: cap.max(initial),
        }
    }

    pub fn state(&self) -> BackoffState {
        BackoffState {
            policy: *self,
            next: self.initial,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    policy: BackoffPolicy,
    next: Duration,
}

impl BackoffState {
    /// Returns the delay to wait now and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.policy.cap);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.policy.initial;
    }
}

/// Default wait before re-fetching a notified transaction, so ledger nodes
/// reach consistent state.
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_secs(2);

/// Maintains one long-lived activity subscription per monitored address and
/// reconciles account state on every notification.
///
/// Each `start` stamps the address with a fresh generation; loops check that
/// their generation is still current at every checkpoint, so a stopped loop
/// can never serve an address that was re-started in the meantime.
///
/// Cloning shares all state; clones are handed to spawned loops.
#[derive(Clone)]
pub struct Watchdog {
    store: Arc<dyn MonitorStore>,
    gateway: Arc<dyn LedgerGateway>,
    activity: Arc<dyn ActivitySource>,
    risk: Arc<RiskLookup>,
    sink: Arc<dyn AlertSink>,
    monitored: Arc<RwLock<HashMap<Address, u64>>>,
    next_generation: Arc<AtomicU64>,
    backoff: BackoffPolicy,
    propagation_delay: Duration,
}

impl Watchdog {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        gateway: Arc<dyn LedgerGateway>,
        activity: Arc<dyn ActivitySource>,
        risk: Arc<RiskLookup>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self::with_tuning(
            store,
            gateway,
            activity,
            risk,
            sink,
            BackoffPolicy::default(),
            DEFAULT_PROPAGATION_DELAY,
        )
    }

    pub fn with_tuning(
        store: Arc<dyn MonitorStore>,
        gateway: Arc<dyn LedgerGateway>,
        activity: Arc<dyn ActivitySource>,
        risk: Arc<RiskLookup>,
        sink: Arc<dyn AlertSink>,
        backoff: BackoffPolicy,
        propagation_delay: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            activity,
            risk,
            sink,
            monitored: Arc::new(RwLock::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
            backoff,
            propagation_delay,
        }
    }

    pub fn store(&self) -> &Arc<dyn MonitorStore> {
        &self.store
    }

    /// Begins monitoring `address`: registers it, creates its entry if
    /// absent, takes an immediate snapshot, and spawns the subscription
    /// loop. Returns `false` (and does nothing else) when the address is
    /// already monitored.
    pub async fn start(&self, address: Address) -> bool {
        let generation = {
            let mut monitored = self
                .monitored
                .write()
                .expect("monitored set lock poisoned");
            if monitored.contains_key(&address) {
                warn!(%address, "already monitoring");
                return false;
            }
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            monitored.insert(address.clone(), generation);
            generation
        };
        counter!("watchdog_monitor_starts_total").increment(1);
        gauge!("watchdog_active_monitors").increment(1.0);

        self.store.upsert(&address, Box::new(|_| {}));
        self.refresh_snapshot(&address).await;
        info!(%address, "monitoring started");

        let watchdog = self.clone();
        let loop_address = address.clone();
        tokio::spawn(async move { watchdog.run_subscription(loop_address, generation).await });
        true
    }

    /// Cooperative stop: flips the monitored flag. The running loop observes
    /// it at its next checkpoint and exits; the entry stays queryable.
    pub fn stop(&self, address: &Address) -> bool {
        let removed = self
            .monitored
            .write()
            .expect("monitored set lock poisoned")
            .remove(address)
            .is_some();
        if removed {
            gauge!("watchdog_active_monitors").decrement(1.0);
            info!(%address, "monitoring stop requested");
        } else {
            warn!(%address, "not monitoring");
        }
        removed
    }

    pub fn is_monitored(&self, address: &Address) -> bool {
        self.monitored
            .read()
            .expect("monitored set lock poisoned")
            .contains_key(address)
    }

    /// Checkpoint test used by the loops: the address is still monitored and
    /// no newer loop has taken it over.
    fn is_current(&self, address: &Address, generation: u64) -> bool {
        self.monitored
            .read()
            .expect("monitored set lock poisoned")
            .get(address)
            == Some(&generation)
    }

    /// Subscription loop for one address. Runs until `stop` is observed;
    /// every transport failure closes the connection and retries after the
    /// backoff delay.
    async fn run_subscription(&self, address: Address, generation: u64) {
        let mut backoff = self.backoff.state();
        while self.is_current(&address, generation) {
            match self.activity.subscribe(&address).await {
                Ok(mut stream) => {
                    info!(%address, "activity subscription established");
                    backoff.reset();
                    while self.is_current(&address, generation) {
                        match stream.next_notification().await {
                            Ok(notification) => {
                                self.handle_notification(&address, notification).await;
                            }
                            Err(err) => {
                                warn!(%address, error = %err, "subscription receive failed");
                                counter!("watchdog_subscription_errors_total", "stage" => "receive")
                                    .increment(1);
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(%address, error = %err, "subscription connect failed");
                    counter!("watchdog_subscription_errors_total", "stage" => "connect")
                        .increment(1);
                }
            }

            if !self.is_current(&address, generation) {
                break;
            }
            let delay = backoff.next_delay();
            debug!(%address, delay_ms = delay.as_millis() as u64, "reconnecting after backoff");
            sleep(delay).await;
        }
        info!(%address, "monitoring stopped");
    }

    /// Synchronous part of notification handling, applied in arrival order:
    /// log the signature, refresh the snapshot, then hand the signature to a
    /// detached analysis task.
    async fn handle_notification(&self, address: &Address, notification: ActivityNotification) {
        info!(%address, signature = %notification.signature, "activity detected");
        counter!("watchdog_notifications_total").increment(1);

        let signature = notification.signature.clone();
        self.store.upsert(address, {
            let signature = signature.clone();
            Box::new(move |entry| {
                entry.activity.push(signature);
                entry.touch();
            })
        });
        self.refresh_snapshot(address).await;
        self.spawn_analysis(address.clone(), signature);
    }

    async fn refresh_snapshot(&self, address: &Address) {
        match fetch_snapshot(self.gateway.as_ref(), address).await {
            Ok(snapshot) => self.store.upsert(address, {
                Box::new(move |entry| {
                    entry.snapshot = snapshot;
                    entry.touch();
                })
            }),
            Err(err) => warn!(%address, error = %err, "snapshot refresh failed"),
        }
    }

    /// Detached so slow analysis never stalls notification receipt. Tasks
    /// may complete out of arrival order; alert-log ordering may therefore
    /// differ from on-chain ordering.
    fn spawn_analysis(&self, address: Address, signature: String) {
        let watchdog = self.clone();
        tokio::spawn(async move {
            sleep(watchdog.propagation_delay).await;
            if let Err(err) = analyze_activity(
                watchdog.gateway.as_ref(),
                watchdog.store.as_ref(),
                &watchdog.risk,
                watchdog.sink.as_ref(),
                &address,
                &signature,
            )
            .await
            {
                warn!(%address, signature = %signature, error = %err, "transaction analysis failed");
            }
        });
    }
}

/// Current account state for `address`: native balance plus non-zero token
/// holdings.
pub async fn fetch_snapshot(
    gateway: &dyn LedgerGateway,
    address: &Address,
) -> GatewayResult<AccountSnapshot> {
    let native_balance = gateway.get_native_balance(address).await?;
    let holdings = gateway.get_token_holdings(address).await?;
    Ok(AccountSnapshot {
        native_balance,
        holdings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use chain_sentinel_domain::model::{TokenHolding, TransactionRecord};
    use chain_sentinel_domain::store::InMemoryMonitorStore;

    struct StaticGateway {
        balance: f64,
        holdings: Vec<TokenHolding>,
    }

    #[async_trait]
    impl LedgerGateway for StaticGateway {
        async fn get_transaction(
            &self,
            _signature: &str,
        ) -> GatewayResult<Option<TransactionRecord>> {
            Ok(None)
        }

        async fn get_native_balance(&self, _address: &Address) -> GatewayResult<f64> {
            Ok(self.balance)
        }

        async fn get_token_holdings(
            &self,
            _address: &Address,
        ) -> GatewayResult<Vec<TokenHolding>> {
            Ok(self.holdings.clone())
        }
    }

    #[derive(Default)]
    struct PendingActivity {
        subscribes: AtomicUsize,
    }

    #[async_trait]
    impl ActivitySource for PendingActivity {
        async fn subscribe(
            &self,
            _address: &Address,
        ) -> GatewayResult<Box<dyn chain_sentinel_gateway::ActivityStream>> {
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PendingStream))
        }
    }

    struct PendingStream;

    #[async_trait]
    impl chain_sentinel_gateway::ActivityStream for PendingStream {
        async fn next_notification(&mut self) -> GatewayResult<ActivityNotification> {
            future::pending::<()>().await;
            unreachable!()
        }
    }

    struct SilentSink;

    #[async_trait]
    impl AlertSink for SilentSink {
        async fn notify(&self, _message: &str) -> Result<(), AlertError> {
            Ok(())
        }
    }

    fn build_watchdog(
        gateway: StaticGateway,
    ) -> (Watchdog, Arc<InMemoryMonitorStore>, Arc<PendingActivity>) {
        let store = Arc::new(InMemoryMonitorStore::default());
        let activity = Arc::new(PendingActivity::default());
        let watchdog = Watchdog::with_tuning(
            store.clone(),
            Arc::new(gateway),
            activity.clone(),
            Arc::new(RiskLookup::empty()),
            Arc::new(SilentSink),
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(40)),
            Duration::from_millis(5),
        );
        (watchdog, store, activity)
    }

    #[test]
    fn backoff_doubles_to_cap_and_resets() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(350));
        let mut state = policy.state();
        assert_eq!(state.next_delay(), Duration::from_millis(100));
        assert_eq!(state.next_delay(), Duration::from_millis(200));
        assert_eq!(state.next_delay(), Duration::from_millis(350));
        assert_eq!(state.next_delay(), Duration::from_millis(350));
        state.reset();
        assert_eq!(state.next_delay(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn start_twice_leaves_a_single_loop() {
        let (watchdog, _store, activity) = build_watchdog(StaticGateway {
            balance: 0.0,
            holdings: Vec::new(),
        });
        let address = Address::new("addr1");

        assert!(watchdog.start(address.clone()).await);
        assert!(!watchdog.start(address.clone()).await);
        sleep(Duration::from_millis(50)).await;

        assert!(watchdog.is_monitored(&address));
        assert_eq!(activity.subscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_then_start_reestablishes_monitoring() {
        let (watchdog, _store, activity) = build_watchdog(StaticGateway {
            balance: 0.0,
            holdings: Vec::new(),
        });
        let address = Address::new("addr1");

        assert!(watchdog.start(address.clone()).await);
        sleep(Duration::from_millis(30)).await;
        assert!(watchdog.stop(&address));
        assert!(!watchdog.is_monitored(&address));
        assert!(!watchdog.stop(&address));

        assert!(watchdog.start(address.clone()).await);
        sleep(Duration::from_millis(30)).await;
        assert!(watchdog.is_monitored(&address));
        assert_eq!(activity.subscribes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn start_takes_an_immediate_snapshot() {
        let (watchdog, store, _activity) = build_watchdog(StaticGateway {
            balance: 7.5,
            holdings: vec![TokenHolding {
                asset_id: "mint1".into(),
                amount: 2.0,
                decimals: 6,
            }],
        });
        let address = Address::new("addr1");

        watchdog.start(address.clone()).await;

        let entry = store.get(&address).expect("entry created");
        assert_eq!(entry.snapshot.native_balance, 7.5);
        assert_eq!(entry.snapshot.holdings.len(), 1);
    }

    #[tokio::test]
    async fn notification_appends_activity_and_refreshes_snapshot() {
        let (watchdog, store, _activity) = build_watchdog(StaticGateway {
            balance: 3.25,
            holdings: Vec::new(),
        });
        let address = Address::new("addr1");
        store.upsert(&address, Box::new(|_| {}));

        watchdog
            .handle_notification(
                &address,
                ActivityNotification {
                    signature: "sig-77".into(),
                    logs: Vec::new(),
                },
            )
            .await;

        let entry = store.get(&address).unwrap();
        assert_eq!(entry.activity.newest(), Some("sig-77"));
        assert_eq!(entry.snapshot.native_balance, 3.25);
    }
}
