use std::sync::Arc;

use chain_sentinel_domain::services::telemetry::TelemetryGuard;
use chain_sentinel_domain::store::MonitorStore;
use chain_sentinel_gateway::LedgerGateway;
use chain_sentinel_watchdog::Watchdog;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn MonitorStore>,
    gateway: Arc<dyn LedgerGateway>,
    watchdog: Watchdog,
    telemetry: TelemetryGuard,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        gateway: Arc<dyn LedgerGateway>,
        watchdog: Watchdog,
        telemetry: TelemetryGuard,
    ) -> Self {
        Self {
            store,
            gateway,
            watchdog,
            telemetry,
        }
    }

    pub fn store(&self) -> &Arc<dyn MonitorStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn LedgerGateway> {
        &self.gateway
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }
}
