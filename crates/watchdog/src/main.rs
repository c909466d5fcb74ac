//! Standalone watchdog binary: monitors the addresses listed in
//! `WATCH_ADDRESSES` until interrupted.

use std::io;
use std::sync::Arc;

use chain_sentinel_domain::config::WatchdogConfig;
use chain_sentinel_domain::services::risk::RiskLookup;
use chain_sentinel_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use chain_sentinel_domain::store::InMemoryMonitorStore;
use chain_sentinel_gateway::{RpcLedgerGateway, WsActivitySubscriber};
use chain_sentinel_watchdog::{
    AlertSink, BackoffPolicy, LogAlertSink, Watchdog, WatchdogError, WebhookAlertSink,
};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[watchdog] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), WatchdogError> {
    let config = WatchdogConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("WATCHDOG");
    init_telemetry(&telemetry_config)?;

    let store = Arc::new(InMemoryMonitorStore::default());
    let gateway = Arc::new(RpcLedgerGateway::new(config.rpc_url())?);
    let activity = Arc::new(WsActivitySubscriber::new(config.ws_url())?);
    let risk = Arc::new(match config.risk_data_path() {
        Some(path) => RiskLookup::load(path),
        None => RiskLookup::empty(),
    });
    let sink: Arc<dyn AlertSink> = match config.alert_webhook_url() {
        Some(url) => Arc::new(WebhookAlertSink::new(url)?),
        None => Arc::new(LogAlertSink),
    };

    let watchdog = Watchdog::with_tuning(
        store,
        gateway,
        activity,
        risk,
        sink,
        BackoffPolicy::new(config.reconnect_base(), config.reconnect_cap()),
        config.propagation_delay(),
    );

    for address in config.watch_addresses() {
        watchdog.start(address.clone()).await;
    }

    tokio::signal::ctrl_c().await?;
    Ok(())
}
