use std::sync::Arc;

#[cfg(unix)]
use std::{fs, path::Path};

use actix_web::{middleware::Logger, web, App, HttpServer};
use thiserror::Error;
use tracing::info;

use chain_sentinel_domain::config::{ApiConfig, ConfigError, WatchdogConfig};
use chain_sentinel_domain::services::risk::RiskLookup;
use chain_sentinel_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
use chain_sentinel_domain::store::{InMemoryMonitorStore, MonitorStore};
use chain_sentinel_gateway::{
    GatewayError, LedgerGateway, RpcLedgerGateway, WsActivitySubscriber,
};
use chain_sentinel_watchdog::{
    AlertSink, BackoffPolicy, LogAlertSink, Watchdog, WatchdogError, WebhookAlertSink,
};

use crate::{
    handlers::{
        metrics_handler, receipt_handler, start_monitoring_handler, status_handler,
        stop_monitoring_handler, verify_handler,
    },
    state::AppState,
};

pub async fn run() -> Result<(), BootstrapError> {
    let api_config = ApiConfig::load_from_env()?;
    let watchdog_config = WatchdogConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    let store: Arc<dyn MonitorStore> = Arc::new(InMemoryMonitorStore::default());
    let gateway: Arc<dyn LedgerGateway> =
        Arc::new(RpcLedgerGateway::new(watchdog_config.rpc_url())?);
    let activity = Arc::new(WsActivitySubscriber::new(watchdog_config.ws_url())?);
    let risk = Arc::new(match watchdog_config.risk_data_path() {
        Some(path) => RiskLookup::load(path),
        None => RiskLookup::empty(),
    });
    let sink: Arc<dyn AlertSink> = match watchdog_config.alert_webhook_url() {
        Some(url) => Arc::new(WebhookAlertSink::new(url).map_err(WatchdogError::from)?),
        None => Arc::new(LogAlertSink),
    };

    let watchdog = Watchdog::with_tuning(
        store.clone(),
        gateway.clone(),
        activity,
        risk,
        sink,
        BackoffPolicy::new(
            watchdog_config.reconnect_base(),
            watchdog_config.reconnect_cap(),
        ),
        watchdog_config.propagation_delay(),
    );

    let state = AppState::new(store, gateway, watchdog, telemetry);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .route("/api/v1/verify", web::post().to(verify_handler))
            .route("/api/v1/receipt", web::post().to(receipt_handler))
            .route("/api/v1/monitor", web::post().to(start_monitoring_handler))
            .route(
                "/api/v1/monitor/{address}",
                web::delete().to(stop_monitoring_handler),
            )
            .route("/api/v1/status/{address}", web::get().to(status_handler))
            .route("/metrics", web::get().to(metrics_handler))
    });

    #[cfg(unix)]
    {
        if let Some(socket) = api_config.unix_socket() {
            cleanup_socket(socket)?;
            server = server.bind_uds(socket)?;
        } else {
            server = server.bind(api_config.bind_address())?;
        }
    }

    #[cfg(not(unix))]
    {
        if let Some(socket) = api_config.unix_socket() {
            return Err(BootstrapError::Io(std::io::Error::other(format!(
                "unix socket '{socket}' requested but this platform does not support it"
            ))));
        }
        server = server.bind(api_config.bind_address())?;
    }

    info!(
        bind = api_config.bind_address(),
        unix_socket = api_config.unix_socket().unwrap_or("-"),
        "api listening"
    );
    server.run().await?;

    Ok(())
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A stale socket file from an unclean shutdown makes `bind_uds` fail, so
/// remove it first.
#[cfg(unix)]
fn cleanup_socket(path: &str) -> std::io::Result<()> {
    let socket_path = Path::new(path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    #[actix_web::test]
    async fn cleanup_socket_removes_stale_file() {
        use super::cleanup_socket;

        let path = std::env::temp_dir().join(format!(
            "chain-sentinel-test-{}-{}.sock",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, b"stub").expect("write socket file");
        cleanup_socket(path.to_str().unwrap()).expect("cleanup succeeds");
        assert!(!path.exists());
    }
}
