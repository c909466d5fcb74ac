//! Environment-driven configuration structures shared by all binaries.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::model::{Address, AddressFormatError};

/// API-specific configuration (HTTP bind targets) kept separate from the
/// watchdog knobs so the HTTP surface can boot without ledger variables when
/// it only serves verification traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    bind_address: String,
    unix_socket: Option<String>,
}

impl ApiConfig {
    /// Loads only the environment variables required to bind the HTTP server.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            bind_address: get_required_var("API_BIND_ADDRESS")?,
            unix_socket: get_optional_var("API_UNIX_SOCKET"),
        })
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn unix_socket(&self) -> Option<&str> {
        self.unix_socket.as_deref()
    }
}

/// Ledger endpoints and watchdog pacing derived from `.env`/process
/// variables. Missing or malformed entries surface as `ConfigError` so
/// binaries can respond gracefully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    rpc_url: String,
    ws_url: String,
    risk_data_path: Option<String>,
    alert_webhook_url: Option<String>,
    watch_addresses: Vec<Address>,
    reconnect_base_ms: u64,
    reconnect_cap_ms: u64,
    propagation_delay_ms: u64,
}

impl WatchdogConfig {
    pub const DEFAULT_RECONNECT_BASE_MS: u64 = 500;
    pub const DEFAULT_RECONNECT_CAP_MS: u64 = 30_000;
    pub const DEFAULT_PROPAGATION_DELAY_MS: u64 = 2_000;

    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let watch_addresses = match get_optional_var("WATCH_ADDRESSES") {
            Some(raw) => parse_watch_addresses(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            rpc_url: get_required_var("LEDGER_RPC_URL")?,
            ws_url: get_required_var("LEDGER_WS_URL")?,
            risk_data_path: get_optional_var("RISK_DATA_PATH"),
            alert_webhook_url: get_optional_var("ALERT_WEBHOOK_URL"),
            watch_addresses,
            reconnect_base_ms: get_optional_number("WATCHDOG_RECONNECT_BASE_MS")?
                .unwrap_or(Self::DEFAULT_RECONNECT_BASE_MS),
            reconnect_cap_ms: get_optional_number("WATCHDOG_RECONNECT_CAP_MS")?
                .unwrap_or(Self::DEFAULT_RECONNECT_CAP_MS),
            propagation_delay_ms: get_optional_number("WATCHDOG_PROPAGATION_DELAY_MS")?
                .unwrap_or(Self::DEFAULT_PROPAGATION_DELAY_MS),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn risk_data_path(&self) -> Option<&str> {
        self.risk_data_path.as_deref()
    }

    pub fn alert_webhook_url(&self) -> Option<&str> {
        self.alert_webhook_url.as_deref()
    }

    /// Addresses the standalone watchdog binary starts monitoring at boot.
    pub fn watch_addresses(&self) -> &[Address] {
        &self.watch_addresses
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_cap(&self) -> Duration {
        Duration::from_millis(self.reconnect_cap_ms)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }
}

fn parse_watch_addresses(raw: &str) -> Result<Vec<Address>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            Address::parse(piece).map_err(|source| ConfigError::InvalidAddress {
                key: "WATCH_ADDRESSES",
                source,
            })
        })
        .collect()
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_optional_number(key: &'static str) -> Result<Option<u64>, ConfigError> {
    get_optional_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { key, source })
        })
        .transpose()
}

pub(crate) fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("CHAIN_SENTINEL_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid address in `{key}`: {source}")]
    InvalidAddress {
        key: &'static str,
        #[source]
        source: AddressFormatError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
