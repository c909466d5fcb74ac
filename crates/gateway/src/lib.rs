//! Ledger gateway adapters: typed JSON-RPC fetches over HTTP and the
//! websocket activity subscription. Pure I/O; raw wire shapes are parsed into
//! domain records here and business logic never sees an untyped map.

mod rpc;
mod ws;

pub use rpc::RpcLedgerGateway;
pub use ws::{ActivityNotification, ActivitySource, ActivityStream, WsActivitySubscriber};

use async_trait::async_trait;
use thiserror::Error;

use chain_sentinel_domain::model::{Address, TokenHolding, TransactionRecord};

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ledger rpc error: {0}")]
    Rpc(String),
    #[error("malformed gateway response: {0}")]
    Parse(String),
    #[error("websocket connection failed: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("subscription closed unexpectedly")]
    Closed,
}

/// Fetch contract against a remote ledger node. Calls are independent and
/// side-effect-free on shared process state, so one client serves any number
/// of concurrent tasks.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Full record for `signature`, or `None` when the ledger has no such
    /// transaction.
    async fn get_transaction(&self, signature: &str)
        -> GatewayResult<Option<TransactionRecord>>;

    /// Native balance for `address` in decimal units.
    async fn get_native_balance(&self, address: &Address) -> GatewayResult<f64>;

    /// Non-zero token holdings owned by `address`.
    async fn get_token_holdings(&self, address: &Address) -> GatewayResult<Vec<TokenHolding>>;
}
