//! Websocket activity subscription scoped to a single address.
//!
//! One connection carries one `logsSubscribe` registration. Transport loss
//! surfaces as a distinct error from "no new notification yet": the latter is
//! simply `next_notification` staying pending.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use chain_sentinel_domain::model::Address;

use crate::{GatewayError, GatewayResult};

/// One ledger activity event mentioning a subscribed address.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityNotification {
    pub signature: String,
    pub logs: Vec<String>,
}

/// Opens activity subscriptions. Seam for tests and alternative transports.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn subscribe(&self, address: &Address) -> GatewayResult<Box<dyn ActivityStream>>;
}

/// A live subscription delivering notifications in arrival order.
#[async_trait]
pub trait ActivityStream: Send {
    /// Waits for the next notification. Errors mean the transport is gone
    /// and the caller must resubscribe.
    async fn next_notification(&mut self) -> GatewayResult<ActivityNotification>;
}

/// Websocket-backed [`ActivitySource`].
pub struct WsActivitySubscriber {
    ws_url: Url,
}

impl WsActivitySubscriber {
    pub fn new(ws_url: &str) -> GatewayResult<Self> {
        Ok(Self {
            ws_url: Url::parse(ws_url)?,
        })
    }
}

#[async_trait]
impl ActivitySource for WsActivitySubscriber {
    async fn subscribe(&self, address: &Address) -> GatewayResult<Box<dyn ActivityStream>> {
        let (mut stream, _response) = connect_async(self.ws_url.as_str()).await?;

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [address.as_str()] },
                { "commitment": "confirmed" }
            ]
        });
        stream.send(Message::Text(request.to_string())).await?;
        debug!(%address, "activity subscription requested");

        Ok(Box::new(ActivitySubscription { stream }))
    }
}

pub struct ActivitySubscription {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ActivityStream for ActivitySubscription {
    async fn next_notification(&mut self) -> GatewayResult<ActivityNotification> {
        loop {
            let message = self.stream.next().await.ok_or(GatewayError::Closed)??;
            match message {
                Message::Text(text) => match parse_notification(&text) {
                    Ok(Some(notification)) => return Ok(notification),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "failed to parse subscription frame"),
                },
                Message::Ping(payload) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => {
                    info!(frame = ?frame, "subscription closed by remote");
                    return Err(GatewayError::Closed);
                }
                _ => {}
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WsFrame {
    method: Option<String>,
    params: Option<WsParams>,
}

#[derive(Debug, Deserialize)]
struct WsParams {
    result: WsResult,
}

#[derive(Debug, Deserialize)]
struct WsResult {
    value: WsValue,
}

#[derive(Debug, Deserialize)]
struct WsValue {
    signature: String,
    #[serde(default)]
    logs: Vec<String>,
}

/// `Ok(None)` for frames that are not log notifications (e.g. the
/// subscription confirmation).
fn parse_notification(text: &str) -> GatewayResult<Option<ActivityNotification>> {
    let frame: WsFrame = serde_json::from_str(text)?;
    if frame.method.as_deref() != Some("logsNotification") {
        debug!("ignoring non-notification frame");
        return Ok(None);
    }

    let value = frame
        .params
        .ok_or_else(|| GatewayError::Parse("logsNotification without params".into()))?
        .result
        .value;

    Ok(Some(ActivityNotification {
        signature: value.signature,
        logs: value.logs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_logs_notification() {
        let frame = r#"{
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "context": { "slot": 5208469 },
                    "value": {
                        "signature": "sig1",
                        "err": null,
                        "logs": ["Program 11111 invoke [1]", "Program 11111 success"]
                    }
                },
                "subscription": 24040
            }
        }"#;

        let notification = parse_notification(frame)
            .expect("frame parses")
            .expect("notification present");
        assert_eq!(notification.signature, "sig1");
        assert_eq!(notification.logs.len(), 2);
    }

    #[test]
    fn confirmation_frame_is_ignored() {
        let frame = r#"{ "jsonrpc": "2.0", "result": 23784, "id": 1 }"#;
        assert_eq!(parse_notification(frame).expect("frame parses"), None);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(parse_notification("not json").is_err());
    }
}
