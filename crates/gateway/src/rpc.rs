//! JSON-RPC 2.0 client for transaction, balance, and holdings fetches.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use chain_sentinel_domain::model::{
    Address, TokenBalance, TokenHolding, TransactionRecord, NATIVE_SCALE,
};

use crate::{GatewayError, GatewayResult, LedgerGateway};

const RPC_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC implementation of [`LedgerGateway`].
pub struct RpcLedgerGateway {
    http: reqwest::Client,
    rpc_url: String,
}

impl RpcLedgerGateway {
    pub fn new(rpc_url: impl Into<String>) -> GatewayResult<Self> {
        let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
        })
    }

    /// Issues one JSON-RPC call. `Ok(None)` means the ledger answered with a
    /// null result (e.g. an unknown transaction).
    async fn call<P, R>(&self, method: &'static str, params: P) -> GatewayResult<Option<R>>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response: JsonRpcResponse<R> = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(GatewayError::Rpc(format!(
                "{method} failed with code {}: {}",
                err.code, err.message
            )));
        }

        Ok(response.result)
    }
}

#[async_trait::async_trait]
impl LedgerGateway for RpcLedgerGateway {
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> GatewayResult<Option<TransactionRecord>> {
        let params = (
            signature,
            json!({
                "encoding": "jsonParsed",
                "maxSupportedTransactionVersion": 0,
            }),
        );
        let envelope: Option<TransactionEnvelope> = self.call("getTransaction", params).await?;
        envelope
            .map(|envelope| convert_transaction(signature, envelope))
            .transpose()
    }

    async fn get_native_balance(&self, address: &Address) -> GatewayResult<f64> {
        let params = (address.as_str(),);
        let value: RpcValue<u64> = self
            .call("getBalance", params)
            .await?
            .ok_or_else(|| GatewayError::Parse("missing result for getBalance".into()))?;
        Ok(value.value as f64 / NATIVE_SCALE)
    }

    async fn get_token_holdings(&self, address: &Address) -> GatewayResult<Vec<TokenHolding>> {
        let params = (
            address.as_str(),
            json!({ "programId": TOKEN_PROGRAM_ID }),
            json!({ "encoding": "jsonParsed" }),
        );
        let value: RpcValue<Vec<TokenAccountWire>> = self
            .call("getTokenAccountsByOwner", params)
            .await?
            .ok_or_else(|| {
                GatewayError::Parse("missing result for getTokenAccountsByOwner".into())
            })?;

        Ok(value
            .value
            .into_iter()
            .filter_map(|account| {
                let info = account.account.data.parsed.info;
                let amount = info.token_amount.ui_amount.unwrap_or(0.0);
                (amount > 0.0).then(|| TokenHolding {
                    asset_id: info.mint,
                    amount,
                    decimals: info.token_amount.decimals,
                })
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct RpcValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionEnvelope {
    block_time: Option<i64>,
    meta: TransactionMeta,
    transaction: TransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    err: Option<serde_json::Value>,
    pre_balances: Vec<u64>,
    post_balances: Vec<u64>,
    #[serde(default)]
    pre_token_balances: Vec<WireTokenBalance>,
    #[serde(default)]
    post_token_balances: Vec<WireTokenBalance>,
}

#[derive(Debug, Deserialize)]
struct TransactionBody {
    message: TransactionMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMessage {
    account_keys: Vec<AccountKey>,
}

/// Account keys arrive as plain strings under raw encodings and as
/// `{"pubkey": ...}` objects under `jsonParsed`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    fn into_address(self) -> Address {
        match self {
            AccountKey::Plain(key) => Address::new(key),
            AccountKey::Parsed { pubkey } => Address::new(pubkey),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTokenBalance {
    owner: Option<String>,
    mint: String,
    ui_token_amount: WireTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTokenAmount {
    ui_amount: Option<f64>,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct TokenAccountWire {
    account: TokenAccountInfoWire,
}

#[derive(Debug, Deserialize)]
struct TokenAccountInfoWire {
    data: TokenAccountDataWire,
}

#[derive(Debug, Deserialize)]
struct TokenAccountDataWire {
    parsed: TokenAccountParsedWire,
}

#[derive(Debug, Deserialize)]
struct TokenAccountParsedWire {
    info: TokenInfoWire,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfoWire {
    mint: String,
    token_amount: WireTokenAmount,
}

fn convert_transaction(
    signature: &str,
    envelope: TransactionEnvelope,
) -> GatewayResult<TransactionRecord> {
    let account_keys: Vec<Address> = envelope
        .transaction
        .message
        .account_keys
        .into_iter()
        .map(AccountKey::into_address)
        .collect();

    if envelope.meta.pre_balances.len() != envelope.meta.post_balances.len() {
        return Err(GatewayError::Parse(format!(
            "balance arrays disagree: {} pre vs {} post",
            envelope.meta.pre_balances.len(),
            envelope.meta.post_balances.len()
        )));
    }

    Ok(TransactionRecord {
        signature: signature.to_string(),
        account_keys,
        pre_balances: envelope.meta.pre_balances,
        post_balances: envelope.meta.post_balances,
        pre_token_balances: convert_token_balances(envelope.meta.pre_token_balances),
        post_token_balances: convert_token_balances(envelope.meta.post_token_balances),
        failed: envelope.meta.err.is_some(),
        block_time: envelope.block_time,
    })
}

/// Entries with no owner cannot be attributed to an address and are dropped.
fn convert_token_balances(balances: Vec<WireTokenBalance>) -> Vec<TokenBalance> {
    balances
        .into_iter()
        .filter_map(|balance| {
            let owner = balance.owner?;
            Some(TokenBalance {
                owner: Address::new(owner),
                asset_id: balance.mint,
                ui_amount: balance.ui_token_amount.ui_amount.unwrap_or(0.0),
                decimals: balance.ui_token_amount.decimals,
            })
        })
        .collect()
}
