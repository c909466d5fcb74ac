use actix_web::{web, HttpResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};

use chain_sentinel_domain::detect;
use chain_sentinel_domain::model::{Address, AssetKind, VerificationResult};
use chain_sentinel_gateway::LedgerGateway;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyRequest {
    pub transaction_signature: String,
    pub sender: String,
    pub receiver: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub amount: f64,
    pub asset: Option<AssetKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    pub timestamp: Option<i64>,
    pub message: String,
}

impl From<VerificationResult> for VerifyResponse {
    fn from(result: VerificationResult) -> Self {
        match result {
            VerificationResult::Verified {
                amount,
                asset,
                asset_id,
                block_time,
            } => Self {
                verified: true,
                amount,
                asset: Some(asset),
                asset_id,
                timestamp: block_time,
                message: match asset {
                    AssetKind::Native => "verified native transfer".to_string(),
                    AssetKind::Token => "verified token transfer".to_string(),
                },
            },
            VerificationResult::NotVerified { reason } => Self {
                verified: false,
                amount: 0.0,
                asset: None,
                asset_id: None,
                timestamp: None,
                message: reason,
            },
        }
    }
}

/// One-shot verification. Detector outcomes (including fetch failures) are
/// always a structured 200 body; only malformed input is an HTTP error.
pub async fn verify_handler(
    state: web::Data<AppState>,
    payload: web::Json<VerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let sender = Address::parse(&payload.sender).inspect_err(|_| {
        counter!("api_verify_requests_total", "status" => "invalid_input").increment(1);
    })?;
    let receiver = Address::parse(&payload.receiver).inspect_err(|_| {
        counter!("api_verify_requests_total", "status" => "invalid_input").increment(1);
    })?;
    let signature = payload.transaction_signature.trim();
    if signature.is_empty() {
        counter!("api_verify_requests_total", "status" => "invalid_input").increment(1);
        return Err(ApiError::InvalidInput(
            "transaction signature must not be empty".into(),
        ));
    }

    let result = run_verification(state.gateway().as_ref(), signature, &sender, &receiver).await;
    let status = if result.is_verified() {
        "verified"
    } else {
        "not_verified"
    };
    counter!("api_verify_requests_total", "status" => status).increment(1);

    Ok(HttpResponse::Ok().json(VerifyResponse::from(result)))
}

async fn run_verification(
    gateway: &dyn LedgerGateway,
    signature: &str,
    sender: &Address,
    receiver: &Address,
) -> VerificationResult {
    match gateway.get_transaction(signature).await {
        Ok(Some(record)) => detect(&record, sender, receiver),
        Ok(None) => VerificationResult::not_verified("transaction not found"),
        Err(err) => VerificationResult::not_verified(format!("error: {err}")),
    }
}
