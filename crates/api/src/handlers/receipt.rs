use actix_web::{web, HttpResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct ReceiptRequest {
    pub transaction_signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub confirmed: bool,
    pub block_time: Option<i64>,
    pub message: String,
}

/// Bare receipt check: the transaction exists on the ledger and executed
/// without error, no party attribution.
pub async fn receipt_handler(
    state: web::Data<AppState>,
    payload: web::Json<ReceiptRequest>,
) -> Result<HttpResponse, ApiError> {
    let signature = payload.transaction_signature.trim();
    if signature.is_empty() {
        return Err(ApiError::InvalidInput(
            "transaction signature must not be empty".into(),
        ));
    }

    let response = match state.gateway().get_transaction(signature).await {
        Ok(Some(record)) if record.failed => ReceiptResponse {
            confirmed: false,
            block_time: record.block_time,
            message: "transaction failed on-chain".into(),
        },
        Ok(Some(record)) => ReceiptResponse {
            confirmed: true,
            block_time: record.block_time,
            message: "transaction receipt confirmed".into(),
        },
        Ok(None) => ReceiptResponse {
            confirmed: false,
            block_time: None,
            message: "transaction not found on-chain".into(),
        },
        Err(err) => ReceiptResponse {
            confirmed: false,
            block_time: None,
            message: format!("verification error: {err}"),
        },
    };

    let status = if response.confirmed {
        "confirmed"
    } else {
        "unconfirmed"
    };
    counter!("api_receipt_requests_total", "status" => status).increment(1);

    Ok(HttpResponse::Ok().json(response))
}
