pub mod metrics;
pub mod monitor;
pub mod receipt;
pub mod status;
pub mod verify;

pub use metrics::metrics_handler;
pub use monitor::{start_monitoring_handler, stop_monitoring_handler};
pub use receipt::receipt_handler;
pub use status::status_handler;
pub use verify::verify_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use chain_sentinel_domain::model::AddressFormatError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressFormatError),
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("address is not monitored")]
    NotMonitored,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidAddress(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotMonitored => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
