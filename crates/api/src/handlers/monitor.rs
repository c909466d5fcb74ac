use actix_web::{web, HttpResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};

use chain_sentinel_domain::model::Address;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Deserialize, Serialize)]
pub struct MonitorRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorResponse {
    pub status: String,
    pub address: String,
}

pub async fn start_monitoring_handler(
    state: web::Data<AppState>,
    payload: web::Json<MonitorRequest>,
) -> Result<HttpResponse, ApiError> {
    let address = Address::parse(&payload.address)?;

    let started = state.watchdog().start(address.clone()).await;
    let status = if started {
        "monitoring"
    } else {
        "already_monitoring"
    };
    counter!("api_monitor_requests_total", "action" => "start", "status" => status).increment(1);

    Ok(HttpResponse::Ok().json(MonitorResponse {
        status: status.to_string(),
        address: address.into_inner(),
    }))
}

/// Ends the subscription for an address. Its entry stays queryable.
pub async fn stop_monitoring_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let address = Address::parse(&path.into_inner())?;

    if !state.watchdog().stop(&address) {
        counter!("api_monitor_requests_total", "action" => "stop", "status" => "not_monitored")
            .increment(1);
        return Err(ApiError::NotMonitored);
    }
    counter!("api_monitor_requests_total", "action" => "stop", "status" => "stopped").increment(1);

    Ok(HttpResponse::Ok().json(MonitorResponse {
        status: "stopped".to_string(),
        address: address.into_inner(),
    }))
}
