use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chain_sentinel_domain::model::{Address, MonitorEntry, TokenHolding};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub address: String,
    pub status: String,
    pub risk_label: String,
    pub balance: f64,
    pub holdings: Vec<TokenHolding>,
    pub latest_activity: Vec<String>,
    pub alerts: Vec<String>,
    pub monitored: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StatusResponse {
    fn from_entry(entry: MonitorEntry, monitored: bool) -> Self {
        Self {
            address: entry.address.into_inner(),
            status: entry.status.to_string(),
            risk_label: entry.risk_label,
            balance: entry.snapshot.native_balance,
            holdings: entry.snapshot.holdings,
            latest_activity: entry.activity.iter().map(str::to_string).collect(),
            alerts: entry.alerts.iter().map(str::to_string).collect(),
            monitored,
            started_at: entry.started_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Best-known state for an address; may be stale during an active
/// reconnection.
pub async fn status_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let address = Address::parse(&path.into_inner())?;

    let entry = state.store().get(&address).ok_or(ApiError::NotMonitored)?;
    let monitored = state.watchdog().is_monitored(&address);

    Ok(HttpResponse::Ok().json(StatusResponse::from_entry(entry, monitored)))
}
