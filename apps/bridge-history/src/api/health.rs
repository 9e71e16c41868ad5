use axum::{extract::State, Json};
use serde::Serialize;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub l1_chain_id: u64,
    pub l2_chain_id: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        l1_chain_id: state.chains.l1,
        l2_chain_id: state.chains.l2,
    })
}
