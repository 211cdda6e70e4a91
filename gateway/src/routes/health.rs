use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use ledger::ChainStats;

use crate::state::SharedState;

/// Health-check response: liveness plus a chain snapshot.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub chain: ChainStats,
}

/// `GET /health`
///
/// Returns a basic JSON document indicating liveness, together with the
/// engine's current [`ChainStats`] snapshot.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            chain: state.engine.stats(),
        }),
    )
}
