use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness plus the last cycle state. Public.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let cycle = state.cycle.state().await;
    let recorded = state.ledger.count().await.ok();
    Json(json!({
        "status": "ok",
        "mode": state.trading_mode.to_string(),
        "cycle": cycle.to_string(),
        "cycle_in_flight": state.cycle.is_running(),
        "recorded_cycles": recorded,
    }))
}
