mod auth;
pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{Result, TradingMode};
use engine::CycleHandle;
use ledger::TradeLedger;

/// Handles the read-only API needs from the rest of the process.
#[derive(Clone)]
pub struct AppState {
    pub ledger: TradeLedger,
    pub cycle: CycleHandle,
    pub trading_mode: TradingMode,
    pub dashboard_token: String,
}

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any)
}

/// `/healthz` is open; everything under `/api` needs the bearer token.
pub fn app(state: AppState) -> Router {
    let protected = routes::ledger_router(state.clone());
    Router::new()
        .merge(routes::health_router())
        .merge(protected)
        .with_state(state)
        .layer(permissive_cors())
}

/// Serve the ledger API on all interfaces until the listener fails.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "Ledger API listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
