use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use common::performance::portfolio_change_pct;
use common::TradeAction;

use crate::{auth::require_auth, AppState};

pub fn ledger_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/trades", get(get_trades))
        .route("/api/performance", get(get_performance))
        .route("/api/failures", get(get_failures))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

// ─── Trades ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TradesQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

async fn get_trades(
    State(state): State<AppState>,
    Query(q): Query<TradesQuery>,
) -> Result<Json<Value>, StatusCode> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(50).clamp(1, 200);
    let offset = page.saturating_sub(1).saturating_mul(limit);

    let (trades, total) = state.ledger.page(limit, offset).await.map_err(|e| {
        error!(error = %e, "Failed to read trades");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(json!({
        "trades": trades,
        "total": total,
        "page": page,
        "limit": limit,
    })))
}

// ─── Performance ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PerformanceQuery {
    days: Option<i64>,
}

async fn get_performance(
    State(state): State<AppState>,
    Query(q): Query<PerformanceQuery>,
) -> Result<Json<Value>, StatusCode> {
    let days = q.days.unwrap_or(7).clamp(1, 365);

    let records = state
        .ledger
        .recent_window(chrono::Duration::days(days))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to read trade window");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut peak = 0.0f64;
    let mut max_dd = 0.0f64;
    let mut counts = [0usize; 3];
    let mut curve: Vec<Value> = Vec::with_capacity(records.len());
    for r in &records {
        counts[match r.action {
            TradeAction::Buy => 0,
            TradeAction::Sell => 1,
            TradeAction::Hold => 2,
        }] += 1;
        let value = r.portfolio_value();
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
        curve.push(json!({ "timestamp": r.timestamp, "value": value }));
    }

    Ok(Json(json!({
        "window_days": days,
        "trade_count": records.len(),
        "change_pct": portfolio_change_pct(&records),
        "latest_value": records.last().map(|r| r.portfolio_value()),
        "max_drawdown_pct": max_dd * 100.0,
        "decision_counts": { "buy": counts[0], "sell": counts[1], "hold": counts[2] },
        "first_trade": records.first().map(|r| r.timestamp),
        "last_trade": records.last().map(|r| r.timestamp),
        "equity_curve": curve,
    })))
}

// ─── Failures ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FailuresQuery {
    limit: Option<i64>,
}

async fn get_failures(
    State(state): State<AppState>,
    Query(q): Query<FailuresQuery>,
) -> Result<Json<Value>, StatusCode> {
    let limit = q.limit.unwrap_or(20).clamp(1, 200);
    let failures = state.ledger.failures(limit).await.map_err(|e| {
        error!(error = %e, "Failed to read cycle failures");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({ "failures": failures, "limit": limit })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    use common::{CycleFailure, CycleStage, TradeRecord, TradingMode};
    use engine::CycleHandle;
    use ledger::TradeLedger;
    use risk::RunGuard;

    use crate::{app, AppState};

    use super::*;

    async fn state() -> AppState {
        AppState {
            ledger: TradeLedger::in_memory().await.unwrap(),
            cycle: CycleHandle::new(Arc::new(RunGuard::new())),
            trading_mode: TradingMode::Paper,
            dashboard_token: "secret".into(),
        }
    }

    fn record(hours_ago: i64, quote: f64, base: f64, price: f64) -> TradeRecord {
        acted(hours_ago, TradeAction::Hold, quote, base, price)
    }

    fn acted(hours_ago: i64, action: TradeAction, quote: f64, base: f64, price: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now() - Duration::hours(hours_ago),
            action,
            size_percent: 0,
            rationale: "wait".into(),
            base_balance: base,
            quote_balance: quote,
            avg_cost_basis: 0.0,
            market_price: price,
            reflection: String::new(),
        }
    }

    async fn get(state: AppState, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {t}"));
        }
        let resp = app(state)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn healthz_is_public() {
        let (status, body) = get(state().await, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cycle"], "idle");
        assert_eq!(body["mode"], "paper");
        assert_eq!(body["cycle_in_flight"], false);
        assert_eq!(body["recorded_cycles"], 0);
    }

    #[tokio::test]
    async fn trades_require_token() {
        let s = state().await;
        let (status, _) = get(s.clone(), "/api/trades", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = get(s, "/api/trades", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn empty_configured_token_locks_the_api() {
        let mut s = state().await;
        s.dashboard_token = String::new();
        let (status, _) = get(s, "/api/trades", Some("")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn trades_are_paged_newest_first() {
        let s = state().await;
        for h in [3, 2, 1] {
            s.ledger.append(&record(h, 1_000_000.0, 0.0, 50_000_000.0)).await.unwrap();
        }

        let (status, body) = get(s, "/api/trades?page=1&limit=2", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["trades"].as_array().unwrap().len(), 2);
        assert_eq!(body["trades"][0]["action"], "hold");
    }

    #[tokio::test]
    async fn performance_reports_change_and_drawdown() {
        let s = state().await;
        s.ledger.append(&record(30, 1_000_000.0, 0.0, 50_000_000.0)).await.unwrap();
        s.ledger.append(&record(20, 0.0, 0.02, 40_000_000.0)).await.unwrap();
        s.ledger.append(&record(10, 0.0, 0.02, 55_000_000.0)).await.unwrap();

        let (status, body) = get(s, "/api/performance?days=7", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trade_count"], 3);
        assert!((body["change_pct"].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert!((body["max_drawdown_pct"].as_f64().unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(body["equity_curve"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn performance_summarises_decisions_and_trade_dates() {
        let s = state().await;
        let first = acted(30, TradeAction::Buy, 0.0, 0.02, 50_000_000.0);
        let last = acted(5, TradeAction::Hold, 0.0, 0.02, 52_000_000.0);
        s.ledger.append(&first).await.unwrap();
        s.ledger.append(&acted(20, TradeAction::Buy, 0.0, 0.02, 51_000_000.0)).await.unwrap();
        s.ledger.append(&acted(10, TradeAction::Sell, 1_000_000.0, 0.0, 50_000_000.0)).await.unwrap();
        s.ledger.append(&last).await.unwrap();

        let (status, body) = get(s, "/api/performance", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["decision_counts"]["buy"], 2);
        assert_eq!(body["decision_counts"]["sell"], 1);
        assert_eq!(body["decision_counts"]["hold"], 1);
        let first_ts: chrono::DateTime<Utc> =
            serde_json::from_value(body["first_trade"].clone()).unwrap();
        let last_ts: chrono::DateTime<Utc> =
            serde_json::from_value(body["last_trade"].clone()).unwrap();
        assert_eq!(first_ts.timestamp_micros(), first.timestamp.timestamp_micros());
        assert_eq!(last_ts.timestamp_micros(), last.timestamp.timestamp_micros());
    }

    #[tokio::test]
    async fn empty_window_has_no_trade_dates() {
        let (_, body) = get(state().await, "/api/performance", Some("secret")).await;
        assert!(body["first_trade"].is_null());
        assert!(body["last_trade"].is_null());
        assert_eq!(body["decision_counts"]["buy"], 0);
    }

    #[tokio::test]
    async fn huge_page_number_returns_an_empty_page() {
        let s = state().await;
        s.ledger.append(&record(1, 1_000_000.0, 0.0, 50_000_000.0)).await.unwrap();

        let uri = format!("/api/trades?page={}&limit=200", i64::MAX);
        let (status, body) = get(s, &uri, Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert!(body["trades"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_listed_behind_the_token() {
        let s = state().await;
        s.ledger
            .record_failure(&CycleFailure {
                timestamp: Utc::now(),
                stage: CycleStage::Settlement,
                detail: "accounts unavailable; order order-1 (BUY) was already submitted".into(),
            })
            .await
            .unwrap();

        let (status, _) = get(s.clone(), "/api/failures", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = get(s, "/api/failures?limit=5", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 5);
        let rows = body["failures"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["stage"], "settlement");
        assert!(rows[0]["detail"].as_str().unwrap().contains("order-1"));
    }
}
