use std::sync::Arc;

use tracing::{info, warn};

use common::performance::portfolio_change_pct;
use common::{DecisionService, TradeRecord};
use strategy::MarketSnapshot;

use crate::prompt::{reflection_context, reflection_prompt};

/// Result of one reflection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub performance_pct: f64,
    /// Empty when the reflection call failed.
    pub text: String,
}

/// Summarises recent ledger history into advice for the next decision.
pub struct PerformanceReflector {
    service: Arc<dyn DecisionService>,
    window_days: i64,
}

impl PerformanceReflector {
    pub fn new(service: Arc<dyn DecisionService>, window_days: i64) -> Self {
        Self {
            service,
            window_days,
        }
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// Never fails: a service or serialisation error yields empty text so the
    /// cycle can continue without a reflection.
    pub async fn reflect(&self, records: &[TradeRecord], snapshot: &MarketSnapshot) -> Reflection {
        let performance_pct = portfolio_change_pct(records);

        let context =
            match reflection_context(records, snapshot, performance_pct, self.window_days) {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "Could not build reflection context");
                    return Reflection {
                        performance_pct,
                        text: String::new(),
                    };
                }
            };

        let text = match self.service.complete(reflection_prompt(), &context).await {
            Ok(text) => {
                info!(
                    records = records.len(),
                    performance_pct = format!("{performance_pct:.2}"),
                    "Reflection generated"
                );
                text
            }
            Err(e) => {
                warn!(error = %e, "Reflection unavailable, continuing without it");
                String::new()
            }
        };

        Reflection {
            performance_pct,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use common::{BalanceMap, Error, OrderBook, Result, TradeAction};
    use std::sync::Mutex;

    struct Recording {
        reply: Option<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DecisionService for Recording {
        async fn complete(&self, _prompt: &str, context: &str) -> Result<String> {
            self.seen.lock().unwrap().push(context.to_string());
            self.reply
                .clone()
                .ok_or_else(|| Error::Http("HTTP 500: boom".into()))
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            balances: BalanceMap::new(),
            order_book: OrderBook {
                market: "KRW-BTC".into(),
                timestamp_ms: 0,
                total_ask_size: 0.0,
                total_bid_size: 0.0,
                units: vec![],
            },
            daily: vec![],
            hourly: vec![],
            sentiment: None,
            news: vec![],
            strategy_reference: String::new(),
        }
    }

    fn record(hours_ago: i64, quote: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc::now() - Duration::hours(hours_ago),
            action: TradeAction::Hold,
            size_percent: 0,
            rationale: "wait".into(),
            base_balance: 0.0,
            quote_balance: quote,
            avg_cost_basis: 0.0,
            market_price: 50_000_000.0,
            reflection: String::new(),
        }
    }

    #[tokio::test]
    async fn passes_performance_into_context() {
        let service = Arc::new(Recording {
            reply: Some("Be patient.".into()),
            seen: Mutex::new(vec![]),
        });
        let reflector = PerformanceReflector::new(service.clone(), 7);

        let records = vec![record(48, 1_000_000.0), record(1, 1_100_000.0)];
        let out = reflector.reflect(&records, &snapshot()).await;

        assert_eq!(out.text, "Be patient.");
        assert!((out.performance_pct - 10.0).abs() < 1e-9);
        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("last 7 days: 10.00%"));
    }

    #[tokio::test]
    async fn service_failure_yields_empty_text() {
        let service = Arc::new(Recording {
            reply: None,
            seen: Mutex::new(vec![]),
        });
        let reflector = PerformanceReflector::new(service, 7);

        let out = reflector.reflect(&[], &snapshot()).await;
        assert_eq!(out.text, "");
        assert_eq!(out.performance_pct, 0.0);
    }
}
