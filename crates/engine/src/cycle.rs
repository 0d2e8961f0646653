use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use advisor::{DecideError, DecisionMaker, PerformanceReflector};
use common::{
    holding_of, with_timeout, CycleFailure, CycleStage, CycleState, DecisionService,
    ExchangeAccount, TradeRecord,
};
use ledger::TradeLedger;
use risk::{RunGuard, SizingPolicy};
use strategy::{MarketConfig, SnapshotBuilder, SnapshotSources, StrategyFileConfig};

use crate::executor::{OrderExecutor, OrderOutcome};

/// How a call to [`CycleRunner::run_cycle`] ended.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another cycle held the run permit; nothing was called.
    Skipped,
    Completed(TradeRecord),
    Aborted { stage: CycleStage, reason: String },
}

/// Cloneable view of the runner for other crates (API).
#[derive(Clone)]
pub struct CycleHandle {
    guard: Arc<RunGuard>,
    state: Arc<RwLock<CycleState>>,
}

impl CycleHandle {
    pub fn new(guard: Arc<RunGuard>) -> Self {
        Self {
            guard,
            state: Arc::new(RwLock::new(CycleState::Idle)),
        }
    }

    pub async fn state(&self) -> CycleState {
        *self.state.read().await
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }
}

/// External services one runner is wired to.
pub struct CycleServices {
    pub sources: SnapshotSources,
    pub decision: Arc<dyn DecisionService>,
    pub reflection: Arc<dyn DecisionService>,
    pub ledger: TradeLedger,
}

struct StageFailure {
    stage: CycleStage,
    reason: String,
}

impl StageFailure {
    fn new(stage: CycleStage, reason: impl ToString) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Runs one decide-and-trade cycle at a time.
pub struct CycleRunner {
    handle: CycleHandle,
    exchange: Arc<dyn ExchangeAccount>,
    snapshots: SnapshotBuilder,
    ledger: TradeLedger,
    reflector: PerformanceReflector,
    decider: DecisionMaker,
    executor: OrderExecutor,
    market: MarketConfig,
    settle_delay: Duration,
    call_timeout: Duration,
}

impl CycleRunner {
    pub fn new(
        services: CycleServices,
        config: &StrategyFileConfig,
        strategy_reference: impl Into<String>,
        handle: CycleHandle,
    ) -> Self {
        let call_timeout = config.feeds.call_timeout();
        let exchange = services.sources.exchange.clone();

        let policy = SizingPolicy {
            fee_rate: config.execution.fee_rate,
            min_notional: config.execution.min_notional,
        };

        CycleRunner {
            handle,
            executor: OrderExecutor::new(
                exchange.clone(),
                policy,
                config.market.clone(),
                call_timeout,
            ),
            exchange,
            snapshots: SnapshotBuilder::new(
                services.sources,
                config.market.clone(),
                config.feeds.clone(),
                strategy_reference,
            ),
            ledger: services.ledger,
            reflector: PerformanceReflector::new(
                services.reflection,
                config.reflection.window_days,
            ),
            decider: DecisionMaker::new(services.decision),
            market: config.market.clone(),
            settle_delay: config.execution.settle_delay(),
            call_timeout,
        }
    }

    pub fn handle(&self) -> &CycleHandle {
        &self.handle
    }

    async fn set_state(&self, state: CycleState) {
        *self.handle.state.write().await = state;
    }

    /// Run one cycle unless another is in flight. Never panics on collaborator
    /// failure; every path ends in a [`CycleOutcome`].
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_permit) = self.handle.guard.try_acquire() else {
            warn!("Trading cycle already running, skipping this trigger");
            return CycleOutcome::Skipped;
        };

        self.set_state(CycleState::Running).await;
        info!(pair = %self.market.pair, "Trading cycle started");

        match self.steps().await {
            Ok(record) => {
                info!(
                    action = %record.action,
                    size_percent = record.size_percent,
                    base_balance = record.base_balance,
                    quote_balance = record.quote_balance,
                    market_price = record.market_price,
                    "Trading cycle completed"
                );
                self.set_state(CycleState::Completed).await;
                CycleOutcome::Completed(record)
            }
            Err(failure) => {
                error!(stage = %failure.stage, reason = %failure.reason, "Trading cycle aborted");
                self.audit(&failure).await;
                self.set_state(CycleState::Aborted).await;
                CycleOutcome::Aborted {
                    stage: failure.stage,
                    reason: failure.reason,
                }
            }
        }
    }

    async fn steps(&self) -> Result<TradeRecord, StageFailure> {
        let snapshot = self
            .snapshots
            .build()
            .await
            .map_err(|e| StageFailure::new(CycleStage::Snapshot, e))?;
        info!(
            last_close = ?snapshot.last_close(),
            sentiment = ?snapshot.sentiment.as_ref().map(|s| s.value),
            headlines = snapshot.news.len(),
            "Market snapshot ready"
        );

        let window_days = self.reflector.window_days();
        let window = chrono::Duration::try_days(window_days).ok_or_else(|| {
            StageFailure::new(
                CycleStage::History,
                format!("reflection window of {window_days} days is out of range"),
            )
        })?;
        let history = self
            .ledger
            .recent_window(window)
            .await
            .map_err(|e| StageFailure::new(CycleStage::History, e))?;

        let reflection = self.reflector.reflect(&history, &snapshot).await;
        info!(
            records = history.len(),
            performance_pct = format!("{:.2}", reflection.performance_pct),
            "Reflection ready"
        );

        let decision = self
            .decider
            .decide(&snapshot, &reflection.text)
            .await
            .map_err(|e| match e {
                DecideError::Rejected { source, raw } => StageFailure::new(
                    CycleStage::Decision,
                    format!("{source}; raw payload: {raw}"),
                ),
                other => StageFailure::new(CycleStage::Decision, other),
            })?;

        let order = self.executor.execute(&decision).await;

        tokio::time::sleep(self.settle_delay).await;

        let settlement_failure = |e: common::Error| match &order {
            OrderOutcome::Submitted(fill) => StageFailure::new(
                CycleStage::Settlement,
                format!("{e}; order {} ({}) was already submitted", fill.order_id, fill.side),
            ),
            _ => StageFailure::new(CycleStage::Settlement, e),
        };
        let balances = with_timeout("balances", self.call_timeout, self.exchange.balances())
            .await
            .map_err(&settlement_failure)?;
        let market_price = with_timeout(
            "current price",
            self.call_timeout,
            self.exchange.current_price(&self.market.pair),
        )
        .await
        .map_err(&settlement_failure)?;

        let base = holding_of(&balances, &self.market.base_currency);
        let quote = holding_of(&balances, &self.market.quote_currency);

        let record = TradeRecord {
            timestamp: Utc::now(),
            action: decision.action(),
            size_percent: if order.executed() {
                decision.size_percent()
            } else {
                0
            },
            rationale: decision.rationale().to_string(),
            base_balance: base.amount,
            quote_balance: quote.amount,
            avg_cost_basis: base.avg_cost,
            market_price,
            reflection: reflection.text,
        };

        self.ledger
            .append(&record)
            .await
            .map_err(|e| StageFailure::new(CycleStage::Persistence, e))?;

        Ok(record)
    }

    async fn audit(&self, failure: &StageFailure) {
        let row = CycleFailure {
            timestamp: Utc::now(),
            stage: failure.stage,
            detail: failure.reason.clone(),
        };
        if let Err(e) = self.ledger.record_failure(&row).await {
            warn!(error = %e, "Could not record cycle failure");
        }
    }
}
