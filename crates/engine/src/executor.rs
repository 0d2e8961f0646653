use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use common::{holding_of, with_timeout, Decision, ExchangeAccount, OrderResult, TradeAction};
use risk::{OrderPlan, SizingPolicy, SkipReason};
use strategy::MarketConfig;

/// What happened to the decision at the exchange.
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    /// Hold: nothing was read or sent.
    Held,
    Submitted(OrderResult),
    /// Sizing refused the order.
    Skipped(SkipReason),
    /// A balance/price read or the submission itself failed.
    Failed(String),
}

impl OrderOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, OrderOutcome::Submitted(_))
    }
}

/// Turns a validated decision into at most one market order.
///
/// This is the ONLY component that calls `market_buy` / `market_sell`.
/// Failures here never abort the cycle; they surface as
/// [`OrderOutcome::Failed`] and the decision is recorded as not executed.
pub struct OrderExecutor {
    exchange: Arc<dyn ExchangeAccount>,
    policy: SizingPolicy,
    market: MarketConfig,
    call_timeout: Duration,
}

impl OrderExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeAccount>,
        policy: SizingPolicy,
        market: MarketConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            exchange,
            policy,
            market,
            call_timeout,
        }
    }

    pub async fn execute(&self, decision: &Decision) -> OrderOutcome {
        let pair = self.market.pair.as_str();
        let size = decision.size_percent();

        let plan = match decision.action() {
            TradeAction::Hold => {
                info!(reason = %decision.rationale(), "Holding position");
                return OrderOutcome::Held;
            }
            TradeAction::Buy => {
                let quote = match self.holding(&self.market.quote_currency).await {
                    Ok(amount) => amount,
                    Err(reason) => return reason,
                };
                info!(quote_balance = quote, size_percent = size, "Sizing buy");
                self.policy.plan_buy(quote, size)
            }
            TradeAction::Sell => {
                let base = match self.holding(&self.market.base_currency).await {
                    Ok(amount) => amount,
                    Err(reason) => return reason,
                };
                let price = match with_timeout(
                    "current price",
                    self.call_timeout,
                    self.exchange.current_price(pair),
                )
                .await
                {
                    Ok(p) => p,
                    Err(e) => {
                        error!(error = %e, "Price read for sell sizing failed");
                        return OrderOutcome::Failed(e.to_string());
                    }
                };
                info!(base_balance = base, price = price, size_percent = size, "Sizing sell");
                self.policy.plan_sell(base, size, price)
            }
        };

        let submitted = match plan {
            OrderPlan::Skip(reason) => {
                warn!(reason = %reason, "Order not placed");
                return OrderOutcome::Skipped(reason);
            }
            OrderPlan::Buy { quote_amount } => {
                with_timeout(
                    "market buy",
                    self.call_timeout,
                    self.exchange.market_buy(pair, quote_amount),
                )
                .await
            }
            OrderPlan::Sell { base_amount, .. } => {
                with_timeout(
                    "market sell",
                    self.call_timeout,
                    self.exchange.market_sell(pair, base_amount),
                )
                .await
            }
        };

        match submitted {
            Ok(order) => {
                info!(
                    order_id = %order.order_id,
                    side = %order.side,
                    requested = order.requested,
                    state = %order.state,
                    "Order accepted"
                );
                OrderOutcome::Submitted(order)
            }
            Err(e) => {
                error!(pair = %pair, error = %e, "Order submission failed");
                OrderOutcome::Failed(e.to_string())
            }
        }
    }

    async fn holding(&self, currency: &str) -> Result<f64, OrderOutcome> {
        match with_timeout("balances", self.call_timeout, self.exchange.balances()).await {
            Ok(balances) => Ok(holding_of(&balances, currency).amount),
            Err(e) => {
                error!(currency = %currency, error = %e, "Balance read for sizing failed");
                Err(OrderOutcome::Failed(e.to_string()))
            }
        }
    }
}
