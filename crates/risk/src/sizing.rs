use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::TradeAction;

/// Order sizing rules applied between a decision and the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingPolicy {
    /// Trading fee held back from buys (0.0005 = 0.05%).
    pub fee_rate: f64,
    /// Orders must be worth strictly more than this, in quote currency.
    pub min_notional: f64,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            fee_rate: 0.0005,
            min_notional: 5000.0,
        }
    }
}

/// What the executor should send, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderPlan {
    /// Market buy spending `quote_amount`.
    Buy { quote_amount: f64 },
    /// Market sell of `base_amount`, worth `notional` at the quoted price.
    Sell { base_amount: f64, notional: f64 },
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Computed order value does not clear the minimum notional.
    BelowMinimum {
        action: TradeAction,
        notional: f64,
        min_notional: f64,
    },
    /// Balance or price was not a usable number.
    InvalidInput(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BelowMinimum {
                action,
                notional,
                min_notional,
            } => write!(
                f,
                "{action} of {notional:.2} is not above the minimum order of {min_notional:.2}"
            ),
            SkipReason::InvalidInput(s) => write!(f, "{s}"),
        }
    }
}

impl SizingPolicy {
    /// Quote amount a buy of `size_percent` would spend after the fee buffer.
    pub fn buy_spend(&self, quote_balance: f64, size_percent: u8) -> f64 {
        quote_balance * (size_percent as f64 / 100.0) * (1.0 - self.fee_rate)
    }

    /// Base amount a sell of `size_percent` would release.
    pub fn sell_amount(&self, base_balance: f64, size_percent: u8) -> f64 {
        base_balance * (size_percent as f64 / 100.0)
    }

    pub fn plan_buy(&self, quote_balance: f64, size_percent: u8) -> OrderPlan {
        if !quote_balance.is_finite() || quote_balance < 0.0 {
            return OrderPlan::Skip(SkipReason::InvalidInput(format!(
                "unusable quote balance {quote_balance}"
            )));
        }
        let spend = self.buy_spend(quote_balance, size_percent);
        if spend > self.min_notional {
            info!(spend = spend, size_percent = size_percent, "Buy sized");
            OrderPlan::Buy {
                quote_amount: spend,
            }
        } else {
            warn!(
                spend = spend,
                min_notional = self.min_notional,
                "Buy skipped: insufficient quote balance"
            );
            OrderPlan::Skip(SkipReason::BelowMinimum {
                action: TradeAction::Buy,
                notional: spend,
                min_notional: self.min_notional,
            })
        }
    }

    pub fn plan_sell(&self, base_balance: f64, size_percent: u8, price: f64) -> OrderPlan {
        if !base_balance.is_finite() || base_balance < 0.0 || !price.is_finite() || price <= 0.0 {
            return OrderPlan::Skip(SkipReason::InvalidInput(format!(
                "unusable base balance {base_balance} or price {price}"
            )));
        }
        let amount = self.sell_amount(base_balance, size_percent);
        let notional = amount * price;
        if notional > self.min_notional {
            info!(amount = amount, notional = notional, size_percent = size_percent, "Sell sized");
            OrderPlan::Sell {
                base_amount: amount,
                notional,
            }
        } else {
            warn!(
                notional = notional,
                min_notional = self.min_notional,
                "Sell skipped: insufficient base balance"
            );
            OrderPlan::Skip(SkipReason::BelowMinimum {
                action: TradeAction::Sell,
                notional,
                min_notional: self.min_notional,
            })
        }
    }
}
