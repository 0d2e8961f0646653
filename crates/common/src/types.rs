use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One candle of an OHLCV series. Series are kept oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle granularity requested from an [`crate::OhlcvProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleInterval {
    Day,
    Hour,
}

impl std::fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandleInterval::Day => write!(f, "day"),
            CandleInterval::Hour => write!(f, "minute60"),
        }
    }
}

/// Holding of a single currency on the exchange account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    pub amount: f64,
    /// Average acquisition price in quote currency. Zero for the quote currency itself.
    pub avg_cost: f64,
}

/// Amount and cost basis for one currency inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub amount: f64,
    pub avg_cost: f64,
}

/// Look up a currency in a balance list, treating absence as an empty holding.
pub fn holding_of(balances: &[Balance], currency: &str) -> Holding {
    balances
        .iter()
        .find(|b| b.currency == currency)
        .map(|b| Holding {
            amount: b.amount,
            avg_cost: b.avg_cost,
        })
        .unwrap_or(Holding {
            amount: 0.0,
            avg_cost: 0.0,
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUnit {
    pub ask_price: f64,
    pub bid_price: f64,
    pub ask_size: f64,
    pub bid_size: f64,
}

/// Order book depth for one market, best levels first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub market: String,
    pub timestamp_ms: i64,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    pub units: Vec<OrderBookUnit>,
}

/// Side of an exchange order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Acknowledgement of an accepted market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub pair: String,
    pub side: OrderSide,
    /// Quote amount for buys, base volume for sells.
    pub requested: f64,
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

/// Market-wide sentiment reading (Fear & Greed style, 0-100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentIndex {
    pub value: u8,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub date: String,
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

// ─── Decisions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
            TradeAction::Hold => write!(f, "hold"),
        }
    }
}

impl std::str::FromStr for TradeAction {
    type Err = InvalidDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            "hold" => Ok(TradeAction::Hold),
            other => Err(InvalidDecision::UnknownAction(other.to_string())),
        }
    }
}

/// Why a decision payload could not become a [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDecision {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("hold must carry percentage 0, got {0}")]
    HoldWithSize(i64),
    #[error("{action} percentage must be within 1..=100, got {size}")]
    SizeOutOfRange { action: TradeAction, size: i64 },
}

/// A validated trading decision.
///
/// Fields are private so the hold/size invariant cannot be bypassed:
/// `hold` always carries 0, `buy`/`sell` always carry 1..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    action: TradeAction,
    size_percent: u8,
    rationale: String,
}

impl Decision {
    pub fn new(
        action: TradeAction,
        size_percent: i64,
        rationale: impl Into<String>,
    ) -> Result<Self, InvalidDecision> {
        match action {
            TradeAction::Hold if size_percent != 0 => {
                return Err(InvalidDecision::HoldWithSize(size_percent))
            }
            TradeAction::Buy | TradeAction::Sell if !(1..=100).contains(&size_percent) => {
                return Err(InvalidDecision::SizeOutOfRange {
                    action,
                    size: size_percent,
                })
            }
            _ => {}
        }
        Ok(Self {
            action,
            size_percent: size_percent as u8,
            rationale: rationale.into(),
        })
    }

    pub fn action(&self) -> TradeAction {
        self.action
    }

    pub fn size_percent(&self) -> u8 {
        self.size_percent
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }
}

// ─── Ledger rows ──────────────────────────────────────────────────────────────

/// One completed cycle as persisted in the trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    /// Decision size when the order went through, 0 otherwise.
    pub size_percent: u8,
    pub rationale: String,
    pub base_balance: f64,
    pub quote_balance: f64,
    pub avg_cost_basis: f64,
    pub market_price: f64,
    pub reflection: String,
}

impl TradeRecord {
    /// Total account value in quote currency at the recorded market price.
    pub fn portfolio_value(&self) -> f64 {
        self.quote_balance + self.base_balance * self.market_price
    }
}

/// Pipeline step at which a cycle was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Snapshot,
    History,
    Decision,
    Settlement,
    Persistence,
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStage::Snapshot => write!(f, "snapshot"),
            CycleStage::History => write!(f, "history"),
            CycleStage::Decision => write!(f, "decision"),
            CycleStage::Settlement => write!(f, "settlement"),
            CycleStage::Persistence => write!(f, "persistence"),
        }
    }
}

/// Audit row for a cycle that ended in `Aborted`. Kept apart from trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleFailure {
    pub timestamp: DateTime<Utc>,
    pub stage: CycleStage,
    pub detail: String,
}

/// Lifecycle of the trading cycle runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    #[default]
    Idle,
    Running,
    Completed,
    Aborted,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Idle => write!(f, "idle"),
            CycleState::Running => write!(f, "running"),
            CycleState::Completed => write!(f, "completed"),
            CycleState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Balances keyed by currency, ordered for stable serialization.
pub type BalanceMap = BTreeMap<String, Holding>;
