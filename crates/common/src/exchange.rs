use async_trait::async_trait;

use crate::{Balance, CandleInterval, OhlcvBar, OrderBook, OrderResult, Result};

/// Abstraction over the exchange account.
///
/// `UpbitClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// Orders must only be submitted by `OrderExecutor` in `crates/engine`, after
/// sizing and the minimum-notional check in `crates/risk`.
#[async_trait]
pub trait ExchangeAccount: Send + Sync {
    /// All non-empty balances held on the account.
    async fn balances(&self) -> Result<Vec<Balance>>;

    /// Latest trade price for a market (e.g. "KRW-BTC").
    async fn current_price(&self, pair: &str) -> Result<f64>;

    async fn order_book(&self, pair: &str) -> Result<OrderBook>;

    /// Market buy spending `quote_amount` of the quote currency.
    async fn market_buy(&self, pair: &str, quote_amount: f64) -> Result<OrderResult>;

    /// Market sell of `base_amount` units of the base currency.
    async fn market_sell(&self, pair: &str, base_amount: f64) -> Result<OrderResult>;
}

/// Source of historical candles.
#[async_trait]
pub trait OhlcvProvider: Send + Sync {
    /// The most recent `count` candles, oldest first.
    async fn series(&self, pair: &str, interval: CandleInterval, count: usize)
        -> Result<Vec<OhlcvBar>>;
}
