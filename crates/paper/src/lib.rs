use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Balance, Error, ExchangeAccount, OrderBook, OrderResult, OrderSide, Result};

/// Slack for float noise when an order spends the whole balance.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Holdings {
    quote: f64,
    base: f64,
    avg_cost: f64,
}

/// Simulated exchange account for paper trading.
///
/// Prices and depth come from a real market-data source; balances and fills
/// are simulated at the current price with the exchange fee applied. No real
/// orders are ever sent.
pub struct PaperClient {
    market: Arc<dyn ExchangeAccount>,
    pair: String,
    base_currency: String,
    quote_currency: String,
    fee_rate: f64,
    holdings: RwLock<Holdings>,
}

impl PaperClient {
    pub fn new(
        market: Arc<dyn ExchangeAccount>,
        pair: impl Into<String>,
        base_currency: impl Into<String>,
        quote_currency: impl Into<String>,
        initial_quote: f64,
        fee_rate: f64,
    ) -> Self {
        let pair = pair.into();
        info!(
            pair = %pair,
            initial_quote = initial_quote,
            fee_rate = fee_rate,
            "PaperClient initialized"
        );
        Self {
            market,
            pair,
            base_currency: base_currency.into(),
            quote_currency: quote_currency.into(),
            fee_rate,
            holdings: RwLock::new(Holdings {
                quote: initial_quote,
                base: 0.0,
                avg_cost: 0.0,
            }),
        }
    }

    fn check_pair(&self, pair: &str) -> Result<()> {
        if pair != self.pair {
            return Err(Error::Exchange(format!(
                "PaperClient only trades {}, not {pair}",
                self.pair
            )));
        }
        Ok(())
    }

    fn fill(&self, pair: &str, side: OrderSide, requested: f64) -> OrderResult {
        OrderResult {
            order_id: uuid::Uuid::new_v4().to_string(),
            pair: pair.to_string(),
            side,
            requested,
            state: "done".to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl ExchangeAccount for PaperClient {
    async fn balances(&self) -> Result<Vec<Balance>> {
        let h = *self.holdings.read().await;
        Ok(vec![
            Balance {
                currency: self.quote_currency.clone(),
                amount: h.quote,
                avg_cost: 0.0,
            },
            Balance {
                currency: self.base_currency.clone(),
                amount: h.base,
                avg_cost: h.avg_cost,
            },
        ])
    }

    async fn current_price(&self, pair: &str) -> Result<f64> {
        self.market.current_price(pair).await
    }

    async fn order_book(&self, pair: &str) -> Result<OrderBook> {
        self.market.order_book(pair).await
    }

    async fn market_buy(&self, pair: &str, quote_amount: f64) -> Result<OrderResult> {
        self.check_pair(pair)?;
        let price = self.market.current_price(pair).await?;
        if price <= 0.0 || quote_amount <= 0.0 {
            return Err(Error::Exchange(format!(
                "cannot buy {quote_amount} at price {price}"
            )));
        }

        let cost = quote_amount * (1.0 + self.fee_rate);
        let mut h = self.holdings.write().await;
        if cost > h.quote + EPSILON {
            return Err(Error::InsufficientBalance(format!(
                "buy needs {cost:.2} {} but only {:.2} is available",
                self.quote_currency, h.quote
            )));
        }

        let bought = quote_amount / price;
        h.avg_cost = (h.base * h.avg_cost + quote_amount) / (h.base + bought);
        h.base += bought;
        h.quote = (h.quote - cost).max(0.0);

        debug!(
            price = price,
            spent = cost,
            bought = bought,
            avg_cost = h.avg_cost,
            "Paper buy filled"
        );
        Ok(self.fill(pair, OrderSide::Buy, quote_amount))
    }

    async fn market_sell(&self, pair: &str, base_amount: f64) -> Result<OrderResult> {
        self.check_pair(pair)?;
        let price = self.market.current_price(pair).await?;
        if price <= 0.0 || base_amount <= 0.0 {
            return Err(Error::Exchange(format!(
                "cannot sell {base_amount} at price {price}"
            )));
        }

        let mut h = self.holdings.write().await;
        if base_amount > h.base + EPSILON {
            return Err(Error::InsufficientBalance(format!(
                "sell of {base_amount} {} exceeds holding {}",
                self.base_currency, h.base
            )));
        }

        let proceeds = base_amount * price * (1.0 - self.fee_rate);
        h.base = (h.base - base_amount).max(0.0);
        h.quote += proceeds;
        if h.base <= EPSILON {
            h.base = 0.0;
            h.avg_cost = 0.0;
        }

        debug!(
            price = price,
            sold = base_amount,
            proceeds = proceeds,
            "Paper sell filled"
        );
        Ok(self.fill(pair, OrderSide::Sell, base_amount))
    }
}
