use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use common::{
    Balance, CandleInterval, Error, ExchangeAccount, OhlcvBar, OhlcvProvider, OrderBook,
    OrderBookUnit, OrderResult, OrderSide, Result,
};

use super::auth::bearer_token;

const BASE_URL: &str = "https://api.upbit.com";

/// Upbit answers at most this many candles per request.
const MAX_CANDLES: usize = 200;

struct Credentials {
    access_key: String,
    secret_key: String,
}

/// REST client for Upbit. Serves both the account (orders, balances) and
/// public market data.
///
/// A client built with [`UpbitClient::public`] has no keys; its private
/// calls fail with [`Error::Config`] while market data keeps working, which
/// is what paper trading uses.
pub struct UpbitClient {
    credentials: Option<Credentials>,
    base_url: String,
    http: Client,
}

impl UpbitClient {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(
            Some((access_key.into(), secret_key.into())),
            BASE_URL,
            Duration::from_secs(10),
        )
    }

    /// Market data only.
    pub fn public() -> Result<Self> {
        Self::with_base_url(None, BASE_URL, Duration::from_secs(10))
    }

    pub fn with_base_url(
        credentials: Option<(String, String)>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            credentials: credentials.map(|(access_key, secret_key)| Credentials {
                access_key,
                secret_key,
            }),
            base_url: base_url.into(),
            http,
        })
    }

    fn authorize(&self, request: RequestBuilder, query: Option<&str>) -> Result<RequestBuilder> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::Config("Upbit API keys are not configured".into()))?;
        let token = bearer_token(&creds.access_key, &creds.secret_key, query)?;
        Ok(request.bearer_auth(token))
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let request = self.http.get(format!("{}{path}", self.base_url)).query(query);
        send(request).await
    }

    async fn private_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.http.get(format!("{}{path}", self.base_url));
        send(self.authorize(request, None)?).await
    }

    async fn place_order(&self, params: Vec<(&'static str, String)>) -> Result<OrderResponse> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let body: serde_json::Map<String, serde_json::Value> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();

        let request = self
            .http
            .post(format!("{}/v1/orders", self.base_url))
            .json(&body);
        send(self.authorize(request, Some(&query))?).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let resp = request.send().await.map_err(|e| Error::Http(e.to_string()))?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    serde_json::from_str(&body).map_err(|e| Error::Exchange(format!("unexpected response: {e}")))
}

fn parse_number(field: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| Error::Exchange(format!("bad {field} '{value}': {e}")))
}

#[async_trait]
impl ExchangeAccount for UpbitClient {
    async fn balances(&self) -> Result<Vec<Balance>> {
        let accounts: Vec<AccountEntry> = self.private_get("/v1/accounts").await?;
        accounts
            .into_iter()
            .map(|a| {
                Ok(Balance {
                    amount: parse_number("balance", &a.balance)?,
                    avg_cost: parse_number("avg_buy_price", &a.avg_buy_price)?,
                    currency: a.currency,
                })
            })
            .collect()
    }

    async fn current_price(&self, pair: &str) -> Result<f64> {
        let tickers: Vec<Ticker> = self
            .public_get("/v1/ticker", &[("markets", pair.to_string())])
            .await?;
        tickers
            .into_iter()
            .next()
            .map(|t| t.trade_price)
            .ok_or_else(|| Error::Exchange(format!("no ticker returned for {pair}")))
    }

    async fn order_book(&self, pair: &str) -> Result<OrderBook> {
        let books: Vec<OrderBookEntry> = self
            .public_get("/v1/orderbook", &[("markets", pair.to_string())])
            .await?;
        let book = books
            .into_iter()
            .next()
            .ok_or_else(|| Error::Exchange(format!("no order book returned for {pair}")))?;

        Ok(OrderBook {
            market: book.market,
            timestamp_ms: book.timestamp,
            total_ask_size: book.total_ask_size,
            total_bid_size: book.total_bid_size,
            units: book
                .orderbook_units
                .into_iter()
                .map(|u| OrderBookUnit {
                    ask_price: u.ask_price,
                    bid_price: u.bid_price,
                    ask_size: u.ask_size,
                    bid_size: u.bid_size,
                })
                .collect(),
        })
    }

    async fn market_buy(&self, pair: &str, quote_amount: f64) -> Result<OrderResult> {
        debug!(pair = %pair, quote_amount = quote_amount, "Submitting market buy to Upbit");
        let resp = self
            .place_order(vec![
                ("market", pair.to_string()),
                ("side", "bid".to_string()),
                ("ord_type", "price".to_string()),
                ("price", quote_amount.to_string()),
            ])
            .await?;
        Ok(resp.into_result(pair, OrderSide::Buy, quote_amount))
    }

    async fn market_sell(&self, pair: &str, base_amount: f64) -> Result<OrderResult> {
        debug!(pair = %pair, base_amount = base_amount, "Submitting market sell to Upbit");
        let resp = self
            .place_order(vec![
                ("market", pair.to_string()),
                ("side", "ask".to_string()),
                ("ord_type", "market".to_string()),
                ("volume", base_amount.to_string()),
            ])
            .await?;
        Ok(resp.into_result(pair, OrderSide::Sell, base_amount))
    }
}

#[async_trait]
impl OhlcvProvider for UpbitClient {
    async fn series(&self, pair: &str, interval: CandleInterval, count: usize) -> Result<Vec<OhlcvBar>> {
        let path = match interval {
            CandleInterval::Day => "/v1/candles/days",
            CandleInterval::Hour => "/v1/candles/minutes/60",
        };
        let candles: Vec<Candle> = self
            .public_get(
                path,
                &[
                    ("market", pair.to_string()),
                    ("count", count.min(MAX_CANDLES).to_string()),
                ],
            )
            .await?;

        // Upbit lists newest first.
        let mut bars = candles
            .into_iter()
            .map(Candle::into_bar)
            .collect::<Result<Vec<_>>>()?;
        bars.reverse();
        Ok(bars)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AccountEntry {
    currency: String,
    balance: String,
    avg_buy_price: String,
}

#[derive(Deserialize)]
struct Ticker {
    trade_price: f64,
}

#[derive(Deserialize)]
struct OrderBookEntry {
    market: String,
    timestamp: i64,
    total_ask_size: f64,
    total_bid_size: f64,
    orderbook_units: Vec<OrderBookLevel>,
}

#[derive(Deserialize)]
struct OrderBookLevel {
    ask_price: f64,
    bid_price: f64,
    ask_size: f64,
    bid_size: f64,
}

#[derive(Deserialize)]
struct Candle {
    candle_date_time_utc: String,
    opening_price: f64,
    high_price: f64,
    low_price: f64,
    trade_price: f64,
    candle_acc_trade_volume: f64,
}

impl Candle {
    fn into_bar(self) -> Result<OhlcvBar> {
        let timestamp = NaiveDateTime::parse_from_str(&self.candle_date_time_utc, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| Error::Exchange(format!("bad candle time '{}': {e}", self.candle_date_time_utc)))?
            .and_utc();
        Ok(OhlcvBar {
            timestamp,
            open: self.opening_price,
            high: self.high_price,
            low: self.low_price,
            close: self.trade_price,
            volume: self.candle_acc_trade_volume,
        })
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    uuid: String,
    state: String,
    created_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    fn into_result(self, pair: &str, side: OrderSide, requested: f64) -> OrderResult {
        OrderResult {
            order_id: self.uuid,
            pair: pair.to_string(),
            side,
            requested,
            state: self.state,
            timestamp: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}
