use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use common::{
    Balance, CandleInterval, Error, ExchangeAccount, Headline, NewsProvider, OhlcvBar,
    OhlcvProvider, OrderBook, OrderResult, Result, SentimentIndex, SentimentProvider,
};
use strategy::{FeedConfig, MarketConfig, SnapshotBuilder, SnapshotSources};

struct StubExchange {
    fail_balances: bool,
}

#[async_trait]
impl ExchangeAccount for StubExchange {
    async fn balances(&self) -> Result<Vec<Balance>> {
        if self.fail_balances {
            return Err(Error::Exchange("accounts unavailable".into()));
        }
        Ok(vec![
            Balance { currency: "KRW".into(), amount: 1_000_000.0, avg_cost: 0.0 },
            Balance { currency: "BTC".into(), amount: 0.01, avg_cost: 50_000_000.0 },
            Balance { currency: "XRP".into(), amount: 42.0, avg_cost: 700.0 },
        ])
    }

    async fn current_price(&self, _pair: &str) -> Result<f64> {
        Ok(60_000_000.0)
    }

    async fn order_book(&self, pair: &str) -> Result<OrderBook> {
        Ok(OrderBook {
            market: pair.to_string(),
            timestamp_ms: 1_700_000_000_000,
            total_ask_size: 3.0,
            total_bid_size: 4.0,
            units: vec![],
        })
    }

    async fn market_buy(&self, _pair: &str, _quote_amount: f64) -> Result<OrderResult> {
        unreachable!("snapshot building never places orders")
    }

    async fn market_sell(&self, _pair: &str, _base_amount: f64) -> Result<OrderResult> {
        unreachable!("snapshot building never places orders")
    }
}

struct StubCandles {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl OhlcvProvider for StubCandles {
    async fn series(&self, _pair: &str, interval: CandleInterval, count: usize) -> Result<Vec<OhlcvBar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Http("candles unavailable".into()));
        }
        let step = match interval {
            CandleInterval::Day => chrono::Duration::days(1),
            CandleInterval::Hour => chrono::Duration::hours(1),
        };
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Ok((0..count)
            .map(|i| {
                let c = 50_000_000.0 + (i as f64) * 10_000.0;
                OhlcvBar {
                    timestamp: start + step * i as i32,
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1.0,
                }
            })
            .collect())
    }
}

struct StubSentiment {
    fail: bool,
}

#[async_trait]
impl SentimentProvider for StubSentiment {
    async fn index(&self) -> Result<SentimentIndex> {
        if self.fail {
            return Err(Error::Http("fng down".into()));
        }
        Ok(SentimentIndex { value: 72, label: "Greed".into() })
    }
}

struct StubNews {
    fail: bool,
    slow: bool,
}

#[async_trait]
impl NewsProvider for StubNews {
    async fn search(&self, _query: &str) -> Result<Vec<Headline>> {
        if self.slow {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail {
            return Err(Error::Http("news down".into()));
        }
        Ok((0..8)
            .map(|i| Headline { title: format!("headline {i}"), date: "1 hour ago".into() })
            .collect())
    }
}

#[derive(Default)]
struct Setup {
    fail_balances: bool,
    fail_candles: bool,
    fail_sentiment: bool,
    fail_news: bool,
    slow_news: bool,
}

fn make_builder(setup: Setup) -> (SnapshotBuilder, Arc<StubCandles>) {
    let candles = Arc::new(StubCandles { fail: setup.fail_candles, calls: AtomicUsize::new(0) });
    let sources = SnapshotSources {
        exchange: Arc::new(StubExchange { fail_balances: setup.fail_balances }),
        candles: candles.clone(),
        sentiment: Arc::new(StubSentiment { fail: setup.fail_sentiment }),
        news: Arc::new(StubNews { fail: setup.fail_news, slow: setup.slow_news }),
    };
    let feeds = FeedConfig { call_timeout_secs: 1, ..FeedConfig::default() };
    (
        SnapshotBuilder::new(sources, MarketConfig::default(), feeds, "buy the dip"),
        candles,
    )
}

#[tokio::test]
async fn builds_full_snapshot() {
    let (builder, _) = make_builder(Setup::default());
    let snap = builder.build().await.unwrap();

    assert_eq!(snap.balances.len(), 2, "only base and quote currencies are kept");
    assert_eq!(snap.balances["KRW"].amount, 1_000_000.0);
    assert_eq!(snap.balances["BTC"].avg_cost, 50_000_000.0);
    assert_eq!(snap.daily.len(), 30);
    assert_eq!(snap.hourly.len(), 24);
    assert_eq!(snap.news.len(), 5, "top five headlines kept");
    assert_eq!(snap.sentiment.as_ref().unwrap().value, 72);
    assert_eq!(snap.strategy_reference, "buy the dip");
    assert!(snap.daily[29].indicators.sma_20.is_some());
}

#[tokio::test]
async fn last_close_prefers_the_hourly_series() {
    let (builder, _) = make_builder(Setup::default());
    let mut snap = builder.build().await.unwrap();

    assert_eq!(snap.last_close(), Some(snap.hourly[23].bar.close));
    snap.hourly.clear();
    assert_eq!(snap.last_close(), Some(snap.daily[29].bar.close));
    snap.daily.clear();
    assert_eq!(snap.last_close(), None);
}

#[tokio::test]
async fn identical_responses_give_identical_snapshots() {
    let (builder, _) = make_builder(Setup::default());
    let first = builder.build().await.unwrap();
    let second = builder.build().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn balance_failure_aborts_before_candles() {
    let (builder, candles) = make_builder(Setup { fail_balances: true, ..Setup::default() });
    let err = builder.build().await.unwrap_err();
    assert!(matches!(err, Error::Exchange(_)));
    assert_eq!(candles.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn candle_failure_aborts() {
    let (builder, _) = make_builder(Setup { fail_candles: true, ..Setup::default() });
    assert!(builder.build().await.is_err());
}

#[tokio::test]
async fn advisory_failures_degrade_to_neutral_defaults() {
    let (builder, _) = make_builder(Setup {
        fail_sentiment: true,
        fail_news: true,
        ..Setup::default()
    });
    let snap = builder.build().await.unwrap();
    assert!(snap.sentiment.is_none());
    assert!(snap.news.is_empty());
}

#[tokio::test]
async fn slow_news_is_cut_off_by_timeout() {
    let (builder, _) = make_builder(Setup { slow_news: true, ..Setup::default() });
    let started = std::time::Instant::now();
    let snap = builder.build().await.unwrap();
    assert!(snap.news.is_empty());
    assert!(started.elapsed() < Duration::from_secs(10));
}
