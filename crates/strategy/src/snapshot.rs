use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use common::{
    with_timeout, BalanceMap, CandleInterval, ExchangeAccount, Headline, Holding, NewsProvider,
    OhlcvProvider, OrderBook, Result, SentimentIndex, SentimentProvider,
};

use crate::config::{FeedConfig, MarketConfig};
use crate::indicators::{IndicatorBar, IndicatorEngine};

/// Everything the decision service sees for one cycle.
///
/// Built once by [`SnapshotBuilder::build`] and only handed out by reference
/// afterwards. Contains no locally generated timestamps, so identical
/// collaborator responses produce identical snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub balances: BalanceMap,
    pub order_book: OrderBook,
    pub daily: Vec<IndicatorBar>,
    pub hourly: Vec<IndicatorBar>,
    pub sentiment: Option<SentimentIndex>,
    pub news: Vec<Headline>,
    pub strategy_reference: String,
}

impl MarketSnapshot {
    /// Close of the most recent hourly bar, falling back to the daily series.
    pub fn last_close(&self) -> Option<f64> {
        self.hourly
            .last()
            .or_else(|| self.daily.last())
            .map(|b| b.bar.close)
    }
}

/// Collaborators the snapshot is assembled from.
#[derive(Clone)]
pub struct SnapshotSources {
    pub exchange: Arc<dyn ExchangeAccount>,
    pub candles: Arc<dyn OhlcvProvider>,
    pub sentiment: Arc<dyn SentimentProvider>,
    pub news: Arc<dyn NewsProvider>,
}

/// Aggregates balances, depth, candles, sentiment and news into a [`MarketSnapshot`].
///
/// Balances, order book and both candle series are critical: any failure
/// aborts the build and the partial data is dropped. Sentiment and news are
/// advisory and degrade to `None` / empty. Every call is time-bounded; none
/// are retried here.
pub struct SnapshotBuilder {
    sources: SnapshotSources,
    engine: IndicatorEngine,
    market: MarketConfig,
    feeds: FeedConfig,
    strategy_reference: String,
}

impl SnapshotBuilder {
    pub fn new(
        sources: SnapshotSources,
        market: MarketConfig,
        feeds: FeedConfig,
        strategy_reference: impl Into<String>,
    ) -> Self {
        Self {
            sources,
            engine: IndicatorEngine::default(),
            market,
            feeds,
            strategy_reference: strategy_reference.into(),
        }
    }

    pub async fn build(&self) -> Result<MarketSnapshot> {
        let limit = self.feeds.call_timeout();
        let pair = self.market.pair.as_str();

        // ── Critical sources ─────────────────────────────────────────────────
        let all_balances =
            with_timeout("balances", limit, self.sources.exchange.balances()).await?;
        let balances: BalanceMap = all_balances
            .into_iter()
            .filter(|b| {
                b.currency == self.market.base_currency
                    || b.currency == self.market.quote_currency
            })
            .map(|b| {
                (
                    b.currency,
                    Holding {
                        amount: b.amount,
                        avg_cost: b.avg_cost,
                    },
                )
            })
            .collect();

        let order_book =
            with_timeout("order book", limit, self.sources.exchange.order_book(pair)).await?;

        let daily_bars = with_timeout(
            "daily candles",
            limit,
            self.sources
                .candles
                .series(pair, CandleInterval::Day, self.market.daily_bars),
        )
        .await?;
        let hourly_bars = with_timeout(
            "hourly candles",
            limit,
            self.sources
                .candles
                .series(pair, CandleInterval::Hour, self.market.hourly_bars),
        )
        .await?;

        if daily_bars.len() < self.engine.warmup() {
            debug!(
                bars = daily_bars.len(),
                warmup = self.engine.warmup(),
                "Daily series shorter than the largest indicator window"
            );
        }
        let daily = self.engine.compute(&daily_bars);
        let hourly = self.engine.compute(&hourly_bars);

        // ── Advisory sources ─────────────────────────────────────────────────
        let sentiment = match with_timeout("sentiment", limit, self.sources.sentiment.index()).await
        {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(error = %e, "Sentiment index unavailable, continuing without it");
                None
            }
        };

        let news = match with_timeout(
            "news",
            limit,
            self.sources.news.search(&self.feeds.news_query),
        )
        .await
        {
            Ok(mut headlines) => {
                headlines.truncate(self.feeds.news_limit);
                headlines
            }
            Err(e) => {
                warn!(error = %e, "News unavailable, continuing without headlines");
                Vec::new()
            }
        };

        info!(
            pair = %pair,
            daily = daily.len(),
            hourly = hourly.len(),
            headlines = news.len(),
            sentiment = sentiment.is_some(),
            "Market snapshot built"
        );

        Ok(MarketSnapshot {
            balances,
            order_book,
            daily,
            hourly,
            sentiment,
            news,
            strategy_reference: self.strategy_reference.clone(),
        })
    }
}
