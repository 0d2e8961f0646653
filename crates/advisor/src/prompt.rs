use serde_json::json;

use common::{Result, TradeRecord};
use strategy::MarketSnapshot;

const DECISION_INSTRUCTIONS: &str = "\
You are an expert Bitcoin trader. Analyse the data provided and decide whether \
to buy, sell, or hold right now.

Take into account:
- technical indicators and market data
- recent news headlines and their likely effect on the price
- the Fear and Greed index and overall market sentiment
- recent trading performance and the reflection below";

const DECISION_FORMAT: &str = "\
Reply with one JSON object and nothing else (no markdown, no code fences, no \
commentary), using exactly these keys:
{\"decision\": \"buy\" | \"sell\" | \"hold\", \"percentage\": <integer, 1-100 for buy/sell, 0 for hold>, \"reason\": \"<short explanation>\"}";

const REFLECTION_INSTRUCTIONS: &str = "\
You are a trading assistant reviewing recent trading performance and current \
market conditions to improve future trading decisions.

Using the data provided, write:
1. A brief reflection on the recent trading decisions
2. What worked well and what did not
3. Concrete suggestions for future decisions
4. Any patterns or trends you notice in the market data

Keep the response under 250 words.";

/// Instructions for the trading call: fixed rules, strategy reference and reflection.
pub fn decision_prompt(snapshot: &MarketSnapshot, reflection: &str) -> String {
    let reflection = if reflection.trim().is_empty() {
        "(no reflection available)"
    } else {
        reflection
    };
    let reference = if snapshot.strategy_reference.trim().is_empty() {
        "(no strategy reference provided)"
    } else {
        snapshot.strategy_reference.as_str()
    };

    format!(
        "{DECISION_INSTRUCTIONS}\n\n\
         Recent trading reflection:\n{reflection}\n\n\
         Always follow this trading method:\n{reference}\n\n\
         {DECISION_FORMAT}"
    )
}

/// Market data for the trading call, one labelled JSON block per source.
pub fn decision_context(snapshot: &MarketSnapshot) -> Result<String> {
    Ok(format!(
        "Current investment status: {}\n\
         Orderbook: {}\n\
         Daily OHLCV with indicators ({} bars): {}\n\
         Hourly OHLCV with indicators ({} bars): {}\n\
         Recent news headlines: {}\n\
         Fear and Greed Index: {}",
        serde_json::to_string(&snapshot.balances)?,
        serde_json::to_string(&snapshot.order_book)?,
        snapshot.daily.len(),
        serde_json::to_string(&snapshot.daily)?,
        snapshot.hourly.len(),
        serde_json::to_string(&snapshot.hourly)?,
        serde_json::to_string(&snapshot.news)?,
        serde_json::to_string(&snapshot.sentiment)?,
    ))
}

pub fn reflection_prompt() -> &'static str {
    REFLECTION_INSTRUCTIONS
}

/// Ledger window, current market data and the computed performance figure.
pub fn reflection_context(
    records: &[TradeRecord],
    snapshot: &MarketSnapshot,
    performance_pct: f64,
    window_days: i64,
) -> Result<String> {
    let market = json!({
        "fear_greed_index": snapshot.sentiment,
        "news_headlines": snapshot.news,
        "orderbook": snapshot.order_book,
        "daily_ohlcv": snapshot.daily,
        "hourly_ohlcv": snapshot.hourly,
    });
    Ok(format!(
        "Recent trading data:\n{}\n\n\
         Current market data:\n{}\n\n\
         Overall performance in the last {window_days} days: {performance_pct:.2}%",
        serde_json::to_string(records)?,
        serde_json::to_string(&market)?,
    ))
}
