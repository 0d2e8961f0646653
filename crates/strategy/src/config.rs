use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Top-level strategy config file (TOML). Every field has a default, so an
/// empty file is valid.
///
/// Example `config/strategy.toml`:
/// ```toml
/// reference_path = "strategy.txt"
///
/// [market]
/// pair = "KRW-BTC"
/// base_currency = "BTC"
/// quote_currency = "KRW"
/// daily_bars = 30
/// hourly_bars = 24
///
/// [execution]
/// fee_rate = 0.0005
/// min_notional = 5000.0
/// settle_delay_secs = 2
///
/// [schedule]
/// times = ["09:00", "15:00", "21:00"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyFileConfig {
    /// Text file with the trading method the decision service must follow.
    pub reference_path: Option<String>,
    pub market: MarketConfig,
    pub execution: ExecutionConfig,
    pub feeds: FeedConfig,
    pub reflection: ReflectionConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Exchange market code, e.g. "KRW-BTC".
    pub pair: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub daily_bars: usize,
    pub hourly_bars: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            pair: "KRW-BTC".to_string(),
            base_currency: "BTC".to_string(),
            quote_currency: "KRW".to_string(),
            daily_bars: 30,
            hourly_bars: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Exchange trading fee, held back from every buy (0.0005 = 0.05%).
    pub fee_rate: f64,
    /// Smallest order value in quote currency that will be submitted.
    pub min_notional: f64,
    /// Wait before re-reading balances after the order step.
    pub settle_delay_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.0005,
            min_notional: 5000.0,
            settle_delay_secs: 2,
        }
    }
}

impl ExecutionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub news_query: String,
    pub news_limit: usize,
    /// Upper bound for every external call made while building a snapshot.
    pub call_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            news_query: "btc".to_string(),
            news_limit: 5,
            call_timeout_secs: 10,
        }
    }
}

impl FeedConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Longest reflection look-back accepted from the config file.
pub const MAX_REFLECTION_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub window_days: i64,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self { window_days: 7 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local times of day, "HH:MM".
    pub times: Vec<String>,
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            times: vec!["09:00".into(), "15:00".into(), "21:00".into()],
            run_on_start: true,
        }
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Strategy config not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse strategy config at '{}': {e}",
                path.display()
            ))
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read the strategy reference text, or an empty string when none is configured.
    pub fn load_reference(&self) -> Result<String> {
        match &self.reference_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read strategy reference at '{path}': {e}"))
            }),
            None => Ok(String::new()),
        }
    }

    fn validate(&self) -> Result<()> {
        let exec = &self.execution;
        if !(0.0..1.0).contains(&exec.fee_rate) {
            return Err(Error::Config(format!(
                "execution.fee_rate must be within [0, 1), got {}",
                exec.fee_rate
            )));
        }
        if exec.min_notional < 0.0 {
            return Err(Error::Config("execution.min_notional must be >= 0".into()));
        }
        let window = self.reflection.window_days;
        if !(1..=MAX_REFLECTION_WINDOW_DAYS).contains(&window) {
            return Err(Error::Config(format!(
                "reflection.window_days must be within 1..={MAX_REFLECTION_WINDOW_DAYS}, got {window}"
            )));
        }
        if self.market.daily_bars == 0 || self.market.hourly_bars == 0 {
            return Err(Error::Config("market bar counts must be > 0".into()));
        }
        Ok(())
    }
}
