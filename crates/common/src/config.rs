use crate::{Error, Result, TradingMode};

/// All configuration loaded from environment variables at startup.
/// A missing required variable is reported as [`Error::Config`] and aborts startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Trading
    pub trading_mode: TradingMode,
    pub paper_initial_quote: f64,

    // Exchange credentials (required in live mode only)
    pub upbit_access_key: Option<String>,
    pub upbit_secret_key: Option<String>,

    // Decision service
    pub openai_api_key: String,
    pub openai_decision_model: String,
    pub openai_reflection_model: String,

    // News search; headlines are skipped when absent
    pub serpapi_api_key: Option<String>,

    // Database
    pub database_url: String,

    // Strategy config file path
    pub strategy_config_path: String,

    // Read-only ledger API; disabled without a token
    pub dashboard_token: Option<String>,
    pub dashboard_port: u16,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let trading_mode = match get("TRADING_MODE")
            .unwrap_or_else(|| "paper".to_string())
            .to_lowercase()
            .as_str()
        {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let (upbit_access_key, upbit_secret_key) = match trading_mode {
            TradingMode::Live => (
                Some(required("UPBIT_ACCESS_KEY")?),
                Some(required("UPBIT_SECRET_KEY")?),
            ),
            TradingMode::Paper => (get("UPBIT_ACCESS_KEY"), get("UPBIT_SECRET_KEY")),
        };

        let paper_initial_quote = match get("PAPER_INITIAL_QUOTE") {
            Some(v) => v.parse().map_err(|_| {
                Error::Config(format!("PAPER_INITIAL_QUOTE is not a number: '{v}'"))
            })?,
            None => 1_000_000.0,
        };

        Ok(Config {
            trading_mode,
            paper_initial_quote,
            upbit_access_key,
            upbit_secret_key,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_decision_model: get("OPENAI_DECISION_MODEL")
                .unwrap_or_else(|| "o1-mini-2024-09-12".to_string()),
            openai_reflection_model: get("OPENAI_REFLECTION_MODEL")
                .unwrap_or_else(|| "gpt-4o-2024-08-06".to_string()),
            serpapi_api_key: get("SERPAPI_API_KEY"),
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/trades.db".to_string()),
            strategy_config_path: get("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
            dashboard_token: get("DASHBOARD_TOKEN"),
            dashboard_port: get("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }
}
