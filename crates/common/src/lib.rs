pub mod advisory;
pub mod config;
pub mod error;
pub mod exchange;
pub mod performance;
pub mod timeout;
pub mod types;

pub use advisory::{DecisionService, NewsProvider, SentimentProvider};
pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{ExchangeAccount, OhlcvProvider};
pub use timeout::with_timeout;
pub use types::*;
