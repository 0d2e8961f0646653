use async_trait::async_trait;

use crate::{Headline, Result, SentimentIndex};

/// Market sentiment gauge. Advisory: callers fall back to `None` on error.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn index(&self) -> Result<SentimentIndex>;
}

/// Headline search. Advisory: callers fall back to an empty list on error.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Headline>>;
}

/// Text completion service consulted for trading decisions and reflections.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// `prompt` carries the instructions, `context` the market data they apply to.
    async fn complete(&self, prompt: &str, context: &str) -> Result<String>;
}
