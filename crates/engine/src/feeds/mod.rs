pub mod fear_greed;
pub mod serpapi;

use async_trait::async_trait;

use common::{Headline, NewsProvider, Result};

pub use fear_greed::FearGreedClient;
pub use serpapi::SerpApiNews;

/// Stand-in when no news API key is configured.
pub struct NoNews;

#[async_trait]
impl NewsProvider for NoNews {
    async fn search(&self, _query: &str) -> Result<Vec<Headline>> {
        Ok(Vec::new())
    }
}
