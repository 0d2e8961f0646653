use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::{Error, Headline, NewsProvider, Result};

const BASE_URL: &str = "https://serpapi.com";

/// Google News search through SerpAPI.
pub struct SerpApiNews {
    api_key: String,
    base_url: String,
    http: Client,
}

impl SerpApiNews {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, BASE_URL, Duration::from_secs(10))
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        })
    }
}

#[async_trait]
impl NewsProvider for SerpApiNews {
    async fn search(&self, query: &str) -> Result<Vec<Headline>> {
        let resp = self
            .http
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("engine", "google_news"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!("HTTP {}", resp.status())));
        }

        let body: SearchResponse = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        // Story clusters carry no top-level title.
        let headlines: Vec<Headline> = body
            .news_results
            .into_iter()
            .filter_map(|r| {
                r.title.map(|title| Headline {
                    title,
                    date: r.date.unwrap_or_default(),
                })
            })
            .collect();

        debug!(query = %query, count = headlines.len(), "News search complete");
        Ok(headlines)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<NewsResult>,
}

#[derive(Deserialize)]
struct NewsResult {
    title: Option<String>,
    date: Option<String>,
}
