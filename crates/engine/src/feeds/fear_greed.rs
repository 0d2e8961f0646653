use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::{Error, Result, SentimentIndex, SentimentProvider};

const BASE_URL: &str = "https://api.alternative.me";

/// Crypto Fear & Greed index from alternative.me.
pub struct FearGreedClient {
    base_url: String,
    http: Client,
}

impl FearGreedClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL, Duration::from_secs(10))
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }
}

#[async_trait]
impl SentimentProvider for FearGreedClient {
    async fn index(&self) -> Result<SentimentIndex> {
        let resp = self
            .http
            .get(format!("{}/fng/", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!("HTTP {}", resp.status())));
        }

        let body: FngResponse = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        let latest = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::Other("fear and greed response has no data".into()))?;
        let value = latest
            .value
            .parse::<u8>()
            .map_err(|e| Error::Other(format!("bad fear and greed value '{}': {e}", latest.value)))?;

        debug!(value = value, label = %latest.value_classification, "Fear and greed index");
        Ok(SentimentIndex {
            value,
            label: latest.value_classification,
        })
    }
}

#[derive(Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_latest_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fng/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Fear and Greed Index",
                "data": [
                    { "value": "27", "value_classification": "Fear",
                      "timestamp": "1709251200", "time_until_update": "3600" }
                ]
            })))
            .mount(&server)
            .await;

        let client = FearGreedClient::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let index = client.index().await.unwrap();
        assert_eq!(index.value, 27);
        assert_eq!(index.label, "Fear");
    }

    #[tokio::test]
    async fn empty_data_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fng/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(&server)
            .await;

        let client = FearGreedClient::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(client.index().await.is_err());
    }
}
