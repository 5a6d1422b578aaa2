use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SummarizerConfig;
use crate::error::{DebateError, Result};

/// Produces the one-line summary broadcast on the summary topic after each
/// accepted statement. Pluggable so the stub can be swapped for a real
/// summarization service without touching the engine.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Passthrough stub used until a summarization service is wired in.
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        Ok(format!("[summary] {}", text))
    }
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// Client for an external summarization sidecar.
pub struct HttpSummarizer {
    client: reqwest::Client,
    api_url: String,
}

impl HttpSummarizer {
    pub fn new(api_url: String, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DebateError::Summarizer(e.to_string()))?;
        Ok(Self { client, api_url })
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&SummarizeRequest { content: text })
            .send()
            .await
            .map_err(|e| DebateError::Summarizer(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DebateError::Summarizer(format!(
                "summarizer returned {}",
                response.status()
            )));
        }

        let body: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| DebateError::Summarizer(e.to_string()))?;
        Ok(body.summary)
    }
}

/// Pick the summarizer from configuration: the HTTP sidecar when enabled,
/// otherwise the stub.
pub fn from_config(config: &SummarizerConfig) -> Arc<dyn Summarizer> {
    if config.enabled {
        match HttpSummarizer::new(config.api_url.clone(), config.request_timeout) {
            Ok(client) => {
                tracing::info!(api_url = %config.api_url, "HTTP summarizer enabled");
                return Arc::new(client);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build HTTP summarizer, falling back to stub");
            }
        }
    }
    Arc::new(NoopSummarizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_passthrough() {
        let summary = NoopSummarizer.summarize("the claim").await.unwrap();
        assert_eq!(summary, "[summary] the claim");
    }

    #[test]
    fn test_disabled_config_selects_stub() {
        let config = SummarizerConfig {
            enabled: false,
            api_url: "http://127.0.0.1:5000/debate/summarize".to_string(),
            request_timeout: Duration::from_secs(10),
        };
        // No network involved for the stub; enough to confirm it is chosen.
        let summarizer = from_config(&config);
        let summary = futures::executor::block_on(summarizer.summarize("x")).unwrap();
        assert!(summary.starts_with("[summary]"));
    }
}
