//! HTTP transport for the IMDB site with a small fixed retry budget.
//!
//! Retries cover connect/timeout errors only, with a uniformly random
//! backoff between attempts. Throttling between page fetches is the
//! caller's job (see the scrape drivers).

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

pub const BASE_URL: &str = "https://www.imdb.com";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_backoff_ms: 1_000,
            max_backoff_ms: 2_000,
        }
    }
}

#[derive(Clone)]
pub struct ImdbClient {
    client: Client,
    retry: RetryPolicy,
}

impl ImdbClient {
    pub fn new(user_agent: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, retry })
    }

    #[must_use]
    pub fn title_url(title_id: &str) -> String {
        format!("{BASE_URL}{title_id}")
    }

    /// Fetches a page body, retrying connect/timeout failures. Non-success
    /// status codes are returned as errors without retry; the drivers treat
    /// them as a per-entity failure and move on.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get_text_with_params(url, &[]).await
    }

    pub async fn get_text_with_params(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self
                .client
                .get(url)
                .header("Accept-Language", ACCEPT_LANGUAGE)
                .query(params);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(anyhow!("Bad status code {status} for {url}"));
                    }
                    return response
                        .text()
                        .await
                        .with_context(|| format!("Failed to read body of {url}"));
                }
                Err(err) if (err.is_connect() || err.is_timeout()) && attempt < self.retry.attempts => {
                    let backoff = random_delay(self.retry.min_backoff_ms, self.retry.max_backoff_ms);
                    warn!(
                        "Request to {url} failed ({err}), retrying in {}ms (attempt {attempt}/{})",
                        backoff.as_millis(),
                        self.retry.attempts
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Request to {url} failed"));
                }
            }
        }
    }
}

/// Uniformly sampled delay between the configured bounds.
#[must_use]
pub fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    let ms = rand::rng().random_range(min_ms..=max_ms);
    Duration::from_millis(ms)
}
