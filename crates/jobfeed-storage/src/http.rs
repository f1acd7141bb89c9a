//! Feed download over HTTP with a request timeout and a short retry schedule.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

/// How many times a feed request is tried, and how long to pause between tries.
///
/// The pause doubles after every failed try and never exceeds `max_pause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub attempts: u32,
    pub first_pause: Duration,
    pub max_pause: Duration,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            attempts: 3,
            first_pause: Duration::from_millis(500),
            max_pause: Duration::from_secs(5),
        }
    }
}

impl RetrySchedule {
    /// Pause after the `failed`-th unsuccessful try (1-based).
    pub fn pause_after(&self, failed: u32) -> Duration {
        let doublings = failed.saturating_sub(1).min(31);
        self.first_pause
            .saturating_mul(1u32 << doublings)
            .min(self.max_pause)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub retry: RetrySchedule,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            retry: RetrySchedule::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    /// Timeouts, refused connections, throttling and server errors are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request(err) => err.is_timeout() || err.is_connect(),
            FetchError::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
        }
    }
}

/// A downloaded feed body and the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct FeedBody {
    pub final_url: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetrySchedule,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build().context("building reqwest client")?,
            retry: config.retry,
        })
    }

    pub async fn fetch_feed(&self, run_id: Uuid, source_name: &str, url: &str) -> Result<FeedBody, FetchError> {
        let span = info_span!("feed_request", %run_id, source = source_name, url);
        self.fetch_with_retry(url).instrument(span).await
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<FeedBody, FetchError> {
        let attempts = self.retry.attempts.max(1);
        let mut failed = 0;
        loop {
            match self.request_once(url).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && failed + 1 < attempts => {
                    failed += 1;
                    let pause = self.retry.pause_after(failed);
                    warn!(attempt = failed, ?pause, error = %err, "feed request failed; retrying");
                    tokio::time::sleep(pause).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_once(&self, url: &str) -> Result<FeedBody, FetchError> {
        let response = self.client.get(url).header(ACCEPT, FEED_ACCEPT).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }
        Ok(FeedBody {
            final_url,
            bytes: response.bytes().await?.to_vec(),
        })
    }
}
