use std::time::Duration;

use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};

use gazette_core::error::AppError;
use gazette_core::session::{self, SessionConfig};
use gazette_core::traits::{FetchedPage, Fetcher};

use crate::retry::RetryPolicy;
use crate::robots::RobotsCache;

/// HTTP fetcher using reqwest.
///
/// Timeout and User-Agent come from the session active when `fetch` is
/// called, so scoped overrides apply per request. robots.txt is honored by
/// default; transient errors (timeouts, connection failures, 429 and 5xx)
/// are retried with exponential backoff.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    robots: Option<RobotsCache>,
    retry: RetryPolicy,
}

/// A successful response body with its metadata.
pub(crate) struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub responded_url: String,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            robots: Some(RobotsCache::default()),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_robots_cache(mut self, robots: RobotsCache) -> Self {
        self.robots = Some(robots);
        self
    }

    /// Skip robots.txt checks.
    pub fn ignore_robots(mut self) -> Self {
        self.robots = None;
        self
    }

    /// Sends a GET with retries and returns the first successful response.
    async fn get(&self, url: &str, session: &SessionConfig) -> Result<Response, AppError> {
        if let Some(robots) = &self.robots {
            if !robots
                .allowed(&self.client, url, &session.user_agent, session.timeout)
                .await
            {
                return Err(AppError::RobotsDisallowed(url.to_string()));
            }
        }

        let mut attempt = 1;
        loop {
            match self.send(url, session).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts() => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(%url, attempt, delay_ms = %delay.as_millis(), error = %e, "Retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, url: &str, session: &SessionConfig) -> Result<Response, AppError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &session.user_agent)
            .timeout(session.timeout)
            .send()
            .await
            .map_err(|e| map_error(e, session.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Raw body of `url`, for feeds and sitemaps.
    pub(crate) async fn download(&self, url: &str) -> Result<Download, AppError> {
        let session = session::current();
        let response = self.get(url, &session).await?;
        let responded_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_body_error(e, session.timeout))?;

        Ok(Download {
            bytes: bytes.to_vec(),
            content_type,
            responded_url,
        })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        let session = session::current();
        let response = self.get(url, &session).await?;
        let responded_url = response.url().to_string();
        let content = response
            .text()
            .await
            .map_err(|e| map_body_error(e, session.timeout))?;

        tracing::debug!(%url, %responded_url, bytes = content.len(), "Fetched page");
        Ok(FetchedPage {
            content,
            requested_url: url.to_string(),
            responded_url,
            fetched_at: Utc::now(),
        })
    }
}

fn map_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout.as_secs())
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

fn map_body_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout.as_secs())
    } else {
        AppError::HttpError(format!("Failed to read response body: {e}"))
    }
}
