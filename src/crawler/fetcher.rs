//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the archiver, including:
//! - Building the HTTP client from the session settings
//! - GET requests for page text and streamed attachment bodies
//! - Error classification into timeouts and fetch failures
//! - Optional bounded retry with exponential backoff

use crate::config::ClientConfig;
use crate::ArchiverError;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, Response};
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with the configured timeouts and session cookie
///
/// The login flow is handled elsewhere; its session cookie, when present,
/// is sent with every request and the client keeps any cookies the forum
/// sets afterwards.
///
/// # Example
///
/// ```no_run
/// use forum_archiver::config::ClientConfig;
/// use forum_archiver::crawler::build_http_client;
///
/// let config = ClientConfig {
///     cookie: Some("xf_user=42%2Cabc".to_string()),
///     ..ClientConfig::default()
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &ClientConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = &config.cookie {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => tracing::warn!("Ignoring unusable session cookie: {}", e),
        }
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues GET requests and classifies their failures
///
/// # Failure mapping
///
/// | Condition | Error |
/// |-----------|-------|
/// | Deadline exceeded | `ArchiverError::Timeout` |
/// | Connection/DNS/TLS failure | `ArchiverError::Fetch` (no status) |
/// | Non-2xx answer | `ArchiverError::Fetch` (with status) |
///
/// With `retry_attempts > 0`, timeouts, connection failures and 5xx answers
/// are retried; 4xx answers never are.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl PageFetcher {
    /// Creates a fetcher without retry
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry_attempts: 0,
            retry_delay: Duration::from_millis(1000),
        }
    }

    /// Enables bounded retry for transient failures
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Fetches a page and returns its body text
    pub async fn fetch(&self, url: &Url) -> Result<String, ArchiverError> {
        self.with_retry_loop(url, move || async move {
            let response = self.get_once(url).await?;
            response
                .text()
                .await
                .map_err(|e| classify_error(url.as_str(), e))
        })
        .await
    }

    /// Sends a GET request and returns the response with its body unread
    ///
    /// Callers inspect headers first and then either stream or drop the body.
    pub async fn get(&self, url: &Url) -> Result<Response, ArchiverError> {
        self.with_retry_loop(url, move || self.get_once(url)).await
    }

    async fn get_once(&self, url: &Url) -> Result<Response, ArchiverError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiverError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        Ok(response)
    }

    async fn with_retry_loop<T, F, Fut>(&self, url: &Url, op: F) -> Result<T, ArchiverError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ArchiverError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    let delay = self.retry_delay.saturating_mul(1 << attempt.min(16));
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} in {:?} (attempt {}/{}): {}",
                        url,
                        delay,
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!("Fetch failed for {}: {}", url, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Maps a reqwest error onto the archiver's fetch failure taxonomy
pub fn classify_error(url: &str, error: reqwest::Error) -> ArchiverError {
    if error.is_timeout() {
        ArchiverError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        ArchiverError::Fetch {
            url: url.to_string(),
            status: None,
            message: format!("Connection failed: {}", error),
        }
    } else {
        ArchiverError::Fetch {
            url: url.to_string(),
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}
