//! Request executor: the single point of HTTP access for a run
//!
//! Every request is throttled per host and retried with exponential
//! backoff. Transport failures never escape: after the last attempt the
//! executor logs and returns `None`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::RequestConfig;

/// Errors raised by an HTTP transport
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Response as seen by the crawler: status, headers and the body text.
///
/// The body is read eagerly but its failure is kept separate from the
/// status, so callers can tell "got a 200 but the body broke" apart.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    body: Result<String, String>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: Ok(body.into()),
        }
    }

    /// Response whose body could not be read
    pub fn with_body_error(status: u16, headers: Vec<(String, String)>, error: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: Err(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Numeric `Retry-After` in seconds; HTTP-date values are ignored
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn text(&self) -> Result<&str, RequestError> {
        self.body
            .as_deref()
            .map_err(|e| RequestError::Body(e.clone()))
    }

    pub fn into_text(self) -> Result<String, RequestError> {
        self.body.map_err(RequestError::Body)
    }
}

/// Seam between the executor and the network
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, user_agent: &str) -> Result<HttpResponse, RequestError>;
}

/// `reqwest`-backed transport
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &RequestConfig) -> Result<Self, RequestError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<HttpResponse, RequestError> {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        Ok(match response.text().await {
            Ok(body) => HttpResponse::new(status, headers, body),
            Err(e) => HttpResponse::with_body_error(status, headers, e.to_string()),
        })
    }
}

/// Per-host minimum spacing between requests.
///
/// Callers reserve their slot under the lock, so concurrent tasks hitting
/// the same host are spaced by `delay` as well.
#[derive(Debug)]
pub struct HostThrottle {
    delay: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `host` is allowed, and record it
    pub async fn wait(&self, host: &str) {
        let slot = {
            let mut last_request = self.last_request.lock();
            let now = Instant::now();
            let slot = match last_request.get(host) {
                Some(last) => (*last + self.delay).max(now),
                None => now,
            };
            last_request.insert(host.to_string(), slot);
            slot
        };

        if slot > Instant::now() {
            debug!(host, wait_us = (slot - Instant::now()).as_micros() as u64, "Throttling");
        }
        tokio::time::sleep_until(slot).await;
    }
}

/// Throttled, retrying HTTP GET executor
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    throttle: HostThrottle,
    config: RequestConfig,
}

impl RequestExecutor {
    pub fn new(config: RequestConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            throttle: HostThrottle::new(config.throttle_delay()),
            config,
        }
    }

    /// Executor backed by `reqwest`
    pub fn with_reqwest(config: RequestConfig) -> Result<Self, RequestError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(config, transport))
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// GET `url`, returning `None` only when every attempt failed in transport.
    ///
    /// A retryable status on the last attempt is returned as-is.
    pub async fn request(&self, url: &str) -> Option<HttpResponse> {
        let host = host_of(url);
        let attempts = self.config.max_retry.max(1);
        let mut backoff = self.config.retry_delay();

        for attempt in 1..=attempts {
            self.throttle.wait(&host).await;
            let is_last = attempt == attempts;

            match self.transport.get(url, &self.config.user_agent).await {
                Ok(response) => {
                    if response.is_success() || !self.config.is_retry_status(response.status) {
                        return Some(response);
                    }
                    if is_last {
                        warn!(
                            url,
                            status = response.status,
                            attempts,
                            "Retryable status after final attempt"
                        );
                        return Some(response);
                    }
                    let wait = response.retry_after().unwrap_or(backoff);
                    warn!(
                        url,
                        status = response.status,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Retryable status, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    if is_last {
                        error!(url, attempts, error = %e, "Request failed after final attempt");
                        return None;
                    }
                    warn!(
                        url,
                        attempt,
                        wait_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }

            backoff *= 2;
        }

        None
    }
}

/// Throttle key for a URL; unparsable URLs throttle on their own string
fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}
