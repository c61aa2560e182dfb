//! HTTP request, throttling, and retry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DEFAULT_USER_AGENT;

/// Settings for the request executor shared by every HTTP access of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// User agent sent with every request and used for robots.txt evaluation
    pub user_agent: String,
    /// Minimum delay between two requests to the same host (milliseconds)
    pub throttle_delay_ms: u64,
    /// Maximum number of attempts per request (0 behaves like 1)
    pub max_retry: u32,
    /// Initial retry backoff (milliseconds), doubled after every retry
    pub retry_delay_ms: u64,
    /// Status codes that trigger a retry
    pub retry_statuses: Vec<u16>,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl RequestConfig {
    pub fn throttle_delay(&self) -> Duration {
        Duration::from_millis(self.throttle_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a status code belongs to the retryable set
    pub fn is_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            throttle_delay_ms: 1000,
            max_retry: 3,
            retry_delay_ms: 1000,
            retry_statuses: vec![408, 429, 500, 502, 503, 504],
            timeout_secs: 30,
        }
    }
}
