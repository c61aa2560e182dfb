//! robots.txt handling
//!
//! Fetches the site's robots.txt once per run through the request executor,
//! caches the parsed policy, and filters URL lists against it. Any failure
//! to fetch or parse leaves the crawl unblocked.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::executor::RequestExecutor;

/// Parsed robots.txt rules for one user agent
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Parsed disallow patterns for our user agent
    disallow_patterns: Vec<String>,
    /// Parsed allow patterns for our user agent
    allow_patterns: Vec<String>,
}

impl RobotsPolicy {
    /// Parse robots.txt content for `user_agent`
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let mut disallow = Vec::new();
        let mut allow = Vec::new();

        // Groups name the product token ("TeaserCrawl/1.0 (+...)" -> "teasercrawl"),
        // compared whole and case-insensitively
        let ua_token = user_agent
            .split(|c: char| c == '/' || c.is_whitespace())
            .next()
            .unwrap_or(user_agent)
            .to_lowercase();
        let mut current_agent_applies = false;
        let mut found_specific_agent = false;
        let mut in_agent_list = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    let agent = value.to_lowercase();
                    let matches_specific = !ua_token.is_empty() && agent == ua_token;

                    // Consecutive user-agent lines share one group
                    let applies = if agent == "*" {
                        !found_specific_agent
                    } else {
                        matches_specific
                    };

                    if matches_specific && !found_specific_agent {
                        // Specific group replaces wildcard rules
                        found_specific_agent = true;
                        disallow.clear();
                        allow.clear();
                    }

                    current_agent_applies = if in_agent_list {
                        current_agent_applies || applies
                    } else {
                        applies
                    };
                    in_agent_list = true;
                }
                "disallow" if current_agent_applies => {
                    in_agent_list = false;
                    if !value.is_empty() {
                        disallow.push(value.to_string());
                    }
                }
                "allow" if current_agent_applies => {
                    in_agent_list = false;
                    if !value.is_empty() {
                        allow.push(value.to_string());
                    }
                }
                _ => in_agent_list = false,
            }
        }

        Self {
            disallow_patterns: disallow,
            allow_patterns: allow,
        }
    }

    /// Check if a path (with optional query) is allowed
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest_allow_match = self
            .allow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        let longest_disallow_match = self
            .disallow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        // Longer match wins; if equal, allow wins
        longest_allow_match >= longest_disallow_match
    }

    /// Check a full URL against the policy
    pub fn is_url_allowed(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => {
                let mut target = parsed.path().to_string();
                if let Some(query) = parsed.query() {
                    target.push('?');
                    target.push_str(query);
                }
                self.is_allowed(&target)
            }
            Err(_) => true,
        }
    }

    /// Check if a path matches a robots.txt pattern (`*` wildcard, `$` anchor)
    fn path_matches(path: &str, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }

        let (pattern, anchored) = match pattern.strip_suffix('$') {
            Some(p) => (p, true),
            None => (pattern, false),
        };

        let mut parts = pattern.split('*');
        let first = parts.next().unwrap_or("");
        let Some(mut rest) = path.strip_prefix(first) else {
            return false;
        };
        let mut parts: Vec<&str> = parts.collect();

        let last = match parts.pop() {
            Some(last) => last,
            None => return !anchored || rest.is_empty(),
        };

        for part in parts {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }

        // Leftmost placement of the middle parts leaves the most room for the last one
        if anchored {
            rest.ends_with(last)
        } else {
            rest.contains(last)
        }
    }
}

/// Filters URL lists against the configured robots.txt
pub struct RobotsChecker {
    robots_url: Option<String>,
    executor: Arc<RequestExecutor>,
    /// `None` marks a robots URL whose fetch or parse failed
    cache: Mutex<HashMap<String, Option<Arc<RobotsPolicy>>>>,
}

impl RobotsChecker {
    pub fn new(robots_url: Option<String>, executor: Arc<RequestExecutor>) -> Self {
        Self {
            robots_url,
            executor,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Keep only URLs the robots policy allows for our user agent.
    ///
    /// Without a robots URL, or without a usable policy, every URL passes.
    /// The result is deduplicated in first-seen order.
    pub async fn filter_allowed(&self, urls: &[String]) -> Vec<String> {
        let policy = match &self.robots_url {
            Some(robots_url) => self.policy(robots_url).await,
            None => None,
        };

        let mut seen = HashSet::new();
        let unique = urls.iter().filter(|u| seen.insert(u.as_str()));

        let Some(policy) = policy else {
            return unique.cloned().collect();
        };

        unique
            .filter(|url| {
                let allowed = policy.is_url_allowed(url);
                if !allowed {
                    debug!(url = %url, "Disallowed by robots.txt");
                }
                allowed
            })
            .cloned()
            .collect()
    }

    /// Cached policy for `robots_url`, fetching it on first use
    async fn policy(&self, robots_url: &str) -> Option<Arc<RobotsPolicy>> {
        if let Some(cached) = self.cache.lock().get(robots_url) {
            return cached.clone();
        }

        let policy = self.fetch_policy(robots_url).await.map(Arc::new);
        self.cache
            .lock()
            .insert(robots_url.to_string(), policy.clone());
        policy
    }

    async fn fetch_policy(&self, robots_url: &str) -> Option<RobotsPolicy> {
        let response = match self.executor.request(robots_url).await {
            Some(r) => r,
            None => {
                warn!(robots_url, "Could not fetch robots.txt, allowing all URLs");
                return None;
            }
        };

        if !response.is_success() {
            warn!(
                robots_url,
                status = response.status,
                "robots.txt not available, allowing all URLs"
            );
            return None;
        }

        match response.text() {
            Ok(content) => {
                info!(robots_url, "Loaded robots.txt");
                Some(RobotsPolicy::parse(content, self.executor.user_agent()))
            }
            Err(e) => {
                warn!(robots_url, error = %e, "Unreadable robots.txt, allowing all URLs");
                None
            }
        }
    }
}
