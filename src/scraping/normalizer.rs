//! URL normalization and prefix/suffix filtering
//!
//! Applies, in order: sanitize, strip query params, allow-prefix filter,
//! deny-prefix filter, deny-ending filter, dedup. The result is order
//! preserving and idempotent.

use std::collections::HashSet;
use url::Url;

use crate::config::CrawlerConfig;

/// URL normalizer built from the site configuration
#[derive(Debug, Clone, Default)]
pub struct UrlNormalizer {
    strip_params: Vec<String>,
    allow_prefixes: Vec<String>,
    deny_prefixes: Vec<String>,
    deny_endings: Vec<String>,
}

impl UrlNormalizer {
    pub fn new(config: &CrawlerConfig) -> Self {
        let strip_params = if config.strip_query_params.enabled {
            config.strip_query_params.params.clone()
        } else {
            Vec::new()
        };

        Self {
            strip_params,
            allow_prefixes: config.allow_prefixes.clone(),
            deny_prefixes: config.deny_prefixes.clone(),
            deny_endings: config
                .deny_endings
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    /// Normalize a list of URLs
    pub fn normalize(&self, urls: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();

        urls.iter()
            .map(|u| self.strip_query(&sanitize_url(u)))
            .filter(|u| self.is_allowed(u))
            .filter(|u| !self.is_denied(u))
            .filter(|u| !self.has_denied_ending(u))
            .filter(|u| seen.insert(u.clone()))
            .collect()
    }

    /// Remove configured parameter names from the query string
    fn strip_query(&self, url: &str) -> String {
        if self.strip_params.is_empty() {
            return url.to_string();
        }

        let mut parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return url.to_string(),
        };

        if let Some(query) = parsed.query() {
            let kept: Vec<&str> = query
                .split('&')
                .filter(|p| {
                    let key = p.split('=').next().unwrap_or("");
                    !p.is_empty() && !self.strip_params.iter().any(|s| s == key)
                })
                .collect();

            if kept.is_empty() {
                parsed.set_query(None);
            } else {
                let joined = kept.join("&");
                parsed.set_query(Some(&joined));
            }
        }

        parsed.to_string()
    }

    /// Allow-prefix check; no prefixes keeps everything
    pub fn is_allowed(&self, url: &str) -> bool {
        self.allow_prefixes.is_empty() || self.allow_prefixes.iter().any(|p| url.starts_with(p))
    }

    pub fn is_denied(&self, url: &str) -> bool {
        self.deny_prefixes.iter().any(|p| url.starts_with(p))
    }

    fn has_denied_ending(&self, url: &str) -> bool {
        if self.deny_endings.is_empty() {
            return false;
        }
        let path = match Url::parse(url) {
            Ok(u) => u.path().to_lowercase(),
            Err(_) => url.to_lowercase(),
        };
        self.deny_endings.iter().any(|e| path.ends_with(e.as_str()))
    }
}

/// Rebuild a URL as `scheme://host[:port]path[?query][#fragment]`.
///
/// URLs that do not parse, or have no host, are returned unchanged.
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(_) => return url.to_string(),
    };

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h,
        _ => return url.to_string(),
    };

    let mut rebuilt = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        rebuilt.push_str(&format!(":{}", port));
    }
    rebuilt.push_str(parsed.path());
    if let Some(query) = parsed.query() {
        rebuilt.push('?');
        rebuilt.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        rebuilt.push('#');
        rebuilt.push_str(fragment);
    }
    rebuilt
}
