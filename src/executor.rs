//! Query execution against the graph-query endpoint
//!
//! The executor is the only part of the pipeline that performs I/O. It is a
//! trait so the rest of the pipeline can run against in-memory results.

use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::ManifestError;

/// Longest endpoint message kept in a `QueryFailed` error
const MAX_MESSAGE_LEN: usize = 512;

/// Trait for running CONSTRUCT queries
pub trait QueryExecutor: Send + Sync {
    /// Run a CONSTRUCT query and return its JSON-shaped result
    fn construct(&self, query: &str) -> Result<Value, ManifestError>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn construct(&self, query: &str) -> Result<Value, ManifestError> {
        (**self).construct(query)
    }
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn construct(&self, query: &str) -> Result<Value, ManifestError> {
        (**self).construct(query)
    }
}

/// Bounded retry for transient transport failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay_ms: 100,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    ///
    /// Exponential backoff capped at `max_delay_ms`; with jitter enabled half
    /// of the delay is fixed and half is random.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self
            .min_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        if self.jitter && delay > 1 {
            let half = delay / 2;
            let spread = rand::thread_rng().gen_range(0..=delay - half);
            Duration::from_millis(half + spread)
        } else {
            Duration::from_millis(delay)
        }
    }
}

/// Connection settings for the graph-query endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Query endpoint URL
    pub url: String,
    /// Value of the `output` parameter requesting a JSON result
    pub output: String,
    /// Per-attempt timeout
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://sparql.ub.uib.no/sparql/query".to_string(),
            output: "json".to_string(),
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// HTTP client for a SPARQL endpoint
#[derive(Debug, Clone)]
pub struct SparqlClient {
    http: Client,
    endpoint: Url,
    output: String,
    timeout_ms: u64,
    retry: RetryPolicy,
}

impl SparqlClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, ManifestError> {
        let endpoint = Url::parse(&config.url).map_err(|e| {
            ManifestError::Config(format!("invalid endpoint URL '{}': {}", config.url, e))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ManifestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            output: config.output.clone(),
            timeout_ms: config.timeout_ms,
            retry: config.retry.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL for a query
    pub fn request_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("output", &self.output);
        url
    }

    fn execute_once(&self, query: &str) -> Result<Value, ManifestError> {
        let url = self.request_url(query);

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/ld+json, application/json")
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = match body.trim() {
                "" => status.canonical_reason().unwrap_or("no message").to_string(),
                text => truncate(text, MAX_MESSAGE_LEN),
            };
            return Err(ManifestError::QueryFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| ManifestError::Decode(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> ManifestError {
        if e.is_timeout() {
            ManifestError::Timeout {
                endpoint: self.endpoint.to_string(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            ManifestError::Transport {
                endpoint: self.endpoint.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl QueryExecutor for SparqlClient {
    fn construct(&self, query: &str) -> Result<Value, ManifestError> {
        let mut attempt = 0;
        loop {
            debug!(endpoint = %self.endpoint, attempt, "Sending CONSTRUCT query");
            match self.execute_once(query) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        endpoint = %self.endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient query failure, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((pos, _)) => format!("{}…", &text[..pos]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_without_jitter() {
        let policy = RetryPolicy {
            max_retries: 5,
            min_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: false,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(70), Duration::from_millis(1_000));
    }

    #[test]
    fn test_backoff_jitter_stays_in_bounds() {
        let policy = RetryPolicy {
            max_retries: 5,
            min_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: true,
        };
        for _ in 0..50 {
            let delay = policy.backoff(2).as_millis();
            assert!((200..=400).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_request_url_encodes_query() {
        let client = SparqlClient::new(&EndpointConfig::default()).unwrap();
        let url = client.request_url("SELECT * WHERE { ?s ?p \"x\" }");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0].0, "query");
        assert_eq!(pairs[0].1, "SELECT * WHERE { ?s ?p \"x\" }");
        assert_eq!(pairs[1], ("output".to_string(), "json".to_string()));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let config = EndpointConfig {
            url: "not a url".to_string(),
            ..EndpointConfig::default()
        };
        assert!(matches!(
            SparqlClient::new(&config),
            Err(ManifestError::Config(_))
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
