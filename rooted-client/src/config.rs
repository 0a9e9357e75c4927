//! Client configuration.
//!
//! Everything the client needs is passed in at construction: the service
//! base URL, the API token pair, timeouts and the retry policy. There is no
//! default host; a config without a base URL fails [`ClientConfig::validate`].

use crate::error::{ClientError, ClientResult};
use crate::record::MergePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable holding the service base URL.
pub const ENV_BASE_URL: &str = "ROOTED_BASE_URL";
/// Environment variable holding the API token id.
pub const ENV_TOKEN_ID: &str = "ROOTED_TOKEN_ID";
/// Environment variable holding the API token key.
pub const ENV_TOKEN_KEY: &str = "ROOTED_TOKEN_KEY";
/// Optional override for the per-request timeout.
pub const ENV_TIMEOUT_SECS: &str = "ROOTED_TIMEOUT_SECS";
/// Optional override for the retry limit.
pub const ENV_MAX_RETRIES: &str = "ROOTED_MAX_RETRIES";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// API token pair. The secret is wiped from memory on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    /// Token id, sent in the `Authorization` header.
    pub key_id: String,
    /// Token key, only ever used as HMAC key material.
    #[serde(skip_serializing)]
    pub secret_key: String,
}

impl Credential {
    pub fn new(key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Retry behaviour for a single logical request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; retry `n` waits `backoff_factor_ms * 2^(n-1)`.
    pub backoff_factor_ms: u64,
    /// Upper bound for any single delay, including `Retry-After`.
    pub max_backoff_secs: u64,
    /// Status codes that trigger a retry.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor_ms: 500,
            max_backoff_secs: 120,
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns true if a response with this status should be retried.
    #[must_use]
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        let millis = self.backoff_factor_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(millis).min(self.max_backoff())
    }

    /// The delay cap.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

fn default_user_agent() -> String {
    format!("rooted-client {}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Configuration for [`crate::ApiClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Service base URL, e.g. `https://bhe.example.com`.
    pub base_url: String,
    /// API token pair.
    pub credential: Credential,
    /// `User-Agent` header value (`<client-id> <version>`).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// How `props` are merged into flattened records.
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

impl ClientConfig {
    /// Creates a config with default timeout, retry and merge settings.
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
            user_agent: default_user_agent(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            merge_policy: MergePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    #[must_use]
    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Reads the config from `ROOTED_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let base_url = required_env(ENV_BASE_URL)?;
        let credential =
            Credential::new(required_env(ENV_TOKEN_ID)?, required_env(ENV_TOKEN_KEY)?);
        let mut config = Self::new(base_url, credential);

        if let Some(raw) = optional_env(ENV_TIMEOUT_SECS) {
            config.timeout_secs = raw
                .parse()
                .map_err(|_| {
                    ClientError::Config(format!("{ENV_TIMEOUT_SECS} is not a number: {raw}"))
                })?;
        }
        if let Some(raw) = optional_env(ENV_MAX_RETRIES) {
            config.retry.max_retries = raw
                .parse()
                .map_err(|_| {
                    ClientError::Config(format!("{ENV_MAX_RETRIES} is not a number: {raw}"))
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads the config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the config can be used to talk to a service.
    pub fn validate(&self) -> ClientResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ClientError::Config("base_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must start with http:// or https://: {url}"
            )));
        }
        if self.credential.key_id.is_empty() {
            return Err(ClientError::Config("token id is empty".to_string()));
        }
        if self.credential.secret_key.is_empty() {
            return Err(ClientError::Config("token key is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ClientError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Joins the base URL with an API path (`/api/v2/...`).
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(name: &str) -> ClientResult<String> {
    optional_env(name).ok_or_else(|| ClientError::Config(format!("{name} is not set")))
}
