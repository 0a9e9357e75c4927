//! Signed, retrying HTTP client.
//!
//! [`ApiClient::request`] never returns an error. Every failure ends up as
//! an [`ApiOutcome`] variant so that callers can tell "service unreachable"
//! apart from "entity not found" without catching anything.

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::signer::{RequestSigner, SignedRequest};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Classified result of one logical request (after retries).
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// 2xx response. An empty body parses as `Null`.
    Success(Value),
    /// 404 response, with its JSON body when it had one.
    NotFound(Option<Value>),
    /// Any other non-2xx status once retries are exhausted.
    Status { status: u16, body: Option<Value> },
    /// Network error, timeout, or an unparseable 2xx body.
    Transport(String),
}

impl ApiOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success(_))
    }

    /// The success body, or `None` for every kind of failure.
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            ApiOutcome::Success(body) => Some(body),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiOutcome::Success(body) => Some(body),
            _ => None,
        }
    }

    /// Short description for logs and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            ApiOutcome::Success(_) => "success".to_string(),
            ApiOutcome::NotFound(_) => "HTTP 404".to_string(),
            ApiOutcome::Status { status, .. } => format!("HTTP {status}"),
            ApiOutcome::Transport(reason) => format!("transport error: {reason}"),
        }
    }
}

/// Client for the attack-path API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: Client,
}

impl ApiClient {
    /// Validates `config` and builds the underlying HTTP client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Signer bound to this client's credential.
    #[must_use]
    pub fn signer(&self) -> RequestSigner<'_> {
        RequestSigner::new(&self.config.credential, &self.config.user_agent)
    }

    /// Signed `GET`.
    pub async fn get(&self, path: &str) -> ApiOutcome {
        self.request(Method::GET, path, None).await
    }

    /// Sends a signed request, retrying per the configured policy.
    ///
    /// `path` is signed verbatim, query string included, so it must already
    /// be percent-encoded.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> ApiOutcome {
        let body_bytes = match body.map(serde_json::to_vec).transpose() {
            Ok(bytes) => bytes,
            Err(e) => return ApiOutcome::Transport(format!("failed to encode request body: {e}")),
        };

        let url = self.config.url_for(path);
        let policy = &self.config.retry;
        let mut retry: u32 = 0;

        loop {
            let signed = self.signer().sign(method.as_str(), path, body_bytes.clone());
            debug!(method = %method, path, retry, "sending signed request");

            match self.send(&method, &url, signed).await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if policy.is_retryable(status) && retry < policy.max_retries {
                        retry += 1;
                        let delay = retry_after(&response)
                            .map(|d| d.min(policy.max_backoff()))
                            .unwrap_or_else(|| policy.delay_for(retry));
                        warn!(
                            path,
                            status,
                            retry,
                            delay_ms = delay.as_millis() as u64,
                            "transient status (retrying)"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return classify(path, status, response).await;
                }
                Err(e) => {
                    if retry < policy.max_retries {
                        retry += 1;
                        let delay = policy.delay_for(retry);
                        warn!(path, retry, error = %e, "request failed (retrying)");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    warn!(path, error = %e, "request failed after retries");
                    return ApiOutcome::Transport(e.to_string());
                }
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        signed: SignedRequest,
    ) -> reqwest::Result<Response> {
        let mut builder = self.http.request(method.clone(), url);
        for (name, value) in &signed.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = signed.body {
            builder = builder.body(body);
        }
        builder.send().await
    }
}

async fn classify(path: &str, status: u16, response: Response) -> ApiOutcome {
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return ApiOutcome::Transport(format!("failed to read response body: {e}")),
    };
    let parsed = if bytes.iter().all(u8::is_ascii_whitespace) {
        Ok(Value::Null)
    } else {
        serde_json::from_slice::<Value>(&bytes)
    };

    match status {
        200..=299 => match parsed {
            Ok(body) => ApiOutcome::Success(body),
            Err(e) => {
                warn!(path, error = %e, "response body is not JSON");
                ApiOutcome::Transport(format!("invalid JSON body: {e}"))
            }
        },
        404 => {
            debug!(path, "not found");
            ApiOutcome::NotFound(parsed.ok().filter(|v| !v.is_null()))
        }
        _ => {
            warn!(path, status, "request failed");
            ApiOutcome::Status {
                status,
                body: parsed.ok().filter(|v| !v.is_null()),
            }
        }
    }
}

/// `Retry-After` in whole seconds, if present.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
