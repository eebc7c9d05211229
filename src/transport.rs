//! HTTP transport with bounded exponential-backoff retry.
//!
//! Everything that talks to the network goes through the [`Transport`] trait so
//! the fetcher and the list store can be exercised without sockets.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::SecureString;
use crate::error::SyncError;

const TIMEOUT_SECS: u64 = 30;

/// Largest response body accepted (10 MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Bytes of an error response body kept in the failure message
const ERROR_EXCERPT_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A single outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<SecureString>,
    pub json: Option<serde_json::Value>,
    /// Extra headers, validated by the caller
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer: None,
            json: None,
            headers: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: None,
            json: Some(body),
            headers: Vec::new(),
        }
    }

    pub fn put(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Put,
            url: url.into(),
            bearer: None,
            json: Some(body),
            headers: Vec::new(),
        }
    }

    pub fn bearer(mut self, token: SecureString) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the declared content type is JSON (`application/json`, `+json`)
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false)
    }
}

/// "Fetch with retry" capability.
///
/// Implementations only return `Ok` for 2xx responses; anything else after the
/// retry budget is exhausted is a [`SyncError::Transport`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SyncError>;
}

/// Retry policy: `attempts` tries, waiting `base_delay * 2^(n-1)` before try `n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given zero-based attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    pub fn new(retry: RetryPolicy) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("relaysync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, retry })
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    async fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            // The body usually says why (e.g. a `success: false` envelope)
            let body = response.text().await.unwrap_or_default();
            let excerpt = error_excerpt(&body);
            if excerpt.is_empty() {
                return Err(format!("HTTP {}", status));
            }
            return Err(format!("HTTP {}: {}", status, excerpt));
        }

        if let Some(content_length) = response.content_length() {
            if content_length as usize > MAX_RESPONSE_SIZE {
                return Err(format!(
                    "Response too large: {} bytes (max: {} bytes)",
                    content_length, MAX_RESPONSE_SIZE
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;
        if body.len() > MAX_RESPONSE_SIZE {
            return Err(format!(
                "Downloaded content too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_RESPONSE_SIZE
            ));
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Trimmed prefix of an error body, cut on a char boundary
fn error_excerpt(body: &str) -> &str {
    let body = body.trim();
    if body.len() <= ERROR_EXCERPT_LEN {
        return body;
    }
    let mut end = ERROR_EXCERPT_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        let mut last_error = None;

        for attempt in 0..self.retry.attempts.max(1) {
            if attempt > 0 {
                let delay = self.retry.delay_before(attempt);
                debug!("Retry {} after {:?} for {}", attempt, delay, request.url);
                tokio::time::sleep(delay).await;
            }

            match self.execute_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    debug!("{:?} {} failed: {}", request.method, request.url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(SyncError::Transport(format!(
            "{:?} {} failed after {} attempt(s): {}",
            request.method,
            request.url,
            self.retry.attempts.max(1),
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}
