//! Resilient HTTP client for the Mangia backend
//!
//! Every network call in the crate goes through [`ApiClient`]: one
//! logical request with a bounded per-attempt timeout and a bounded
//! number of retries. Only network-level failures (timeout, connection)
//! are retried; once the server answers, even with an error status, the
//! outcome is final and surfaced as-is.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::Config;

/// Timeout and retry budget for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Budget for a single attempt; an attempt exceeding it is cancelled.
    pub timeout: Duration,
    /// Retries after the first attempt, so at most `max_retries + 1`
    /// attempts total.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    /// A policy that never retries, for calls where a quick answer
    /// matters more than resilience.
    pub fn no_retries(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Per-request knobs on top of the client defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Overrides the client's default policy when set.
    pub policy: Option<RetryPolicy>,
    /// Attach the configured bearer token, if there is one.
    pub with_auth: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Timeouts and connection failures may succeed on a later attempt;
    /// everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Timeout(_) | ApiError::Connection(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http { status: 404, .. })
    }
}

/// Error-body convention: a JSON object carrying `detail` or `message`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail.or(b.message))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()))
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET with the default policy, no auth.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await
    }

    /// POST with the default policy, no auth.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    /// Liveness probe against `GET /health`. Failures of any kind map to
    /// `false`; a quick 3s single attempt, never retried.
    pub async fn health(&self) -> bool {
        let options = RequestOptions {
            policy: Some(RetryPolicy::no_retries(Duration::from_secs(3))),
            with_auth: false,
        };
        self.request::<Value>(Method::GET, "/health", None, options)
            .await
            .is_ok()
    }

    /// Execute one logical request.
    ///
    /// Mutating requests carry an `Idempotency-Key` header generated
    /// once per logical request and reused on every retry, so a server
    /// that deduplicates can drop replays. Without server-side
    /// deduplication a retry after a timeout on the response path can
    /// still apply the mutation twice; the client cannot rule that out.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let policy = options.policy.unwrap_or(self.policy);
        let url = format!("{}{}", self.base_url, path);
        let idempotency_key =
            (method != Method::GET).then(|| Uuid::new_v4().to_string());

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let mut builder = self.client.request(method.clone(), &url);
            if options.with_auth {
                if let Some(ref token) = self.auth_token {
                    builder = builder.bearer_auth(token);
                }
            }
            if let Some(ref key) = idempotency_key {
                builder = builder.header("Idempotency-Key", key);
            }
            if let Some(ref body) = body {
                builder = builder.json(body);
            }

            // The timeout bounds the attempt; dropping the future on
            // expiry cancels the in-flight call.
            let error = match tokio::time::timeout(policy.timeout, builder.send()).await {
                Ok(Ok(response)) => return Self::read_response(response).await,
                Ok(Err(e)) => ApiError::Connection(e),
                Err(_) => ApiError::Timeout(policy.timeout),
            };

            if attempt > policy.max_retries {
                tracing::error!(%method, %url, attempt, %error, "request failed");
                return Err(error);
            }

            tracing::warn!(
                %method,
                %url,
                attempt,
                remaining = policy.max_retries - attempt + 1,
                %error,
                "retrying request"
            );
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await.map_err(ApiError::Connection)?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_detail() {
        let msg = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "No messages provided"}"#,
        );
        assert_eq!(msg, "No messages provided");
    }

    #[test]
    fn test_error_message_prefers_detail_over_message() {
        let msg = error_message(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "from detail", "message": "from message"}"#,
        );
        assert_eq!(msg, "from detail");
    }

    #[test]
    fn test_error_message_falls_back_to_message() {
        let msg = error_message(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message": "boom"}"#,
        );
        assert_eq!(msg, "boom");
    }

    #[test]
    fn test_error_message_generic_fallback() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "not json"),
            "HTTP error! status: 502"
        );
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, "{}"),
            "HTTP error! status: 404"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Timeout(Duration::from_secs(1)).is_retryable());
        let http = ApiError::Http {
            status: 500,
            message: "server error".into(),
        };
        assert!(!http.is_retryable());
        assert!(!http.is_not_found());
        let not_found = ApiError::Http {
            status: 404,
            message: "Order not found".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_policy_from_config() {
        let config = Config::default();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = Config {
            api_url: "http://localhost:8000/".into(),
            ..Config::default()
        };
        let client = ApiClient::new(&config);
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
