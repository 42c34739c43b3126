use crate::http::error::HttpError;
use crate::http::transport::{ApiRequest, ReqwestTransport, Transport};
use bon::Builder;
use log::warn;
use serde_json::Value;
use std::time::Duration;

/// Bounded retry with a linearly growing delay (`backoff × attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct RetryPolicy {
    #[builder(default = 3)]
    pub max_retries: u32,
    #[builder(default = Duration::from_millis(1500))]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// JSON GET client that retries every failure, including 404 and 429, and hands
/// the last error back untouched so callers can branch on its status.
#[derive(Debug, Clone)]
pub struct RetryingClient<T = ReqwestTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub async fn get(&self, request: &ApiRequest) -> Result<Value, HttpError> {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.get_json(request).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "Request error for {} (attempt {}/{}): {}",
                        request.url, attempt, attempts, e
                    );
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedTransport;
    use reqwest::StatusCode;
    use serde_json::json;

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .backoff(Duration::ZERO)
            .build()
    }

    #[tokio::test]
    async fn returns_body_after_transient_failures() {
        let transport = ScriptedTransport::new();
        transport
            .fail(StatusCode::BAD_GATEWAY)
            .fail(StatusCode::SERVICE_UNAVAILABLE)
            .respond(json!({"ok": true}));
        let client = RetryingClient::new(transport.clone(), instant_policy(3));

        let body = client.get(&ApiRequest::new("https://example.test")).await;

        assert_eq!(body.unwrap(), json!({"ok": true}));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn final_error_keeps_its_status() {
        let transport = ScriptedTransport::new();
        transport
            .fail(StatusCode::NOT_FOUND)
            .fail(StatusCode::NOT_FOUND)
            .fail(StatusCode::NOT_FOUND);
        let client = RetryingClient::new(transport.clone(), instant_policy(3));

        let err = client
            .get(&ApiRequest::new("https://example.test"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn zero_retries_still_makes_one_attempt() {
        let transport = ScriptedTransport::new();
        transport.respond(json!([]));
        let client = RetryingClient::new(transport.clone(), instant_policy(0));

        assert!(client.get(&ApiRequest::new("https://example.test")).await.is_ok());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn default_policy_matches_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff, Duration::from_millis(1500));
    }
}
