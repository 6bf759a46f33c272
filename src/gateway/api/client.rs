//! Usage: Bearer-authorized JSON API client with throttling, token refresh, and retry/backoff.

use super::pacing::{JitterSource, RandomJitter, Sleeper, TokioSleeper};
use super::retry::{decide, parse_retry_after, AttemptDecision, AttemptFailure, RetryPolicy};
use crate::gateway::oauth::TokenStore;
use crate::shared::error::{AppError, AppResult};
use crate::shared::security::sanitize_error_body_snippet;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: TokenStore,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn JitterSource>,
    last_request_at: Option<Instant>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, store: TokenStore) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
            last_request_at: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn set_max_wait(&mut self, max_wait: Option<Duration>) {
        self.policy.max_wait = max_wait;
    }

    /// Issues one logical call, retrying per the policy. An empty 2xx body yields `{}`.
    pub async fn call(
        &mut self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let encoded_body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| AppError::InvalidInput(format!("request body is not serializable: {e}")))?;

        let mut refreshed = false;
        let mut attempt: u32 = 0;
        loop {
            let token = self.store.ensure_valid().await?;
            self.pace().await;

            let failure = match self
                .send_once(&method, &url, query, encoded_body.as_deref(), &token.access_token)
                .await
            {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let jitter = self.jitter.next_jitter();
            match decide(&failure, attempt, &self.policy, refreshed, jitter) {
                AttemptDecision::RefreshToken => {
                    tracing::warn!(%method, path, "HTTP 401 from API; refreshing token and retrying");
                    self.store.force_refresh().await?;
                    refreshed = true;
                }
                AttemptDecision::Retry { delay } => {
                    tracing::warn!(
                        %method,
                        path,
                        attempt,
                        "{} from API; retrying in {:.1}s",
                        failure.label(),
                        delay.as_secs_f64()
                    );
                    self.sleeper.sleep(delay).await;
                }
                AttemptDecision::SoftStop { wait } => {
                    tracing::warn!(
                        %method,
                        path,
                        "rate limited; server asked to wait {:.1}s which exceeds the ceiling",
                        wait.as_secs_f64()
                    );
                    return Err(AppError::RateLimitExceeded {
                        wait_seconds: wait.as_secs_f64(),
                    });
                }
                AttemptDecision::Fatal => return Err(failure.into_error()),
            }
            attempt += 1;
        }
    }

    /// Like [`ApiClient::call`], decoding the body into an endpoint-specific type.
    pub async fn call_typed<T: DeserializeOwned>(
        &mut self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> AppResult<T> {
        let value = self.call(method.clone(), path, query, body).await?;
        serde_json::from_value(value).map_err(|e| {
            AppError::MalformedResponse(format!("unexpected response shape for {method} {path}: {e}"))
        })
    }

    async fn pace(&mut self) {
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < self.policy.throttle {
                self.sleeper.sleep(self.policy.throttle - elapsed).await;
            }
        }
        self.last_request_at = Some(Instant::now());
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&[u8]>,
        access_token: &str,
    ) -> Result<Value, AttemptFailure> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptFailure::Network(format!("request failed: {e}")))?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = response
            .text()
            .await
            .map_err(|e| AttemptFailure::Network(format!("response read failed: {e}")))?;

        if !status.is_success() {
            return Err(AttemptFailure::Http {
                status: status.as_u16(),
                retry_after,
                message: sanitize_error_body_snippet(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|e| AttemptFailure::Malformed(format!("response json invalid: {e}")))
    }
}
