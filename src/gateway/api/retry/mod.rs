//! Usage: Retry policy and per-attempt decisions for API calls.

use crate::shared::error::AppError;
use std::time::Duration;


pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(250);
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(120);
pub const DEFAULT_NETWORK_BACKOFF_CAP: Duration = Duration::from_secs(60);
const BACKOFF_BASE_SECS: f64 = 1.0;
// 2^20 s already exceeds any sane cap; keeps `powi` finite.
const MAX_BACKOFF_EXPONENT: u32 = 20;

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. A forced token refresh also spends one.
    pub max_retries: u32,
    /// Minimum spacing between consecutive requests.
    pub throttle: Duration,
    /// Backoff ceiling for 429/5xx responses.
    pub backoff_cap: Duration,
    /// Backoff ceiling for network failures and malformed bodies.
    pub network_backoff_cap: Duration,
    /// A 429 whose computed wait exceeds this aborts with `RateLimitExceeded`.
    pub max_wait: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            throttle: DEFAULT_THROTTLE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            network_backoff_cap: DEFAULT_NETWORK_BACKOFF_CAP,
            max_wait: None,
        }
    }
}

/// What went wrong on one attempt.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttemptFailure {
    Http {
        status: u16,
        retry_after: Option<Duration>,
        message: String,
    },
    Network(String),
    Malformed(String),
}

impl AttemptFailure {
    pub(crate) fn into_error(self) -> AppError {
        match self {
            AttemptFailure::Http { status: 401, .. } => AppError::Unauthorized,
            AttemptFailure::Http {
                status, message, ..
            } if is_retryable_status(status) => AppError::TransientServerError {
                status: Some(status),
                message,
            },
            AttemptFailure::Http {
                status, message, ..
            } => AppError::ApiRejected { status, message },
            AttemptFailure::Network(message) => AppError::TransientServerError {
                status: None,
                message,
            },
            AttemptFailure::Malformed(message) => AppError::MalformedResponse(message),
        }
    }

    pub(crate) fn label(&self) -> String {
        match self {
            AttemptFailure::Http { status, .. } => format!("HTTP {status}"),
            AttemptFailure::Network(_) => "network error".to_string(),
            AttemptFailure::Malformed(_) => "malformed response".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AttemptDecision {
    RefreshToken,
    Retry { delay: Duration },
    SoftStop { wait: Duration },
    Fatal,
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// `min(cap, base * 2^attempt * jitter)`.
pub(crate) fn backoff_delay(attempt: u32, cap: Duration, jitter: f64) -> Duration {
    let exponent = attempt.min(MAX_BACKOFF_EXPONENT) as i32;
    let raw = BACKOFF_BASE_SECS * 2f64.powi(exponent) * jitter;
    let cap_secs = cap.as_secs_f64();
    let secs = if raw.is_finite() { raw.min(cap_secs) } else { cap_secs };
    Duration::from_secs_f64(secs.max(0.0))
}

/// Parses a delta-seconds `Retry-After` value.
pub(crate) fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    // Saturate so an absurd value still lands above any ceiling.
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

/// Chooses the next step after a failed attempt.
///
/// `attempt` is 0-indexed; retries remain while `attempt < policy.max_retries`.
/// `refreshed` is true once this call has already forced a token refresh.
pub(crate) fn decide(
    failure: &AttemptFailure,
    attempt: u32,
    policy: &RetryPolicy,
    refreshed: bool,
    jitter: f64,
) -> AttemptDecision {
    let attempts_remain = attempt < policy.max_retries;

    match failure {
        AttemptFailure::Http { status: 401, .. } => {
            if !refreshed && attempts_remain {
                AttemptDecision::RefreshToken
            } else {
                AttemptDecision::Fatal
            }
        }
        AttemptFailure::Http {
            status,
            retry_after,
            ..
        } if is_retryable_status(*status) => {
            let mut delay = backoff_delay(attempt, policy.backoff_cap, jitter);
            if let Some(retry_after) = retry_after {
                delay = delay.max(*retry_after);
            }
            if *status == 429 && policy.max_wait.is_some_and(|ceiling| delay > ceiling) {
                return AttemptDecision::SoftStop { wait: delay };
            }
            if attempts_remain {
                AttemptDecision::Retry { delay }
            } else {
                AttemptDecision::Fatal
            }
        }
        AttemptFailure::Http { .. } => AttemptDecision::Fatal,
        AttemptFailure::Network(_) | AttemptFailure::Malformed(_) => {
            if attempts_remain {
                AttemptDecision::Retry {
                    delay: backoff_delay(attempt, policy.network_backoff_cap, jitter),
                }
            } else {
                AttemptDecision::Fatal
            }
        }
    }
}
