//! Usage: Resilient JSON API client (throttle, refresh-on-401, backoff on 429/5xx).

pub(crate) mod client;
pub(crate) mod pacing;
pub(crate) mod retry;

pub use client::ApiClient;
pub use pacing::{JitterSource, RandomJitter, SleepFuture, Sleeper, TokioSleeper};
pub use retry::{RetryPolicy, DEFAULT_NETWORK_BACKOFF_CAP};
