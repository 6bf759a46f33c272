//! Usage: Public test helpers for integration tests.

use crate::gateway::api::{JitterSource, SleepFuture, Sleeper};
use crate::gateway::oauth::{OAuthToken, TokenStore};
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds_f64;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records requested sleeps and returns immediately.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        if let Ok(mut guard) = self.sleeps.lock() {
            guard.push(duration);
        }
        Box::pin(async {})
    }
}

/// Always returns the same multiplier.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn next_jitter(&self) -> f64 {
        self.0
    }
}

/// Token valid for `valid_for` from now.
pub fn token_valid_for(access_token: &str, refresh_token: &str, valid_for: Duration) -> OAuthToken {
    OAuthToken {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at: now_unix_seconds_f64() + valid_for.as_secs_f64(),
        scope: "playlist-modify-public".to_string(),
        token_type: "Bearer".to_string(),
    }
}

/// Token store at `path` already holding `token` (written to disk).
pub fn seeded_token_store(
    path: impl Into<PathBuf>,
    token_url: &str,
    token: OAuthToken,
) -> AppResult<TokenStore> {
    let mut store = TokenStore::new(
        path.into(),
        "test-client",
        token_url,
        http_client()?,
    );
    store.save(token)?;
    Ok(store)
}

/// Client for loopback mock servers; ignores proxy environment variables.
pub fn http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| format!("SYSTEM_ERROR: test http client init failed: {e}").into())
}
