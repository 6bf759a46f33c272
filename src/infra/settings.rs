//! Usage: Optional JSON settings file (schema, defaults, sanitization, loading).

use crate::shared::error::{AppError, AppResult};
use crate::shared::fs::read_optional;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SETTINGS_FILE: &str = "playlist-relay.json";
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub const DEFAULT_SCOPE: &str = "playlist-modify-public playlist-modify-private playlist-read-private";
const DEFAULT_AUTH_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_THROTTLE_MS: u64 = 250;
const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_BACKOFF_CAP_SECONDS: u64 = 120;
const DEFAULT_MAX_WAIT_SECONDS: u64 = 600;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_TOKEN_PATH: &str = ".spotify-oauth-token.json";
const DEFAULT_CHECKPOINT_PATH: &str = ".spotify-playlist-checkpoint.json";
const DEFAULT_ISRC_CACHE_PATH: &str = ".spotify-isrc-cache.json";
const MAX_AUTH_TIMEOUT_SECONDS: u64 = 60 * 60;
const MAX_THROTTLE_MS: u64 = 60 * 1000;
const MAX_MAX_RETRIES: u32 = 50;
const MAX_BACKOFF_CAP_SECONDS: u64 = 60 * 60;
const MAX_MAX_WAIT_SECONDS: u64 = 24 * 60 * 60;
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub accounts_base_url: String,
    pub api_base_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_timeout_seconds: u64,
    pub throttle_ms: u64,
    pub max_retries: u32,
    pub backoff_cap_seconds: u64,
    pub max_wait_seconds: u64,
    pub batch_size: usize,
    pub token_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub isrc_cache_path: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            accounts_base_url: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            auth_timeout_seconds: DEFAULT_AUTH_TIMEOUT_SECONDS,
            throttle_ms: DEFAULT_THROTTLE_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_cap_seconds: DEFAULT_BACKOFF_CAP_SECONDS,
            max_wait_seconds: DEFAULT_MAX_WAIT_SECONDS,
            batch_size: DEFAULT_BATCH_SIZE,
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            isrc_cache_path: PathBuf::from(DEFAULT_ISRC_CACHE_PATH),
        }
    }
}

impl AppSettings {
    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts_base_url.trim_end_matches('/'))
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_base_url.trim_end_matches('/'))
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_seconds)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_seconds)
    }
}

fn sanitize_base_urls(settings: &mut AppSettings) -> bool {
    let mut changed = false;

    if settings.accounts_base_url.trim().is_empty() {
        settings.accounts_base_url = DEFAULT_ACCOUNTS_BASE_URL.to_string();
        changed = true;
    }
    if settings.api_base_url.trim().is_empty() {
        settings.api_base_url = DEFAULT_API_BASE_URL.to_string();
        changed = true;
    }
    if settings.redirect_uri.trim().is_empty() {
        settings.redirect_uri = DEFAULT_REDIRECT_URI.to_string();
        changed = true;
    }
    if settings.scope.trim().is_empty() {
        settings.scope = DEFAULT_SCOPE.to_string();
        changed = true;
    }

    changed
}

fn sanitize_auth_timeout(settings: &mut AppSettings) -> bool {
    let mut changed = false;

    if settings.auth_timeout_seconds == 0 {
        settings.auth_timeout_seconds = DEFAULT_AUTH_TIMEOUT_SECONDS;
        changed = true;
    }
    if settings.auth_timeout_seconds > MAX_AUTH_TIMEOUT_SECONDS {
        settings.auth_timeout_seconds = MAX_AUTH_TIMEOUT_SECONDS;
        changed = true;
    }

    changed
}

fn sanitize_retry_settings(settings: &mut AppSettings) -> bool {
    let mut changed = false;

    if settings.throttle_ms > MAX_THROTTLE_MS {
        settings.throttle_ms = MAX_THROTTLE_MS;
        changed = true;
    }
    if settings.max_retries > MAX_MAX_RETRIES {
        settings.max_retries = MAX_MAX_RETRIES;
        changed = true;
    }
    if settings.backoff_cap_seconds == 0 {
        settings.backoff_cap_seconds = DEFAULT_BACKOFF_CAP_SECONDS;
        changed = true;
    }
    if settings.backoff_cap_seconds > MAX_BACKOFF_CAP_SECONDS {
        settings.backoff_cap_seconds = MAX_BACKOFF_CAP_SECONDS;
        changed = true;
    }
    if settings.max_wait_seconds > MAX_MAX_WAIT_SECONDS {
        settings.max_wait_seconds = MAX_MAX_WAIT_SECONDS;
        changed = true;
    }

    changed
}

fn sanitize_batch_size(settings: &mut AppSettings) -> bool {
    if settings.batch_size == 0 {
        settings.batch_size = DEFAULT_BATCH_SIZE;
        return true;
    }
    if settings.batch_size > MAX_BATCH_SIZE {
        settings.batch_size = MAX_BATCH_SIZE;
        return true;
    }
    false
}

pub(crate) fn sanitize(settings: &mut AppSettings) -> bool {
    let mut repaired = false;
    repaired |= sanitize_base_urls(settings);
    repaired |= sanitize_auth_timeout(settings);
    repaired |= sanitize_retry_settings(settings);
    repaired |= sanitize_batch_size(settings);
    repaired
}

fn parse_settings_json(content: &str, path: &Path) -> AppResult<AppSettings> {
    serde_json::from_str(content)
        .map_err(|e| AppError::Config(format!("invalid settings file {}: {e}", path.display())))
}

/// Loads settings from `explicit` (must exist) or the default file (optional).
pub fn load(explicit: Option<&Path>) -> AppResult<AppSettings> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };

    let Some(content) = read_optional(&path)? else {
        if required {
            return Err(AppError::Config(format!(
                "settings file not found: {}",
                path.display()
            )));
        }
        return Ok(AppSettings::default());
    };

    let mut settings = parse_settings_json(&content, &path)?;
    if sanitize(&mut settings) {
        tracing::warn!(path = %path.display(), "settings contained out-of-range values; using clamped values");
    }
    tracing::debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}
