//! Usage: Persisted access/refresh token pair with transparent renewal.

use super::token_exchange::{refresh_access_token, TokenRefreshRequest, TokenResponse};
use crate::shared::error::{AppError, AppResult};
use crate::shared::fs::{read_optional, write_json_atomic};
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_seconds_f64;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TOKEN_SKEW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix epoch seconds.
    #[serde(default)]
    pub expires_at: f64,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }

    /// Usable iff complete and `now < expires_at - skew`.
    pub fn is_usable_at(&self, now: f64, skew: Duration) -> bool {
        self.is_complete() && now < self.expires_at - skew.as_secs_f64()
    }

    pub fn seconds_until_expiry(&self, now: f64) -> f64 {
        self.expires_at - now
    }

    /// Builds a token from an endpoint response; `previous` supplies the refresh token and
    /// scope when the server omits them.
    pub(crate) fn from_response(
        response: &TokenResponse,
        previous: Option<&OAuthToken>,
        now: f64,
    ) -> Option<Self> {
        let access_token = response.access_token()?.to_string();
        let refresh_token = response
            .refresh_token()
            .map(str::to_string)
            .or_else(|| previous.map(|t| t.refresh_token.clone()))
            .unwrap_or_default();
        let scope = response
            .scope
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| previous.map(|t| t.scope.clone()))
            .unwrap_or_default();
        let token_type = response
            .token_type
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_token_type);

        Some(Self {
            access_token,
            refresh_token,
            expires_at: now + response.expires_in_secs(),
            scope,
            token_type,
        })
    }
}

/// Owns the token file exclusively. Every change is a whole-file atomic overwrite.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    client_id: String,
    token_url: String,
    http: reqwest::Client,
    skew: Duration,
    token: Option<OAuthToken>,
}

impl TokenStore {
    pub fn new(
        path: impl Into<PathBuf>,
        client_id: impl Into<String>,
        token_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            path: path.into(),
            client_id: client_id.into(),
            token_url: token_url.into(),
            http,
            skew: DEFAULT_TOKEN_SKEW,
            token: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn current(&self) -> Option<&OAuthToken> {
        self.token.as_ref()
    }

    /// Reads the token file. Missing, unreadable JSON, or incomplete tokens all yield `None`.
    pub fn load(&mut self) -> AppResult<Option<OAuthToken>> {
        let Some(text) = read_optional(&self.path)? else {
            self.token = None;
            return Ok(None);
        };

        let token = match serde_json::from_str::<OAuthToken>(&text) {
            Ok(token) if token.is_complete() => Some(token),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "stored token is incomplete; ignoring it");
                None
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "stored token is not valid json: {err}");
                None
            }
        };
        self.token = token.clone();
        Ok(token)
    }

    pub fn save(&mut self, token: OAuthToken) -> AppResult<()> {
        write_json_atomic(&self.path, &token)?;
        tracing::debug!(
            access_token = %mask_token(&token.access_token),
            expires_at = token.expires_at,
            "token persisted"
        );
        self.token = Some(token);
        Ok(())
    }

    /// Returns a token that stays usable for at least the configured skew, refreshing when needed.
    pub async fn ensure_valid(&mut self) -> AppResult<OAuthToken> {
        if self.token.is_none() {
            self.load()?;
        }
        let Some(token) = self.token.clone() else {
            return Err(AppError::TokenRefreshFailed(
                "no stored token to refresh; run `auth login` first".to_string(),
            ));
        };

        if token.is_usable_at(now_unix_seconds_f64(), self.skew) {
            return Ok(token);
        }
        tracing::debug!("access token expired or about to expire; refreshing");
        self.refresh(&token).await
    }

    /// Runs the refresh_token grant and persists the result.
    pub async fn refresh(&mut self, token: &OAuthToken) -> AppResult<OAuthToken> {
        if token.refresh_token.trim().is_empty() {
            return Err(AppError::TokenRefreshFailed(
                "stored token has no refresh_token".to_string(),
            ));
        }

        let request = TokenRefreshRequest {
            token_url: self.token_url.clone(),
            client_id: self.client_id.clone(),
            refresh_token: token.refresh_token.clone(),
        };
        let response = refresh_access_token(&self.http, &request).await?;
        let refreshed = OAuthToken::from_response(&response, Some(token), now_unix_seconds_f64())
            .ok_or_else(|| {
                AppError::TokenRefreshFailed("token response missing access_token".to_string())
            })?;

        self.save(refreshed.clone())?;
        tracing::info!("access token refreshed");
        Ok(refreshed)
    }

    /// Refreshes regardless of the cached expiry.
    pub async fn force_refresh(&mut self) -> AppResult<OAuthToken> {
        if self.token.is_none() {
            self.load()?;
        }
        let Some(token) = self.token.clone() else {
            return Err(AppError::TokenRefreshFailed(
                "no stored token to refresh; run `auth login` first".to_string(),
            ));
        };
        self.refresh(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: f64) -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            scope: "playlist-modify-private".to_string(),
            token_type: "Bearer".to_string(),
        }
    }

    #[test]
    fn usability_honours_skew() {
        let skew = Duration::from_secs(30);
        assert!(token(1_000.0).is_usable_at(969.0, skew));
        assert!(!token(1_000.0).is_usable_at(970.0, skew));
        assert!(!token(1_000.0).is_usable_at(1_001.0, skew));
        assert!(token(1_000.0).is_usable_at(999.0, Duration::ZERO));
    }

    #[test]
    fn incomplete_tokens_are_never_usable() {
        let mut t = token(f64::MAX);
        t.refresh_token.clear();
        assert!(!t.is_usable_at(0.0, Duration::ZERO));
    }

    #[test]
    fn response_without_refresh_token_keeps_previous_one() {
        let previous = token(0.0);
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","expires_in":60}"#).expect("json");
        let next = OAuthToken::from_response(&response, Some(&previous), 100.0).expect("token");
        assert_eq!(next.access_token, "new");
        assert_eq!(next.refresh_token, "refresh");
        assert_eq!(next.scope, "playlist-modify-private");
        assert_eq!(next.expires_at, 160.0);
    }

    #[test]
    fn issued_refresh_token_supersedes_previous_one() {
        let previous = token(0.0);
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"new","refresh_token":"rotated","token_type":"bearer"}"#,
        )
        .expect("json");
        let next = OAuthToken::from_response(&response, Some(&previous), 0.0).expect("token");
        assert_eq!(next.refresh_token, "rotated");
        assert_eq!(next.token_type, "bearer");
        assert_eq!(next.expires_at, 3600.0);
    }

    #[test]
    fn load_treats_missing_and_incomplete_files_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        let mut store = TokenStore::new(&path, "cid", "http://127.0.0.1:1/api/token", reqwest::Client::new());

        assert_eq!(store.load().expect("load"), None);

        std::fs::write(&path, r#"{"access_token":"a","refresh_token":"","expires_at":1}"#)
            .expect("write");
        assert_eq!(store.load().expect("load"), None);

        std::fs::write(&path, "not json").expect("write");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        let mut store = TokenStore::new(&path, "cid", "http://127.0.0.1:1/api/token", reqwest::Client::new());
        store.save(token(42.5)).expect("save");

        let mut reopened = TokenStore::new(&path, "cid", "http://127.0.0.1:1/api/token", reqwest::Client::new());
        assert_eq!(reopened.load().expect("load"), Some(token(42.5)));
    }

    #[tokio::test]
    async fn ensure_valid_without_token_fails_with_refresh_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = TokenStore::new(
            dir.path().join("token.json"),
            "cid",
            "http://127.0.0.1:1/api/token",
            reqwest::Client::new(),
        );
        let err = store.ensure_valid().await.expect_err("no token");
        assert_eq!(err.code(), "AUTH_REFRESH_FAILED");
    }
}
