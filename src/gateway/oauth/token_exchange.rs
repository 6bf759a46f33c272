//! Usage: OAuth token endpoint helpers (authorization_code + refresh_token grants).

use crate::shared::error::{AppError, AppResult};
use crate::shared::security::sanitize_error_body_snippet;
use serde::Deserialize;
use std::collections::HashMap;

const DEFAULT_EXPIRES_IN_SECS: f64 = 3600.0;

#[derive(Debug, Clone)]
pub(crate) struct TokenExchangeRequest {
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) code: String,
    pub(crate) redirect_uri: String,
    pub(crate) code_verifier: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenRefreshRequest {
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) refresh_token: String,
}

/// Token endpoint response body. Only `access_token` is mandatory.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub(crate) access_token: Option<String>,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde(default)]
    pub(crate) expires_in: Option<f64>,
    #[serde(default)]
    pub(crate) scope: Option<String>,
    #[serde(default)]
    pub(crate) token_type: Option<String>,
}

impl TokenResponse {
    pub(crate) fn expires_in_secs(&self) -> f64 {
        self.expires_in
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        non_empty(self.access_token.as_deref())
    }

    pub(crate) fn refresh_token(&self) -> Option<&str> {
        non_empty(self.refresh_token.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    fn error(self, message: String) -> AppError {
        match self {
            Grant::AuthorizationCode => AppError::TokenExchangeFailed(message),
            Grant::RefreshToken => AppError::TokenRefreshFailed(message),
        }
    }
}

/// Exchanges an authorization code; both an access and a refresh token are required.
pub(crate) async fn exchange_authorization_code(
    client: &reqwest::Client,
    req: &TokenExchangeRequest,
) -> AppResult<TokenResponse> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "authorization_code".to_string());
    form.insert("code", req.code.trim().to_string());
    form.insert("redirect_uri", req.redirect_uri.trim().to_string());
    form.insert("client_id", req.client_id.trim().to_string());
    form.insert("code_verifier", req.code_verifier.trim().to_string());

    let token = post_token_form(client, &req.token_url, &form, Grant::AuthorizationCode).await?;
    if token.refresh_token().is_none() {
        return Err(AppError::TokenExchangeFailed(
            "token response missing refresh_token".to_string(),
        ));
    }
    Ok(token)
}

pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    req: &TokenRefreshRequest,
) -> AppResult<TokenResponse> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "refresh_token".to_string());
    form.insert("refresh_token", req.refresh_token.trim().to_string());
    form.insert("client_id", req.client_id.trim().to_string());

    post_token_form(client, &req.token_url, &form, Grant::RefreshToken).await
}

async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    form: &HashMap<&str, String>,
    grant: Grant,
) -> AppResult<TokenResponse> {
    let response = client
        .post(token_url.trim())
        .form(form)
        .send()
        .await
        .map_err(|e| grant.error(format!("token request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| grant.error(format!("token response read failed: {e}")))?;

    if !status.is_success() {
        return Err(grant.error(format!(
            "token endpoint returned status={} body={}",
            status.as_u16(),
            sanitize_error_body_snippet(&body)
        )));
    }

    parse_token_body(&body, grant)
}

fn parse_token_body(body: &str, grant: Grant) -> AppResult<TokenResponse> {
    let token: TokenResponse = serde_json::from_str(body)
        .map_err(|e| grant.error(format!("token response json invalid: {e}")))?;
    if token.access_token().is_none() {
        return Err(grant.error("token response missing access_token".to_string()));
    }
    Ok(token)
}
