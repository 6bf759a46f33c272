//! Usage: Interactive authorization-code + PKCE flow through a loopback redirect listener.

use super::callback_server::{CallbackListener, OAuthCallbackPayload};
use super::pkce::AuthorizationRequest;
use super::token_exchange::{exchange_authorization_code, TokenExchangeRequest};
use super::token_store::{OAuthToken, TokenStore};
use crate::shared::error::{AppError, AppResult};
use crate::shared::security::constant_time_eq;
use crate::shared::time::now_unix_seconds_f64;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

const MAX_POLL_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PkceAuthorizer {
    authorize_url: String,
}

impl PkceAuthorizer {
    pub fn new(authorize_url: impl Into<String>) -> Self {
        Self {
            authorize_url: authorize_url.into(),
        }
    }

    /// Runs one authorization attempt and persists the granted token through `store`.
    ///
    /// `present` receives the authorization URL once the listener is bound. The listener is
    /// released before this returns, whatever the outcome.
    pub async fn authorize<P>(
        &self,
        store: &mut TokenStore,
        redirect_uri: &str,
        scope: &str,
        timeout: Duration,
        present: P,
    ) -> AppResult<OAuthToken>
    where
        P: FnOnce(&str),
    {
        let client_id = store.client_id().trim().to_string();
        if client_id.is_empty() {
            return Err(AppError::InvalidInput("client_id is required".to_string()));
        }

        let mut listener = CallbackListener::bind(redirect_uri).await?;
        let request = AuthorizationRequest::new(listener.redirect_uri());
        let authorize_url = build_authorize_url(&self.authorize_url, &client_id, &request, scope)?;

        present(&authorize_url);
        tracing::info!(
            redirect_uri = %request.redirect_uri,
            port = listener.port(),
            "waiting for authorization callback"
        );

        let waited = wait_for_callback(&mut listener, &request.state, timeout).await;
        drop(listener);
        let code = waited?;

        let exchange = TokenExchangeRequest {
            token_url: store.token_url().to_string(),
            client_id,
            code,
            redirect_uri: request.redirect_uri.clone(),
            code_verifier: request.pkce.code_verifier.clone(),
        };
        let response = exchange_authorization_code(store.http(), &exchange).await?;
        let mut token = OAuthToken::from_response(&response, None, now_unix_seconds_f64())
            .filter(OAuthToken::is_complete)
            .ok_or_else(|| {
                AppError::TokenExchangeFailed(
                    "token response must carry both access_token and refresh_token".to_string(),
                )
            })?;
        if token.scope.trim().is_empty() {
            token.scope = scope.to_string();
        }

        store.save(token.clone())?;
        tracing::info!(path = %store.path().display(), "authorization complete; token saved");
        Ok(token)
    }
}

pub(crate) fn build_authorize_url(
    authorize_url: &str,
    client_id: &str,
    request: &AuthorizationRequest,
    scope: &str,
) -> AppResult<String> {
    let mut url = Url::parse(authorize_url.trim())
        .map_err(|e| AppError::Config(format!("invalid authorize url: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", client_id);
        query.append_pair("response_type", "code");
        query.append_pair("redirect_uri", &request.redirect_uri);
        query.append_pair("code_challenge_method", "S256");
        query.append_pair("code_challenge", &request.pkce.code_challenge);
        query.append_pair("state", &request.state);
        query.append_pair("scope", scope);
        query.append_pair("show_dialog", "false");
    }
    Ok(url.to_string())
}

/// Polls until a callback carrying `code` arrives, the deadline passes, or validation fails.
async fn wait_for_callback(
    listener: &mut CallbackListener,
    expected_state: &str,
    timeout: Duration,
) -> AppResult<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(AppError::AuthorizationTimeout {
                timeout_secs: timeout.as_secs(),
            });
        }

        if let Some(payload) = listener.poll(remaining.min(MAX_POLL_WAIT)).await? {
            return validate_callback(payload, expected_state);
        }
    }
}

fn validate_callback(payload: OAuthCallbackPayload, expected_state: &str) -> AppResult<String> {
    let state_matches = payload
        .state
        .as_deref()
        .is_some_and(|state| constant_time_eq(state.as_bytes(), expected_state.as_bytes()));
    if !state_matches {
        return Err(AppError::StateMismatch);
    }

    if let Some(error) = payload.error {
        let detail = match payload.error_description {
            Some(description) if !description.is_empty() => format!("{error} ({description})"),
            _ => error,
        };
        return Err(AppError::AuthorizationDenied(detail));
    }

    payload
        .code
        .ok_or_else(|| AppError::TokenExchangeFailed("callback carried no code".to_string()))
}
