//! Usage: Subcommand handlers and the shared invocation context.

pub(crate) mod auth;
pub(crate) mod isrc;
pub(crate) mod playlist;

use crate::app::cli::GlobalArgs;
use crate::gateway::api::{ApiClient, RetryPolicy, DEFAULT_NETWORK_BACKOFF_CAP};
use crate::gateway::http::build_http_client;
use crate::gateway::oauth::{callback_server::parse_loopback_redirect, PkceAuthorizer, TokenStore};
use crate::infra::env_file::resolve_client_id;
use crate::infra::settings::{self, AppSettings};
use crate::shared::error::AppResult;
use std::path::PathBuf;
use std::time::Duration;

/// How a command finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// Progress was persisted but work remains (rate-limit ceiling hit).
    SoftStopped,
}

/// Settings plus command-line overrides, resolved once per invocation.
pub(crate) struct CommandContext {
    settings: AppSettings,
    client_id_flag: Option<String>,
    env_file: Option<PathBuf>,
    open_browser: bool,
    http: reqwest::Client,
}

impl CommandContext {
    pub(crate) fn from_args(global: &GlobalArgs) -> AppResult<Self> {
        let mut settings = settings::load(global.config.as_deref())?;
        if let Some(token) = &global.token {
            settings.token_path = token.clone();
        }
        if let Some(redirect_uri) = &global.redirect_uri {
            settings.redirect_uri = redirect_uri.clone();
        }
        if let Some(throttle_ms) = global.throttle_ms {
            settings.throttle_ms = throttle_ms;
        }
        if let Some(max_retries) = global.max_retries {
            settings.max_retries = max_retries;
        }
        if settings::sanitize(&mut settings) {
            tracing::warn!("command-line values out of range; using clamped values");
        }
        parse_loopback_redirect(&settings.redirect_uri)?;

        Ok(Self {
            settings,
            client_id_flag: global.client_id.clone(),
            env_file: global.env_file.clone(),
            open_browser: !global.no_open_browser,
            http: build_http_client()?,
        })
    }

    pub(crate) fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub(crate) fn client_id(&self) -> AppResult<String> {
        resolve_client_id(self.client_id_flag.as_deref(), self.env_file.as_deref())
    }

    /// Token store with any cached token loaded.
    pub(crate) fn token_store(&self) -> AppResult<TokenStore> {
        self.token_store_for(self.client_id()?)
    }

    pub(crate) fn token_store_for(&self, client_id: String) -> AppResult<TokenStore> {
        let mut store = TokenStore::new(
            self.settings.token_path.clone(),
            client_id,
            self.settings.token_url(),
            self.http.clone(),
        );
        store.load()?;
        Ok(store)
    }

    /// Runs the interactive flow and stores the fresh token.
    pub(crate) async fn authorize(&self, store: &mut TokenStore) -> AppResult<()> {
        let authorizer = PkceAuthorizer::new(self.settings.authorize_url());
        let open_browser = self.open_browser;
        authorizer
            .authorize(
                store,
                &self.settings.redirect_uri,
                &self.settings.scope,
                self.settings.auth_timeout(),
                |url| present_authorize_url(url, open_browser),
            )
            .await?;
        Ok(())
    }

    /// Token store holding a usable token, authorizing first when nothing is cached.
    pub(crate) async fn authorized_store(&self) -> AppResult<TokenStore> {
        let mut store = self.token_store()?;
        if store.current().is_none() {
            tracing::info!("no cached token; starting authorization");
            self.authorize(&mut store).await?;
        } else {
            store.ensure_valid().await?;
        }
        Ok(store)
    }

    pub(crate) fn api_client(&self, store: TokenStore) -> ApiClient {
        let policy = RetryPolicy {
            max_retries: self.settings.max_retries,
            throttle: self.settings.throttle(),
            backoff_cap: self.settings.backoff_cap(),
            network_backoff_cap: DEFAULT_NETWORK_BACKOFF_CAP.min(self.settings.backoff_cap()),
            max_wait: ceiling(self.settings.max_wait_seconds),
        };
        ApiClient::new(self.http.clone(), self.settings.api_base_url.clone(), store)
            .with_policy(policy)
    }

    /// Rate-limit ceiling for this invocation; `0` disables it.
    pub(crate) fn max_wait(&self, override_seconds: Option<u64>) -> Option<Duration> {
        ceiling(override_seconds.unwrap_or(self.settings.max_wait_seconds))
    }
}

fn ceiling(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

fn present_authorize_url(url: &str, open_browser: bool) {
    eprintln!("Open this URL to authorize playlist-relay:\n\n  {url}\n");
    if !open_browser {
        return;
    }
    if let Err(err) = webbrowser::open(url) {
        tracing::warn!("could not open a browser ({err}); open the URL above manually");
    }
}
