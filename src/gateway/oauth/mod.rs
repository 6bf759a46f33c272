//! Usage: OAuth flow helpers for interactive login, token exchange, and refresh.
//!
//! Only the authorization_code (with PKCE) and refresh_token grants are supported.

pub(crate) mod authorizer;
pub(crate) mod callback_server;
pub(crate) mod pkce;
pub(crate) mod token_exchange;
pub(crate) mod token_store;

pub use authorizer::PkceAuthorizer;
pub use token_store::{OAuthToken, TokenStore, DEFAULT_TOKEN_SKEW};
