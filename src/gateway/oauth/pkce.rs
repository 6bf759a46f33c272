//! Usage: PKCE verifier/challenge and `state` generation for the authorization-code flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_ENTROPY_BYTES: usize = 64;
const STATE_ENTROPY_BYTES: usize = 24;

#[derive(Debug, Clone)]
pub(crate) struct PkcePair {
    pub(crate) code_verifier: String,
    pub(crate) code_challenge: String,
}

/// Ephemeral per-attempt authorization parameters; never persisted.
#[derive(Debug, Clone)]
pub(crate) struct AuthorizationRequest {
    pub(crate) pkce: PkcePair,
    pub(crate) state: String,
    pub(crate) redirect_uri: String,
}

impl AuthorizationRequest {
    pub(crate) fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            pkce: generate_pkce_pair(),
            state: generate_state(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

pub(crate) fn generate_pkce_pair() -> PkcePair {
    let mut random = [0u8; VERIFIER_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut random);

    let code_verifier = URL_SAFE_NO_PAD.encode(random);
    let code_challenge = code_challenge_s256(&code_verifier);

    PkcePair {
        code_verifier,
        code_challenge,
    }
}

pub(crate) fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

pub(crate) fn generate_state() -> String {
    let mut bytes = [0u8; STATE_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
