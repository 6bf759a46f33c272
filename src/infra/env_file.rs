//! Usage: Discover the Spotify client id from flags, environment, or `.spotify.env` files.

use crate::shared::error::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENV_FILE: &str = ".spotify.env";
const CLIENT_ID_KEYS: [&str; 5] = [
    "clientID",
    "CLIENT_ID",
    "SPOTIFY_CLIENT_ID",
    "spotifyClientId",
    "SPOTIFY_CLIENTID",
];

/// Parses `KEY=value` lines (optional `export `, `#` comments, surrounding quotes).
pub(crate) fn parse_env_assignments(content: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let assignment = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim();
        let Some((key, value)) = assignment.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        out.insert(key.to_string(), value.to_string());
    }
    out
}

fn client_id_from_assignments(env: &HashMap<String, String>) -> Option<String> {
    CLIENT_ID_KEYS
        .iter()
        .filter_map(|key| env.get(*key))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn candidate_env_files(env_file: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = env_file {
        candidates.push(path.to_path_buf());
    }
    candidates.push(PathBuf::from(DEFAULT_ENV_FILE));
    candidates
}

/// `explicit` already folds the `--client-id` flag and `SPOTIFY_CLIENT_ID`; env files are the fallback.
pub fn resolve_client_id(explicit: Option<&str>, env_file: Option<&Path>) -> AppResult<String> {
    if let Some(client_id) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(client_id.to_string());
    }

    for path in candidate_env_files(env_file) {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => continue,
        };
        if let Some(client_id) = client_id_from_assignments(&parse_env_assignments(&content)) {
            tracing::debug!(path = %path.display(), "client id loaded from env file");
            return Ok(client_id);
        }
    }

    Err(AppError::Config(
        "missing Spotify client id; pass --client-id, set SPOTIFY_CLIENT_ID, or create .spotify.env with clientID=<id>"
            .to_string(),
    ))
}
