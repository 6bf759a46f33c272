//! Usage: Local playlist JSON helpers (dotted-path navigation, track id extraction).

use crate::shared::error::{AppError, AppResult};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

const TRACK_ID_LEN: usize = 22;
const TRACK_URI_PREFIX: &str = "spotify:track:";
const GUESS_SAMPLE_ITEMS: usize = 50;

const ITEM_ID_KEYS: [&str; 12] = [
    "spotifyId",
    "spotify_id",
    "spotifyTrackId",
    "spotifyTrackID",
    "spotifyUri",
    "spotifyURI",
    "spotifyTrackUri",
    "spotifyTrackURI",
    "trackUri",
    "uri",
    "id",
    "trackId",
];
const NESTED_PARENT_KEYS: [&str; 2] = ["spotify", "track"];
const NESTED_ID_KEYS: [&str; 4] = ["id", "uri", "spotifyId", "spotifyUri"];

static TRACK_URL_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn track_url_regex() -> Option<&'static Regex> {
    TRACK_URL_RE
        .get_or_init(|| {
            Regex::new(r"open\.spotify\.com/(?:intl-[A-Za-z-]+/)?track/([0-9A-Za-z]{22})(?:[/?#]|$)")
                .ok()
        })
        .as_ref()
}

pub fn load_json(path: &Path) -> AppResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::InvalidInput(format!("JSON file not found: {}", path.display()))
        } else {
            AppError::Io(format!("failed to read {}: {e}", path.display()))
        }
    })?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::InvalidInput(format!("{} is not valid JSON: {e}", path.display())))
}

/// Resolves a dotted object path (`a.b.items`). Empty segments are ignored.
pub fn navigate<'a>(root: &'a Value, path: &str) -> AppResult<&'a Value> {
    let mut current = root;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(key).ok_or_else(|| {
                AppError::InvalidInput(format!("missing key '{key}' while resolving path '{path}'"))
            })?,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "cannot resolve key '{key}' on a non-object while resolving path '{path}'"
                )))
            }
        };
    }
    Ok(current)
}

pub fn navigate_mut<'a>(root: &'a mut Value, path: &str) -> AppResult<&'a mut Value> {
    let mut current = root;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Object(map) => map.get_mut(key).ok_or_else(|| {
                AppError::InvalidInput(format!("missing key '{key}' while resolving path '{path}'"))
            })?,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "cannot resolve key '{key}' on a non-object while resolving path '{path}'"
                )))
            }
        };
    }
    Ok(current)
}

pub fn is_track_id(value: &str) -> bool {
    let value = value.trim();
    value.len() == TRACK_ID_LEN && value.chars().all(|ch| ch.is_ascii_alphanumeric())
}

/// Normalizes a bare id, `spotify:track:` URI, or `open.spotify.com/track/` URL to a track URI.
pub fn track_uri_from_any(value: &str) -> Option<String> {
    let value = value.trim();
    if is_track_id(value) {
        return Some(format!("{TRACK_URI_PREFIX}{value}"));
    }
    if let Some(id) = value.strip_prefix(TRACK_URI_PREFIX) {
        return is_track_id(id).then(|| format!("{TRACK_URI_PREFIX}{}", id.trim()));
    }
    if value.contains("open.spotify.com/") {
        let captures = track_url_regex()?.captures(value)?;
        let id = captures.get(1)?.as_str();
        return Some(format!("{TRACK_URI_PREFIX}{id}"));
    }
    None
}

pub fn track_id_from_uri(uri: &str) -> &str {
    uri.strip_prefix(TRACK_URI_PREFIX).unwrap_or(uri)
}

/// First usable track URI found on a playlist item, checking direct keys then nested objects.
pub fn extract_track_uri(item: &Value) -> Option<String> {
    let Value::Object(map) = item else {
        return None;
    };

    let direct = ITEM_ID_KEYS.iter().filter_map(|key| map.get(*key));
    let nested = NESTED_PARENT_KEYS
        .iter()
        .filter_map(|parent| map.get(*parent).and_then(Value::as_object))
        .flat_map(|parent| NESTED_ID_KEYS.iter().filter_map(move |key| parent.get(*key)));

    direct
        .chain(nested)
        .filter_map(Value::as_str)
        .find_map(track_uri_from_any)
}

pub fn extract_track_id(item: &Value) -> Option<String> {
    extract_track_uri(item).map(|uri| track_id_from_uri(&uri).to_string())
}

/// Picks the only `<key>.items` array of the root object that carries track ids.
pub fn guess_items_path(root: &Value) -> AppResult<String> {
    let Value::Object(map) = root else {
        return Err(AppError::InvalidInput(
            "JSON root is not an object; pass --path".to_string(),
        ));
    };

    let candidates: Vec<String> = map
        .iter()
        .filter(|(_, value)| {
            value
                .get("items")
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .take(GUESS_SAMPLE_ITEMS)
                        .any(|item| extract_track_uri(item).is_some())
                })
        })
        .map(|(key, _)| format!("{key}.items"))
        .collect();

    match candidates.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(AppError::InvalidInput(
            "could not find any '<playlist>.items' array with Spotify ids; pass --path".to_string(),
        )),
        many => Err(AppError::InvalidInput(format!(
            "multiple candidate playlists found; pass --path. candidates: {}",
            many.join(", ")
        ))),
    }
}

/// `title` of the object that owns `<prefix>.items`, if any.
pub fn playlist_title(root: &Value, items_path: &str) -> Option<String> {
    let prefix = if items_path == "items" {
        ""
    } else {
        items_path.strip_suffix(".items")?
    };
    navigate(root, prefix)
        .ok()?
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

/// Items arrays to process: the explicit path, or every `<key>.items` array of the root.
pub fn items_list_paths(root: &Value, explicit_path: Option<&str>) -> AppResult<Vec<String>> {
    if let Some(path) = explicit_path.map(str::trim).filter(|p| !p.is_empty()) {
        if !navigate(root, path)?.is_array() {
            return Err(AppError::InvalidInput(format!(
                "JSON path '{path}' did not resolve to a list"
            )));
        }
        return Ok(vec![path.to_string()]);
    }

    let paths: Vec<String> = root
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(_, value)| value.get("items").is_some_and(Value::is_array))
                .map(|(key, _)| format!("{key}.items"))
                .collect()
        })
        .unwrap_or_default();

    if paths.is_empty() {
        return Err(AppError::InvalidInput(
            "no '<playlist>.items' arrays found; pass --json-path".to_string(),
        ));
    }
    Ok(paths)
}
