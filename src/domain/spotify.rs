//! Usage: Typed Spotify Web API endpoints used by the playlist and ISRC workflows.

use crate::gateway::api::ApiClient;
use crate::shared::error::{AppError, AppResult};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

pub const PLAYLIST_PAGE_LIMIT: usize = 50;
pub const ADD_TRACKS_MAX_URIS: usize = 100;
pub const GET_TRACKS_MAX_IDS: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PlaylistPage {
    items: Vec<Option<PlaylistSummary>>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPlaylist {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    #[allow(dead_code)]
    snapshot_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TracksResponse {
    tracks: Vec<Option<Track>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub external_ids: ExternalIds,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub isrc: Option<String>,
}

pub async fn get_current_user(client: &mut ApiClient) -> AppResult<CurrentUser> {
    client.call_typed(Method::GET, "/v1/me", &[], None).await
}

/// Pages through the current user's playlists until one named exactly `name` is found.
pub async fn find_playlist_by_name(
    client: &mut ApiClient,
    name: &str,
) -> AppResult<Option<PlaylistSummary>> {
    let mut offset = 0usize;
    loop {
        let query = [
            ("limit", PLAYLIST_PAGE_LIMIT.to_string()),
            ("offset", offset.to_string()),
        ];
        let page: PlaylistPage = client
            .call_typed(Method::GET, "/v1/me/playlists", &query, None)
            .await?;

        if let Some(found) = page.items.into_iter().flatten().find(|p| p.name == name) {
            return Ok(Some(found));
        }
        if page.next.is_none() {
            return Ok(None);
        }
        offset += PLAYLIST_PAGE_LIMIT;
    }
}

pub async fn unfollow_playlist(client: &mut ApiClient, playlist_id: &str) -> AppResult<()> {
    let path = format!("/v1/playlists/{}/followers", urlencoding::encode(playlist_id));
    client.call(Method::DELETE, &path, &[], None).await?;
    Ok(())
}

pub async fn create_playlist(
    client: &mut ApiClient,
    user_id: &str,
    name: &str,
    public: bool,
    description: &str,
) -> AppResult<CreatedPlaylist> {
    let path = format!("/v1/users/{}/playlists", urlencoding::encode(user_id));
    let body = json!({
        "name": name,
        "public": public,
        "description": description,
    });
    client.call_typed(Method::POST, &path, &[], Some(&body)).await
}

/// Appends up to [`ADD_TRACKS_MAX_URIS`] track URIs.
pub async fn add_tracks(client: &mut ApiClient, playlist_id: &str, uris: &[String]) -> AppResult<()> {
    let path = format!("/v1/playlists/{}/tracks", urlencoding::encode(playlist_id));
    let body = json!({ "uris": uris });
    let _: SnapshotResponse = client.call_typed(Method::POST, &path, &[], Some(&body)).await?;
    Ok(())
}

/// Looks up to [`GET_TRACKS_MAX_IDS`] tracks. The result is aligned with `ids`; unknown ids are `None`.
pub async fn get_tracks(client: &mut ApiClient, ids: &[String]) -> AppResult<Vec<Option<Track>>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let query = [("ids", ids.join(","))];
    let response: TracksResponse = client
        .call_typed(Method::GET, "/v1/tracks", &query, None)
        .await?;
    if response.tracks.len() != ids.len() {
        return Err(AppError::MalformedResponse(format!(
            "GET /v1/tracks returned {} entries for {} ids",
            response.tracks.len(),
            ids.len()
        )));
    }
    Ok(response.tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_response_keeps_nulls_aligned() {
        let response: TracksResponse = serde_json::from_value(serde_json::json!({
            "tracks": [
                {"id": "a", "external_ids": {"isrc": "USRC17607839"}},
                null,
                {"id": "c"}
            ]
        }))
        .expect("json");
        assert_eq!(response.tracks.len(), 3);
        assert_eq!(
            response.tracks[0]
                .as_ref()
                .and_then(|t| t.external_ids.isrc.as_deref()),
            Some("USRC17607839")
        );
        assert!(response.tracks[1].is_none());
        assert!(response.tracks[2]
            .as_ref()
            .is_some_and(|t| t.external_ids.isrc.is_none()));
    }

    #[test]
    fn missing_arrays_are_not_defaulted() {
        assert!(serde_json::from_value::<TracksResponse>(json!({"unexpected": true})).is_err());
        assert!(serde_json::from_value::<PlaylistPage>(json!({"next": null})).is_err());
    }
}
