//! Usage: Create a Spotify playlist from a local items array, resumable via checkpoint.

use super::batch::{BatchTarget, CheckpointedBatchRunner, RunOutcome, SourceFingerprint};
use super::source::{extract_track_uri, guess_items_path, navigate, playlist_title};
use super::spotify;
use crate::gateway::api::ApiClient;
use crate::shared::error::{AppError, AppResult};
use serde_json::Value;
use std::path::PathBuf;

pub const DEFAULT_DESCRIPTION: &str = "Created by playlist-relay";

/// Track URIs and naming resolved from the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistPlan {
    pub items_path: String,
    pub playlist_name: String,
    pub uris: Vec<String>,
    pub skipped: usize,
}

pub fn plan_playlist(
    root: &Value,
    items_path: Option<&str>,
    name: Option<&str>,
) -> AppResult<PlaylistPlan> {
    let items_path = match items_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => path.to_string(),
        None => guess_items_path(root)?,
    };

    let items = navigate(root, &items_path)?.as_array().ok_or_else(|| {
        AppError::InvalidInput(format!("resolved path '{items_path}' is not an array"))
    })?;

    let playlist_name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| playlist_title(root, &items_path))
        .ok_or_else(|| {
            AppError::InvalidInput(
                "missing playlist name; pass --name or give the playlist a title".to_string(),
            )
        })?;

    let mut uris = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match extract_track_uri(item) {
            Some(uri) => uris.push(uri),
            None => skipped += 1,
        }
    }
    if uris.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "no Spotify track ids found at '{items_path}'"
        )));
    }

    Ok(PlaylistPlan {
        items_path,
        playlist_name,
        uris,
        skipped,
    })
}

#[derive(Debug, Clone)]
pub struct CreatePlaylistOptions {
    pub source_json: PathBuf,
    pub public: bool,
    pub description: String,
    pub replace: bool,
    pub resume: bool,
    pub batch_size: usize,
    pub checkpoint_path: PathBuf,
}

struct PlaylistTarget<'a> {
    client: &'a mut ApiClient,
    name: &'a str,
    public: bool,
    description: &'a str,
    replace: bool,
}

impl BatchTarget for PlaylistTarget<'_> {
    async fn create_resource(&mut self) -> AppResult<String> {
        let me = spotify::get_current_user(self.client).await?;
        if me.id.trim().is_empty() {
            return Err(AppError::MalformedResponse(
                "/v1/me returned an empty user id".to_string(),
            ));
        }
        tracing::debug!(
            user_id = %me.id,
            display_name = me.display_name.as_deref().unwrap_or(""),
            "resolved current user"
        );

        if self.replace {
            if let Some(existing) = spotify::find_playlist_by_name(self.client, self.name).await? {
                tracing::info!(playlist_id = %existing.id, "unfollowing existing playlist '{}'", self.name);
                spotify::unfollow_playlist(self.client, &existing.id).await?;
            }
        }

        let created = spotify::create_playlist(
            self.client,
            &me.id,
            self.name,
            self.public,
            self.description,
        )
        .await?;
        tracing::info!(playlist_id = %created.id, "created playlist '{}'", self.name);
        Ok(created.id)
    }

    async fn apply_batch(&mut self, resource_id: &str, items: &[String]) -> AppResult<()> {
        spotify::add_tracks(self.client, resource_id, items).await
    }
}

/// Creates (or resumes filling) the playlist described by `plan`.
pub async fn create_playlist(
    client: &mut ApiClient,
    plan: &PlaylistPlan,
    options: &CreatePlaylistOptions,
) -> AppResult<RunOutcome> {
    let fingerprint = SourceFingerprint::new(
        options.source_json.display().to_string(),
        plan.items_path.clone(),
        plan.playlist_name.clone(),
        &plan.uris,
    );
    let runner = CheckpointedBatchRunner::new(&options.checkpoint_path)
        .with_batch_size(options.batch_size.min(spotify::ADD_TRACKS_MAX_URIS))
        .with_resume(options.resume)
        .with_skipped_items(plan.skipped);

    let mut target = PlaylistTarget {
        client,
        name: &plan.playlist_name,
        public: options.public,
        description: &options.description,
        replace: options.replace,
    };
    runner.run(&fingerprint, &plan.uris, &mut target).await
}
