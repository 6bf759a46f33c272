//! Usage: Enrich playlist items with ISRC codes looked up through `/v1/tracks`.

use super::source::{extract_track_id, is_track_id, items_list_paths, navigate, navigate_mut};
use super::spotify::{self, GET_TRACKS_MAX_IDS};
use crate::gateway::api::ApiClient;
use crate::shared::error::{AppError, AppResult};
use crate::shared::fs::{read_optional, write_json_atomic};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_FIELD: &str = "isrc";

/// Persistent `track id -> isrc | null` map. `null` records a confirmed miss.
#[derive(Debug, Clone, Default)]
pub struct IsrcCache {
    path: PathBuf,
    entries: BTreeMap<String, Option<String>>,
}

impl IsrcCache {
    /// Invalid files and entries are dropped rather than failing the run.
    pub fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let mut entries = BTreeMap::new();
        if let Some(text) = read_optional(&path)? {
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => {
                    for (id, value) in map {
                        if !is_track_id(&id) {
                            continue;
                        }
                        match value {
                            Value::Null => {
                                entries.insert(id, None);
                            }
                            Value::String(isrc) => {
                                entries.insert(id, Some(isrc).filter(|s| !s.is_empty()));
                            }
                            _ => {}
                        }
                    }
                }
                _ => tracing::warn!(path = %path.display(), "ignoring unreadable isrc cache"),
            }
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(|v| v.as_deref())
    }

    pub fn insert(&mut self, id: String, isrc: Option<String>) {
        self.entries.insert(id, isrc.filter(|s| !s.is_empty()));
    }

    pub fn known_isrc_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_some()).count()
    }

    pub fn save(&self) -> AppResult<()> {
        write_json_atomic(&self.path, &self.entries)
    }
}

/// Which items need a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichPlan {
    pub field: String,
    pub items_paths: Vec<String>,
    pub unique_ids: Vec<String>,
    pub items_total: usize,
    pub already_had_field: usize,
    pub missing_track_id: usize,
}

impl EnrichPlan {
    pub fn pending_ids(&self, cache: &IsrcCache) -> Vec<String> {
        self.unique_ids
            .iter()
            .filter(|id| !cache.contains(id))
            .cloned()
            .collect()
    }
}

fn has_field(item: &Value, field: &str) -> bool {
    item.get(field)
        .and_then(Value::as_str)
        .is_some_and(|v| !v.is_empty())
}

pub fn plan_enrichment(root: &Value, items_path: Option<&str>, field: &str) -> AppResult<EnrichPlan> {
    let field = field.trim();
    if field.is_empty() {
        return Err(AppError::InvalidInput("--field must not be empty".to_string()));
    }
    let items_paths = items_list_paths(root, items_path)?;

    let mut ids = BTreeSet::new();
    let mut items_total = 0usize;
    let mut already_had_field = 0usize;
    let mut missing_track_id = 0usize;

    for path in &items_paths {
        let Some(items) = navigate(root, path)?.as_array() else {
            continue;
        };
        items_total += items.len();
        for item in items.iter().filter(|item| item.is_object()) {
            if has_field(item, field) {
                already_had_field += 1;
                continue;
            }
            match extract_track_id(item) {
                Some(id) => {
                    ids.insert(id);
                }
                None => missing_track_id += 1,
            }
        }
    }

    Ok(EnrichPlan {
        field: field.to_string(),
        items_paths,
        unique_ids: ids.into_iter().collect(),
        items_total,
        already_had_field,
        missing_track_id,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub fetched_ids: usize,
    /// Set when a rate-limit wait above the ceiling stopped fetching early.
    pub rate_limited_wait_seconds: Option<f64>,
}

/// Fetches `ids` in batches, saving the cache after each batch. A rate-limit soft stop ends
/// fetching without failing; other errors propagate.
pub async fn fetch_missing(
    client: &mut ApiClient,
    ids: &[String],
    cache: &mut IsrcCache,
) -> AppResult<FetchOutcome> {
    let mut outcome = FetchOutcome::default();
    for batch in ids.chunks(GET_TRACKS_MAX_IDS) {
        let tracks = match spotify::get_tracks(client, batch).await {
            Ok(tracks) => tracks,
            Err(AppError::RateLimitExceeded { wait_seconds }) => {
                tracing::warn!("stopping lookups; rate limit wait {wait_seconds:.1}s exceeds ceiling");
                outcome.rate_limited_wait_seconds = Some(wait_seconds);
                break;
            }
            Err(err) => return Err(err),
        };

        outcome.fetched_ids += batch.len();
        for (index, id) in batch.iter().enumerate() {
            let isrc = tracks
                .get(index)
                .and_then(Option::as_ref)
                .and_then(|track| track.external_ids.isrc.clone());
            cache.insert(id.clone(), isrc);
        }
        cache.save()?;
        tracing::info!("looked up {}/{} tracks", outcome.fetched_ids, ids.len());
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub enriched: usize,
    pub not_found: usize,
}

/// Writes cached ISRCs into items lacking the field.
pub fn apply_isrcs(root: &mut Value, plan: &EnrichPlan, cache: &IsrcCache) -> AppResult<ApplyOutcome> {
    let mut outcome = ApplyOutcome::default();
    for path in &plan.items_paths {
        let Some(items) = navigate_mut(root, path)?.as_array_mut() else {
            continue;
        };
        for item in items.iter_mut() {
            if !item.is_object() || has_field(item, &plan.field) {
                continue;
            }
            let Some(id) = extract_track_id(item) else {
                continue;
            };
            match (cache.get(&id), item.as_object_mut()) {
                (Some(isrc), Some(map)) => {
                    map.insert(plan.field.clone(), Value::String(isrc.to_string()));
                    outcome.enriched += 1;
                }
                _ => outcome.not_found += 1,
            }
        }
    }
    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichStats {
    pub items_total: usize,
    pub spotify_ids_unique: usize,
    pub spotify_ids_cached: usize,
    pub fetched_ids: usize,
    pub enriched: usize,
    pub already_had_field: usize,
    pub missing_spotify_id: usize,
    pub not_found_in_spotify: usize,
    pub incomplete: bool,
    pub rate_limited_wait_seconds: Option<f64>,
}

impl EnrichStats {
    pub fn new(plan: &EnrichPlan, cache: &IsrcCache, fetch: &FetchOutcome, apply: &ApplyOutcome) -> Self {
        Self {
            items_total: plan.items_total,
            spotify_ids_unique: plan.unique_ids.len(),
            spotify_ids_cached: cache.known_isrc_count(),
            fetched_ids: fetch.fetched_ids,
            enriched: apply.enriched,
            already_had_field: plan.already_had_field,
            missing_spotify_id: plan.missing_track_id,
            not_found_in_spotify: apply.not_found,
            incomplete: fetch.rate_limited_wait_seconds.is_some(),
            rate_limited_wait_seconds: fetch.rate_limited_wait_seconds,
        }
    }
}
