//! Usage: `enrich-isrc` (enriched JSON to stdout, stats to stderr).

use super::{CommandContext, CommandOutcome};
use crate::app::cli::EnrichIsrcArgs;
use crate::domain::isrc::{self, EnrichStats, FetchOutcome, IsrcCache};
use crate::domain::source::load_json;
use crate::shared::error::{AppError, AppResult};
use std::io::Write;

pub(crate) async fn run(ctx: &CommandContext, args: &EnrichIsrcArgs) -> AppResult<CommandOutcome> {
    let mut root = load_json(&args.json)?;
    let plan = isrc::plan_enrichment(&root, args.json_path.as_deref(), &args.field)?;

    let cache_path = args
        .cache
        .clone()
        .unwrap_or_else(|| ctx.settings().isrc_cache_path.clone());
    let mut cache = IsrcCache::load(cache_path)?;
    let pending = plan.pending_ids(&cache);
    tracing::info!(
        lists = plan.items_paths.len(),
        unique_ids = plan.unique_ids.len(),
        pending = pending.len(),
        "planned isrc enrichment"
    );

    let fetch = if pending.is_empty() {
        FetchOutcome::default()
    } else {
        let store = ctx.authorized_store().await?;
        let mut client = ctx.api_client(store);
        client.set_max_wait(ctx.max_wait(args.max_wait_seconds));
        isrc::fetch_missing(&mut client, &pending, &mut cache).await?
    };

    let applied = isrc::apply_isrcs(&mut root, &plan, &cache)?;
    let stats = EnrichStats::new(&plan, &cache, &fetch, &applied);

    write_stdout_json(&root)?;
    let stats_json = serde_json::to_string_pretty(&stats)
        .map_err(|e| AppError::Io(format!("failed to encode stats: {e}")))?;
    eprintln!("{stats_json}");

    if stats.incomplete {
        tracing::warn!("isrc enrichment incomplete; rerun later to continue from the cache");
        return Ok(CommandOutcome::SoftStopped);
    }
    Ok(CommandOutcome::Completed)
}

fn write_stdout_json(value: &serde_json::Value) -> AppResult<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| AppError::Io(format!("failed to write JSON to stdout: {e}")))?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
