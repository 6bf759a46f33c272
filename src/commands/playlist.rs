//! Usage: `create-playlist`.

use super::{CommandContext, CommandOutcome};
use crate::app::cli::CreatePlaylistArgs;
use crate::domain::playlist::{self, CreatePlaylistOptions, DEFAULT_DESCRIPTION};
use crate::domain::source::load_json;
use crate::shared::error::AppResult;

pub(crate) async fn run(ctx: &CommandContext, args: &CreatePlaylistArgs) -> AppResult<CommandOutcome> {
    let root = load_json(&args.json)?;
    let plan = playlist::plan_playlist(&root, args.path.as_deref(), args.name.as_deref())?;
    tracing::info!(
        items_path = %plan.items_path,
        tracks = plan.uris.len(),
        skipped = plan.skipped,
        "planned playlist '{}'",
        plan.playlist_name
    );

    let settings = ctx.settings();
    let options = CreatePlaylistOptions {
        source_json: args.json.clone(),
        public: !args.private,
        description: args
            .description
            .clone()
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        replace: !args.no_replace,
        resume: !args.no_resume,
        batch_size: args.batch_size.unwrap_or(settings.batch_size),
        checkpoint_path: args
            .checkpoint
            .clone()
            .unwrap_or_else(|| settings.checkpoint_path.clone()),
    };

    let store = ctx.authorized_store().await?;
    let mut client = ctx.api_client(store);
    let outcome = playlist::create_playlist(&mut client, &plan, &options).await?;

    println!(
        "Playlist '{}' ({}): {} tracks added{}{}",
        plan.playlist_name,
        outcome.resource_id,
        outcome.total,
        if outcome.resumed { " (resumed)" } else { "" },
        if plan.skipped > 0 {
            format!(", {} items without a track id skipped", plan.skipped)
        } else {
            String::new()
        }
    );
    Ok(CommandOutcome::Completed)
}
