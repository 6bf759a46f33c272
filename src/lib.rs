mod app;
mod commands;
mod domain;
mod gateway;
mod infra;
mod shared;
pub mod test_support;

pub use domain::batch::{
    hash_items, BatchTarget, Checkpoint, CheckpointStatus, CheckpointStore,
    CheckpointedBatchRunner, RunOutcome, SourceFingerprint, DEFAULT_BATCH_SIZE,
};
pub use domain::isrc::{
    apply_isrcs, fetch_missing, plan_enrichment, ApplyOutcome, EnrichPlan, EnrichStats,
    FetchOutcome, IsrcCache,
};
pub use domain::playlist::{create_playlist, plan_playlist, CreatePlaylistOptions, PlaylistPlan};
pub use gateway::api::{
    ApiClient, JitterSource, RandomJitter, RetryPolicy, SleepFuture, Sleeper, TokioSleeper,
};
pub use gateway::oauth::{OAuthToken, PkceAuthorizer, TokenStore, DEFAULT_TOKEN_SKEW};
pub use infra::settings::AppSettings;
pub use shared::error::{AppError, AppResult};

use app::cli::{AuthAction, Cli, Command};
use clap::Parser;
use commands::{CommandContext, CommandOutcome};
use std::process::ExitCode;

const EXIT_FAILURE: u8 = 1;
const EXIT_SOFT_STOP: u8 = 2;

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    app::logging::init(&cli.global.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match runtime.block_on(dispatch(cli)) {
        Ok(CommandOutcome::Completed) => ExitCode::SUCCESS,
        Ok(CommandOutcome::SoftStopped) => ExitCode::from(EXIT_SOFT_STOP),
        Err(err) if err.is_soft_stop() => {
            eprintln!("stopped: {err}; progress was saved, rerun to continue");
            ExitCode::from(EXIT_SOFT_STOP)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn dispatch(cli: Cli) -> AppResult<CommandOutcome> {
    let ctx = CommandContext::from_args(&cli.global)?;
    match cli.command {
        Command::Auth {
            action: AuthAction::Login,
        } => commands::auth::login(&ctx).await,
        Command::Auth {
            action: AuthAction::Status,
        } => commands::auth::status(&ctx),
        Command::CreatePlaylist(args) => commands::playlist::run(&ctx, &args).await,
        Command::EnrichIsrc(args) => commands::isrc::run(&ctx, &args).await,
    }
}
