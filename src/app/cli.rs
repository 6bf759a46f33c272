//! Usage: Command-line surface (clap derive).

use crate::domain::isrc::DEFAULT_FIELD;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "playlist-relay",
    version,
    about = "Create Spotify playlists and enrich playlist JSON through the Spotify Web API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Settings file (default: ./playlist-relay.json when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Spotify app client id.
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// `.env`-style file holding `clientID=<id>` (default: ./.spotify.env).
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Token cache file.
    #[arg(long, global = true)]
    pub token: Option<PathBuf>,

    /// Redirect URI registered for the Spotify app; must be http on a loopback host.
    #[arg(long, global = true)]
    pub redirect_uri: Option<String>,

    /// Print the authorization URL without opening a browser.
    #[arg(long, global = true, default_value_t = false)]
    pub no_open_browser: bool,

    /// Minimum delay between API requests, in milliseconds.
    #[arg(long, global = true)]
    pub throttle_ms: Option<u64>,

    /// Retry budget per API request.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorization management.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Create a playlist from a local items array (resumable).
    CreatePlaylist(CreatePlaylistArgs),
    /// Write ISRC codes into playlist items; enriched JSON goes to stdout.
    EnrichIsrc(EnrichIsrcArgs),
}

#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Run the interactive authorization flow and store a fresh token.
    Login,
    /// Show whether a token is stored and when it expires.
    Status,
}

#[derive(Debug, Clone, Args)]
pub struct CreatePlaylistArgs {
    /// Source playlist JSON file.
    #[arg(long)]
    pub json: PathBuf,

    /// Dotted path to the items array (e.g. `user__mix.items`); guessed when omitted.
    #[arg(long)]
    pub path: Option<String>,

    /// Playlist name; defaults to the title of the object owning `.items`.
    #[arg(long)]
    pub name: Option<String>,

    /// Keep an existing playlist with the same name instead of unfollowing it.
    #[arg(long, default_value_t = false)]
    pub no_replace: bool,

    /// Ignore any checkpoint and start over.
    #[arg(long, default_value_t = false)]
    pub no_resume: bool,

    /// Create a private playlist.
    #[arg(long, default_value_t = false)]
    pub private: bool,

    /// Playlist description.
    #[arg(long)]
    pub description: Option<String>,

    /// Checkpoint file.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Tracks per append call (max 100).
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct EnrichIsrcArgs {
    /// Input playlist JSON file.
    #[arg(long)]
    pub json: PathBuf,

    /// Dotted path to one items list; every `<key>.items` list is processed when omitted.
    #[arg(long)]
    pub json_path: Option<String>,

    /// Field to write.
    #[arg(long, default_value = DEFAULT_FIELD)]
    pub field: String,

    /// ISRC lookup cache file.
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Stop (exit 2, partial output) when a rate-limit wait would exceed this many seconds.
    #[arg(long)]
    pub max_wait_seconds: Option<u64>,
}
