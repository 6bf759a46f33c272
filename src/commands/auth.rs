//! Usage: `auth login` / `auth status`.

use super::{CommandContext, CommandOutcome};
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds_f64;

pub(crate) async fn login(ctx: &CommandContext) -> AppResult<CommandOutcome> {
    let mut store = ctx.token_store()?;
    ctx.authorize(&mut store).await?;
    println!("Authorized. Token saved to {}", store.path().display());
    Ok(CommandOutcome::Completed)
}

/// Reads the cache only; a missing client id is not an error here.
pub(crate) fn status(ctx: &CommandContext) -> AppResult<CommandOutcome> {
    let store = ctx.token_store_for(ctx.client_id().unwrap_or_default())?;
    let Some(token) = store.current() else {
        println!("Not authorized (no token at {})", store.path().display());
        return Ok(CommandOutcome::Completed);
    };

    println!("Token file: {}", store.path().display());
    if !token.scope.is_empty() {
        println!("Scope: {}", token.scope);
    }
    println!("{}", describe_expiry(token.seconds_until_expiry(now_unix_seconds_f64())));
    Ok(CommandOutcome::Completed)
}

fn describe_expiry(remaining_seconds: f64) -> String {
    if remaining_seconds <= 0.0 {
        return "Access token expired (will refresh on next use)".to_string();
    }
    let total = remaining_seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("Access token valid for {hours}h {minutes}m")
    } else {
        format!("Access token valid for {minutes}m")
    }
}
