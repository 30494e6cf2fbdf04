//! # Serve Subcommand
//!
//! Runs the HTTP governance console over the opened database until the
//! process is interrupted.

use anyhow::{Context, Result};
use clap::Args;
use folio_api::state::AppState;

use crate::{Runtime, EXIT_OK};

/// Arguments for `folio serve`.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address (defaults to the configured `APP_BIND`).
    #[arg(long)]
    pub bind: Option<String>,
}

pub fn bind_address(args: &ServeArgs, rt: &Runtime) -> String {
    args.bind.clone().unwrap_or_else(|| rt.settings.bind.clone())
}

pub async fn run_serve(args: &ServeArgs, rt: &Runtime) -> Result<u8> {
    let addr = bind_address(args, rt);
    let state = AppState::with_clock(rt.pool().clone(), rt.settings.clone(), rt.clock.clone());
    folio_api::serve(state, &addr)
        .await
        .with_context(|| format!("server on {addr} failed"))?;
    Ok(EXIT_OK)
}
