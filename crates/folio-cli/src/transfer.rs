//! # Export / Import Subcommands
//!
//! CSV transfer of portfolio history and the trade log. History files may
//! use either the stored column layout (`db`) or the legacy update layout
//! (`update`); import accepts both.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use folio_service::{
    export_history_csv, export_trade_log_csv, import_history_csv, import_trade_log_csv, ExportFormat,
};
use serde_json::json;

use crate::{print_json, Runtime, EXIT_OK};

/// Arguments for `folio export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination CSV for portfolio history.
    #[arg(long)]
    pub out: PathBuf,

    /// Column layout: `db` or `update`.
    #[arg(long, default_value = "db")]
    pub format: ExportFormat,

    /// Also export the trade log to this file.
    #[arg(long)]
    pub trades_out: Option<PathBuf>,
}

/// Arguments for `folio import`.
#[derive(Args, Debug, Default)]
pub struct ImportArgs {
    /// History CSV to import (defaults to the configured portfolio CSV).
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Trade-log CSV to import.
    #[arg(long)]
    pub trades_csv: Option<PathBuf>,
}

pub async fn run_export(args: &ExportArgs, rt: &Runtime) -> Result<u8> {
    let rows = export_history_csv(rt.pool(), &args.out, args.format)
        .await
        .with_context(|| format!("failed to export history to {}", args.out.display()))?;
    println!("Exported {rows} rows to {}", args.out.display());

    if let Some(out) = &args.trades_out {
        let trades = export_trade_log_csv(rt.pool(), out)
            .await
            .with_context(|| format!("failed to export trade log to {}", out.display()))?;
        println!("Exported {trades} rows to {}", out.display());
    }
    Ok(EXIT_OK)
}

pub async fn run_import(args: &ImportArgs, rt: &Runtime) -> Result<u8> {
    let csv = args.csv.clone().unwrap_or_else(|| rt.settings.portfolio_csv.clone());
    let result = import_history_csv(&rt.ledger, &csv)
        .await
        .with_context(|| format!("failed to import {}", csv.display()))?;
    print_json(&json!({"event": "import", "result": result}))?;

    if let Some(trades) = &args.trades_csv {
        let result = import_trade_log_csv(&rt.ledger, trades)
            .await
            .with_context(|| format!("failed to import {}", trades.display()))?;
        print_json(&json!({"event": "import", "result": result}))?;
    }
    Ok(EXIT_OK)
}
