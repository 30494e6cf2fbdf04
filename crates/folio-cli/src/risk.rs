//! # Risk Subcommand
//!
//! Risk snapshot of the stored portfolio, the chained risk-event log, the
//! exposure scalar, and backward-looking performance statistics.

use anyhow::Result;
use clap::{Args, Subcommand};
use folio_risk::RegimeProbabilities;
use folio_service::RiskMonitor;
use serde_json::json;

use crate::{print_json, print_json_pretty, Runtime, EXIT_OK};

/// Arguments for `folio risk`.
#[derive(Args, Debug)]
pub struct RiskArgs {
    #[command(subcommand)]
    pub command: RiskCommand,
}

#[derive(Subcommand, Debug)]
pub enum RiskCommand {
    /// Compute the current risk snapshot.
    Snapshot {
        /// Append one chained risk event per fired threshold.
        #[arg(long)]
        emit: bool,
    },

    /// Show recent risk events, newest first.
    Events {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Exposure scalar from regime probabilities and open breaches.
    Exposure {
        #[arg(long, default_value_t = 0.0)]
        bear: f64,
        #[arg(long, default_value_t = 0.0)]
        high_vol: f64,
    },

    /// Volatility, Sortino ratio, streaks and drawdowns over stored history.
    Performance,
}

pub async fn run_risk(args: &RiskArgs, rt: &Runtime) -> Result<u8> {
    let monitor = RiskMonitor::new(rt.ledger.clone());
    match &args.command {
        RiskCommand::Snapshot { emit } => {
            let snapshot = monitor.compute_snapshot().await?;
            if *emit {
                let events = monitor.emit_risk_events(&snapshot).await?;
                print_json_pretty(&json!({"snapshot": snapshot, "events": events}))?;
            } else {
                print_json_pretty(&snapshot)?;
            }
            Ok(EXIT_OK)
        }

        RiskCommand::Events { limit } => {
            print_json_pretty(&rt.ledger.recent_risk_events(*limit).await?)?;
            Ok(EXIT_OK)
        }

        RiskCommand::Exposure { bear, high_vol } => {
            for (flag, p) in [("--bear", *bear), ("--high-vol", *high_vol)] {
                anyhow::ensure!((0.0..=1.0).contains(&p), "{flag} must be within [0, 1], got {p}");
            }
            let regime = RegimeProbabilities {
                bear: *bear,
                high_vol: *high_vol,
            };
            let open_breaches = rt.ledger.count_open_breaches().await?;
            let scalar = monitor.exposure_scalar(Some(&regime)).await?;
            print_json(&json!({
                "event": "exposure",
                "bear": bear,
                "high_vol": high_vol,
                "open_breaches": open_breaches,
                "exposure_scalar": scalar,
            }))?;
            Ok(EXIT_OK)
        }

        RiskCommand::Performance => {
            print_json_pretty(&monitor.performance().await?)?;
            Ok(EXIT_OK)
        }
    }
}
