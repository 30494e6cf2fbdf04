//! # Portfolio Subcommands
//!
//! - `snapshot`: persist today's valuation, skipping weekends and holidays
//!   unless `--force`.
//! - `rebalance`: print a one-line JSON summary of holdings and the current
//!   exposure scalar.
//! - `seed`: write the synthetic starting portfolio in `dev_stage`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use folio_core::{Settings, TradingCalendar};
use folio_portfolio::round2;
use folio_risk::RegimeProbabilities;
use folio_service::{repo, seed_dev_stage, take_snapshot, RiskMonitor};
use serde::Serialize;

use crate::{print_json, Runtime, EXIT_OK, EXIT_REJECTED};

/// Arguments for `folio snapshot`.
#[derive(Args, Debug, Default)]
pub struct SnapshotArgs {
    /// Snapshot even on weekends and holidays.
    #[arg(long)]
    pub force: bool,

    /// JSON array of `YYYY-MM-DD` holidays. Replaces the configured list.
    #[arg(long)]
    pub holidays: Option<PathBuf>,

    /// Snapshot date (defaults to today).
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// Arguments for `folio rebalance`.
#[derive(Args, Debug, Default)]
pub struct RebalanceArgs {
    /// Cash level to maintain.
    #[arg(long)]
    pub target_cash: Option<f64>,

    /// Bear-regime probability in [0, 1].
    #[arg(long)]
    pub bear: Option<f64>,

    /// High-volatility regime probability in [0, 1].
    #[arg(long)]
    pub high_vol: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceSummary {
    pub event: &'static str,
    pub holdings: usize,
    pub total_cost_basis: f64,
    pub target_cash: Option<f64>,
    pub exposure_scalar: f64,
}

fn snapshot_calendar(settings: &Settings, holidays: Option<&Path>) -> Result<TradingCalendar> {
    match holidays {
        Some(path) => TradingCalendar::from_json_file(path)
            .with_context(|| format!("failed to read holidays from {}", path.display())),
        None => Ok(settings.calendar()),
    }
}

pub async fn run_snapshot(args: &SnapshotArgs, rt: &Runtime) -> Result<u8> {
    let date = args.date.unwrap_or_else(|| rt.today());
    let calendar = snapshot_calendar(&rt.settings, args.holidays.as_deref())?;
    if !args.force && !calendar.is_trading_day(date) {
        tracing::info!(%date, "not a trading day");
        println!("Skipping snapshot: {date} is not a trading day");
        return Ok(EXIT_OK);
    }

    let market = rt.market().await?;
    let report = take_snapshot(rt.pool(), &rt.ledger, market.as_ref(), date).await?;
    println!(
        "Snapshot created for {date} with {} rows (incl. TOTAL)",
        report.rows.len()
    );
    Ok(EXIT_OK)
}

fn regime(args: &RebalanceArgs) -> Result<Option<RegimeProbabilities>> {
    if args.bear.is_none() && args.high_vol.is_none() {
        return Ok(None);
    }
    let regime = RegimeProbabilities {
        bear: args.bear.unwrap_or(0.0),
        high_vol: args.high_vol.unwrap_or(0.0),
    };
    for (flag, p) in [("--bear", regime.bear), ("--high-vol", regime.high_vol)] {
        anyhow::ensure!((0.0..=1.0).contains(&p), "{flag} must be within [0, 1], got {p}");
    }
    Ok(Some(regime))
}

pub async fn rebalance_summary(args: &RebalanceArgs, rt: &Runtime) -> Result<RebalanceSummary> {
    let regime = regime(args)?;
    let loaded = repo::load_portfolio(rt.pool()).await?;
    let exposure_scalar = RiskMonitor::new(rt.ledger.clone())
        .exposure_scalar(regime.as_ref())
        .await?;
    Ok(RebalanceSummary {
        event: "rebalance-summary",
        holdings: loaded.portfolio.len(),
        total_cost_basis: round2(loaded.portfolio.total_cost_basis()),
        target_cash: args.target_cash,
        exposure_scalar,
    })
}

pub async fn run_rebalance(args: &RebalanceArgs, rt: &Runtime) -> Result<u8> {
    let summary = rebalance_summary(args, rt).await?;
    print_json(&summary)?;
    Ok(EXIT_OK)
}

pub async fn run_seed(rt: &Runtime) -> Result<u8> {
    if !rt.settings.env.is_dev_stage() {
        eprintln!("seed is only available when APP_ENV=dev_stage");
        return Ok(EXIT_REJECTED);
    }
    let report = seed_dev_stage(&rt.ledger, rt.today()).await?;
    if !report.seeded {
        eprintln!("portfolio already initialized; nothing seeded");
    }
    print_json(&report)?;
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use folio_core::{AppEnv, FixedClock};
    use folio_service::{memory_pool, Ledger};

    async fn runtime(env: AppEnv, today: NaiveDate) -> Runtime {
        let settings = Settings {
            env,
            ..Settings::default()
        };
        Runtime {
            settings,
            ledger: Ledger::new(memory_pool().await.unwrap()),
            clock: Arc::new(FixedClock(today)),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn holidays_file_replaces_configured_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holidays.json");
        std::fs::write(&path, r#"["2024-06-03"]"#).unwrap();
        let settings = Settings {
            trading_holidays: vec![NaiveDate::from_ymd_opt(2024, 6, 4).unwrap()],
            ..Settings::default()
        };

        let calendar = snapshot_calendar(&settings, Some(&path)).unwrap();
        assert!(!calendar.is_trading_day(monday()));
        assert!(calendar.is_trading_day(monday().succ_opt().unwrap()));

        let configured = snapshot_calendar(&settings, None).unwrap();
        assert!(configured.is_trading_day(monday()));
    }

    #[test]
    fn missing_holidays_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(snapshot_calendar(&Settings::default(), Some(&missing)).is_err());
    }

    #[test]
    fn regime_flags_are_optional_and_bounded() {
        assert!(regime(&RebalanceArgs::default()).unwrap().is_none());
        let args = RebalanceArgs {
            bear: Some(0.5),
            ..RebalanceArgs::default()
        };
        let r = regime(&args).unwrap().unwrap();
        assert_eq!((r.bear, r.high_vol), (0.5, 0.0));
        let args = RebalanceArgs {
            high_vol: Some(1.2),
            ..RebalanceArgs::default()
        };
        assert!(regime(&args).is_err());
    }

    #[tokio::test]
    async fn rebalance_on_empty_store() {
        let rt = runtime(AppEnv::Production, monday()).await;
        let args = RebalanceArgs {
            target_cash: Some(500.0),
            bear: Some(0.5),
            high_vol: Some(0.3),
        };
        let summary = rebalance_summary(&args, &rt).await.unwrap();
        assert_eq!(summary.event, "rebalance-summary");
        assert_eq!(summary.holdings, 0);
        assert_eq!(summary.total_cost_basis, 0.0);
        assert_eq!(summary.target_cash, Some(500.0));
        assert!((summary.exposure_scalar - 0.71).abs() < 1e-12);
    }

    #[tokio::test]
    async fn seed_then_rebalance_in_dev_stage() {
        let rt = runtime(AppEnv::DevStage, monday()).await;
        assert_eq!(run_seed(&rt).await.unwrap(), EXIT_OK);
        let summary = rebalance_summary(&RebalanceArgs::default(), &rt).await.unwrap();
        assert_eq!(summary.holdings, 2);
        assert_eq!(summary.total_cost_basis, 900.0);
        assert_eq!(summary.exposure_scalar, 1.0);
    }

    #[tokio::test]
    async fn seed_is_refused_in_production() {
        let rt = runtime(AppEnv::Production, monday()).await;
        assert_eq!(run_seed(&rt).await.unwrap(), EXIT_REJECTED);
        let loaded = repo::load_portfolio(rt.pool()).await.unwrap();
        assert!(loaded.is_first_time);
    }

    #[tokio::test]
    async fn weekend_snapshot_is_skipped_unless_forced() {
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        let rt = runtime(AppEnv::DevStage, saturday).await;
        assert_eq!(run_snapshot(&SnapshotArgs::default(), &rt).await.unwrap(), EXIT_OK);
        assert!(repo::latest_history_date(rt.pool()).await.unwrap().is_none());

        let forced = SnapshotArgs {
            force: true,
            ..SnapshotArgs::default()
        };
        assert_eq!(run_snapshot(&forced, &rt).await.unwrap(), EXIT_OK);
        assert_eq!(repo::latest_history_date(rt.pool()).await.unwrap(), Some(saturday));
    }
}
