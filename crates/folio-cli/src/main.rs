//! # folio CLI entry point
//!
//! Parses command-line arguments, resolves settings, opens the database and
//! dispatches to subcommand handlers inside a root span carrying a fresh
//! `correlation_id`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use folio_cli::governance::{run_governance, GovernanceArgs};
use folio_cli::portfolio::{run_rebalance, run_seed, run_snapshot, RebalanceArgs, SnapshotArgs};
use folio_cli::risk::{run_risk, RiskArgs};
use folio_cli::serve::{run_serve, ServeArgs};
use folio_cli::trade::{run_buy, run_price, run_sell, BuyArgs, PriceArgs, SellArgs};
use folio_cli::transfer::{run_export, run_import, ExportArgs, ImportArgs};
use folio_cli::{resolve_settings, Overrides, Runtime, EXIT_ERROR};

/// Portfolio ledger with governance audit chains.
///
/// Daily snapshots, CSV import/export, manual trades with pre-trade policy
/// checks, tamper-evident audit and risk logs, and an HTTP console.
#[derive(Parser, Debug)]
#[command(name = "folio", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides `APP_DB_FILE`).
    #[arg(long, global = true)]
    db_file: Option<PathBuf>,

    /// `dev_stage` or `production` (overrides `APP_ENV`).
    #[arg(long, global = true)]
    env: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Persist today's portfolio snapshot if it is a trading day.
    Snapshot(SnapshotArgs),

    /// Print a holdings summary with the current exposure scalar.
    Rebalance(RebalanceArgs),

    /// Seed a synthetic starting portfolio (dev_stage only).
    Seed,

    /// Export portfolio history (and optionally the trade log) to CSV.
    Export(ExportArgs),

    /// Import portfolio history (and optionally the trade log) from CSV.
    Import(ImportArgs),

    /// Buy shares at a manual price.
    Buy(BuyArgs),

    /// Sell shares at a manual price.
    Sell(SellArgs),

    /// Manage the manual price book.
    Price(PriceArgs),

    /// Policy rules, audit chain, config snapshots and breaches.
    Governance(GovernanceArgs),

    /// Risk snapshot, events, exposure and performance.
    Risk(RiskArgs),

    /// Run the HTTP governance console.
    Serve(ServeArgs),
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<u8> {
    let overrides = Overrides {
        db_file: cli.db_file,
        env: cli.env,
    };
    let settings = resolve_settings(cli.config.as_deref(), &overrides)?;
    tracing::debug!(env = settings.env.as_str(), db = %settings.db_file.display(), "settings resolved");
    let rt = Runtime::open(settings).await?;

    match cli.command {
        Commands::Snapshot(args) => run_snapshot(&args, &rt).await,
        Commands::Rebalance(args) => run_rebalance(&args, &rt).await,
        Commands::Seed => run_seed(&rt).await,
        Commands::Export(args) => run_export(&args, &rt).await,
        Commands::Import(args) => run_import(&args, &rt).await,
        Commands::Buy(args) => run_buy(&args, &rt).await,
        Commands::Sell(args) => run_sell(&args, &rt).await,
        Commands::Price(args) => run_price(&args, &rt).await,
        Commands::Governance(args) => run_governance(&args, &rt).await,
        Commands::Risk(args) => run_risk(&args, &rt).await,
        Commands::Serve(args) => run_serve(&args, &rt).await,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to start async runtime: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let span = tracing::info_span!("folio", correlation_id = %Uuid::new_v4().simple());
    let result = runtime.block_on(dispatch(cli).instrument(span));

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
