//! # Trade and Price Subcommands
//!
//! Manual `buy` and `sell` against the stored portfolio, and the manual
//! price book used in production, where no live feed is configured.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use folio_core::Ticker;
use folio_service::{repo, TradeExecutor, TradeOptions, TradeReceipt};

use crate::{print_json_pretty, rejected, Runtime, EXIT_OK, EXIT_REJECTED};

/// Flags shared by `buy` and `sell`.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ExecutionFlags {
    /// Evaluate active policy rules before executing.
    #[arg(long)]
    pub enforce_governance: bool,

    /// Skip the today's-range price check.
    #[arg(long)]
    pub no_range_check: bool,
}

/// Arguments for `folio buy`.
#[derive(Args, Debug)]
pub struct BuyArgs {
    pub ticker: String,
    #[arg(long)]
    pub shares: f64,
    #[arg(long)]
    pub price: f64,
    #[arg(long)]
    pub stop_loss: Option<f64>,
    #[command(flatten)]
    pub flags: ExecutionFlags,
}

/// Arguments for `folio sell`.
#[derive(Args, Debug)]
pub struct SellArgs {
    pub ticker: String,
    #[arg(long)]
    pub shares: f64,
    #[arg(long)]
    pub price: f64,
    #[command(flatten)]
    pub flags: ExecutionFlags,
}

/// Arguments for `folio price`.
#[derive(Args, Debug)]
pub struct PriceArgs {
    #[command(subcommand)]
    pub command: PriceCommand,
}

#[derive(Subcommand, Debug)]
pub enum PriceCommand {
    /// Set or replace the manual price for a ticker.
    Set { ticker: String, price: f64 },
    /// Remove a manual price.
    Remove { ticker: String },
    /// List manual prices.
    List,
}

async fn executor(rt: &Runtime, flags: ExecutionFlags) -> Result<TradeExecutor> {
    let options = TradeOptions {
        enforce_governance: flags.enforce_governance || rt.settings.enforce_governance,
        check_day_range: !flags.no_range_check,
    };
    let market = rt.market().await?;
    Ok(TradeExecutor::new(rt.ledger.clone(), market, Arc::clone(&rt.clock), options))
}

fn report(receipt: &TradeReceipt) {
    println!("{}", receipt.message);
    for breach in &receipt.breaches {
        eprintln!(
            "warning: rule {} breached ({})",
            breach.rule_code,
            breach.auto_action.as_deref().unwrap_or("none")
        );
    }
}

pub async fn run_buy(args: &BuyArgs, rt: &Runtime) -> Result<u8> {
    let executor = executor(rt, args.flags).await?;
    match executor.buy(&args.ticker, args.shares, args.price, args.stop_loss).await {
        Ok(receipt) => {
            report(&receipt);
            Ok(EXIT_OK)
        }
        Err(e) => rejected(e),
    }
}

pub async fn run_sell(args: &SellArgs, rt: &Runtime) -> Result<u8> {
    let executor = executor(rt, args.flags).await?;
    match executor.sell(&args.ticker, args.shares, args.price).await {
        Ok(receipt) => {
            report(&receipt);
            Ok(EXIT_OK)
        }
        Err(e) => rejected(e),
    }
}

pub async fn run_price(args: &PriceArgs, rt: &Runtime) -> Result<u8> {
    match &args.command {
        PriceCommand::Set { ticker, price } => {
            let ticker = match Ticker::parse(ticker) {
                Ok(t) => t,
                Err(e) => return rejected(e.into()),
            };
            if let Err(e) = folio_core::validate_price(*price) {
                return rejected(e.into());
            }
            repo::set_manual_price(rt.pool(), &ticker, *price).await?;
            println!("Manual price for {ticker} set to ${price:.2}");
            Ok(EXIT_OK)
        }
        PriceCommand::Remove { ticker } => {
            let ticker = match Ticker::parse(ticker) {
                Ok(t) => t,
                Err(e) => return rejected(e.into()),
            };
            if repo::remove_manual_price(rt.pool(), &ticker).await? {
                println!("Manual price for {ticker} removed");
                Ok(EXIT_OK)
            } else {
                eprintln!("No manual price for {ticker}");
                Ok(EXIT_REJECTED)
            }
        }
        PriceCommand::List => {
            print_json_pretty(&repo::list_manual_prices(rt.pool()).await?)?;
            Ok(EXIT_OK)
        }
    }
}
