//! # CSV Import and Export
//!
//! Moves `portfolio_history` and `trade_log` between SQLite and the CSV
//! layouts in `folio_portfolio::csv_format`.
//!
//! Importing history replaces the whole table and derives current holdings
//! from the latest date: every non-`TOTAL` row becomes a position whose buy
//! price is the row's per-share cost basis, and cash comes from that date's
//! `TOTAL` row.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use folio_core::{FolioError, Ticker};
use folio_portfolio::csv_format::{read_history, read_trade_log, write_history, write_trade_log, write_update};
use folio_portfolio::{Portfolio, Position, SnapshotRow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::ledger::Ledger;
use crate::repo;

pub const IMPORT: &str = "import";
pub const SKIP_MISSING: &str = "missing";
pub const SKIP_EMPTY: &str = "empty";

/// Column layout for history exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// `portfolio_history` column names.
    #[default]
    Db,
    /// `chatgpt_portfolio_update.csv` headers.
    Update,
}

impl std::str::FromStr for ExportFormat {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db" => Ok(Self::Db),
            "update" => Ok(Self::Update),
            other => Err(FolioError::Validation(format!(
                "unknown export format '{other}': expected db or update"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub rows_history: usize,
    pub rows_portfolio: usize,
    pub cash: f64,
}

impl ImportReport {
    fn skipped(reason: &str) -> Self {
        Self {
            skipped: true,
            reason: Some(reason.to_string()),
            rows_history: 0,
            rows_portfolio: 0,
            cash: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeImportReport {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub rows: usize,
}

/// Holdings and cash implied by the latest date in `rows`.
pub fn derive_holdings(rows: &[SnapshotRow]) -> Result<Portfolio, FolioError> {
    let Some(latest) = rows.iter().map(|r| r.date).max() else {
        return Ok(Portfolio::default());
    };
    let day: Vec<&SnapshotRow> = rows.iter().filter(|r| r.date == latest).collect();
    let positions = day
        .iter()
        .filter(|r| !r.is_total())
        .map(|r| {
            let shares = r.shares.unwrap_or(0.0);
            let buy_price = r.cost_basis.unwrap_or(0.0);
            Ok(Position {
                ticker: Ticker::parse(&r.ticker)?,
                shares,
                stop_loss: r.stop_loss.unwrap_or(0.0),
                buy_price,
                cost_basis: buy_price * shares,
            })
        })
        .collect::<Result<Vec<_>, FolioError>>()?;
    let cash = day
        .iter()
        .rev()
        .find(|r| r.is_total())
        .and_then(|r| r.cash_balance)
        .unwrap_or(0.0);
    Ok(Portfolio::new(positions, cash))
}

/// Replace history, holdings and cash from a history CSV.
pub async fn import_history_csv(ledger: &Ledger, path: &Path) -> Result<ImportReport, ServiceError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "history import skipped: file missing");
        return Ok(ImportReport::skipped(SKIP_MISSING));
    }
    let rows = read_history(BufReader::new(File::open(path)?))?;
    if rows.is_empty() {
        tracing::info!(path = %path.display(), "history import skipped: no rows");
        return Ok(ImportReport::skipped(SKIP_EMPTY));
    }
    let portfolio = derive_holdings(&rows)?;

    let mut tx = ledger.pool().begin().await?;
    repo::replace_history(&mut tx, &rows).await?;
    repo::save_portfolio(&mut tx, &portfolio).await?;
    tx.commit().await?;

    let report = ImportReport {
        skipped: false,
        reason: None,
        rows_history: rows.len(),
        rows_portfolio: portfolio.len(),
        cash: portfolio.cash,
    };
    ledger
        .log_audit_event(
            IMPORT,
            &json!({
                "source": path.display().to_string(),
                "table": "portfolio_history",
                "rows_history": report.rows_history,
                "rows_portfolio": report.rows_portfolio,
                "cash": report.cash,
            }),
            None,
            None,
        )
        .await?;
    tracing::info!(
        rows_history = report.rows_history,
        rows_portfolio = report.rows_portfolio,
        cash = report.cash,
        "history imported"
    );
    Ok(report)
}

/// Replace the trade log from a trade-log CSV.
pub async fn import_trade_log_csv(ledger: &Ledger, path: &Path) -> Result<TradeImportReport, ServiceError> {
    if !path.exists() {
        return Ok(TradeImportReport {
            skipped: true,
            reason: Some(SKIP_MISSING.into()),
            rows: 0,
        });
    }
    let entries = read_trade_log(BufReader::new(File::open(path)?))?;
    if entries.is_empty() {
        return Ok(TradeImportReport {
            skipped: true,
            reason: Some(SKIP_EMPTY.into()),
            rows: 0,
        });
    }
    let mut tx = ledger.pool().begin().await?;
    repo::replace_trade_log(&mut tx, &entries).await?;
    tx.commit().await?;

    ledger
        .log_audit_event(
            IMPORT,
            &json!({
                "source": path.display().to_string(),
                "table": "trade_log",
                "rows": entries.len(),
            }),
            None,
            None,
        )
        .await?;
    tracing::info!(rows = entries.len(), "trade log imported");
    Ok(TradeImportReport {
        skipped: false,
        reason: None,
        rows: entries.len(),
    })
}

fn create_output(out: &Path) -> Result<BufWriter<File>, ServiceError> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(out)?))
}

/// Write `portfolio_history` ordered by date and ticker. Returns the row
/// count.
pub async fn export_history_csv(pool: &SqlitePool, out: &Path, format: ExportFormat) -> Result<usize, ServiceError> {
    let rows = repo::load_history(pool).await?;
    let mut writer = create_output(out)?;
    let written = match format {
        ExportFormat::Db => write_history(&mut writer, &rows)?,
        ExportFormat::Update => write_update(&mut writer, &rows)?,
    };
    writer.flush()?;
    tracing::info!(rows = written, out = %out.display(), ?format, "history exported");
    Ok(written)
}

pub async fn export_trade_log_csv(pool: &SqlitePool, out: &Path) -> Result<usize, ServiceError> {
    let entries = repo::list_trades(pool).await?;
    let mut writer = create_output(out)?;
    let written = write_trade_log(&mut writer, &entries)?;
    writer.flush()?;
    tracing::info!(rows = written, out = %out.display(), "trade log exported");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use folio_portfolio::csv_format::{PORTFOLIO_UPDATE_HEADERS, TRADE_LOG_HEADERS};

    const UPDATE_CSV: &str = "\
Date,Ticker,Shares,Buy Price,Cost Basis,Stop Loss,Current Price,Total Value,PnL,Action,Cash Balance,Total Equity
2024-01-02,ABC,10,5,50,4,6,60,10,HOLD,,
2024-01-02,TOTAL,,,,,,60,10,,100,160
2024-01-03,ABC,10,5,50,4,7,70,20,HOLD,,
2024-01-03,XYZ,2,20,40,0,20,40,0,HOLD,,
2024-01-03,TOTAL,,,,,,110,20,,60,170
";

    const DB_CSV: &str = "\
date,ticker,shares,cost_basis,stop_loss,current_price,total_value,pnl,action,cash_balance,total_equity
2024-01-03,ABC,10,5,4,7,70,20,HOLD,,
2024-01-03,TOTAL,,,,,70,20,,60,130
";

    async fn ledger() -> Ledger {
        Ledger::new(memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn missing_and_empty_files_are_skipped() {
        let ledger = ledger().await;
        let dir = tempfile::tempdir().unwrap();
        let report = import_history_csv(&ledger, &dir.path().join("nope.csv")).await.unwrap();
        assert!(report.skipped);
        assert_eq!(report.reason.as_deref(), Some(SKIP_MISSING));

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        let report = import_history_csv(&ledger, &empty).await.unwrap();
        assert_eq!(report.reason.as_deref(), Some(SKIP_EMPTY));

        let trades = import_trade_log_csv(&ledger, &dir.path().join("nope.csv")).await.unwrap();
        assert!(trades.skipped);
        assert!(ledger.recent_audit_events(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_layout_import_derives_latest_holdings() {
        let ledger = ledger().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        std::fs::write(&path, UPDATE_CSV).unwrap();

        let report = import_history_csv(&ledger, &path).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.rows_history, 5);
        assert_eq!(report.rows_portfolio, 2);
        assert_eq!(report.cash, 60.0);

        let loaded = repo::load_portfolio(ledger.pool()).await.unwrap().portfolio;
        let xyz = loaded.position(&Ticker::parse("XYZ").unwrap()).unwrap();
        assert_eq!(xyz.buy_price, 20.0);
        assert_eq!(xyz.cost_basis, 40.0);
        assert_eq!(loaded.cash, 60.0);

        let audit = ledger.recent_audit_events(1).await.unwrap();
        assert_eq!(audit[0].category, IMPORT);
        assert_eq!(audit[0].payload()["rows_history"], json!(5));
    }

    #[tokio::test]
    async fn db_layout_import_replaces_previous_history() {
        let ledger = ledger().await;
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        std::fs::write(&first, UPDATE_CSV).unwrap();
        std::fs::write(&second, DB_CSV).unwrap();

        import_history_csv(&ledger, &first).await.unwrap();
        let report = import_history_csv(&ledger, &second).await.unwrap();
        assert_eq!(report.rows_history, 2);
        assert_eq!(repo::load_history(ledger.pool()).await.unwrap().len(), 2);
        let loaded = repo::load_portfolio(ledger.pool()).await.unwrap().portfolio;
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn export_writes_both_layouts() {
        let ledger = ledger().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.csv");
        std::fs::write(&path, UPDATE_CSV).unwrap();
        import_history_csv(&ledger, &path).await.unwrap();

        let db_out = dir.path().join("out").join("history.csv");
        assert_eq!(export_history_csv(ledger.pool(), &db_out, ExportFormat::Db).await.unwrap(), 5);
        let text = std::fs::read_to_string(&db_out).unwrap();
        assert!(text.starts_with("date,ticker,shares,cost_basis"));

        let update_out = dir.path().join("update.csv");
        export_history_csv(ledger.pool(), &update_out, ExportFormat::Update).await.unwrap();
        let text = std::fs::read_to_string(&update_out).unwrap();
        assert_eq!(text.lines().next().unwrap(), PORTFOLIO_UPDATE_HEADERS.join(","));
        // Re-importing our own export yields the same holdings.
        let other = Ledger::new(memory_pool().await.unwrap());
        let again = import_history_csv(&other, &update_out).await.unwrap();
        assert_eq!(again.rows_portfolio, 2);
        assert_eq!(again.cash, 60.0);
    }

    #[tokio::test]
    async fn trade_log_round_trip() {
        let ledger = ledger().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        std::fs::write(
            &path,
            "Date,Ticker,Shares Bought,Buy Price,Cost Basis,PnL,Reason,Shares Sold,Sell Price\n\
             2024-01-02,ABC,10,5,50,0,MANUAL BUY - New position,,\n\
             2024-01-03,ABC,,5,20,4,MANUAL SELL - User,4,6\n",
        )
        .unwrap();
        let report = import_trade_log_csv(&ledger, &path).await.unwrap();
        assert_eq!(report.rows, 2);

        let out = dir.path().join("trades_out.csv");
        assert_eq!(export_trade_log_csv(ledger.pool(), &out).await.unwrap(), 2);
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().next().unwrap(), TRADE_LOG_HEADERS.join(","));
    }

    #[test]
    fn export_format_parses() {
        assert_eq!("UPDATE".parse::<ExportFormat>().unwrap(), ExportFormat::Update);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn invalid_ticker_in_latest_day_fails() {
        let rows = folio_portfolio::csv_format::read_history(
            "date,ticker,shares,cost_basis\n2024-01-03,not a ticker,1,1\n".as_bytes(),
        )
        .unwrap();
        assert!(derive_holdings(&rows).is_err());
    }
}
