//! # CSV Schemas
//!
//! Codecs for the two files the portfolio exchanges with spreadsheets and
//! older tooling:
//!
//! - `chatgpt_portfolio_update.csv`: [`PORTFOLIO_UPDATE_HEADERS`]
//! - `chatgpt_trade_log.csv`: [`TRADE_LOG_HEADERS`]
//!
//! plus the database layout of `portfolio_history` ([`HISTORY_COLUMNS`]),
//! used by `export --format db`.
//!
//! Readers are lenient: headers are normalized (trimmed, lower-cased,
//! spaces and dashes turned into underscores), unknown columns are ignored
//! and blank cells read as `None`. Either history layout is accepted; when a
//! `buy_price` column is present it supplies the per-share price and
//! `cost_basis` is taken to be the position total.

use std::collections::HashMap;
use std::io::{Read, Write};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use folio_core::FolioError;
use thiserror::Error;

use crate::snapshot::{round2, SnapshotRow};
use crate::trade::TradeLogEntry;

pub const PORTFOLIO_UPDATE_HEADERS: [&str; 12] = [
    "Date",
    "Ticker",
    "Shares",
    "Buy Price",
    "Cost Basis",
    "Stop Loss",
    "Current Price",
    "Total Value",
    "PnL",
    "Action",
    "Cash Balance",
    "Total Equity",
];

pub const TRADE_LOG_HEADERS: [&str; 9] = [
    "Date",
    "Ticker",
    "Shares Bought",
    "Buy Price",
    "Cost Basis",
    "PnL",
    "Reason",
    "Shares Sold",
    "Sell Price",
];

pub const HISTORY_COLUMNS: [&str; 11] = [
    "date",
    "ticker",
    "shares",
    "cost_basis",
    "stop_loss",
    "current_price",
    "total_value",
    "pnl",
    "action",
    "cash_balance",
    "total_equity",
];

#[derive(Error, Debug)]
pub enum CsvError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: invalid {column} '{value}'")]
    InvalidCell {
        row: usize,
        column: &'static str,
        value: String,
    },
}

impl From<CsvError> for FolioError {
    fn from(err: CsvError) -> Self {
        match err {
            CsvError::Io(e) => FolioError::Io(e),
            other => FolioError::Validation(other.to_string()),
        }
    }
}

/// Normalize a header: trim, lower-case, spaces and dashes to `_`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Column lookup over one record, keyed by normalized header.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            index: headers
                .iter()
                .enumerate()
                .map(|(i, h)| (normalize_header(h), i))
                .collect(),
        }
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn require(&self, name: &'static str) -> Result<(), CsvError> {
        if self.has(name) {
            Ok(())
        } else {
            Err(CsvError::MissingColumn(name))
        }
    }

    fn text<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn number(
        &self,
        record: &StringRecord,
        row: usize,
        name: &'static str,
    ) -> Result<Option<f64>, CsvError> {
        match self.text(record, name) {
            None => Ok(None),
            Some(raw) => raw
                .replace(['$', ','], "")
                .parse::<f64>()
                .map(Some)
                .map_err(|_| CsvError::InvalidCell {
                    row,
                    column: name,
                    value: raw.to_string(),
                }),
        }
    }

    fn date(&self, record: &StringRecord, row: usize) -> Result<Option<NaiveDate>, CsvError> {
        match self.text(record, "date") {
            None => Ok(None),
            Some(raw) => parse_date_cell(raw).map(Some).ok_or_else(|| CsvError::InvalidCell {
                row,
                column: "date",
                value: raw.to_string(),
            }),
        }
    }
}

/// Accepts `YYYY-MM-DD` optionally followed by a time component.
fn parse_date_cell(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input)
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Read history rows in either layout. Rows without a date or ticker are
/// skipped. An input with no header line yields no rows.
pub fn read_history<R: Read>(input: R) -> Result<Vec<SnapshotRow>, CsvError> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(Vec::new());
    }
    let cols = Columns::new(&headers);
    cols.require("date")?;
    cols.require("ticker")?;
    let update_layout = cols.has("buy_price");

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 2;
        let (Some(date), Some(ticker)) = (cols.date(&record, row)?, cols.text(&record, "ticker"))
        else {
            continue;
        };
        let per_share = if update_layout {
            cols.number(&record, row, "buy_price")?
        } else {
            cols.number(&record, row, "cost_basis")?
        };
        rows.push(SnapshotRow {
            date,
            ticker: ticker.to_ascii_uppercase(),
            shares: cols.number(&record, row, "shares")?,
            cost_basis: per_share,
            stop_loss: cols.number(&record, row, "stop_loss")?,
            current_price: cols.number(&record, row, "current_price")?,
            total_value: cols.number(&record, row, "total_value")?,
            pnl: cols.number(&record, row, "pnl")?,
            action: cols.text(&record, "action").map(str::to_string),
            cash_balance: cols.number(&record, row, "cash_balance")?,
            total_equity: cols.number(&record, row, "total_equity")?,
        });
    }
    Ok(rows)
}

/// Write history rows in the `portfolio_history` column layout.
pub fn write_history<W: Write>(output: W, rows: &[SnapshotRow]) -> Result<usize, CsvError> {
    let mut wtr = Writer::from_writer(output);
    wtr.write_record(HISTORY_COLUMNS)?;
    for r in rows {
        wtr.write_record([
            r.date.to_string(),
            r.ticker.clone(),
            cell(r.shares),
            cell(r.cost_basis),
            cell(r.stop_loss),
            cell(r.current_price),
            cell(r.total_value),
            cell(r.pnl),
            r.action.clone().unwrap_or_default(),
            cell(r.cash_balance),
            cell(r.total_equity),
        ])?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Write history rows in the `chatgpt_portfolio_update.csv` layout.
///
/// `Buy Price` is the per-share price; `Cost Basis` is the position total.
pub fn write_update<W: Write>(output: W, rows: &[SnapshotRow]) -> Result<usize, CsvError> {
    let mut wtr = Writer::from_writer(output);
    wtr.write_record(PORTFOLIO_UPDATE_HEADERS)?;
    for r in rows {
        let total_cost = match (r.cost_basis, r.shares) {
            (Some(price), Some(shares)) => Some(round2(price * shares)),
            _ => None,
        };
        wtr.write_record([
            r.date.to_string(),
            r.ticker.clone(),
            cell(r.shares),
            cell(r.cost_basis),
            cell(total_cost),
            cell(r.stop_loss),
            cell(r.current_price),
            cell(r.total_value),
            cell(r.pnl),
            r.action.clone().unwrap_or_default(),
            cell(r.cash_balance),
            cell(r.total_equity),
        ])?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Read a trade log. A legacy `shares` column stands in for
/// `shares_bought`.
pub fn read_trade_log<R: Read>(input: R) -> Result<Vec<TradeLogEntry>, CsvError> {
    let mut rdr = reader(input);
    let headers = rdr.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Ok(Vec::new());
    }
    let cols = Columns::new(&headers);
    cols.require("date")?;
    cols.require("ticker")?;
    let bought_col = if cols.has("shares_bought") { "shares_bought" } else { "shares" };

    let mut entries = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 2;
        let (Some(date), Some(ticker)) = (cols.date(&record, row)?, cols.text(&record, "ticker"))
        else {
            continue;
        };
        entries.push(TradeLogEntry {
            date,
            ticker: ticker.to_ascii_uppercase(),
            shares_bought: cols.number(&record, row, bought_col)?,
            buy_price: cols.number(&record, row, "buy_price")?,
            cost_basis: cols.number(&record, row, "cost_basis")?,
            pnl: cols.number(&record, row, "pnl")?,
            reason: cols.text(&record, "reason").map(str::to_string),
            shares_sold: cols.number(&record, row, "shares_sold")?,
            sell_price: cols.number(&record, row, "sell_price")?,
        });
    }
    Ok(entries)
}

pub fn write_trade_log<W: Write>(output: W, entries: &[TradeLogEntry]) -> Result<usize, CsvError> {
    let mut wtr = Writer::from_writer(output);
    wtr.write_record(TRADE_LOG_HEADERS)?;
    for e in entries {
        wtr.write_record([
            e.date.to_string(),
            e.ticker.clone(),
            cell(e.shares_bought),
            cell(e.buy_price),
            cell(e.cost_basis),
            cell(e.pnl),
            e.reason.clone().unwrap_or_default(),
            cell(e.shares_sold),
            cell(e.sell_price),
        ])?;
    }
    wtr.flush()?;
    Ok(entries.len())
}
