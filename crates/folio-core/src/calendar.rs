//! # Trading Calendar
//!
//! Weekday trading days minus configured holidays, regular session hours,
//! and a `Clock` seam so date-dependent logic can be tested with a fixed
//! date.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, Utc, Weekday};

use crate::error::{ConfigError, FolioError};

/// Source of "now" for date-dependent operations.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock; `today()` uses the host's local date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one date, at midnight UTC.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Regular session: 09:30 to 16:00 exchange time.
pub const MARKET_OPEN: (u32, u32) = (9, 30);
pub const MARKET_CLOSE: (u32, u32) = (16, 0);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Load holidays from a JSON array of `YYYY-MM-DD` strings.
    pub fn from_json_file(path: &Path) -> Result<Self, FolioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, FolioError> {
        let raw: Vec<String> = serde_json::from_str(text).map_err(|e| ConfigError::InvalidValue {
            key: "holidays".into(),
            reason: e.to_string(),
        })?;
        let mut holidays = BTreeSet::new();
        for day in raw {
            holidays.insert(parse_date("holidays", &day)?);
        }
        Ok(Self { holidays })
    }

    pub fn with_holidays(mut self, more: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(more);
        self
    }

    pub fn holidays(&self) -> impl Iterator<Item = &NaiveDate> {
        self.holidays.iter()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.is_holiday(date)
    }

    /// True when `time` falls inside the regular session of a trading day.
    pub fn is_market_open(&self, date: NaiveDate, time: NaiveTime) -> bool {
        let open = NaiveTime::from_hms_opt(MARKET_OPEN.0, MARKET_OPEN.1, 0);
        let close = NaiveTime::from_hms_opt(MARKET_CLOSE.0, MARKET_CLOSE.1, 0);
        match (open, close) {
            (Some(open), Some(close)) => {
                self.is_trading_day(date) && time >= open && time <= close
            }
            _ => false,
        }
    }

    /// The first trading day strictly after `date`.
    pub fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date + Duration::days(1);
        while !self.is_trading_day(next) {
            next += Duration::days(1);
        }
        next
    }

    /// The most recent trading day on or before `date`.
    pub fn last_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        while !self.is_trading_day(day) {
            day -= Duration::days(1);
        }
        day
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub(crate) fn parse_date(key: &str, raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{raw}': {e}"),
    })
}
