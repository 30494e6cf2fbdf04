//! # Market Data
//!
//! `MarketData` is the provider seam. Two providers ship:
//!
//! - [`SyntheticMarket`]: deterministic, seeded prices for `dev_stage`.
//!   Each ticker walks a geometric random path over business days starting
//!   at [`SYNTHETIC_EPOCH`]; the generator is seeded from `(seed, ticker)`
//!   so a candle for a given date is identical whatever window is requested.
//! - [`ManualPriceBook`]: operator price overrides.
//!
//! [`LayeredMarket`] consults overrides first and falls back to a provider
//! when one is configured. There is no live network feed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use folio_core::{validate_price, AppEnv, FolioError, Ticker};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub as_of: NaiveDate,
}

/// Today's traded range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayRange {
    pub low: f64,
    pub high: f64,
}

impl DayRange {
    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
}

pub trait MarketData: Send + Sync {
    fn name(&self) -> &'static str;

    fn quote(&self, ticker: &Ticker) -> Result<Quote, FolioError>;

    fn day_range(&self, ticker: &Ticker) -> Result<DayRange, FolioError>;

    /// Daily candles for `start..=end`, oldest first.
    fn daily_candles(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>, FolioError>;

    fn profile(&self, ticker: &Ticker) -> Result<CompanyProfile, FolioError>;
}

// ─── Synthetic provider ────────────────────────────────────────────────

/// First business day of every synthetic path.
pub const SYNTHETIC_EPOCH: (i32, u32, u32) = (2020, 1, 1);

const DRIFT: f64 = 0.0005;
const VOLATILITY: f64 = 0.02;
const START_PRICE: std::ops::Range<f64> = 4.0..30.0;
const MAX_INTRADAY_SPREAD: f64 = 0.02;
const VOLUME: std::ops::Range<u64> = 25_000..500_000;
const PRICE_FLOOR: f64 = 0.01;

pub const SYNTHETIC_SECTORS: [&str; 5] =
    ["Technology", "Healthcare", "Financials", "Energy", "Consumer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticMarket {
    seed: u64,
    today: NaiveDate,
}

impl SyntheticMarket {
    pub fn new(seed: u64, today: NaiveDate) -> Self {
        Self { seed, today }
    }

    fn ticker_seed(&self, ticker: &Ticker) -> u64 {
        let hash = Sha256::digest(format!("{}:{}", self.seed, ticker).as_bytes());
        let mut first = [0u8; 8];
        first.copy_from_slice(&hash[..8]);
        u64::from_be_bytes(first)
    }

    fn epoch() -> Result<NaiveDate, FolioError> {
        let (y, m, d) = SYNTHETIC_EPOCH;
        NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| FolioError::NoMarketData("invalid synthetic epoch".into()))
    }

    /// The full path from the epoch to `end`, oldest first.
    fn path(&self, ticker: &Ticker, end: NaiveDate) -> Result<Vec<Candle>, FolioError> {
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let mut prev_close = rng.gen_range(START_PRICE);
        let mut day = Self::epoch()?;
        let mut candles = Vec::new();
        while day <= end {
            if is_business_day(day) {
                let ret = DRIFT + VOLATILITY * standard_normal(&mut rng);
                let open = prev_close;
                let close = (prev_close * (1.0 + ret)).max(PRICE_FLOOR);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..MAX_INTRADAY_SPREAD));
                let low = (open.min(close) * (1.0 - rng.gen_range(0.0..MAX_INTRADAY_SPREAD)))
                    .max(PRICE_FLOOR);
                let volume = rng.gen_range(VOLUME);
                candles.push(Candle {
                    date: day,
                    open: round4(open),
                    high: round4(high),
                    low: round4(low),
                    close: round4(close),
                    volume,
                });
                prev_close = close;
            }
            day += Duration::days(1);
        }
        Ok(candles)
    }

    fn latest(&self, ticker: &Ticker) -> Result<Candle, FolioError> {
        self.path(ticker, self.today)?
            .pop()
            .ok_or_else(|| FolioError::NoMarketData(format!("no synthetic data for {ticker}")))
    }
}

impl MarketData for SyntheticMarket {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn quote(&self, ticker: &Ticker) -> Result<Quote, FolioError> {
        let candle = self.latest(ticker)?;
        Ok(Quote {
            ticker: ticker.to_string(),
            price: candle.close,
            as_of: candle.date,
        })
    }

    fn day_range(&self, ticker: &Ticker) -> Result<DayRange, FolioError> {
        let candle = self.latest(ticker)?;
        Ok(DayRange {
            low: candle.low,
            high: candle.high,
        })
    }

    fn daily_candles(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>, FolioError> {
        let candles: Vec<Candle> = self
            .path(ticker, end)?
            .into_iter()
            .filter(|c| c.date >= start)
            .collect();
        if candles.is_empty() {
            return Err(FolioError::NoMarketData(format!(
                "no synthetic candles for {ticker} between {start} and {end}"
            )));
        }
        Ok(candles)
    }

    fn profile(&self, ticker: &Ticker) -> Result<CompanyProfile, FolioError> {
        let idx = (self.ticker_seed(ticker) % SYNTHETIC_SECTORS.len() as u64) as usize;
        Ok(CompanyProfile {
            ticker: ticker.to_string(),
            name: format!("{ticker} Synthetic Corp"),
            sector: Some(SYNTHETIC_SECTORS[idx].to_string()),
        })
    }
}

fn is_business_day(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Box-Muller transform.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

// ─── Manual overrides ──────────────────────────────────────────────────

/// Operator-entered prices, keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualPriceBook {
    prices: BTreeMap<String, f64>,
    as_of: Option<NaiveDate>,
}

impl ManualPriceBook {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            prices: BTreeMap::new(),
            as_of: Some(as_of),
        }
    }

    pub fn from_prices(
        as_of: NaiveDate,
        prices: impl IntoIterator<Item = (String, f64)>,
    ) -> Self {
        Self {
            prices: prices.into_iter().collect(),
            as_of: Some(as_of),
        }
    }

    pub fn set(&mut self, ticker: &Ticker, price: f64) -> Result<(), FolioError> {
        validate_price(price)?;
        self.prices.insert(ticker.to_string(), price);
        Ok(())
    }

    pub fn remove(&mut self, ticker: &Ticker) -> Option<f64> {
        self.prices.remove(ticker.as_str())
    }

    pub fn get(&self, ticker: &Ticker) -> Option<f64> {
        self.prices.get(ticker.as_str()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.prices.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn missing(ticker: &Ticker, what: &str) -> FolioError {
        FolioError::NoMarketData(format!("no {what} for {ticker} in manual price book"))
    }
}

impl MarketData for ManualPriceBook {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn quote(&self, ticker: &Ticker) -> Result<Quote, FolioError> {
        let price = self.get(ticker).ok_or_else(|| Self::missing(ticker, "price"))?;
        let as_of = self
            .as_of
            .ok_or_else(|| Self::missing(ticker, "pricing date"))?;
        Ok(Quote {
            ticker: ticker.to_string(),
            price,
            as_of,
        })
    }

    fn day_range(&self, ticker: &Ticker) -> Result<DayRange, FolioError> {
        Err(Self::missing(ticker, "day range"))
    }

    fn daily_candles(
        &self,
        ticker: &Ticker,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Candle>, FolioError> {
        Err(Self::missing(ticker, "candles"))
    }

    fn profile(&self, ticker: &Ticker) -> Result<CompanyProfile, FolioError> {
        Err(Self::missing(ticker, "profile"))
    }
}

// ─── Layering ──────────────────────────────────────────────────────────

/// Manual overrides in front of an optional provider.
#[derive(Clone)]
pub struct LayeredMarket {
    overrides: ManualPriceBook,
    fallback: Option<Arc<dyn MarketData>>,
}

impl LayeredMarket {
    pub fn new(overrides: ManualPriceBook, fallback: Option<Arc<dyn MarketData>>) -> Self {
        Self {
            overrides,
            fallback,
        }
    }

    fn fallback(&self, ticker: &Ticker) -> Result<&Arc<dyn MarketData>, FolioError> {
        self.fallback.as_ref().ok_or_else(|| {
            FolioError::NoMarketData(format!("no market data provider configured for {ticker}"))
        })
    }
}

impl std::fmt::Debug for LayeredMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredMarket")
            .field("overrides", &self.overrides)
            .field("fallback", &self.fallback.as_ref().map(|m| m.name()))
            .finish()
    }
}

impl MarketData for LayeredMarket {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn quote(&self, ticker: &Ticker) -> Result<Quote, FolioError> {
        if self.overrides.get(ticker).is_some() {
            return self.overrides.quote(ticker);
        }
        self.fallback(ticker)?.quote(ticker)
    }

    fn day_range(&self, ticker: &Ticker) -> Result<DayRange, FolioError> {
        self.fallback(ticker)?.day_range(ticker)
    }

    fn daily_candles(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>, FolioError> {
        self.fallback(ticker)?.daily_candles(ticker, start, end)
    }

    fn profile(&self, ticker: &Ticker) -> Result<CompanyProfile, FolioError> {
        self.fallback(ticker)?.profile(ticker)
    }
}

/// Build the provider for an environment: `dev_stage` layers overrides over
/// the synthetic market; `production` uses overrides alone.
pub fn provider_for(
    env: AppEnv,
    seed: u64,
    today: NaiveDate,
    overrides: ManualPriceBook,
) -> Arc<dyn MarketData> {
    let fallback: Option<Arc<dyn MarketData>> = match env {
        AppEnv::DevStage => Some(Arc::new(SyntheticMarket::new(seed, today))),
        AppEnv::Production => None,
    };
    Arc::new(LayeredMarket::new(overrides, fallback))
}

/// Latest price per ticker. Failures are logged and priced at zero.
pub fn fetch_prices(market: &dyn MarketData, tickers: &[Ticker]) -> HashMap<String, f64> {
    tickers
        .iter()
        .map(|t| {
            let price = match market.quote(t) {
                Ok(q) => q.price,
                Err(e) => {
                    tracing::warn!(ticker = %t, provider = market.name(), error = %e, "price unavailable, using 0.0");
                    0.0
                }
            };
            (t.to_string(), price)
        })
        .collect()
}

/// Sector per ticker, skipping tickers without a profile.
pub fn fetch_sectors(market: &dyn MarketData, tickers: &[Ticker]) -> HashMap<String, String> {
    tickers
        .iter()
        .filter_map(|t| match market.profile(t) {
            Ok(p) => p.sector.map(|s| (t.to_string(), s)),
            Err(e) => {
                tracing::debug!(ticker = %t, error = %e, "no sector");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    #[test]
    fn synthetic_is_deterministic() {
        let a = SyntheticMarket::new(42, d(2024, 7, 5));
        let b = SyntheticMarket::new(42, d(2024, 7, 5));
        assert_eq!(a.quote(&t("ABC")).unwrap(), b.quote(&t("ABC")).unwrap());
        let other_seed = SyntheticMarket::new(7, d(2024, 7, 5));
        assert_ne!(
            a.quote(&t("ABC")).unwrap().price,
            other_seed.quote(&t("ABC")).unwrap().price
        );
    }

    #[test]
    fn candle_for_a_date_is_window_independent() {
        let m = SyntheticMarket::new(42, d(2024, 7, 5));
        let short = m.daily_candles(&t("ABC"), d(2024, 6, 3), d(2024, 6, 7)).unwrap();
        let long = m.daily_candles(&t("ABC"), d(2024, 1, 1), d(2024, 6, 30)).unwrap();
        let from_long: Vec<_> = long
            .into_iter()
            .filter(|c| c.date >= d(2024, 6, 3) && c.date <= d(2024, 6, 7))
            .collect();
        assert_eq!(short, from_long);
        assert_eq!(short.len(), 5);
    }

    #[test]
    fn candles_are_well_formed_business_days() {
        let m = SyntheticMarket::new(1, d(2024, 7, 5));
        for c in m.daily_candles(&t("XYZ"), d(2024, 1, 1), d(2024, 3, 31)).unwrap() {
            assert!(is_business_day(c.date));
            assert!(c.low <= c.open.min(c.close));
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low > 0.0);
            assert!(VOLUME.contains(&c.volume));
        }
    }

    #[test]
    fn quote_falls_on_last_business_day() {
        let m = SyntheticMarket::new(42, d(2024, 7, 7)); // Sunday
        let q = m.quote(&t("ABC")).unwrap();
        assert_eq!(q.as_of, d(2024, 7, 5));
        let range = m.day_range(&t("ABC")).unwrap();
        assert!(range.contains(q.price));
    }

    #[test]
    fn empty_window_is_no_market_data() {
        let m = SyntheticMarket::new(42, d(2024, 7, 5));
        let err = m.daily_candles(&t("ABC"), d(2019, 1, 1), d(2019, 6, 1)).unwrap_err();
        assert!(err.is_market_data());
    }

    #[test]
    fn profile_sector_is_stable() {
        let m = SyntheticMarket::new(42, d(2024, 7, 5));
        let p1 = m.profile(&t("ABC")).unwrap();
        let p2 = m.profile(&t("ABC")).unwrap();
        assert_eq!(p1, p2);
        assert!(SYNTHETIC_SECTORS.contains(&p1.sector.as_deref().unwrap()));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut book = ManualPriceBook::new(d(2024, 7, 5));
        book.set(&t("ABC"), 12.5).unwrap();
        assert!(book.set(&t("ABC"), -1.0).is_err());
        let market = provider_for(AppEnv::DevStage, 42, d(2024, 7, 5), book);
        assert_eq!(market.quote(&t("ABC")).unwrap().price, 12.5);
        assert!(market.quote(&t("XYZ")).is_ok());
        assert!(market.day_range(&t("ABC")).is_ok());
    }

    #[test]
    fn production_without_override_has_no_data() {
        let book = ManualPriceBook::from_prices(d(2024, 7, 5), [("ABC".to_string(), 3.0)]);
        let market = provider_for(AppEnv::Production, 42, d(2024, 7, 5), book);
        assert_eq!(market.quote(&t("ABC")).unwrap().price, 3.0);
        assert!(matches!(market.quote(&t("XYZ")), Err(FolioError::NoMarketData(_))));
        assert!(market.day_range(&t("ABC")).unwrap_err().is_market_data());
    }

    #[test]
    fn fetch_prices_defaults_to_zero() {
        let book = ManualPriceBook::from_prices(d(2024, 7, 5), [("ABC".to_string(), 3.0)]);
        let prices = fetch_prices(&book, &[t("ABC"), t("XYZ")]);
        assert_eq!(prices["ABC"], 3.0);
        assert_eq!(prices["XYZ"], 0.0);
    }

    #[test]
    fn fetch_sectors_skips_unknown() {
        let synthetic = SyntheticMarket::new(42, d(2024, 7, 5));
        assert_eq!(fetch_sectors(&synthetic, &[t("ABC"), t("XYZ")]).len(), 2);
        let book = ManualPriceBook::new(d(2024, 7, 5));
        assert!(fetch_sectors(&book, &[t("ABC")]).is_empty());
    }
}
