//! # Performance Analytics
//!
//! Backward-looking statistics over daily series: per-series drawdown,
//! volatility with a zero risk-free Sharpe ratio, Sortino ratio, and
//! win/loss streaks. Returns here are in percent.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::snapshot::{daily_returns, TRADING_DAYS_PER_YEAR};

const DOWNSIDE_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawdownStats {
    /// Worst percentage drop from the running peak (≤ 0).
    pub max_drawdown_pct: f64,
    /// Worst absolute drop from the running peak (≤ 0).
    pub max_drawdown_dollar: f64,
}

/// Drawdown of a chronological value series; `None` when empty.
pub fn max_drawdown(values: &[f64]) -> Option<DrawdownStats> {
    let mut peak = f64::NEG_INFINITY;
    let mut worst_pct = 0.0_f64;
    let mut worst_dollar = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        let drop = v - peak;
        worst_dollar = worst_dollar.min(drop);
        if peak > 0.0 {
            worst_pct = worst_pct.min(drop / peak * 100.0);
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(DrawdownStats {
            max_drawdown_pct: worst_pct,
            max_drawdown_dollar: worst_dollar,
        })
    }
}

/// Drawdown per ticker from chronological position values.
pub fn drawdowns_by_ticker(series: &BTreeMap<String, Vec<f64>>) -> BTreeMap<String, DrawdownStats> {
    series
        .iter()
        .filter_map(|(ticker, values)| max_drawdown(values).map(|d| (ticker.clone(), d)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VolatilityStats {
    pub daily_volatility_pct: f64,
    pub annualized_volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub avg_daily_return_pct: f64,
}

/// Daily percentage returns of a chronological equity series.
pub fn percent_returns(equity: &[f64]) -> Vec<f64> {
    daily_returns(equity).into_iter().map(|r| r * 100.0).collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Sample standard deviation; zero with fewer than two points.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64).sqrt()
}

pub fn portfolio_volatility(equity: &[f64]) -> VolatilityStats {
    let returns = percent_returns(equity);
    let daily = sample_std(&returns);
    let avg = mean(&returns);
    VolatilityStats {
        daily_volatility_pct: daily,
        annualized_volatility_pct: daily * TRADING_DAYS_PER_YEAR.sqrt(),
        sharpe_ratio: if daily > 0.0 {
            avg / daily * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        },
        avg_daily_return_pct: avg,
    }
}

/// Sortino ratio at a zero risk-free rate.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let deviation = if downside.is_empty() {
        DOWNSIDE_FLOOR
    } else {
        (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt()
    };
    mean(returns) / deviation
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

/// Longest runs of positive and negative returns. Flat days break neither.
pub fn streaks(returns: &[f64]) -> Streaks {
    let (mut wins, mut losses) = (0usize, 0usize);
    let mut out = Streaks::default();
    for &r in returns {
        if r > 0.0 {
            wins += 1;
            losses = 0;
            out.max_consecutive_wins = out.max_consecutive_wins.max(wins);
        } else if r < 0.0 {
            losses += 1;
            wins = 0;
            out.max_consecutive_losses = out.max_consecutive_losses.max(losses);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_tracks_pct_and_dollars() {
        let d = max_drawdown(&[100.0, 150.0, 120.0, 160.0, 140.0]).unwrap();
        assert!((d.max_drawdown_pct + 20.0).abs() < 1e-9);
        assert!((d.max_drawdown_dollar + 30.0).abs() < 1e-9);
        assert!(max_drawdown(&[]).is_none());
    }

    #[test]
    fn per_ticker_drawdowns() {
        let series = BTreeMap::from([
            ("AAA".to_string(), vec![10.0, 5.0]),
            ("BBB".to_string(), vec![]),
        ]);
        let out = drawdowns_by_ticker(&series);
        assert_eq!(out.len(), 1);
        assert!((out["AAA"].max_drawdown_pct + 50.0).abs() < 1e-9);
    }

    #[test]
    fn volatility_and_sharpe() {
        // returns: +10%, -10%
        let v = portfolio_volatility(&[100.0, 110.0, 99.0]);
        assert!((v.avg_daily_return_pct - 0.0).abs() < 1e-9);
        assert!((v.daily_volatility_pct - 200f64.sqrt()).abs() < 1e-9);
        assert!((v.annualized_volatility_pct - 200f64.sqrt() * 252f64.sqrt()).abs() < 1e-9);
        assert!(v.sharpe_ratio.abs() < 1e-9);
        assert_eq!(portfolio_volatility(&[100.0]), VolatilityStats::default());
    }

    #[test]
    fn sortino_uses_downside_only() {
        let r = [2.0, -1.0, 3.0, -3.0];
        // mean 0.25, downside deviation sqrt((1 + 9) / 2)
        let expected = 0.25 / 5f64.sqrt();
        assert!((sortino_ratio(&r) - expected).abs() < 1e-12);
        assert!(sortino_ratio(&[1.0, 2.0]) > 1e9);
        assert_eq!(sortino_ratio(&[]), 0.0);
    }

    #[test]
    fn streak_counting() {
        let s = streaks(&[1.0, 2.0, 0.0, 3.0, -1.0, -2.0, 1.0]);
        assert_eq!(s.max_consecutive_wins, 3);
        assert_eq!(s.max_consecutive_losses, 2);
    }
}
