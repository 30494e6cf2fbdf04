//! # Risk Snapshot
//!
//! Point-in-time concentration, volatility, drawdown and VaR figures.
//!
//! Inputs come from persisted state: position values at cost, the most recent
//! [`EQUITY_WINDOW`] daily `total_equity` values (newest first) and cash.
//! Equity is the newest history value; with no positive equity the snapshot
//! is all zeros apart from cash.

use serde::{Deserialize, Serialize};

/// Number of daily equity points considered.
pub const EQUITY_WINDOW: usize = 40;
/// Returns used for rolling volatility.
pub const VOL_WINDOW: usize = 20;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const VAR_QUANTILE: f64 = 0.05;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskInputs {
    pub position_values: Vec<f64>,
    /// Daily total equity, newest first.
    pub equity_history: Vec<f64>,
    pub cash: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub equity: f64,
    pub cash: f64,
    pub top1_concentration_pct: f64,
    pub top3_concentration_pct: f64,
    pub rolling_20d_vol_pct: f64,
    pub max_drawdown_pct: f64,
    pub var_95_pct: f64,
}

pub fn compute_snapshot(inputs: &RiskInputs) -> RiskSnapshot {
    let history: Vec<f64> = inputs
        .equity_history
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .take(EQUITY_WINDOW)
        .collect();
    let equity = history.first().copied().unwrap_or(0.0);
    if equity <= 0.0 {
        return RiskSnapshot {
            cash: inputs.cash,
            ..RiskSnapshot::default()
        };
    }

    let mut values = inputs.position_values.clone();
    values.sort_by(|a, b| b.total_cmp(a));
    let top1 = values.first().map_or(0.0, |v| v / equity * 100.0);
    let top3 = if values.is_empty() {
        0.0
    } else {
        values.iter().take(3).sum::<f64>() / equity * 100.0
    };

    let chronological: Vec<f64> = history.iter().rev().copied().collect();
    let returns = daily_returns(&chronological);

    let rolling_20d_vol_pct = if returns.len() >= 2 {
        let recent = &returns[returns.len().saturating_sub(VOL_WINDOW)..];
        population_std(recent) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
    } else {
        0.0
    };

    RiskSnapshot {
        equity,
        cash: inputs.cash,
        top1_concentration_pct: top1,
        top3_concentration_pct: top3,
        rolling_20d_vol_pct,
        max_drawdown_pct: max_drawdown_pct(&chronological),
        var_95_pct: historical_var(&returns),
    }
}

/// Simple returns between consecutive points with a positive base.
pub fn daily_returns(chronological: &[f64]) -> Vec<f64> {
    chronological
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

pub fn population_std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Most negative percentage drop from a running peak; zero or negative.
pub fn max_drawdown_pct(chronological: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for &v in chronological {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min((v / peak - 1.0) * 100.0);
        }
    }
    worst
}

/// Historical 95% VaR in percent: the negated 5th-percentile return.
pub fn historical_var(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((VAR_QUANTILE * sorted.len() as f64) as usize).min(sorted.len() - 1);
    -sorted[idx] * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_equity_keeps_cash_only() {
        let snap = compute_snapshot(&RiskInputs {
            position_values: vec![100.0],
            equity_history: vec![],
            cash: 25.0,
        });
        assert_eq!(
            snap,
            RiskSnapshot {
                cash: 25.0,
                ..RiskSnapshot::default()
            }
        );
    }

    #[test]
    fn concentration_uses_newest_equity() {
        let snap = compute_snapshot(&RiskInputs {
            position_values: vec![100.0, 400.0, 50.0, 25.0],
            equity_history: vec![1000.0, 900.0],
            cash: 0.0,
        });
        assert_eq!(snap.equity, 1000.0);
        assert!((snap.top1_concentration_pct - 40.0).abs() < 1e-9);
        assert!((snap.top3_concentration_pct - 55.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_from_running_peak() {
        // chronological: 100, 120, 90, 110
        let snap = compute_snapshot(&RiskInputs {
            position_values: vec![],
            equity_history: vec![110.0, 90.0, 120.0, 100.0],
            cash: 0.0,
        });
        assert!((snap.max_drawdown_pct + 25.0).abs() < 1e-9);
        assert_eq!(snap.top1_concentration_pct, 0.0);
    }

    #[test]
    fn volatility_needs_two_returns() {
        let one_return = compute_snapshot(&RiskInputs {
            position_values: vec![],
            equity_history: vec![110.0, 100.0],
            cash: 0.0,
        });
        assert_eq!(one_return.rolling_20d_vol_pct, 0.0);
        assert!((one_return.var_95_pct + 10.0).abs() < 1e-9);

        let two_returns = compute_snapshot(&RiskInputs {
            position_values: vec![],
            equity_history: vec![100.0, 110.0, 100.0],
            cash: 0.0,
        });
        // returns +10%, -9.0909%; pstdev = 9.5454%
        let expected = ((0.1 + 1.0 / 11.0) / 2.0) * 252f64.sqrt() * 100.0;
        assert!((two_returns.rolling_20d_vol_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn var_picks_fifth_percentile() {
        let mut returns: Vec<f64> = (0..40).map(|i| f64::from(i) / 1000.0).collect();
        returns[7] = -0.08;
        returns[8] = -0.06;
        // n = 40 -> index 2 of the sorted list
        returns[9] = -0.07;
        assert!((historical_var(&returns) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn history_is_capped_to_window() {
        let mut history = vec![100.0; EQUITY_WINDOW];
        history.push(1_000_000.0); // 41st point, ignored
        let snap = compute_snapshot(&RiskInputs {
            position_values: vec![],
            equity_history: history,
            cash: 0.0,
        });
        assert_eq!(snap.max_drawdown_pct, 0.0);
    }

    #[test]
    fn non_positive_base_returns_are_skipped() {
        let returns = daily_returns(&[0.0, 10.0, 11.0]);
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 0.1).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn drawdown_is_never_positive(series in proptest::collection::vec(1.0f64..1e6, 0..60)) {
            prop_assert!(max_drawdown_pct(&series) <= 0.0);
            prop_assert!(max_drawdown_pct(&series) >= -100.0);
        }

        #[test]
        fn concentration_is_bounded_by_position_sum(values in proptest::collection::vec(0.0f64..1e4, 1..10)) {
            let equity: f64 = values.iter().sum::<f64>() + 1.0;
            let snap = compute_snapshot(&RiskInputs {
                position_values: values,
                equity_history: vec![equity],
                cash: 1.0,
            });
            prop_assert!(snap.top1_concentration_pct <= snap.top3_concentration_pct + 1e-9);
            prop_assert!(snap.top3_concentration_pct <= 100.0);
        }
    }
}
