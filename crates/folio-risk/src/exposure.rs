//! Gross exposure scalar from regime probabilities and governance pressure.
//!
//! `scalar = 1 − 0.4·bear − 0.3·high_vol − min(0.05·open_breaches, 0.25)`,
//! rounded to four decimals and floored at [`MIN_EXPOSURE`].

use serde::{Deserialize, Serialize};

pub const MIN_EXPOSURE: f64 = 0.4;
const BEAR_WEIGHT: f64 = 0.4;
const HIGH_VOL_WEIGHT: f64 = 0.3;
const PER_BREACH: f64 = 0.05;
const MAX_BREACH_PENALTY: f64 = 0.25;

/// Regime probabilities in `[0, 1]`. Missing keys read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeProbabilities {
    pub bear: f64,
    pub high_vol: f64,
}

pub fn compute_exposure_scalar(regime: Option<&RegimeProbabilities>, open_breaches: usize) -> f64 {
    let mut scalar = 1.0;
    if let Some(r) = regime {
        scalar -= BEAR_WEIGHT * r.bear;
        scalar -= HIGH_VOL_WEIGHT * r.high_vol;
    }
    scalar -= (open_breaches as f64 * PER_BREACH).min(MAX_BREACH_PENALTY);
    ((scalar * 10_000.0).round() / 10_000.0).max(MIN_EXPOSURE)
}
