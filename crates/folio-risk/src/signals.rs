//! Threshold checks that turn a [`RiskSnapshot`] into risk events.

use folio_core::Severity;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::snapshot::RiskSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskEventType {
    ConcentrationTop1,
    ConcentrationTop3,
    Drawdown,
    Volatility,
    #[serde(rename = "var95")]
    Var95,
}

impl RiskEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConcentrationTop1 => "concentration_top1",
            Self::ConcentrationTop3 => "concentration_top3",
            Self::Drawdown => "drawdown",
            Self::Volatility => "volatility",
            Self::Var95 => "var95",
        }
    }
}

impl std::fmt::Display for RiskEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits in percent. Drawdown fires below its (negative) limit, the others
/// above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub top1_concentration_pct: f64,
    pub top3_concentration_pct: f64,
    pub max_drawdown_pct: f64,
    pub rolling_vol_pct: f64,
    pub var_95_pct: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            top1_concentration_pct: 40.0,
            top3_concentration_pct: 60.0,
            max_drawdown_pct: -15.0,
            rolling_vol_pct: 35.0,
            var_95_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSignal {
    pub event_type: RiskEventType,
    pub severity: Severity,
    pub value: f64,
}

impl RiskSignal {
    pub fn payload(&self) -> Value {
        json!({ "value": self.value })
    }
}

/// Signals fired by `snapshot`, in a fixed order.
pub fn signals(snapshot: &RiskSnapshot, thresholds: &RiskThresholds) -> Vec<RiskSignal> {
    let checks = [
        (
            RiskEventType::ConcentrationTop1,
            snapshot.top1_concentration_pct,
            snapshot.top1_concentration_pct > thresholds.top1_concentration_pct,
        ),
        (
            RiskEventType::ConcentrationTop3,
            snapshot.top3_concentration_pct,
            snapshot.top3_concentration_pct > thresholds.top3_concentration_pct,
        ),
        (
            RiskEventType::Drawdown,
            snapshot.max_drawdown_pct,
            snapshot.max_drawdown_pct < thresholds.max_drawdown_pct,
        ),
        (
            RiskEventType::Volatility,
            snapshot.rolling_20d_vol_pct,
            snapshot.rolling_20d_vol_pct > thresholds.rolling_vol_pct,
        ),
        (
            RiskEventType::Var95,
            snapshot.var_95_pct,
            snapshot.var_95_pct > thresholds.var_95_pct,
        ),
    ];
    checks
        .into_iter()
        .filter(|(_, _, fired)| *fired)
        .map(|(event_type, value, _)| RiskSignal {
            event_type,
            severity: Severity::Warn,
            value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(top1: f64, top3: f64, vol: f64, dd: f64, var: f64) -> RiskSnapshot {
        RiskSnapshot {
            equity: 1000.0,
            cash: 100.0,
            top1_concentration_pct: top1,
            top3_concentration_pct: top3,
            rolling_20d_vol_pct: vol,
            max_drawdown_pct: dd,
            var_95_pct: var,
        }
    }

    #[test]
    fn all_five_fire() {
        let fired = signals(&snapshot(50.0, 70.0, 40.0, -20.0, 6.0), &RiskThresholds::default());
        let kinds: Vec<_> = fired.iter().map(|s| s.event_type.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["concentration_top1", "concentration_top3", "drawdown", "volatility", "var95"]
        );
        assert!(fired.iter().all(|s| s.severity == Severity::Warn));
        assert_eq!(fired[2].payload(), json!({"value": -20.0}));
    }

    #[test]
    fn limits_are_strict() {
        let fired = signals(&snapshot(40.0, 60.0, 35.0, -15.0, 5.0), &RiskThresholds::default());
        assert!(fired.is_empty());
    }

    #[test]
    fn custom_thresholds() {
        let tight = RiskThresholds {
            var_95_pct: 1.0,
            ..RiskThresholds::default()
        };
        let fired = signals(&snapshot(0.0, 0.0, 0.0, 0.0, 2.0), &tight);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].event_type, RiskEventType::Var95);
    }

    #[test]
    fn thresholds_deserialize_with_defaults() {
        let t: RiskThresholds = serde_json::from_str(r#"{"rolling_vol_pct": 20}"#).unwrap();
        assert_eq!(t.rolling_vol_pct, 20.0);
        assert_eq!(t.top1_concentration_pct, 40.0);
        assert_eq!(serde_json::to_string(&RiskEventType::Var95).unwrap(), "\"var95\"");
    }
}
