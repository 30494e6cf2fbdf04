//! # Risk Monitor
//!
//! On-demand risk evaluation over the persisted portfolio: compute a
//! snapshot, append one chained `risk_event` per fired threshold, and derive
//! the gross exposure scalar from regime probabilities and open breaches.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use folio_ledger::RiskEvent;
use folio_risk::snapshot::EQUITY_WINDOW;
use folio_risk::{
    compute_exposure_scalar, compute_snapshot, drawdowns_by_ticker, max_drawdown, percent_returns,
    portfolio_volatility, signals, sortino_ratio, streaks, DrawdownStats, RegimeProbabilities, RiskInputs,
    RiskSnapshot, RiskThresholds, Streaks, VolatilityStats,
};
use serde::Serialize;

use crate::error::ServiceError;
use crate::ledger::Ledger;
use crate::repo;

/// Backward-looking statistics over the stored daily history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days: usize,
    pub volatility: VolatilityStats,
    pub sortino_ratio: f64,
    pub streaks: Streaks,
    pub drawdown: Option<DrawdownStats>,
    pub drawdowns_by_ticker: BTreeMap<String, DrawdownStats>,
}

#[derive(Debug, Clone)]
pub struct RiskMonitor {
    ledger: Ledger,
    thresholds: RiskThresholds,
}

impl RiskMonitor {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            thresholds: RiskThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Position values at cost, the last [`EQUITY_WINDOW`] equity points and
    /// cash.
    pub async fn compute_snapshot(&self) -> Result<RiskSnapshot, ServiceError> {
        let pool = self.ledger.pool();
        let loaded = repo::load_portfolio(pool).await?;
        let inputs = RiskInputs {
            position_values: loaded.portfolio.positions().map(|p| p.value_at_cost()).collect(),
            equity_history: repo::equity_history(pool, EQUITY_WINDOW).await?,
            cash: loaded.portfolio.cash,
        };
        let snapshot = compute_snapshot(&inputs);
        tracing::debug!(?snapshot, "risk snapshot computed");
        Ok(snapshot)
    }

    /// Log one risk event per fired threshold, in a fixed order.
    pub async fn emit_risk_events(&self, snapshot: &RiskSnapshot) -> Result<Vec<RiskEvent>, ServiceError> {
        let mut emitted = Vec::new();
        for signal in signals(snapshot, &self.thresholds) {
            emitted.push(
                self.ledger
                    .log_risk_event(signal.event_type.as_str(), signal.severity, &signal.payload())
                    .await?,
            );
        }
        Ok(emitted)
    }

    pub async fn exposure_scalar(&self, regime: Option<&RegimeProbabilities>) -> Result<f64, ServiceError> {
        let open = self.ledger.count_open_breaches().await?;
        Ok(compute_exposure_scalar(regime, open))
    }

    pub async fn performance(&self) -> Result<PerformanceReport, ServiceError> {
        let pool = self.ledger.pool();
        let series = repo::equity_series(pool).await?;
        let equity: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let returns = percent_returns(&equity);
        Ok(PerformanceReport {
            start: series.first().map(|(d, _)| *d),
            end: series.last().map(|(d, _)| *d),
            days: series.len(),
            volatility: portfolio_volatility(&equity),
            sortino_ratio: sortino_ratio(&returns),
            streaks: streaks(&returns),
            drawdown: max_drawdown(&equity),
            drawdowns_by_ticker: drawdowns_by_ticker(&repo::value_series_by_ticker(pool).await?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use folio_core::{Severity, Ticker};
    use folio_ledger::BreachStatus;
    use folio_portfolio::{build_snapshot, Portfolio, Position};
    use serde_json::json;
    use std::collections::HashMap;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    /// One concentrated position; equity path 1000 -> 1200 -> 900.
    async fn monitor_with_history() -> RiskMonitor {
        let pool = memory_pool().await.unwrap();
        let portfolio = Portfolio::new(
            [Position {
                ticker: Ticker::parse("ABC").unwrap(),
                shares: 100.0,
                stop_loss: 0.0,
                buy_price: 6.0,
                cost_basis: 600.0,
            }],
            300.0,
        );
        let mut conn = pool.acquire().await.unwrap();
        repo::save_portfolio(&mut conn, &portfolio).await.unwrap();
        for (d, price) in [(1, 7.0), (2, 9.0), (3, 6.0)] {
            let prices = HashMap::from([("ABC".to_string(), price)]);
            repo::replace_history_for_date(&mut conn, day(d), &build_snapshot(&portfolio, &prices, day(d)))
                .await
                .unwrap();
        }
        drop(conn);
        RiskMonitor::new(Ledger::new(pool))
    }

    #[tokio::test]
    async fn snapshot_reads_persisted_state() {
        let monitor = monitor_with_history().await;
        let snap = monitor.compute_snapshot().await.unwrap();
        assert_eq!(snap.equity, 900.0);
        assert_eq!(snap.cash, 300.0);
        assert!((snap.top1_concentration_pct - 600.0 / 900.0 * 100.0).abs() < 1e-9);
        assert!((snap.max_drawdown_pct + 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_database_gives_zero_snapshot() {
        let monitor = RiskMonitor::new(Ledger::new(memory_pool().await.unwrap()));
        let snap = monitor.compute_snapshot().await.unwrap();
        assert_eq!(snap, RiskSnapshot::default());
        assert!(monitor.emit_risk_events(&snap).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fired_thresholds_become_chained_events() {
        let monitor = monitor_with_history().await;
        let snap = monitor.compute_snapshot().await.unwrap();
        let events = monitor.emit_risk_events(&snap).await.unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        // 66.7% top1/top3, -25% drawdown, one -25% return for VaR
        assert_eq!(kinds, vec!["concentration_top1", "concentration_top3", "drawdown", "volatility", "var95"]);
        assert!(events.iter().all(|e| e.severity == "warn"));
        assert_eq!(events[2].payload()["value"].as_f64(), Some(-25.0));
        assert!(monitor.ledger.verify_risk_chain().await.unwrap().intact);
        assert_eq!(monitor.ledger.recent_audit_events(10).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn custom_thresholds_silence_events() {
        let monitor = monitor_with_history().await.with_thresholds(RiskThresholds {
            top1_concentration_pct: 100.0,
            top3_concentration_pct: 100.0,
            max_drawdown_pct: -50.0,
            rolling_vol_pct: 1000.0,
            var_95_pct: 50.0,
        });
        let snap = monitor.compute_snapshot().await.unwrap();
        assert!(monitor.emit_risk_events(&snap).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exposure_counts_open_breaches() {
        let monitor = monitor_with_history().await;
        let regime = RegimeProbabilities {
            bear: 0.5,
            high_vol: 0.3,
        };
        assert!((monitor.exposure_scalar(Some(&regime)).await.unwrap() - 0.71).abs() < 1e-12);

        let a = monitor.ledger.log_breach("A", Severity::Warn, &json!({}), None).await.unwrap();
        monitor.ledger.log_breach("B", Severity::Warn, &json!({}), None).await.unwrap();
        assert!((monitor.exposure_scalar(Some(&regime)).await.unwrap() - 0.61).abs() < 1e-12);

        monitor.ledger.update_breach_status(a.id, BreachStatus::Closed).await.unwrap();
        assert!((monitor.exposure_scalar(Some(&regime)).await.unwrap() - 0.66).abs() < 1e-12);
    }

    #[tokio::test]
    async fn performance_over_history() {
        let monitor = monitor_with_history().await;
        let report = monitor.performance().await.unwrap();
        assert_eq!(report.days, 3);
        assert_eq!(report.start, Some(day(1)));
        assert_eq!(report.end, Some(day(3)));
        assert_eq!(report.streaks.max_consecutive_wins, 1);
        assert_eq!(report.streaks.max_consecutive_losses, 1);
        let dd = report.drawdown.unwrap();
        assert!((dd.max_drawdown_pct + 25.0).abs() < 1e-9);
        assert!((dd.max_drawdown_dollar + 300.0).abs() < 1e-9);
        assert!((report.drawdowns_by_ticker["ABC"].max_drawdown_pct - (600.0 / 900.0 - 1.0) * 100.0).abs() < 1e-9);
    }
}
