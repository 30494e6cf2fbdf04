//! # Governance Records
//!
//! Row types for the five governance tables. Chained rows keep the exact
//! stored text of every hashed field (`payload_json`, `severity`, ...) so
//! verification hashes what is on disk.

use folio_core::{FolioError, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What a policy rule measures.
///
/// Unknown types are kept verbatim so rules written by newer tooling
/// survive a round trip; evaluation ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleType {
    /// Projected position value over projected equity.
    PositionWeight,
    /// Today's traded notional, including the order, over equity.
    Turnover,
    /// Order notional over current equity.
    MaxTradeNotionalPct,
    /// Projected sector exposure over projected equity.
    SectorAggregateWeight,
    Other(String),
}

impl RuleType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PositionWeight => "position_weight",
            Self::Turnover => "turnover",
            Self::MaxTradeNotionalPct => "max_trade_notional_pct",
            Self::SectorAggregateWeight => "sector_aggregate_weight",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RuleType {
    fn from(s: String) -> Self {
        match s.trim() {
            "position_weight" => Self::PositionWeight,
            "turnover" => Self::Turnover,
            "max_trade_notional_pct" => Self::MaxTradeNotionalPct,
            "sector_aggregate_weight" => Self::SectorAggregateWeight,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for RuleType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<RuleType> for String {
    fn from(r: RuleType) -> Self {
        r.as_str().to_string()
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored `policy_rule` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: i64,
    pub code: String,
    pub rule_type: RuleType,
    pub threshold: Option<f64>,
    pub severity: Severity,
    pub active: bool,
    pub params: Value,
    pub updated_at: String,
}

/// Input for creating or replacing a rule, keyed by `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub code: String,
    pub rule_type: RuleType,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "empty_object")]
    pub params: Value,
}

fn default_active() -> bool {
    true
}

fn empty_object() -> Value {
    json!({})
}

impl NewRule {
    pub fn new(code: &str, rule_type: RuleType, threshold: f64, severity: Severity) -> Self {
        Self {
            code: code.to_string(),
            rule_type,
            threshold: Some(threshold),
            severity,
            active: true,
            params: empty_object(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Trim and upper-case the code, and reject unusable thresholds.
    pub fn normalized(mut self) -> Result<Self, FolioError> {
        self.code = self.code.trim().to_ascii_uppercase();
        if self.code.is_empty() {
            return Err(FolioError::Validation("rule code must not be empty".into()));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(FolioError::Validation(format!(
                    "rule {} threshold must be a non-negative number",
                    self.code
                )));
            }
        }
        if !self.params.is_object() {
            return Err(FolioError::Validation(format!(
                "rule {} params must be a JSON object",
                self.code
            )));
        }
        Ok(self)
    }
}

/// Rules seeded by `initialize_governance`.
pub fn default_rules() -> Vec<NewRule> {
    vec![
        NewRule::new(
            "MAX_POSITION_WEIGHT",
            RuleType::PositionWeight,
            0.10,
            Severity::Error,
        )
        .with_params(json!({"basis": "portfolio_equity"})),
        NewRule::new("DAILY_TURNOVER_LIMIT", RuleType::Turnover, 0.25, Severity::Warn)
            .with_params(json!({"window": "1d"})),
    ]
}

/// A stored `audit_event` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub ts: String,
    pub category: String,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub payload_json: String,
    pub hash: String,
    pub prev_hash: Option<String>,
}

impl AuditEvent {
    pub fn payload(&self) -> Value {
        parse_json(&self.payload_json)
    }
}

/// A stored `config_snapshot` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub id: i64,
    pub ts: String,
    pub kind: String,
    pub content_json: String,
    pub hash: String,
    pub prev_hash: Option<String>,
}

impl ConfigSnapshot {
    pub fn content(&self) -> Value {
        parse_json(&self.content_json)
    }
}

/// Lifecycle of a breach: `open` until someone acknowledges or closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachStatus {
    Open,
    Acknowledged,
    Closed,
}

impl BreachStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for BreachStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BreachStatus {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "acknowledged" => Ok(Self::Acknowledged),
            "closed" => Ok(Self::Closed),
            other => Err(FolioError::Validation(format!(
                "Invalid status '{other}': expected open, acknowledged or closed"
            ))),
        }
    }
}

/// A stored `breach_log` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachLog {
    pub id: i64,
    pub ts: String,
    pub rule_code: String,
    pub severity: Severity,
    pub context_json: String,
    pub status: BreachStatus,
    pub auto_action: Option<String>,
    pub notes: Option<String>,
}

impl BreachLog {
    pub fn context(&self) -> Value {
        parse_json(&self.context_json)
    }
}

/// A stored `risk_event` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: i64,
    pub ts: String,
    pub event_type: String,
    pub severity: String,
    pub payload_json: String,
    pub hash: String,
    pub prev_hash: Option<String>,
}

impl RiskEvent {
    pub fn payload(&self) -> Value {
        parse_json(&self.payload_json)
    }
}

/// Stored JSON that fails to parse reads as an empty object.
fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| empty_object())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_type_round_trips_known_and_unknown() {
        assert_eq!(RuleType::from("turnover"), RuleType::Turnover);
        assert_eq!(
            RuleType::from("liquidity_floor"),
            RuleType::Other("liquidity_floor".into())
        );
        let json = serde_json::to_string(&RuleType::SectorAggregateWeight).unwrap();
        assert_eq!(json, "\"sector_aggregate_weight\"");
        let back: RuleType = serde_json::from_str("\"liquidity_floor\"").unwrap();
        assert_eq!(back.as_str(), "liquidity_floor");
    }

    #[test]
    fn default_rules_match_catalogue() {
        let rules = default_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].code, "MAX_POSITION_WEIGHT");
        assert_eq!(rules[0].threshold, Some(0.10));
        assert_eq!(rules[0].severity, Severity::Error);
        assert_eq!(rules[0].params, json!({"basis": "portfolio_equity"}));
        assert_eq!(rules[1].code, "DAILY_TURNOVER_LIMIT");
        assert_eq!(rules[1].rule_type, RuleType::Turnover);
        assert_eq!(rules[1].severity, Severity::Warn);
        assert!(rules.iter().all(|r| r.active));
    }

    #[test]
    fn new_rule_normalization() {
        let rule = NewRule::new("  max_x ", RuleType::PositionWeight, 0.2, Severity::Warn)
            .normalized()
            .unwrap();
        assert_eq!(rule.code, "MAX_X");
        assert!(NewRule::new(" ", RuleType::Turnover, 0.1, Severity::Warn)
            .normalized()
            .is_err());
        assert!(NewRule::new("X", RuleType::Turnover, -0.1, Severity::Warn)
            .normalized()
            .is_err());
        assert!(NewRule::new("X", RuleType::Turnover, 0.1, Severity::Warn)
            .with_params(json!([1]))
            .normalized()
            .is_err());
    }

    #[test]
    fn new_rule_serde_defaults() {
        let rule: NewRule =
            serde_json::from_str(r#"{"code":"X","rule_type":"turnover","threshold":0.3}"#).unwrap();
        assert_eq!(rule.severity, Severity::Warn);
        assert!(rule.active);
        assert_eq!(rule.params, json!({}));
    }

    #[test]
    fn breach_status_parsing() {
        assert_eq!("Acknowledged".parse::<BreachStatus>().unwrap(), BreachStatus::Acknowledged);
        assert!("resolved".parse::<BreachStatus>().is_err());
        assert_eq!(BreachStatus::Closed.to_string(), "closed");
    }

    #[test]
    fn malformed_stored_json_reads_as_empty() {
        let ev = AuditEvent {
            id: 1,
            ts: String::new(),
            category: "x".into(),
            ref_type: None,
            ref_id: None,
            payload_json: "{not json".into(),
            hash: String::new(),
            prev_hash: None,
        };
        assert_eq!(ev.payload(), json!({}));
    }
}
