//! # Governance Store
//!
//! Persistence for policy rules, breaches and the three hash chains
//! (`audit_event`, `config_snapshot` per kind, `risk_event`).
//!
//! ## Append protocol
//!
//! Every chain append runs inside one transaction while holding the
//! in-process append lock: read the chain head, compute the link hash over
//! the canonical payload text, insert, read the row back, commit. Writes that
//! also produce an audit event (rule upserts, breaches, status changes, risk
//! events) append that event in the same transaction, so the row and its
//! audit record commit or roll back together.
//!
//! The stored `*_json` column is exactly the canonical text that was hashed,
//! which lets verification recompute links from what is on disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use folio_core::{CanonicalBytes, FolioError, Severity};
use folio_ledger::{
    audit_link_hash, default_rules, risk_link_hash, snapshot_link_hash, verify_chain,
    AuditEvent, BreachLog, BreachStatus, ChainVerification, ConfigSnapshot, NewRule, PolicyRule,
    PreTradeDecision, RiskEvent, RuleType,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ServiceError;

pub const GOVERNANCE_INIT: &str = "governance_init";
pub const RULE_UPSERT: &str = "rule_upsert";
pub const BREACH: &str = "breach";
pub const BREACH_STATUS_UPDATE: &str = "breach_status_update";
pub const BREACH_NOTES_UPDATE: &str = "breach_notes_update";
pub const RISK_EVENT: &str = "risk_event";

/// `auto_action` recorded with breaches from a rejected trade.
pub const TRADE_BLOCKED: &str = "trade_blocked";
/// `auto_action` recorded with breaches from a trade that went ahead.
pub const TRADE_ALLOWED: &str = "trade_allowed";

/// Canonical JSON text of `value`, as stored in `*_json` columns.
pub(crate) fn canonical_json(value: &impl Serialize) -> Result<String, ServiceError> {
    Ok(CanonicalBytes::new(value)?.into_string())
}

// ─── Row mapping ───────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct PolicyRuleRow {
    id: i64,
    code: String,
    rule_type: String,
    threshold: Option<f64>,
    severity: String,
    active: bool,
    params_json: String,
    updated_at: String,
}

impl TryFrom<PolicyRuleRow> for PolicyRule {
    type Error = FolioError;

    fn try_from(r: PolicyRuleRow) -> Result<Self, Self::Error> {
        Ok(PolicyRule {
            id: r.id,
            code: r.code,
            rule_type: RuleType::from(r.rule_type),
            threshold: r.threshold,
            severity: r.severity.parse()?,
            active: r.active,
            params: serde_json::from_str(&r.params_json).unwrap_or_else(|_| json!({})),
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: i64,
    ts: String,
    category: String,
    ref_type: Option<String>,
    ref_id: Option<String>,
    payload_json: String,
    hash: String,
    prev_hash: Option<String>,
}

impl From<AuditEventRow> for AuditEvent {
    fn from(r: AuditEventRow) -> Self {
        AuditEvent {
            id: r.id,
            ts: r.ts,
            category: r.category,
            ref_type: r.ref_type,
            ref_id: r.ref_id,
            payload_json: r.payload_json,
            hash: r.hash,
            prev_hash: r.prev_hash,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConfigSnapshotRow {
    id: i64,
    ts: String,
    kind: String,
    content_json: String,
    hash: String,
    prev_hash: Option<String>,
}

impl From<ConfigSnapshotRow> for ConfigSnapshot {
    fn from(r: ConfigSnapshotRow) -> Self {
        ConfigSnapshot {
            id: r.id,
            ts: r.ts,
            kind: r.kind,
            content_json: r.content_json,
            hash: r.hash,
            prev_hash: r.prev_hash,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BreachRow {
    id: i64,
    ts: String,
    rule_code: String,
    severity: String,
    context_json: String,
    status: String,
    auto_action: Option<String>,
    notes: Option<String>,
}

impl TryFrom<BreachRow> for BreachLog {
    type Error = FolioError;

    fn try_from(r: BreachRow) -> Result<Self, Self::Error> {
        Ok(BreachLog {
            id: r.id,
            ts: r.ts,
            rule_code: r.rule_code,
            severity: r.severity.parse()?,
            context_json: r.context_json,
            status: r.status.parse()?,
            auto_action: r.auto_action,
            notes: r.notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RiskEventRow {
    id: i64,
    ts: String,
    event_type: String,
    severity: String,
    payload_json: String,
    hash: String,
    prev_hash: Option<String>,
}

impl From<RiskEventRow> for RiskEvent {
    fn from(r: RiskEventRow) -> Self {
        RiskEvent {
            id: r.id,
            ts: r.ts,
            event_type: r.event_type,
            severity: r.severity,
            payload_json: r.payload_json,
            hash: r.hash,
            prev_hash: r.prev_hash,
        }
    }
}

const RULE_COLUMNS: &str = "id, code, rule_type, threshold, severity, active, params_json, updated_at";
const AUDIT_COLUMNS: &str = "id, ts, category, ref_type, ref_id, payload_json, hash, prev_hash";
const SNAPSHOT_COLUMNS: &str = "id, ts, kind, content_json, hash, prev_hash";
const BREACH_COLUMNS: &str = "id, ts, rule_code, severity, context_json, status, auto_action, notes";
const RISK_COLUMNS: &str = "id, ts, event_type, severity, payload_json, hash, prev_hash";

/// `{extra..., ...payload}` when `payload` is an object, otherwise the
/// payload is nested under `"payload"`.
fn merged(mut base: Map<String, Value>, payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            for (k, v) in map {
                base.insert(k.clone(), v.clone());
            }
        }
        other => {
            base.insert("payload".into(), other.clone());
        }
    }
    Value::Object(base)
}

fn limit_param(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

// ─── Chain appends (caller holds the append lock) ──────────────────────

async fn append_audit(
    conn: &mut SqliteConnection,
    category: &str,
    ref_type: Option<&str>,
    ref_id: Option<&str>,
    payload_json: &str,
) -> Result<AuditEvent, ServiceError> {
    let prev: Option<String> = sqlx::query_scalar("SELECT hash FROM audit_event ORDER BY id DESC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?;
    let hash = audit_link_hash(prev.as_deref(), category, ref_type, ref_id, payload_json);
    let id = sqlx::query(
        "INSERT INTO audit_event (category, ref_type, ref_id, payload_json, hash, prev_hash)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(category)
    .bind(ref_type)
    .bind(ref_id)
    .bind(payload_json)
    .bind(&hash)
    .bind(prev.as_deref())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    let row = sqlx::query_as::<_, AuditEventRow>(&format!("SELECT {AUDIT_COLUMNS} FROM audit_event WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    tracing::info!(id, category, hash = %hash, "audit event appended");
    Ok(row.into())
}

async fn append_snapshot(
    conn: &mut SqliteConnection,
    kind: &str,
    content_json: &str,
) -> Result<ConfigSnapshot, ServiceError> {
    let prev: Option<String> =
        sqlx::query_scalar("SELECT hash FROM config_snapshot WHERE kind = ? ORDER BY id DESC LIMIT 1")
            .bind(kind)
            .fetch_optional(&mut *conn)
            .await?;
    let hash = snapshot_link_hash(prev.as_deref(), kind, content_json);
    let id = sqlx::query("INSERT INTO config_snapshot (kind, content_json, hash, prev_hash) VALUES (?, ?, ?, ?)")
        .bind(kind)
        .bind(content_json)
        .bind(&hash)
        .bind(prev.as_deref())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    let row = sqlx::query_as::<_, ConfigSnapshotRow>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM config_snapshot WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;
    tracing::info!(id, kind, hash = %hash, "config snapshot appended");
    Ok(row.into())
}

async fn append_risk(
    conn: &mut SqliteConnection,
    event_type: &str,
    severity: &str,
    payload_json: &str,
) -> Result<RiskEvent, ServiceError> {
    let prev: Option<String> = sqlx::query_scalar("SELECT hash FROM risk_event ORDER BY id DESC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?;
    let hash = risk_link_hash(prev.as_deref(), event_type, severity, payload_json);
    let id = sqlx::query(
        "INSERT INTO risk_event (event_type, severity, payload_json, hash, prev_hash) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(event_type)
    .bind(severity)
    .bind(payload_json)
    .bind(&hash)
    .bind(prev.as_deref())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    let row = sqlx::query_as::<_, RiskEventRow>(&format!("SELECT {RISK_COLUMNS} FROM risk_event WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.into())
}

async fn upsert_rule(conn: &mut SqliteConnection, rule: &NewRule, set_active: bool) -> Result<PolicyRule, ServiceError> {
    let params_json = canonical_json(&rule.params)?;
    let sql = if set_active {
        "INSERT INTO policy_rule (code, rule_type, threshold, severity, active, params_json)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(code) DO UPDATE SET
           rule_type = excluded.rule_type,
           threshold = excluded.threshold,
           severity = excluded.severity,
           active = excluded.active,
           params_json = excluded.params_json,
           updated_at = datetime('now')"
    } else {
        "INSERT INTO policy_rule (code, rule_type, threshold, severity, active, params_json)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(code) DO UPDATE SET
           rule_type = excluded.rule_type,
           threshold = excluded.threshold,
           severity = excluded.severity,
           params_json = excluded.params_json,
           updated_at = datetime('now')"
    };
    sqlx::query(sql)
        .bind(&rule.code)
        .bind(rule.rule_type.as_str())
        .bind(rule.threshold)
        .bind(rule.severity.as_str())
        .bind(rule.active)
        .bind(&params_json)
        .execute(&mut *conn)
        .await?;
    let row = sqlx::query_as::<_, PolicyRuleRow>(&format!("SELECT {RULE_COLUMNS} FROM policy_rule WHERE code = ?"))
        .bind(&rule.code)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_into()?)
}

// ─── Results ───────────────────────────────────────────────────────────

/// Outcome of [`Ledger::save_config_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedSnapshot {
    pub snapshot: ConfigSnapshot,
    /// False when the content matched the latest snapshot of its kind.
    pub created: bool,
}

/// Outcome of [`Ledger::initialize_governance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernanceInit {
    pub rules: Vec<PolicyRule>,
    /// The `governance_init` audit event, when this call wrote it.
    pub init_event: Option<AuditEvent>,
}

/// Verification of every governance chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernanceVerification {
    pub audit: ChainVerification,
    pub risk: ChainVerification,
    pub snapshots: BTreeMap<String, ChainVerification>,
    pub intact: bool,
}

// ─── Store ─────────────────────────────────────────────────────────────

/// Governance store over a shared pool. Clones share the append lock and
/// the trade lock.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    append_lock: Arc<Mutex<()>>,
    trade_lock: Arc<Mutex<()>>,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_lock: Arc::new(Mutex::new(())),
            trade_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Serializes trade read-modify-write cycles. Taken before the append
    /// lock, never after it.
    pub(crate) async fn lock_trades(&self) -> MutexGuard<'_, ()> {
        self.trade_lock.lock().await
    }

    pub(crate) async fn lock_appends(&self) -> MutexGuard<'_, ()> {
        self.append_lock.lock().await
    }

    /// Append an audit event inside the caller's transaction. The caller
    /// holds [`Ledger::lock_appends`].
    pub(crate) async fn append_audit_in(
        &self,
        conn: &mut SqliteConnection,
        category: &str,
        payload: &Value,
        ref_type: Option<&str>,
        ref_id: Option<&str>,
    ) -> Result<AuditEvent, ServiceError> {
        let payload_json = canonical_json(payload)?;
        append_audit(conn, category, ref_type, ref_id, &payload_json).await
    }

    // ── Rules ──

    /// Insert or refresh the default rules. `active` is left as the
    /// operator set it.
    pub async fn seed_default_rules(&self) -> Result<Vec<PolicyRule>, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut seeded = Vec::new();
        for rule in default_rules() {
            seeded.push(upsert_rule(&mut tx, &rule.normalized()?, false).await?);
        }
        tx.commit().await?;
        Ok(seeded)
    }

    pub async fn get_rule_by_code(&self, code: &str) -> Result<Option<PolicyRule>, ServiceError> {
        let row = sqlx::query_as::<_, PolicyRuleRow>(&format!("SELECT {RULE_COLUMNS} FROM policy_rule WHERE code = ?"))
            .bind(code.trim().to_ascii_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PolicyRule::try_from).transpose()?)
    }

    pub async fn list_rules(&self) -> Result<Vec<PolicyRule>, ServiceError> {
        let rows = sqlx::query_as::<_, PolicyRuleRow>(&format!("SELECT {RULE_COLUMNS} FROM policy_rule ORDER BY code"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PolicyRule::try_from).collect::<Result<_, _>>()?)
    }

    pub async fn list_active_rules(&self) -> Result<Vec<PolicyRule>, ServiceError> {
        let rows = sqlx::query_as::<_, PolicyRuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM policy_rule WHERE active = 1 ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PolicyRule::try_from).collect::<Result<_, _>>()?)
    }

    /// Create or replace a rule by code and audit the change.
    pub async fn upsert_policy_rule(&self, rule: NewRule) -> Result<PolicyRule, ServiceError> {
        let rule = rule.normalized()?;
        let payload = canonical_json(&json!({
            "code": rule.code,
            "rule_type": rule.rule_type.as_str(),
            "threshold": rule.threshold,
            "active": rule.active,
        }))?;
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let stored = upsert_rule(&mut tx, &rule, true).await?;
        append_audit(&mut tx, RULE_UPSERT, Some("policy_rule"), Some(&stored.code), &payload).await?;
        tx.commit().await?;
        Ok(stored)
    }

    // ── Audit chain ──

    pub async fn log_audit_event(
        &self,
        category: &str,
        payload: &Value,
        ref_type: Option<&str>,
        ref_id: Option<&str>,
    ) -> Result<AuditEvent, ServiceError> {
        let payload_json = canonical_json(payload)?;
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let event = append_audit(&mut tx, category, ref_type, ref_id, &payload_json).await?;
        tx.commit().await?;
        Ok(event)
    }

    /// Newest first.
    pub async fn recent_audit_events(&self, limit: usize) -> Result<Vec<AuditEvent>, ServiceError> {
        let rows = sqlx::query_as::<_, AuditEventRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_event ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit_param(Some(limit)))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditEvent::from).collect())
    }

    /// Verify the oldest `limit` links (all when `None` or zero).
    pub async fn verify_audit_chain(&self, limit: Option<usize>) -> Result<ChainVerification, ServiceError> {
        let limit = limit.filter(|&l| l > 0);
        let rows = sqlx::query_as::<_, AuditEventRow>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_event ORDER BY id ASC LIMIT ?"
        ))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;
        let events: Vec<AuditEvent> = rows.into_iter().map(AuditEvent::from).collect();
        Ok(verify_chain(&events))
    }

    // ── Config snapshots ──

    /// Append `content` to the `kind` chain unless it equals the latest
    /// snapshot of that kind.
    pub async fn save_config_snapshot(&self, kind: &str, content: &Value) -> Result<SavedSnapshot, ServiceError> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(FolioError::Validation("snapshot kind must not be empty".into()).into());
        }
        let content_json = canonical_json(content)?;
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let latest = sqlx::query_as::<_, ConfigSnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM config_snapshot WHERE kind = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(kind)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(existing) = latest.filter(|s| s.content_json == content_json) {
            tx.rollback().await?;
            tracing::debug!(kind, id = existing.id, "config snapshot unchanged");
            return Ok(SavedSnapshot {
                snapshot: existing.into(),
                created: false,
            });
        }
        let snapshot = append_snapshot(&mut tx, kind, &content_json).await?;
        tx.commit().await?;
        Ok(SavedSnapshot {
            snapshot,
            created: true,
        })
    }

    pub async fn latest_config_snapshot(&self, kind: &str) -> Result<Option<ConfigSnapshot>, ServiceError> {
        let row = sqlx::query_as::<_, ConfigSnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM config_snapshot WHERE kind = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ConfigSnapshot::from))
    }

    /// One verification per snapshot kind.
    pub async fn verify_config_snapshots(&self) -> Result<BTreeMap<String, ChainVerification>, ServiceError> {
        let rows = sqlx::query_as::<_, ConfigSnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM config_snapshot ORDER BY kind, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        let mut by_kind: BTreeMap<String, Vec<ConfigSnapshot>> = BTreeMap::new();
        for row in rows {
            by_kind.entry(row.kind.clone()).or_default().push(row.into());
        }
        Ok(by_kind
            .into_iter()
            .map(|(kind, links)| (kind, verify_chain(&links)))
            .collect())
    }

    // ── Breaches ──

    /// Insert a breach row without an audit event.
    pub async fn log_breach(
        &self,
        rule_code: &str,
        severity: Severity,
        context: &Value,
        auto_action: Option<&str>,
    ) -> Result<BreachLog, ServiceError> {
        let mut conn = self.pool.acquire().await?;
        insert_breach(&mut conn, rule_code, severity, context, auto_action).await
    }

    /// Persist a breach row and a `breach` audit event for every breach in
    /// `decision`, in one transaction.
    pub async fn record_breaches(&self, decision: &PreTradeDecision) -> Result<Vec<BreachLog>, ServiceError> {
        if decision.breaches.is_empty() {
            return Ok(Vec::new());
        }
        let auto_action = if decision.will_block { TRADE_BLOCKED } else { TRADE_ALLOWED };
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut logged = Vec::with_capacity(decision.breaches.len());
        for breach in &decision.breaches {
            let context = breach.context();
            let row = insert_breach(&mut tx, &breach.rule_code, breach.severity, &context, Some(auto_action)).await?;
            let mut base = Map::new();
            base.insert("rule_code".into(), Value::String(breach.rule_code.clone()));
            let payload = canonical_json(&merged(base, &context))?;
            append_audit(&mut tx, BREACH, Some("breach_log"), Some(&row.id.to_string()), &payload).await?;
            logged.push(row);
        }
        tx.commit().await?;
        Ok(logged)
    }

    pub async fn update_breach_status(&self, breach_id: i64, status: BreachStatus) -> Result<BreachLog, ServiceError> {
        let payload = canonical_json(&json!({"breach_id": breach_id, "status": status.as_str()}))?;
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE breach_log SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(breach_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(FolioError::NotFound(format!("breach {breach_id}")).into());
        }
        append_audit(&mut tx, BREACH_STATUS_UPDATE, Some("breach_log"), Some(&breach_id.to_string()), &payload).await?;
        let row = fetch_breach(&mut tx, breach_id).await?;
        tx.commit().await?;
        tracing::info!(breach_id, status = status.as_str(), "breach status updated");
        Ok(row)
    }

    /// Replace the notes on a breach. The audit event records only the
    /// length of the notes.
    pub async fn update_breach_notes(&self, breach_id: i64, notes: &str) -> Result<BreachLog, ServiceError> {
        let payload = canonical_json(&json!({"breach_id": breach_id, "notes_len": notes.chars().count()}))?;
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE breach_log SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(breach_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(FolioError::NotFound(format!("breach {breach_id}")).into());
        }
        append_audit(&mut tx, BREACH_NOTES_UPDATE, Some("breach_log"), Some(&breach_id.to_string()), &payload).await?;
        let row = fetch_breach(&mut tx, breach_id).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Newest first.
    pub async fn list_breaches(&self, limit: usize, open_only: bool) -> Result<Vec<BreachLog>, ServiceError> {
        let filter = if open_only { "WHERE status = 'open'" } else { "" };
        let rows = sqlx::query_as::<_, BreachRow>(&format!(
            "SELECT {BREACH_COLUMNS} FROM breach_log {filter} ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit_param(Some(limit)))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BreachLog::try_from).collect::<Result<_, _>>()?)
    }

    pub async fn count_open_breaches(&self) -> Result<usize, ServiceError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM breach_log WHERE status = 'open'")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    // ── Risk chain ──

    /// Append a risk event and its `risk_event` audit record.
    pub async fn log_risk_event(
        &self,
        event_type: &str,
        severity: Severity,
        payload: &Value,
    ) -> Result<RiskEvent, ServiceError> {
        let payload_json = canonical_json(payload)?;
        let mut base = Map::new();
        base.insert("event_type".into(), Value::String(event_type.to_string()));
        base.insert("severity".into(), Value::String(severity.as_str().to_string()));
        let audit_payload = canonical_json(&merged(base, payload))?;

        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let event = append_risk(&mut tx, event_type, severity.as_str(), &payload_json).await?;
        append_audit(&mut tx, RISK_EVENT, Some("risk_event"), Some(&event.id.to_string()), &audit_payload).await?;
        tx.commit().await?;
        tracing::warn!(event_type, value = ?payload.get("value"), hash = %event.hash, "risk event");
        Ok(event)
    }

    /// Newest first.
    pub async fn recent_risk_events(&self, limit: usize) -> Result<Vec<RiskEvent>, ServiceError> {
        let rows = sqlx::query_as::<_, RiskEventRow>(&format!(
            "SELECT {RISK_COLUMNS} FROM risk_event ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit_param(Some(limit)))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RiskEvent::from).collect())
    }

    pub async fn verify_risk_chain(&self) -> Result<ChainVerification, ServiceError> {
        let rows = sqlx::query_as::<_, RiskEventRow>(&format!("SELECT {RISK_COLUMNS} FROM risk_event ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;
        let events: Vec<RiskEvent> = rows.into_iter().map(RiskEvent::from).collect();
        Ok(verify_chain(&events))
    }

    // ── Lifecycle ──

    /// Seed the default rules and write the `governance_init` audit event
    /// the first time only.
    pub async fn initialize_governance(&self) -> Result<GovernanceInit, ServiceError> {
        let rules = self.seed_default_rules().await?;
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let already: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_event WHERE category = ?")
            .bind(GOVERNANCE_INIT)
            .fetch_one(&mut *tx)
            .await?;
        let init_event = if already == 0 {
            let codes: Vec<&str> = rules.iter().map(|r| r.code.as_str()).collect();
            let payload = canonical_json(&json!({ "default_rules": codes }))?;
            Some(append_audit(&mut tx, GOVERNANCE_INIT, None, None, &payload).await?)
        } else {
            None
        };
        tx.commit().await?;
        Ok(GovernanceInit { rules, init_event })
    }

    /// Verify the audit chain, the risk chain and every snapshot kind.
    pub async fn verify_all(&self) -> Result<GovernanceVerification, ServiceError> {
        let audit = self.verify_audit_chain(None).await?;
        let risk = self.verify_risk_chain().await?;
        let snapshots = self.verify_config_snapshots().await?;
        let intact = audit.intact && risk.intact && snapshots.values().all(|v| v.intact);
        Ok(GovernanceVerification {
            audit,
            risk,
            snapshots,
            intact,
        })
    }
}

async fn insert_breach(
    conn: &mut SqliteConnection,
    rule_code: &str,
    severity: Severity,
    context: &Value,
    auto_action: Option<&str>,
) -> Result<BreachLog, ServiceError> {
    let context_json = canonical_json(context)?;
    let id = sqlx::query("INSERT INTO breach_log (rule_code, severity, context_json, auto_action) VALUES (?, ?, ?, ?)")
        .bind(rule_code)
        .bind(severity.as_str())
        .bind(&context_json)
        .bind(auto_action)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    tracing::warn!(id, rule_code, severity = severity.as_str(), "policy breach logged");
    fetch_breach(conn, id).await
}

async fn fetch_breach(conn: &mut SqliteConnection, id: i64) -> Result<BreachLog, ServiceError> {
    let row = sqlx::query_as::<_, BreachRow>(&format!("SELECT {BREACH_COLUMNS} FROM breach_log WHERE id = ?"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_into()?)
}
