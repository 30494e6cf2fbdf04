//! # Hash Chain Links
//!
//! Link hashing and verification for the audit, config snapshot and risk
//! chains.
//!
//! ## Security Invariant
//!
//! `hash = hex(SHA-256(prev | field_1 | ... | field_n))` where `prev` is the
//! previous link's hash (empty at genesis) and absent optional fields hash
//! as the empty string. Stored `prev_hash` is `NULL` at genesis; an empty
//! string is treated the same way.
//!
//! Timestamps and row ids are outside the preimage: they are
//! assigned by the database, and ordering is enforced by `prev_hash`.

use folio_core::{ContentDigest, DigestAlgorithm};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{AuditEvent, ConfigSnapshot, RiskEvent};

const SEPARATOR: &str = "|";

/// Digest of `prev|fields...`.
pub fn link_digest(prev: Option<&str>, fields: &[&str]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(prev.unwrap_or_default().as_bytes());
    for field in fields {
        hasher.update(SEPARATOR.as_bytes());
        hasher.update(field.as_bytes());
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}

pub fn audit_link_hash(
    prev: Option<&str>,
    category: &str,
    ref_type: Option<&str>,
    ref_id: Option<&str>,
    payload_json: &str,
) -> String {
    link_digest(
        prev,
        &[
            category,
            ref_type.unwrap_or_default(),
            ref_id.unwrap_or_default(),
            payload_json,
        ],
    )
    .to_hex()
}

pub fn snapshot_link_hash(prev: Option<&str>, kind: &str, content_json: &str) -> String {
    link_digest(prev, &[kind, content_json]).to_hex()
}

pub fn risk_link_hash(prev: Option<&str>, event_type: &str, severity: &str, payload_json: &str) -> String {
    link_digest(prev, &[event_type, severity, payload_json]).to_hex()
}

/// A stored row that participates in a hash chain.
pub trait ChainLink {
    fn link_id(&self) -> i64;
    fn stored_hash(&self) -> &str;
    fn stored_prev(&self) -> Option<&str>;
    /// Recompute this link's hash on top of `prev`.
    fn recompute(&self, prev: Option<&str>) -> String;
}

impl ChainLink for AuditEvent {
    fn link_id(&self) -> i64 {
        self.id
    }

    fn stored_hash(&self) -> &str {
        &self.hash
    }

    fn stored_prev(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }

    fn recompute(&self, prev: Option<&str>) -> String {
        audit_link_hash(
            prev,
            &self.category,
            self.ref_type.as_deref(),
            self.ref_id.as_deref(),
            &self.payload_json,
        )
    }
}

impl ChainLink for ConfigSnapshot {
    fn link_id(&self) -> i64 {
        self.id
    }

    fn stored_hash(&self) -> &str {
        &self.hash
    }

    fn stored_prev(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }

    fn recompute(&self, prev: Option<&str>) -> String {
        snapshot_link_hash(prev, &self.kind, &self.content_json)
    }
}

impl ChainLink for RiskEvent {
    fn link_id(&self) -> i64 {
        self.id
    }

    fn stored_hash(&self) -> &str {
        &self.hash
    }

    fn stored_prev(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }

    fn recompute(&self, prev: Option<&str>) -> String {
        risk_link_hash(prev, &self.event_type, &self.severity, &self.payload_json)
    }
}

/// Why a link failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakReason {
    /// The stored hash does not match the recomputed one.
    HashMismatch { expected: String, stored: String },
    /// The stored `prev_hash` is not the previous link's hash.
    PrevMismatch {
        expected: Option<String>,
        stored: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    pub id: i64,
    pub reason: BreakReason,
}

/// Result of walking a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    /// Links examined, including the breaking link.
    pub total_links: usize,
    pub intact: bool,
    pub first_break: Option<ChainBreak>,
    /// Hash of the last verified link.
    pub head: Option<String>,
}

impl ChainVerification {
    pub fn empty() -> Self {
        Self {
            total_links: 0,
            intact: true,
            first_break: None,
            head: None,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Verify links ordered oldest-first, starting from genesis.
pub fn verify_chain<L: ChainLink>(links: &[L]) -> ChainVerification {
    verify_chain_from(links, None)
}

/// Verify links ordered oldest-first, where the first link must chain onto
/// `anchor`. Stops at the first break.
pub fn verify_chain_from<L: ChainLink>(links: &[L], anchor: Option<&str>) -> ChainVerification {
    let mut prev: Option<String> = non_empty(anchor).map(str::to_string);
    for (i, link) in links.iter().enumerate() {
        let expected = link.recompute(prev.as_deref());
        let broken = if expected != link.stored_hash() {
            Some(BreakReason::HashMismatch {
                expected,
                stored: link.stored_hash().to_string(),
            })
        } else if non_empty(link.stored_prev()) != prev.as_deref() {
            Some(BreakReason::PrevMismatch {
                expected: prev.clone(),
                stored: link.stored_prev().map(str::to_string),
            })
        } else {
            None
        };
        if let Some(reason) = broken {
            tracing::warn!(link_id = link.link_id(), ?reason, "hash chain broken");
            return ChainVerification {
                total_links: i + 1,
                intact: false,
                first_break: Some(ChainBreak {
                    id: link.link_id(),
                    reason,
                }),
                head: prev,
            };
        }
        prev = Some(link.stored_hash().to_string());
    }
    ChainVerification {
        total_links: links.len(),
        intact: true,
        first_break: None,
        head: prev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn build_audit_chain(payloads: &[&str]) -> Vec<AuditEvent> {
        let mut prev: Option<String> = None;
        let mut chain = Vec::new();
        for (i, payload) in payloads.iter().enumerate() {
            let hash = audit_link_hash(prev.as_deref(), "trade", Some("ticker"), Some("ABC"), payload);
            chain.push(AuditEvent {
                id: i as i64 + 1,
                ts: "2024-07-05 00:00:00".into(),
                category: "trade".into(),
                ref_type: Some("ticker".into()),
                ref_id: Some("ABC".into()),
                payload_json: payload.to_string(),
                hash: hash.clone(),
                prev_hash: prev.clone(),
            });
            prev = Some(hash);
        }
        chain
    }

    #[test]
    fn preimage_layout_matches_pipe_join() {
        // sha256("|governance_init|||{}")
        let direct = {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&Sha256::digest(b"|governance_init|||{}"));
            ContentDigest::new(DigestAlgorithm::Sha256, bytes).to_hex()
        };
        assert_eq!(audit_link_hash(None, "governance_init", None, None, "{}"), direct);
    }

    #[test]
    fn prev_changes_the_hash() {
        let a = snapshot_link_hash(None, "policy", "{}");
        let b = snapshot_link_hash(Some(&a), "policy", "{}");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn risk_link_covers_severity() {
        let warn = risk_link_hash(None, "drawdown", "warn", r#"{"value":-20}"#);
        let error = risk_link_hash(None, "drawdown", "error", r#"{"value":-20}"#);
        assert_ne!(warn, error);
    }

    #[test]
    fn empty_chain_is_intact() {
        let v = verify_chain::<AuditEvent>(&[]);
        assert_eq!(v, ChainVerification::empty());
    }

    #[test]
    fn intact_chain_reports_head() {
        let chain = build_audit_chain(&["{}", r#"{"a":1}"#, r#"{"b":2}"#]);
        let v = verify_chain(&chain);
        assert!(v.intact);
        assert_eq!(v.total_links, 3);
        assert_eq!(v.head.as_deref(), Some(chain[2].hash.as_str()));
    }

    #[test]
    fn payload_tamper_is_a_hash_mismatch() {
        let mut chain = build_audit_chain(&["{}", r#"{"a":1}"#, r#"{"b":2}"#]);
        chain[1].payload_json = r#"{"a":2}"#.into();
        let v = verify_chain(&chain);
        assert!(!v.intact);
        let br = v.first_break.unwrap();
        assert_eq!(br.id, 2);
        assert!(matches!(br.reason, BreakReason::HashMismatch { .. }));
        assert_eq!(v.total_links, 2);
        assert_eq!(v.head.as_deref(), Some(chain[0].hash.as_str()));
    }

    #[test]
    fn rehashed_tamper_breaks_the_next_link() {
        let mut chain = build_audit_chain(&["{}", r#"{"a":1}"#, r#"{"b":2}"#]);
        chain[1].payload_json = r#"{"a":2}"#.into();
        chain[1].hash = chain[1].recompute(chain[1].prev_hash.as_deref());
        let v = verify_chain(&chain);
        assert_eq!(v.first_break.unwrap().id, 3);
    }

    #[test]
    fn rewritten_prev_pointer_is_detected() {
        let mut chain = build_audit_chain(&["{}", r#"{"a":1}"#]);
        chain[1].prev_hash = Some("0".repeat(64));
        let v = verify_chain(&chain);
        let br = v.first_break.unwrap();
        assert_eq!(br.id, 2);
        assert!(matches!(
            br.reason,
            BreakReason::PrevMismatch { stored: Some(ref s), .. } if s == &"0".repeat(64)
        ));
    }

    #[test]
    fn genesis_prev_pointer_is_checked() {
        let mut chain = build_audit_chain(&["{}"]);
        chain[0].prev_hash = Some("f".repeat(64));
        let v = verify_chain(&chain);
        assert!(matches!(
            v.first_break.unwrap().reason,
            BreakReason::PrevMismatch { expected: None, .. }
        ));
        chain[0].prev_hash = Some(String::new());
        assert!(verify_chain(&chain).intact);
    }

    #[test]
    fn anchored_window_verifies_tail() {
        let chain = build_audit_chain(&["{}", r#"{"a":1}"#, r#"{"b":2}"#]);
        let v = verify_chain_from(&chain[1..], Some(&chain[0].hash));
        assert!(v.intact);
        assert!(!verify_chain(&chain[1..]).intact);
    }

    proptest! {
        #[test]
        fn any_single_payload_tamper_is_detected(
            payloads in proptest::collection::vec("[a-z]{0,8}", 1..12),
            pick in any::<proptest::sample::Index>(),
            replacement in "[A-Z]{1,8}",
        ) {
            let json: Vec<String> = payloads.iter().map(|p| format!("{{\"p\":\"{p}\"}}")).collect();
            let refs: Vec<&str> = json.iter().map(String::as_str).collect();
            let mut chain = build_audit_chain(&refs);
            prop_assert!(verify_chain(&chain).intact);

            let i = pick.index(chain.len());
            chain[i].payload_json = format!("{{\"p\":\"{replacement}\"}}");
            let v = verify_chain(&chain);
            prop_assert!(!v.intact);
            prop_assert_eq!(v.first_break.unwrap().id, i as i64 + 1);
        }
    }
}
