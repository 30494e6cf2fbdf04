//! # folio-ledger: Governance Ledger Domain
//!
//! The governance tables form three tamper-evident hash chains:
//!
//! | Chain | Table | Link preimage |
//! |---|---|---|
//! | audit | `audit_event` | `prev\|category\|ref_type\|ref_id\|payload_json` |
//! | config snapshot (one chain per kind) | `config_snapshot` | `prev\|kind\|content_json` |
//! | risk | `risk_event` | `prev\|event_type\|severity\|payload_json` |
//!
//! `prev` is the previous link's hex hash, or the empty string at genesis.
//! Rewriting any stored field of a link changes its recomputed hash; rewriting
//! the hash as well breaks the next link's `prev_hash`. Verification walks a
//! chain oldest-first and reports the first link where either check fails.
//!
//! Policy rules and breaches are not chained; every change to them is
//! recorded as an audit event instead.
//!
//! This crate is pure: no I/O. `folio-service` persists and appends.

pub mod chain;
pub mod model;
pub mod rules;

pub use chain::{
    audit_link_hash, risk_link_hash, snapshot_link_hash, verify_chain, BreakReason, ChainBreak,
    ChainLink, ChainVerification,
};
pub use model::{
    default_rules, AuditEvent, BreachLog, BreachStatus, ConfigSnapshot, NewRule, PolicyRule,
    RiskEvent, RuleType,
};
pub use rules::{evaluate_pre_trade, OrderSide, PreTradeContext, PreTradeDecision, ProposedOrder, RuleBreach};
