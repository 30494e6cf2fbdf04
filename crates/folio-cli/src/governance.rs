//! # Governance Subcommand
//!
//! Policy rules, the audit chain, config snapshots and the breach workflow.
//!
//! ## Subcommands
//!
//! - `init`: seed the default rules (idempotent).
//! - `rules`: list every rule.
//! - `upsert-rule`: create or replace a rule by code.
//! - `verify`: verify the audit, risk and snapshot chains. Exits `1` when
//!   any chain is broken.
//! - `audit`: recent audit events, newest first.
//! - `config-snapshot`: append a config snapshot unless it matches the
//!   latest of its kind.
//! - `breaches`, `breach-status`, `breach-notes`: breach review.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use folio_core::Severity;
use folio_ledger::{BreachStatus, NewRule, RuleType};
use serde_json::{json, Value};

use crate::{print_json, print_json_pretty, rejected, Runtime, EXIT_OK, EXIT_REJECTED};

/// Arguments for `folio governance`.
#[derive(Args, Debug)]
pub struct GovernanceArgs {
    #[command(subcommand)]
    pub command: GovernanceCommand,
}

#[derive(Subcommand, Debug)]
pub enum GovernanceCommand {
    /// Seed default policy rules.
    Init,

    /// List policy rules.
    Rules,

    /// Create or replace a policy rule.
    UpsertRule {
        #[arg(long)]
        code: String,
        /// `position_weight`, `turnover`, `max_trade_notional_pct`,
        /// `sector_aggregate_weight`, or a custom type.
        #[arg(long)]
        rule_type: String,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long, default_value = "warn")]
        severity: Severity,
        #[arg(long)]
        inactive: bool,
        /// Rule parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
    },

    /// Verify every governance chain.
    Verify {
        /// Only verify the oldest `limit` audit links (0 means all).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show recent audit events.
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Record a config snapshot.
    ConfigSnapshot {
        #[arg(long)]
        kind: String,
        /// Read the content from a JSON file.
        #[arg(long, conflicts_with = "json")]
        file: Option<PathBuf>,
        /// Inline JSON content.
        #[arg(long)]
        json: Option<String>,
    },

    /// List breaches, newest first.
    Breaches {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        open_only: bool,
    },

    /// Set a breach's review status.
    BreachStatus { id: i64, status: BreachStatus },

    /// Replace a breach's notes.
    BreachNotes { id: i64, notes: String },
}

fn parse_params(raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(text) => serde_json::from_str(text).context("--params must be valid JSON"),
        None => Ok(json!({})),
    }
}

fn snapshot_content(file: Option<&PathBuf>, inline: Option<&str>) -> Result<Value> {
    match (file, inline) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
        }
        (None, Some(text)) => serde_json::from_str(text).context("--json must be valid JSON"),
        (None, None) => bail!("config-snapshot needs --file or --json"),
    }
}

pub async fn run_governance(args: &GovernanceArgs, rt: &Runtime) -> Result<u8> {
    let ledger = &rt.ledger;
    match &args.command {
        GovernanceCommand::Init => {
            let init = ledger.initialize_governance().await?;
            print_json(&json!({
                "event": "governance-init",
                "rules": init.rules.len(),
                "initialized": init.init_event.is_some(),
            }))?;
            Ok(EXIT_OK)
        }

        GovernanceCommand::Rules => {
            print_json_pretty(&ledger.list_rules().await?)?;
            Ok(EXIT_OK)
        }

        GovernanceCommand::UpsertRule {
            code,
            rule_type,
            threshold,
            severity,
            inactive,
            params,
        } => {
            let rule = NewRule {
                code: code.clone(),
                rule_type: RuleType::from(rule_type.as_str()),
                threshold: *threshold,
                severity: *severity,
                active: !inactive,
                params: parse_params(params.as_deref())?,
            };
            match ledger.upsert_policy_rule(rule).await {
                Ok(saved) => {
                    print_json_pretty(&saved)?;
                    Ok(EXIT_OK)
                }
                Err(e) => rejected(e),
            }
        }

        GovernanceCommand::Verify { limit } => {
            let mut report = ledger.verify_all().await?;
            if limit.is_some() {
                report.audit = ledger.verify_audit_chain(*limit).await?;
                report.intact = report.audit.intact && report.risk.intact && report.snapshots.values().all(|v| v.intact);
            }
            print_json_pretty(&report)?;
            if report.intact {
                Ok(EXIT_OK)
            } else {
                tracing::warn!("governance chain verification failed");
                Ok(EXIT_REJECTED)
            }
        }

        GovernanceCommand::Audit { limit } => {
            print_json_pretty(&ledger.recent_audit_events(*limit).await?)?;
            Ok(EXIT_OK)
        }

        GovernanceCommand::ConfigSnapshot { kind, file, json } => {
            if kind.trim().is_empty() {
                eprintln!("--kind must not be empty");
                return Ok(EXIT_REJECTED);
            }
            let content = snapshot_content(file.as_ref(), json.as_deref())?;
            let saved = ledger.save_config_snapshot(kind.trim(), &content).await?;
            if !saved.created {
                eprintln!("content unchanged; latest {kind} snapshot kept");
            }
            print_json_pretty(&saved)?;
            Ok(EXIT_OK)
        }

        GovernanceCommand::Breaches { limit, open_only } => {
            print_json_pretty(&ledger.list_breaches(*limit, *open_only).await?)?;
            Ok(EXIT_OK)
        }

        GovernanceCommand::BreachStatus { id, status } => match ledger.update_breach_status(*id, *status).await {
            Ok(breach) => {
                print_json_pretty(&breach)?;
                Ok(EXIT_OK)
            }
            Err(e) => rejected(e),
        },

        GovernanceCommand::BreachNotes { id, notes } => match ledger.update_breach_notes(*id, notes).await {
            Ok(breach) => {
                print_json_pretty(&breach)?;
                Ok(EXIT_OK)
            }
            Err(e) => rejected(e),
        },
    }
}
