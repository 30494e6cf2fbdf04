//! # API Route Modules
//!
//! - `governance`: policy rules, audit chain, config snapshots, breaches.
//! - `risk`: stored risk events and on-demand evaluation.
//! - `portfolio`: holdings and cash valued with the configured market data.

pub mod governance;
pub mod portfolio;
pub mod risk;
