//! # folio-core: Foundational Types for Folio
//!
//! This crate is the leaf of the Folio workspace. It defines the primitives
//! every other crate builds on: canonical JSON bytes for hashed payloads,
//! SHA-256 content digests, the error taxonomy, validated tickers, the
//! trading calendar, and runtime settings.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every payload that ends up inside a hash
//!    chain is produced by `CanonicalBytes::new()` (RFC 8785 / JCS). The
//!    stored `*_json` text is exactly the canonical text, so verification can
//!    hash what is on disk without re-serializing.
//!
//! 2. **Newtype wrappers for domain primitives.** `Ticker` can only be
//!    constructed through its validating parser.
//!
//! 3. **One error taxonomy.** `FolioError` carries the validation,
//!    market-data, repository, config, not-found and permission classes used
//!    by every layer above.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `folio-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod calendar;
pub mod canonical;
pub mod config;
pub mod digest;
pub mod error;
pub mod severity;
pub mod validate;

pub use calendar::{Clock, FixedClock, SystemClock, TradingCalendar};
pub use canonical::CanonicalBytes;
pub use config::{AppEnv, Settings};
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ConfigError, FolioError};
pub use severity::Severity;
pub use validate::{validate_price, validate_shares, validate_stop_loss, Ticker};
