//! # Input Validation
//!
//! `Ticker` newtype and numeric guards applied before any trade or price
//! override touches storage.

use serde::{Deserialize, Serialize};

use crate::error::FolioError;

const TICKER_MAX_LEN: usize = 10;

/// An exchange ticker symbol.
///
/// Normalized to trimmed upper-case and matching `^[A-Z][A-Z0-9.]{0,9}$`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, FolioError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if is_valid_ticker(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(FolioError::Validation("Invalid ticker format.".into()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_ticker(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {}
        _ => return false,
    }
    s.len() <= TICKER_MAX_LEN
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.')
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Ticker {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = FolioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn validate_shares(shares: f64) -> Result<f64, FolioError> {
    if positive(shares) {
        Ok(shares)
    } else {
        Err(FolioError::Validation("Shares and price must be positive.".into()))
    }
}

pub fn validate_price(price: f64) -> Result<f64, FolioError> {
    if positive(price) {
        Ok(price)
    } else {
        Err(FolioError::Validation("Shares and price must be positive.".into()))
    }
}

/// Zero means "no stop loss"; anything else must be a valid price.
pub fn validate_stop_loss(stop_loss: f64) -> Result<f64, FolioError> {
    if stop_loss == 0.0 || positive(stop_loss) {
        Ok(stop_loss)
    } else {
        Err(FolioError::Validation("Stop loss must be zero or positive.".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(Ticker::parse("  abc ").unwrap().as_str(), "ABC");
        assert_eq!(Ticker::parse("brk.b").unwrap().as_str(), "BRK.B");
    }

    #[test]
    fn rejects_malformed_tickers() {
        for bad in ["", "1ABC", ".A", "ABCDEFGHIJK", "AB-C", "A B"] {
            assert!(Ticker::parse(bad).is_err(), "{bad} should be rejected");
        }
        assert!(Ticker::parse("ABCDEFGHIJ").is_ok());
    }

    #[test]
    fn serde_validates() {
        let t: Ticker = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(t.as_str(), "MSFT");
        assert!(serde_json::from_str::<Ticker>("\"9X\"").is_err());
    }

    #[test]
    fn numeric_guards() {
        assert!(validate_shares(1.0).is_ok());
        assert!(validate_shares(0.0).is_err());
        assert!(validate_price(-2.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_stop_loss(0.0).is_ok());
        assert!(validate_stop_loss(-1.0).is_err());
    }

    proptest! {
        #[test]
        fn accepted_tickers_reparse_to_themselves(s in "[A-Z][A-Z0-9.]{0,9}") {
            let t = Ticker::parse(&s).unwrap();
            prop_assert_eq!(Ticker::parse(t.as_str()).unwrap(), t);
        }
    }
}
