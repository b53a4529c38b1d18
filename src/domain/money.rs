//! Money, accounts, and banker transaction handles.

use crate::domain::{AdSpotId, AuctionId, Decimal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// ISO-style currency tag carried with every amount.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        CurrencyCode(code.into())
    }

    /// Default settlement currency.
    pub fn usd() -> Self {
        CurrencyCode("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(CurrencyCode, CurrencyCode),
}

/// A (value, currency) pair.
///
/// Zero amounts are currency-neutral: they compare equal to and add onto any
/// currency. Comparison across two different non-zero currencies is
/// undefined and yields `None` from `partial_cmp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: Decimal,
    pub currency: CurrencyCode,
}

impl Amount {
    pub fn new(value: Decimal, currency: CurrencyCode) -> Self {
        Amount { value, currency }
    }

    pub fn usd(value: Decimal) -> Self {
        Amount::new(value, CurrencyCode::usd())
    }

    /// A currency-neutral zero.
    pub fn zero() -> Self {
        Amount::new(Decimal::zero(), CurrencyCode::usd())
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Add two amounts, adopting the non-zero side's currency.
    pub fn checked_add(&self, other: &Amount) -> Result<Amount, MoneyError> {
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.clone(),
                other.currency.clone(),
            ));
        }
        Ok(Amount::new(self.value + other.value, self.currency.clone()))
    }

    /// Compare within a currency; zero compares against anything.
    pub fn partial_cmp_value(&self, other: &Amount) -> Option<Ordering> {
        if self.is_zero() || other.is_zero() || self.currency == other.currency {
            self.value.partial_cmp(&other.value)
        } else {
            None
        }
    }

    /// True when `self` strictly exceeds `other` and the comparison is
    /// defined.
    pub fn exceeds(&self, other: &Amount) -> bool {
        matches!(self.partial_cmp_value(other), Some(Ordering::Greater))
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Hierarchical account path, e.g. `network:campaign:strategy`.
///
/// Empty keys are legal in events (the exchange may omit the account) but
/// never drive a committed financial operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct AccountKey(pub Vec<String>);

impl AccountKey {
    pub fn new(parts: Vec<String>) -> Self {
        AccountKey(parts)
    }

    /// Parse a `:`-separated account path. Empty input gives an empty key.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return AccountKey::default();
        }
        AccountKey(path.split(':').map(|s| s.to_string()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Join the path with the given separator, for counter names and logs.
    pub fn join(&self, sep: char) -> String {
        self.0.join(&sep.to_string())
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join(':'))
    }
}

/// The banker's transaction handle for one bid:
/// `"<auctionId>-<spotId>-<agent>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BidId(pub String);

impl BidId {
    pub fn new(auction_id: &AuctionId, ad_spot_id: &AdSpotId, agent: &str) -> Self {
        BidId(format!("{}-{}-{}", auction_id, ad_spot_id, agent))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One named slice of a committed price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub amount: Amount,
}

/// Itemised breakdown handed to the banker alongside a commit; may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LineItems(pub Vec<LineItem>);

impl LineItems {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(v: i64) -> Amount {
        Amount::usd(Decimal::from(v))
    }

    #[test]
    fn zero_is_currency_neutral() {
        let eur = Amount::new(Decimal::from(5), CurrencyCode::new("EUR"));
        assert_eq!(Amount::zero().checked_add(&eur).unwrap(), eur);
        assert_eq!(eur.checked_add(&Amount::zero()).unwrap(), eur);
        assert!(usd(1).exceeds(&Amount::zero()));
    }

    #[test]
    fn addition_rejects_mixed_currencies() {
        let eur = Amount::new(Decimal::from(5), CurrencyCode::new("EUR"));
        let err = usd(5).checked_add(&eur).unwrap_err();
        assert!(matches!(err, MoneyError::CurrencyMismatch(_, _)));
    }

    #[test]
    fn comparison_undefined_across_currencies() {
        let eur = Amount::new(Decimal::from(5), CurrencyCode::new("EUR"));
        assert_eq!(usd(5).partial_cmp_value(&eur), None);
        assert!(!usd(5).exceeds(&eur));
        assert!(usd(6).exceeds(&usd(5)));
    }

    #[test]
    fn account_key_parse_and_join() {
        let key = AccountKey::parse("network:campaign");
        assert_eq!(key.join('.'), "network.campaign");
        assert!(!key.is_empty());
        assert!(AccountKey::parse("").is_empty());
    }

    #[test]
    fn bid_id_format() {
        let id = BidId::new(&AuctionId::new("a1"), &AdSpotId::new("s1"), "agent-x");
        assert_eq!(id.as_str(), "a1-s1-agent-x");
    }
}
