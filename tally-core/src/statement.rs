//! Statement-level metadata.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency code used when the statement never names one.
pub const UNKNOWN_CURRENCY: &str = "unknown";

/// Account number as printed. Statements often mask all but the last
/// digits ("XXXXXX1234"), which is kept as-is and flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountNumber {
    pub value: String,
    pub masked: bool,
}

impl AccountNumber {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let masked = value.chars().any(|c| matches!(c, 'X' | 'x' | '*' | '#'));
        Self { value, masked }
    }

    /// Trailing visible digits, handy for matching masked numbers.
    pub fn last_digits(&self, n: usize) -> String {
        let digits: Vec<char> = self.value.chars().filter(|c| c.is_ascii_digit()).collect();
        digits[digits.len().saturating_sub(n)..].iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatementPeriod {
    /// Builds a period, swapping the bounds if they arrive reversed.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Header fields of a statement. Every field may be absent; absence is a
/// valid outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementMetadata {
    pub account_holder: Option<String>,
    pub account_number: Option<AccountNumber>,
    pub period: Option<StatementPeriod>,
    /// Signed; negative when the account starts overdrawn
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub opening_balance: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub closing_balance: Option<Decimal>,
    /// ISO 4217 code, or "unknown"
    pub currency: String,
    /// IFSC / routing number / sort code
    #[serde(default)]
    pub routing_code: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl Default for StatementMetadata {
    fn default() -> Self {
        Self {
            account_holder: None,
            account_number: None,
            period: None,
            opening_balance: None,
            closing_balance: None,
            currency: UNKNOWN_CURRENCY.to_string(),
            routing_code: None,
            branch: None,
        }
    }
}

impl StatementMetadata {
    pub fn has_known_currency(&self) -> bool {
        self.currency != UNKNOWN_CURRENCY
    }

    /// `(key, value)` pairs of the fields that are present, in a stable
    /// order. Used for CSV comment preambles and summaries.
    pub fn present_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(h) = &self.account_holder {
            out.push(("account_holder", h.clone()));
        }
        if let Some(a) = &self.account_number {
            out.push(("account_number", a.value.clone()));
        }
        if let Some(p) = &self.period {
            out.push(("period_start", p.start.to_string()));
            out.push(("period_end", p.end.to_string()));
        }
        if let Some(b) = &self.opening_balance {
            out.push(("opening_balance", b.to_string()));
        }
        if let Some(b) = &self.closing_balance {
            out.push(("closing_balance", b.to_string()));
        }
        out.push(("currency", self.currency.clone()));
        if let Some(r) = &self.routing_code {
            out.push(("routing_code", r.clone()));
        }
        if let Some(b) = &self.branch {
            out.push(("branch", b.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_account_number() {
        let acct = AccountNumber::new("XXXXXX1234");
        assert!(acct.masked);
        assert_eq!(acct.last_digits(4), "1234");

        let plain = AccountNumber::new("001234567890");
        assert!(!plain.masked);
        assert_eq!(plain.last_digits(20), "001234567890");
    }

    #[test]
    fn test_period_orders_bounds() {
        let a = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let p = StatementPeriod::new(a, b);
        assert_eq!(p.start, b);
        assert!(p.contains(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_default_currency_unknown() {
        let meta = StatementMetadata::default();
        assert_eq!(meta.currency, "unknown");
        assert!(!meta.has_known_currency());
        assert_eq!(meta.present_fields(), vec![("currency", "unknown".to_string())]);
    }
}
