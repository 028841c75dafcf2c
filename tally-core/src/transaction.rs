//! Parsed statement transactions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money leaving the account
    Debit,
    /// Money entering the account
    Credit,
}

impl Direction {
    /// Apply this direction to a non-negative magnitude.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Direction::Debit => -amount,
            Direction::Credit => amount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "debit",
            Direction::Credit => "credit",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lines a transaction was parsed from, for tracing back to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub page: usize,
    pub start_line: usize,
    /// Inclusive
    pub end_line: usize,
}

impl SourceSpan {
    pub fn new(page: usize, start_line: usize, end_line: usize) -> Self {
        Self {
            page,
            start_line,
            end_line,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "page {} line {}", self.page + 1, self.start_line + 1)
        } else {
            write!(
                f,
                "page {} lines {}-{}",
                self.page + 1,
                self.start_line + 1,
                self.end_line + 1
            )
        }
    }
}

/// The other side of a transfer, when the description names one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub account: Option<String>,
    pub name: Option<String>,
}

impl Counterparty {
    pub fn is_empty(&self) -> bool {
        self.account.is_none() && self.name.is_none()
    }
}

/// One statement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    /// Always positive; the sign lives in `direction`
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub direction: Direction,
    /// Balance printed next to the row, if the statement has that column
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub running_balance: Option<Decimal>,
    pub source: SourceSpan,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        direction: Direction,
        source: SourceSpan,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            direction,
            running_balance: None,
            source,
            category: Category::Other,
            counterparty: None,
        }
    }

    pub fn with_running_balance(mut self, balance: Decimal) -> Self {
        self.running_balance = Some(balance);
        self
    }

    /// Negative for debits, positive for credits.
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }

    pub fn is_debit(&self) -> bool {
        self.direction == Direction::Debit
    }
}
