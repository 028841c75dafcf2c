//! Non-fatal diagnostics attached to an extraction result.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::statement::StatementPeriod;
use crate::transaction::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    PageExtractionFailure,
    DateFormatAmbiguous,
    TransactionParseFailure,
    BalanceMismatch,
    ReconciliationSkipped,
    DateOutsidePeriod,
}

/// Which printed balance a computed balance was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceCheck {
    RunningBalance,
    ClosingBalance,
}

/// A detected inconsistency or degraded extraction. The pipeline keeps
/// going after every one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Finding {
    PageExtractionFailure {
        page: usize,
        reason: String,
    },
    DateFormatAmbiguous {
        /// Format applied to the whole document anyway
        chosen: String,
        /// Date tokens the chosen format could not read
        unparsed: Vec<String>,
    },
    TransactionParseFailure {
        span: SourceSpan,
        reason: String,
        /// The group's text, kept for audit
        raw_text: String,
    },
    BalanceMismatch {
        check: BalanceCheck,
        /// Offending transaction, `None` when a closing balance is compared
        /// against a statement with no transactions
        transaction_index: Option<usize>,
        #[serde(with = "rust_decimal::serde::str")]
        expected: Decimal,
        #[serde(with = "rust_decimal::serde::str")]
        found: Decimal,
        /// `found - expected`
        #[serde(with = "rust_decimal::serde::str")]
        delta: Decimal,
    },
    ReconciliationSkipped {
        reason: String,
    },
    DateOutsidePeriod {
        transaction_index: usize,
        date: NaiveDate,
        period: StatementPeriod,
    },
}

impl Finding {
    pub fn kind(&self) -> FindingKind {
        match self {
            Finding::PageExtractionFailure { .. } => FindingKind::PageExtractionFailure,
            Finding::DateFormatAmbiguous { .. } => FindingKind::DateFormatAmbiguous,
            Finding::TransactionParseFailure { .. } => FindingKind::TransactionParseFailure,
            Finding::BalanceMismatch { .. } => FindingKind::BalanceMismatch,
            Finding::ReconciliationSkipped { .. } => FindingKind::ReconciliationSkipped,
            Finding::DateOutsidePeriod { .. } => FindingKind::DateOutsidePeriod,
        }
    }

    pub fn balance_mismatch(
        check: BalanceCheck,
        transaction_index: Option<usize>,
        expected: Decimal,
        found: Decimal,
    ) -> Self {
        Finding::BalanceMismatch {
            check,
            transaction_index,
            expected,
            found,
            delta: found - expected,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::PageExtractionFailure { page, reason } => {
                write!(f, "page {} could not be extracted: {reason}", page + 1)
            }
            Finding::DateFormatAmbiguous { chosen, unparsed } => write!(
                f,
                "mixed date formats; applied {chosen}, {} token(s) unreadable ({})",
                unparsed.len(),
                unparsed.join(", ")
            ),
            Finding::TransactionParseFailure { span, reason, raw_text } => {
                write!(f, "{span}: {reason}: {raw_text:?}")
            }
            Finding::BalanceMismatch {
                check,
                transaction_index,
                expected,
                found,
                delta,
            } => {
                let what = match check {
                    BalanceCheck::RunningBalance => "running balance",
                    BalanceCheck::ClosingBalance => "closing balance",
                };
                match transaction_index {
                    Some(i) => write!(
                        f,
                        "{what} after transaction #{i} is {found}, computed {expected} (delta {delta})"
                    ),
                    None => write!(f, "{what} is {found}, computed {expected} (delta {delta})"),
                }
            }
            Finding::ReconciliationSkipped { reason } => {
                write!(f, "reconciliation skipped: {reason}")
            }
            Finding::DateOutsidePeriod {
                transaction_index,
                date,
                period,
            } => write!(
                f,
                "transaction #{transaction_index} dated {date} falls outside {} to {}",
                period.start, period.end
            ),
        }
    }
}
