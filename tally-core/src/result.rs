//! The pipeline's output for one document.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::finding::{Finding, FindingKind};
use crate::statement::StatementMetadata;
use crate::transaction::{Direction, Transaction};

/// Metadata, transactions in statement order (never re-sorted) and the
/// findings collected along the way. Built once per document and not
/// modified after validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub metadata: StatementMetadata,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ExtractionResult {
    pub fn new(
        metadata: StatementMetadata,
        transactions: Vec<Transaction>,
        findings: Vec<Finding>,
    ) -> Self {
        Self {
            metadata,
            transactions,
            findings,
        }
    }

    pub fn findings_of(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind() == kind)
    }

    pub fn has_finding(&self, kind: FindingKind) -> bool {
        self.findings_of(kind).next().is_some()
    }

    /// True when nothing was flagged.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn total(&self, direction: Direction) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.direction == direction)
            .map(|t| t.amount)
            .sum()
    }

    /// Sum of signed amounts (credits minus debits).
    pub fn net_change(&self) -> Decimal {
        self.transactions.iter().map(|t| t.signed_amount()).sum()
    }
}
