//! Reconciliation: replay the transactions on top of the opening balance
//! and compare against every balance the statement prints.

use rust_decimal::Decimal;
use tally_core::{BalanceCheck, Finding, StatementMetadata, Transaction};
use tracing::{debug, info};

/// Cross-check transactions against the statement's balances and period.
///
/// All outcomes are findings; nothing here fails. After a running-balance
/// mismatch the replay re-anchors on the printed balance, so one bad row
/// yields one finding instead of a finding on every row after it.
pub fn validate(
    metadata: &StatementMetadata,
    transactions: &[Transaction],
    tolerance: Decimal,
) -> Vec<Finding> {
    let tolerance = tolerance.abs();
    let mut findings = Vec::new();

    match (metadata.opening_balance, metadata.closing_balance) {
        (None, None) => findings.push(Finding::ReconciliationSkipped {
            reason: "statement has no opening or closing balance".to_string(),
        }),
        (None, Some(_)) => findings.push(Finding::ReconciliationSkipped {
            reason: "statement has no opening balance".to_string(),
        }),
        (Some(_), None) => findings.push(Finding::ReconciliationSkipped {
            reason: "statement has no closing balance".to_string(),
        }),
        (Some(_), Some(_)) => {}
    }

    // Without an opening balance the first printed running balance is the
    // only usable anchor.
    let (mut balance, start) = match metadata.opening_balance {
        Some(b) => (Some(b), 0),
        None => match transactions
            .iter()
            .position(|t| t.running_balance.is_some())
        {
            Some(i) => (transactions[i].running_balance, i + 1),
            None => (None, transactions.len()),
        },
    };

    if let Some(mut computed) = balance {
        for (i, txn) in transactions.iter().enumerate().skip(start) {
            computed += txn.signed_amount();
            if let Some(printed) = txn.running_balance {
                if (printed - computed).abs() > tolerance {
                    debug!(index = i, %printed, %computed, "running balance mismatch");
                    findings.push(Finding::balance_mismatch(
                        BalanceCheck::RunningBalance,
                        Some(i),
                        computed,
                        printed,
                    ));
                }
                computed = printed;
            }
        }
        balance = Some(computed);
    }

    if let (Some(computed), Some(closing)) = (balance, metadata.closing_balance) {
        if (closing - computed).abs() > tolerance {
            let last = transactions.len().checked_sub(1);
            findings.push(Finding::balance_mismatch(
                BalanceCheck::ClosingBalance,
                last,
                computed,
                closing,
            ));
        }
    }

    if let Some(period) = metadata.period {
        for (i, txn) in transactions.iter().enumerate() {
            if !period.contains(txn.date) {
                findings.push(Finding::DateOutsidePeriod {
                    transaction_index: i,
                    date: txn.date,
                    period,
                });
            }
        }
    }

    info!(
        transactions = transactions.len(),
        findings = findings.len(),
        "reconciliation finished"
    );
    findings
}

/// Opening balance plus every signed amount.
pub fn computed_closing(opening: Decimal, transactions: &[Transaction]) -> Decimal {
    opening + transactions.iter().map(|t| t.signed_amount()).sum::<Decimal>()
}
