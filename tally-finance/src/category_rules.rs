//! Deterministic head rules mapping transaction descriptions to a
//! [`Category`].
//!
//! Keywords are matched as whole words on the upper-cased description, so
//! "INT" (interest) does not fire on "INTERNET". Multi-word keywords match
//! consecutive words.

use tally_core::Category;

/// Ordered rule table. Priority: first matching row wins, so the more
/// specific heads come before the generic ones.
const HEAD_RULES: &[(Category, &[&str])] = &[
    (Category::CreditCard, &["CREDIT CARD PAYMENT", "CC PAYMENT", "CARD DUES"]),
    (Category::Refund, &["REFUND", "REV", "REVERSAL", "CHARGEBACK"]),
    (Category::Salary, &["SALARY", "PAYROLL", "SAL"]),
    (Category::Dividend, &["DIVIDEND", "DIV"]),
    (Category::Interest, &["INTEREST", "INT", "CR INT", "INT PD"]),
    (
        Category::Charge,
        &["CHRG", "CHARGE", "CHARGES", "FEE", "FEES", "GST", "PENALTY", "SMS CHRG"],
    ),
    (Category::Cash, &["ATM", "CSH", "CASH", "CASA", "ATW"]),
    (Category::CardPayment, &["POS", "DEBIT CARD", "CARD PURCHASE", "PURCHASE"]),
    (Category::Transfer, &["NEFT", "RTGS", "TRANSFER", "TRF", "ZELLE", "WIRE"]),
    (Category::Withdrawal, &["UPI", "IMPS", "WITHDRAWAL", "DEBIT"]),
];

/// Categorize a description. Falls back to [`Category::Other`].
pub fn categorize(description: &str) -> Category {
    let words = word_string(description);
    if words.trim().is_empty() {
        return Category::Other;
    }

    for (category, keywords) in HEAD_RULES {
        if keywords.iter().any(|kw| contains_words(&words, kw)) {
            return *category;
        }
    }

    Category::Other
}

/// Upper-case, alphanumeric words separated by single spaces and padded
/// with a space on both ends.
fn word_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_uppercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

fn contains_words(haystack: &str, keyword: &str) -> bool {
    haystack.contains(&format!(" {keyword} "))
}
