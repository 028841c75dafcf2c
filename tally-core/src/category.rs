//! Transaction "heads": coarse categories assigned from the description.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction categories matched deterministically
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[serde(rename = "cash")]
    Cash,
    #[serde(rename = "withdrawal")]
    Withdrawal,
    #[serde(rename = "transfer")]
    Transfer,
    #[serde(rename = "salary")]
    Salary,
    #[serde(rename = "interest")]
    Interest,
    #[serde(rename = "charge")]
    Charge,
    #[serde(rename = "refund")]
    Refund,
    #[serde(rename = "card-payment")]
    CardPayment,
    #[serde(rename = "credit-card")]
    CreditCard,
    #[serde(rename = "dividend")]
    Dividend,
    #[serde(rename = "other")]
    #[default]
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Cash => "Cash",
            Category::Withdrawal => "Withdrawal",
            Category::Transfer => "Transfer",
            Category::Salary => "Salary",
            Category::Interest => "Interest",
            Category::Charge => "Charge",
            Category::Refund => "Refund",
            Category::CardPayment => "Card Payment",
            Category::CreditCard => "Credit Card",
            Category::Dividend => "Dividend",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
