//! Tunable heuristics for the extraction pipeline.
//!
//! None of these thresholds has a canonical value; the defaults are what
//! works on the statements we have seen, and every one of them can be
//! overridden from the `[extract]` table of the CLI config.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Component order of an all-numeric date such as `01/02/2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// 01/02/2024 is 1 February
    DayFirst,
    /// 01/02/2024 is 2 January
    MonthFirst,
    /// 2024/02/01
    YearFirst,
}

impl fmt::Display for DateOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DateOrder::DayFirst => "DD/MM/YYYY",
            DateOrder::MonthFirst => "MM/DD/YYYY",
            DateOrder::YearFirst => "YYYY/MM/DD",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// A native PDF page with fewer non-whitespace characters than this is
    /// treated as scanned and routed to OCR
    pub min_native_chars: usize,
    /// A line repeated verbatim on at least this share of pages is a
    /// header/footer
    pub noise_page_ratio: f64,
    /// Repetition noise is only detected on documents with this many pages
    pub noise_min_pages: usize,
    /// Largest balance discrepancy still considered rounding
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_tolerance: Decimal,
    pub ocr_timeout_secs: u64,
    /// Pages OCR'd at the same time
    pub ocr_concurrency: usize,
    /// Priority list for numeric dates; the first order that reads every
    /// date in the document is locked in
    pub date_orders: Vec<DateOrder>,
    /// A transaction's date must start within this many characters of the
    /// line start
    pub date_search_window: usize,
    /// Continuation lines a group may collect before further lines are
    /// treated as noise
    pub max_continuation_lines: usize,
    /// Decimal places used for fixed-point export
    pub currency_minor_units: u32,
    /// Added to the built-in debit keywords
    pub debit_keywords: Vec<String>,
    /// Added to the built-in credit keywords
    pub credit_keywords: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_native_chars: 20,
            noise_page_ratio: 0.5,
            noise_min_pages: 2,
            balance_tolerance: Decimal::new(1, 2),
            ocr_timeout_secs: 60,
            ocr_concurrency: 4,
            date_orders: vec![DateOrder::DayFirst, DateOrder::MonthFirst],
            date_search_window: 16,
            max_continuation_lines: 6,
            currency_minor_units: 2,
            debit_keywords: Vec::new(),
            credit_keywords: Vec::new(),
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs.max(1))
    }

    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_date_orders(mut self, orders: Vec<DateOrder>) -> Self {
        self.date_orders = orders;
        self
    }

    pub fn with_balance_tolerance(mut self, tolerance: Decimal) -> Self {
        self.balance_tolerance = tolerance.abs();
        self
    }

    pub fn with_min_native_chars(mut self, n: usize) -> Self {
        self.min_native_chars = n;
        self
    }

    pub fn with_noise_page_ratio(mut self, ratio: f64) -> Self {
        self.noise_page_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Priority list with `YearFirst` appended if missing; ISO-style dates
    /// are never ambiguous so they are always readable.
    pub fn effective_date_orders(&self) -> Vec<DateOrder> {
        let mut orders: Vec<DateOrder> = Vec::new();
        for o in &self.date_orders {
            if !orders.contains(o) {
                orders.push(*o);
            }
        }
        if orders.is_empty() {
            orders.push(DateOrder::DayFirst);
        }
        if !orders.contains(&DateOrder::YearFirst) {
            orders.push(DateOrder::YearFirst);
        }
        orders
    }
}
