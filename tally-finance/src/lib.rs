//! tally-finance: head categories, counterparties, reconciliation and export

pub mod category_rules;
pub mod counterparty;
pub mod export;
pub mod reconcile;

pub use category_rules::categorize;
pub use counterparty::extract_counterparty;
pub use export::{from_json, to_csv, to_json, write_csv};
pub use reconcile::{computed_closing, validate};
