pub mod classify;
pub mod metadata;
pub mod transaction;

pub use classify::{LineClassifier, detect_layout, is_marker};
pub use metadata::extract_metadata;
pub use transaction::{ParseFailure, TransactionParser};
