//! tally-core: data model shared by the statement extraction crates

pub mod category;
pub mod document;
pub mod error;
pub mod finding;
pub mod options;
pub mod page;
pub mod result;
pub mod statement;
pub mod transaction;

pub use category::Category;
pub use document::{Document, DocumentKind};
pub use error::{ExtractError, Result};
pub use finding::{BalanceCheck, Finding, FindingKind};
pub use options::{DateOrder, ExtractOptions};
pub use page::{NormalizedLine, Page, PageImage, TextOrigin};
pub use result::ExtractionResult;
pub use statement::{AccountNumber, StatementMetadata, StatementPeriod, UNKNOWN_CURRENCY};
pub use transaction::{Counterparty, Direction, SourceSpan, Transaction};
