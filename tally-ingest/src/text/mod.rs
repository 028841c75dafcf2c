//! Line-level text handling: cleanup, tokens and document locale.

pub mod locale;
pub mod normalize;
pub mod tokens;

pub use locale::{DateError, DocumentLocale, LocaleInference, infer_locale};
pub use normalize::Normalizer;
pub use tokens::{AmountToken, Cell, DateShape, DateToken, NumberFormat};
