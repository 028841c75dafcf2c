//! tally-ingest: page text from PDFs and scans, and the parsers that turn it
//! into statement metadata and transactions.

pub mod parsers;
pub mod pipeline;
pub mod source;
pub mod text;
pub mod types;

pub use parsers::{LineClassifier, ParseFailure, TransactionParser, extract_metadata};
pub use pipeline::{Extractor, parse_groups, split_pages};
pub use source::{
    LopdfTextLayer, OcrEngine, OcrText, PageRenderer, PdftoppmRenderer, TesseractOcr, TextLayer, TextSource,
};
pub use text::{DocumentLocale, Normalizer, infer_locale};
pub use types::{ColumnLayout, LineGroup};
