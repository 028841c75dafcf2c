//! End-to-end extraction: document → pages → lines → metadata and
//! transactions → findings.

use std::sync::Arc;

use tally_core::{
    Document, ExtractOptions, ExtractionResult, Finding, NormalizedLine, Page, Result, StatementMetadata,
    Transaction,
};
use tally_finance::{categorize, extract_counterparty, validate};
use tracing::{info, warn};

use crate::parsers::{LineClassifier, TransactionParser, extract_metadata};
use crate::source::{OcrEngine, PageRenderer, TextLayer, TextSource};
use crate::text::{DocumentLocale, Normalizer, infer_locale};
use crate::types::LineGroup;

/// Form feed, the page separator of `pdftotext` output.
const PAGE_BREAK: char = '\x0c';

/// Everything learned about a document before transactions are parsed.
struct Prepared {
    lines: Vec<NormalizedLine>,
    locale: DocumentLocale,
    metadata: StatementMetadata,
    findings: Vec<Finding>,
}

/// Runs the whole pipeline for one document at a time. Cheap to clone and
/// safe to share between tasks; documents never share state.
#[derive(Clone)]
pub struct Extractor {
    options: ExtractOptions,
    source: TextSource,
}

impl Extractor {
    /// Native text only; add OCR with [`Extractor::with_ocr`] and
    /// [`Extractor::with_renderer`].
    pub fn new(options: ExtractOptions) -> Self {
        let source = TextSource::new(&options);
        Self { options, source }
    }

    pub fn with_source(mut self, source: TextSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_text_layer(mut self, layer: Arc<dyn TextLayer>) -> Self {
        self.source = self.source.with_text_layer(layer);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.source = self.source.with_renderer(renderer);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.source = self.source.with_ocr(ocr);
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract a statement. Fails only when the document cannot be opened
    /// at all; everything else degrades into findings.
    pub async fn extract(&self, document: &Document) -> Result<ExtractionResult> {
        let pages = self.pages(document).await?;
        Ok(self.extract_pages(&pages))
    }

    pub async fn pages(&self, document: &Document) -> Result<Vec<Page>> {
        self.source.extract(document).await
    }

    /// Plain text with pages separated by form feeds.
    pub fn extract_text(&self, text: &str) -> ExtractionResult {
        self.extract_pages(&split_pages(text))
    }

    pub fn extract_pages(&self, pages: &[Page]) -> ExtractionResult {
        let Prepared {
            lines,
            locale,
            metadata,
            mut findings,
        } = self.prepare(pages);

        let groups = LineClassifier::new(&locale, &self.options).classify(&lines);
        let parser = TransactionParser::new(&locale, &self.options);
        let signed = parser.detect_signed_notation(&groups);
        let parser = parser.with_signed_notation(signed);

        let (transactions, failures) = parse_groups(&parser, &groups);
        findings.extend(failures);
        findings.extend(validate(&metadata, &transactions, self.options.balance_tolerance));

        info!(
            transactions = transactions.len(),
            findings = findings.len(),
            "statement extracted"
        );
        ExtractionResult::new(metadata, transactions, findings)
    }

    /// Normalized lines with the classifier's reading of each.
    pub fn annotate(&self, pages: &[Page]) -> Vec<(NormalizedLine, String)> {
        let prepared = self.prepare(pages);
        let classifier = LineClassifier::new(&prepared.locale, &self.options);
        prepared
            .lines
            .into_iter()
            .map(|line| {
                let label = classifier.label(&line);
                (line, label)
            })
            .collect()
    }

    fn prepare(&self, pages: &[Page]) -> Prepared {
        let mut findings: Vec<Finding> = pages
            .iter()
            .filter_map(|p| {
                p.error.as_ref().map(|reason| Finding::PageExtractionFailure {
                    page: p.index,
                    reason: reason.clone(),
                })
            })
            .collect();

        let lines = Normalizer::new(&self.options).normalize_document(pages);
        let inference = infer_locale(&lines, &self.options);
        findings.extend(inference.findings);

        let metadata = extract_metadata(&lines, &inference.locale);
        let locale = inference.locale.with_period(metadata.period);

        Prepared {
            lines,
            locale,
            metadata,
            findings,
        }
    }
}

/// Parse every group; failures become findings carrying the group text.
pub fn parse_groups(parser: &TransactionParser<'_>, groups: &[LineGroup]) -> (Vec<Transaction>, Vec<Finding>) {
    let mut transactions = Vec::with_capacity(groups.len());
    let mut findings = Vec::new();

    for group in groups {
        match parser.parse(group) {
            Ok(mut txn) => {
                txn.category = categorize(&txn.description);
                txn.counterparty = extract_counterparty(&txn.description);
                transactions.push(txn);
            }
            Err(failure) => {
                let span = group.span();
                warn!(%span, reason = %failure, "transaction not parsed");
                findings.push(Finding::TransactionParseFailure {
                    span,
                    reason: failure.to_string(),
                    raw_text: group.raw_text(),
                });
            }
        }
    }
    (transactions, findings)
}

/// Text pages split on form feeds; a trailing empty page is dropped.
pub fn split_pages(text: &str) -> Vec<Page> {
    let mut parts: Vec<&str> = text.split(PAGE_BREAK).collect();
    if parts.len() > 1 && parts.last().is_some_and(|p| p.trim().is_empty()) {
        parts.pop();
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(i, t)| Page::native(i, t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tally_core::{Category, Direction, FindingKind, TextOrigin};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    const STATEMENT: &str = "\
FIRST COMMUNITY BANK
Account Holder: JANE Q SAMPLE
Account Number: XXXX1234
Statement Period: 01/02/2024 to 29/02/2024
Opening Balance: 1,000.00
Closing Balance: 5,742.30
Date Description Withdrawals Deposits Balance
01/02/2024 ACH SALARY ACME CORP - 5,000.00 6,000.00
03/02/2024 POS GROCERY MART 245.20 - 5,754.80
05/02/2024 MONTHLY SERVICE FEE 12.50 - 5,742.30
Page 1 of 1";

    #[test]
    fn test_end_to_end_text() {
        let result = Extractor::new(ExtractOptions::default()).extract_text(STATEMENT);
        assert!(result.is_clean(), "{:?}", result.findings);
        assert_eq!(result.metadata.opening_balance, Some(d("1000.00")));
        assert_eq!(result.transactions.len(), 3);

        let salary = &result.transactions[0];
        assert_eq!(salary.direction, Direction::Credit);
        assert_eq!(salary.amount, d("5000.00"));
        assert_eq!(salary.category, Category::Salary);

        let fee = &result.transactions[2];
        assert_eq!(fee.direction, Direction::Debit);
        assert_eq!(fee.running_balance, Some(d("5742.30")));
    }

    #[test]
    fn test_failed_pages_become_findings() {
        let pages = vec![
            Page::native(0, "01/02/2024 Grocery Store -45.20"),
            Page::failed(1, TextOrigin::Ocr, "OCR timed out after 60s"),
        ];
        let result = Extractor::new(ExtractOptions::default()).extract_pages(&pages);
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.findings_of(FindingKind::PageExtractionFailure).count(), 1);
    }

    #[test]
    fn test_split_pages() {
        let pages = split_pages("a\x0cb\x0c");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "b");
        assert_eq!(split_pages("").len(), 1);
    }

    #[test]
    fn test_annotate_labels_lines() {
        let pages = split_pages(STATEMENT);
        let labelled = Extractor::new(ExtractOptions::default()).annotate(&pages);
        let starts = labelled.iter().filter(|(_, l)| l == "start").count();
        assert_eq!(starts, 3);
        assert!(labelled.iter().any(|(_, l)| l.starts_with("header")));
    }
}
