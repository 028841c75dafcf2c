//! Grouping normalized lines into candidate transactions.
//!
//! A small state machine over the line stream: a line with a date near its
//! start and an amount after it opens a group, undated lines extend the open
//! group, and page breaks, column headers, carry-forward rows and section
//! titles close it. Column headers also teach the table layout used by the
//! groups that follow.

use regex::Regex;
use std::sync::OnceLock;
use tally_core::{ExtractOptions, NormalizedLine};
use tracing::debug;

use crate::text::tokens::{Cell, amounts, find_dates, scan_cells};
use crate::text::{DateError, DocumentLocale};
use crate::types::{ColumnLayout, LineGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Table header row
    Header(ColumnLayout),
    /// Carry-forward, total or section title
    Marker,
    /// Date plus amount: a new transaction
    Start,
    /// Date but no amount
    Dated,
    Other,
}

pub struct LineClassifier<'a> {
    locale: &'a DocumentLocale,
    date_window: usize,
    max_continuation: usize,
}

impl<'a> LineClassifier<'a> {
    pub fn new(locale: &'a DocumentLocale, options: &ExtractOptions) -> Self {
        Self {
            locale,
            date_window: options.date_search_window,
            max_continuation: options.max_continuation_lines,
        }
    }

    pub fn classify(&self, lines: &[NormalizedLine]) -> Vec<LineGroup> {
        let mut groups: Vec<LineGroup> = Vec::new();
        let mut open: Option<LineGroup> = None;
        let mut layout = ColumnLayout::Unknown;

        for line in lines {
            if open.as_ref().is_some_and(|g| g.start().page != line.page) {
                groups.extend(open.take());
            }

            match self.kind(line) {
                LineKind::Header(learned) => {
                    groups.extend(open.take());
                    if learned != layout {
                        debug!(page = line.page, line = line.line, ?learned, "column layout");
                    }
                    layout = learned;
                }
                // a dated line without figures is furniture, not a continuation
                LineKind::Marker | LineKind::Dated => groups.extend(open.take()),
                LineKind::Start => {
                    groups.extend(open.take());
                    open = Some(LineGroup::new(line.clone(), layout));
                }
                LineKind::Other => match open.as_mut() {
                    Some(group) if group.continuation_count() < self.max_continuation => {
                        group.lines.push(line.clone());
                    }
                    // past the cap the rest is page furniture
                    Some(_) => groups.extend(open.take()),
                    None => {}
                },
            }
        }
        groups.extend(open.take());

        debug!(groups = groups.len(), "lines grouped");
        groups
    }

    /// How a single line reads on its own, for debugging output.
    pub fn label(&self, line: &NormalizedLine) -> String {
        match self.kind(line) {
            LineKind::Header(layout) => format!("header {layout:?}"),
            LineKind::Marker => "marker".to_string(),
            LineKind::Start => "start".to_string(),
            LineKind::Dated => "dated".to_string(),
            LineKind::Other => "-".to_string(),
        }
    }

    fn kind(&self, line: &NormalizedLine) -> LineKind {
        let text = line.text.as_str();
        if let Some(layout) = detect_layout(text, self.locale) {
            return LineKind::Header(layout);
        }
        if is_marker(text) {
            return LineKind::Marker;
        }
        let first_date = find_dates(text)
            .into_iter()
            .next()
            .filter(|d| d.start <= self.date_window)
            .filter(|d| self.locale.resolve(d) != Err(DateError::Invalid));
        match first_date {
            Some(date) => {
                let has_amount = scan_cells(text, date.end, self.locale.number_format)
                    .iter()
                    .any(|c| matches!(c, Cell::Amount(_)));
                if has_amount { LineKind::Start } else { LineKind::Dated }
            }
            None => LineKind::Other,
        }
    }
}

struct HeaderPatterns {
    date: Regex,
    debit: Regex,
    credit: Regex,
    balance: Regex,
    amount: Regex,
}

fn header_patterns() -> &'static HeaderPatterns {
    static P: OnceLock<HeaderPatterns> = OnceLock::new();
    P.get_or_init(|| HeaderPatterns {
        date: Regex::new(r"(?i)\b(?:date|dt\.?)\b").expect("valid date alias regex"),
        debit: Regex::new(r"(?i)\b(?:withdrawals?|debits?|dr\.?|paid out|money out)\b").expect("valid debit alias regex"),
        credit: Regex::new(r"(?i)\b(?:deposits?|credits?|cr\.?|paid in|money in)\b").expect("valid credit alias regex"),
        balance: Regex::new(r"(?i)\b(?:balance|bal\.?)\b").expect("valid balance alias regex"),
        amount: Regex::new(r"(?i)\b(?:amount|amt\.?)\b").expect("valid amount alias regex"),
    })
}

/// Layout of a table header row, or `None` if the line is not one.
///
/// A header names a date column plus either split debit/credit columns, an
/// amount column or a balance column, and carries no figures of its own.
pub fn detect_layout(line: &str, locale: &DocumentLocale) -> Option<ColumnLayout> {
    let p = header_patterns();
    if !p.date.is_match(line) || !find_dates(line).is_empty() || !amounts(line, locale.number_format).is_empty() {
        return None;
    }
    let debit = p.debit.find(line);
    let credit = p.credit.find(line);
    let balance = p.balance.is_match(line);

    match (debit, credit) {
        (Some(d), Some(c)) => Some(ColumnLayout::Split {
            debit_first: d.start() < c.start(),
            balance,
        }),
        _ if p.amount.is_match(line) || balance => Some(ColumnLayout::Single { balance }),
        _ => None,
    }
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)(?:\b(?:opening|closing|beginning|ending|starting|previous)\s+balance\b|^new\s+balance\b",
            r"|\bbalance\s+(?:brought|carried)\s+forward\b|\b(?:brought|carried)\s+forward\b",
            r"|\bbalance\s+[bc]/f\b",
            r"|^(?:sub\s*|grand\s+)?totals?\b",
            r")"
        ))
        .expect("valid marker regex")
    })
}

fn section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^(?:",
            r"deposits?(?:\s+and\s+(?:other\s+)?(?:additions|credits))?",
            r"|withdrawals?(?:\s+and\s+(?:other\s+)?(?:subtractions|debits))?",
            r"|(?:other\s+)?(?:credits|debits)",
            r"|(?:checks|cheques)(?:\s+paid)?",
            r"|electronic\s+(?:withdrawals|deposits|payments)",
            r"|atm\s+(?:and|&)\s+debit\s+card\s+(?:withdrawals|transactions)",
            r"|payments(?:,)?\s+credits\s+and\s+adjustments",
            r"|transactions?(?:\s+(?:details?|history|detail))?",
            r"|account\s+(?:summary|activity)",
            r"|daily\s+(?:ending\s+)?balance(?:\s+summary)?",
            r"|fees(?:\s+charged)?|interest(?:\s+(?:charged|earned))?",
            r")(?:\s*\(?continued\)?)?\s*:?$"
        ))
        .expect("valid section regex")
    })
}

/// Carry-forward rows, totals and section titles.
pub fn is_marker(line: &str) -> bool {
    marker_re().is_match(line) || section_re().is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::DateOrder;

    fn lines(texts: &[(usize, &str)]) -> Vec<NormalizedLine> {
        let mut out = Vec::new();
        let mut per_page = std::collections::HashMap::new();
        for (page, text) in texts {
            let n = per_page.entry(*page).or_insert(0usize);
            out.push(NormalizedLine::new(*page, *n, *text, 1.0));
            *n += 1;
        }
        out
    }

    fn group_texts(groups: &[LineGroup]) -> Vec<Vec<&str>> {
        groups
            .iter()
            .map(|g| g.lines.iter().map(|l| l.text.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_continuations_attach() {
        let locale = DocumentLocale::default();
        let groups = LineClassifier::new(&locale, &ExtractOptions::default()).classify(&lines(&[
            (0, "Opening Balance 1,000.00"),
            (0, "01/02/2024 UPI/402211/ASHA RAO 500.00 500.00"),
            (0, "HDFC0001234 rent"),
            (0, "02/02/2024 Coffee 3.50 496.50"),
            (0, "Closing Balance 496.50"),
            (0, "Thank you for banking with us"),
        ]));
        assert_eq!(
            group_texts(&groups),
            vec![
                vec!["01/02/2024 UPI/402211/ASHA RAO 500.00 500.00", "HDFC0001234 rent"],
                vec!["02/02/2024 Coffee 3.50 496.50"],
            ]
        );
        assert_eq!(groups[0].span().start_line, 1);
        assert_eq!(groups[0].span().end_line, 2);
    }

    #[test]
    fn test_page_break_closes_group() {
        let locale = DocumentLocale::default();
        let groups = LineClassifier::new(&locale, &ExtractOptions::default()).classify(&lines(&[
            (0, "01/02/2024 Coffee 3.50"),
            (1, "Customer care 1800 000 000"),
            (1, "02/02/2024 Tea 2.00"),
        ]));
        assert_eq!(group_texts(&groups), vec![vec!["01/02/2024 Coffee 3.50"], vec!["02/02/2024 Tea 2.00"]]);
    }

    #[test]
    fn test_continuation_cap() {
        let locale = DocumentLocale::default();
        let mut options = ExtractOptions::default();
        options.max_continuation_lines = 1;
        let groups = LineClassifier::new(&locale, &options).classify(&lines(&[
            (0, "01/02/2024 Coffee 3.50"),
            (0, "beans"),
            (0, "more text"),
            (0, "and more"),
        ]));
        assert_eq!(group_texts(&groups), vec![vec!["01/02/2024 Coffee 3.50", "beans"]]);
    }

    #[test]
    fn test_headers_set_layout() {
        let locale = DocumentLocale::default();
        let groups = LineClassifier::new(&locale, &ExtractOptions::default()).classify(&lines(&[
            (0, "Date Narration Withdrawal Amt. Deposit Amt. Closing Balance"),
            (0, "01/02/2024 Salary - 5,000.00 15,000.00"),
            (1, "Date Description Amount Balance"),
            (1, "02/02/2024 Coffee -3.50 14,996.50"),
        ]));
        assert_eq!(
            groups[0].layout,
            ColumnLayout::Split {
                debit_first: true,
                balance: true
            }
        );
        assert_eq!(groups[1].layout, ColumnLayout::Single { balance: true });
    }

    #[test]
    fn test_date_must_lead_the_line() {
        let locale = DocumentLocale::default();
        let groups = LineClassifier::new(&locale, &ExtractOptions::default()).classify(&lines(&[
            (0, "Payment received with thanks on 01/02/2024 45.00"),
        ]));
        assert!(groups.is_empty());
    }

    #[test]
    fn test_dated_line_without_amount_closes() {
        let locale = DocumentLocale {
            date_order: DateOrder::MonthFirst,
            ..DocumentLocale::default()
        };
        let groups = LineClassifier::new(&locale, &ExtractOptions::default()).classify(&lines(&[
            (0, "01/02/2024 Coffee 3.50"),
            (0, "01/03/2024 Statement generated"),
            (0, "stray text"),
        ]));
        assert_eq!(group_texts(&groups), vec![vec!["01/02/2024 Coffee 3.50"]]);
    }

    #[test]
    fn test_layout_detection() {
        let locale = DocumentLocale::default();
        assert_eq!(
            detect_layout("Txn Date Particulars Cr Dr Balance", &locale),
            Some(ColumnLayout::Split {
                debit_first: false,
                balance: true
            })
        );
        assert_eq!(
            detect_layout("DATE DESCRIPTION AMOUNT", &locale),
            Some(ColumnLayout::Single { balance: false })
        );
        assert_eq!(detect_layout("Statement date 01/02/2024", &locale), None);
        assert_eq!(detect_layout("Description", &locale), None);
    }

    #[test]
    fn test_markers() {
        assert!(is_marker("Balance brought forward 1,000.00"));
        assert!(is_marker("01/02/2024 BALANCE B/F 1,000.00"));
        assert!(is_marker("Total 45.20 0.00"));
        assert!(is_marker("01/02/2024 Opening Balance 1,000.00"));
        assert!(is_marker("DEPOSITS AND ADDITIONS"));
        assert!(is_marker("Withdrawals (continued)"));
        assert!(!is_marker("01/02/2024 Grocery Store -45.20"));
        assert!(!is_marker("02/02/2024 Transfer to savings 10.00"));
    }
}
