//! Document-wide date order and number format.
//!
//! Both are decided once per document from every token it contains, then
//! applied uniformly. A statement never mixes `01/02` meaning 1 February on
//! one row with 2 January on the next.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use tally_core::{DateOrder, ExtractOptions, Finding, NormalizedLine, StatementPeriod};
use tracing::{debug, warn};

use super::tokens::{DateShape, DateToken, NumberFormat, find_dates, words};

/// Why a date token could not become a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateError {
    /// Components are impossible under the locked order (e.g. month 13)
    Invalid,
    /// No year printed and none could be inferred
    NoYear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLocale {
    pub date_order: DateOrder,
    pub number_format: NumberFormat,
    /// Used to place yearless dates
    pub period: Option<StatementPeriod>,
    /// Most common year among fully printed dates
    pub fallback_year: Option<i32>,
}

impl Default for DocumentLocale {
    fn default() -> Self {
        Self {
            date_order: DateOrder::DayFirst,
            number_format: NumberFormat::DotDecimal,
            period: None,
            fallback_year: None,
        }
    }
}

impl DocumentLocale {
    pub fn with_period(mut self, period: Option<StatementPeriod>) -> Self {
        self.period = period;
        self
    }

    /// Turn a token into a date under this document's conventions.
    pub fn resolve(&self, token: &DateToken) -> Result<NaiveDate, DateError> {
        let (month, day, year) = match token.shape {
            DateShape::YearFirst { year, month, day } => (month, day, Some(year)),
            DateShape::Named { day, month, year } => (month, day, year),
            DateShape::Numeric { first, second, year } => match self.date_order {
                DateOrder::MonthFirst => (first, second, year),
                DateOrder::DayFirst | DateOrder::YearFirst => (second, first, year),
            },
        };

        if !valid_month_day(month, day) {
            return Err(DateError::Invalid);
        }

        let year = match year {
            Some(y) => y,
            None => self.year_for(month, day).ok_or(DateError::NoYear)?,
        };
        NaiveDate::from_ymd_opt(year, month, day).ok_or(DateError::Invalid)
    }

    /// Year for a date printed without one. The statement period wins; a
    /// period spanning New Year puts late months in the start year.
    fn year_for(&self, month: u32, day: u32) -> Option<i32> {
        if let Some(period) = self.period {
            let (start, end) = (period.start.year(), period.end.year());
            for y in [end, start] {
                if let Some(date) = NaiveDate::from_ymd_opt(y, month, day) {
                    if period.contains(date) {
                        return Some(y);
                    }
                }
            }
            if start != end && month > period.end.month() {
                return Some(start);
            }
            return Some(end);
        }
        self.fallback_year
    }
}

fn valid_month_day(month: u32, day: u32) -> bool {
    // 2000 is a leap year, so 29 February stays possible
    NaiveDate::from_ymd_opt(2000, month, day).is_some()
}

fn parses_under(shape: &DateShape, order: DateOrder) -> bool {
    match *shape {
        DateShape::Numeric { first, second, .. } => match order {
            DateOrder::DayFirst => valid_month_day(second, first),
            DateOrder::MonthFirst => valid_month_day(first, second),
            DateOrder::YearFirst => false,
        },
        DateShape::YearFirst { month, day, .. } | DateShape::Named { day, month, .. } => valid_month_day(month, day),
    }
}

/// Outcome of locale inference: the locale plus any ambiguity finding.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleInference {
    pub locale: DocumentLocale,
    pub findings: Vec<Finding>,
}

/// Lock the date order and number format for a whole document.
///
/// The first order in priority that reads every day/month-ambiguous date is
/// chosen. When none reads them all, the order that reads the most wins
/// (priority breaks ties) and a `DateFormatAmbiguous` finding lists the
/// tokens it could not read.
pub fn infer_locale(lines: &[NormalizedLine], options: &ExtractOptions) -> LocaleInference {
    let tokens: Vec<DateToken> = lines.iter().flat_map(|l| find_dates(&l.text)).collect();
    let ambiguous: Vec<&DateToken> = tokens.iter().filter(|t| t.shape.is_order_ambiguous()).collect();

    let candidates: Vec<DateOrder> = options
        .effective_date_orders()
        .into_iter()
        .filter(|o| *o != DateOrder::YearFirst)
        .collect();
    let candidates = if candidates.is_empty() {
        vec![DateOrder::DayFirst]
    } else {
        candidates
    };

    let mut findings = Vec::new();
    let date_order = match candidates
        .iter()
        .find(|o| ambiguous.iter().all(|t| parses_under(&t.shape, **o)))
    {
        Some(order) => *order,
        None => {
            // max_by_key keeps the last maximum; walk in reverse so the
            // highest-priority order wins ties
            let best = candidates
                .iter()
                .rev()
                .max_by_key(|o| ambiguous.iter().filter(|t| parses_under(&t.shape, **o)).count())
                .copied()
                .unwrap_or(DateOrder::DayFirst);
            let unparsed: Vec<String> = ambiguous
                .iter()
                .filter(|t| !parses_under(&t.shape, best))
                .map(|t| t.text.clone())
                .collect();
            warn!(chosen = %best, unreadable = unparsed.len(), "no single date order reads every date");
            findings.push(Finding::DateFormatAmbiguous {
                chosen: best.to_string(),
                unparsed,
            });
            best
        }
    };

    let number_format = infer_number_format(lines);
    let fallback_year = most_common_year(&tokens);
    debug!(%date_order, ?number_format, ?fallback_year, "locale locked");

    LocaleInference {
        locale: DocumentLocale {
            date_order,
            number_format,
            period: None,
            fallback_year,
        },
        findings,
    }
}

/// Vote between `1,234.56` and `1.234,56` over every numeric word; ties
/// and documents with no decimals default to dot-decimal.
pub fn infer_number_format(lines: &[NormalizedLine]) -> NumberFormat {
    let (mut dot, mut comma) = (0usize, 0usize);
    for line in lines {
        for (_, _, word) in words(&line.text) {
            match decimal_separator(word) {
                Some('.') => dot += 1,
                Some(',') => comma += 1,
                _ => {}
            }
        }
    }
    if comma > dot {
        NumberFormat::CommaDecimal
    } else {
        NumberFormat::DotDecimal
    }
}

/// The separator in front of exactly two trailing digits, provided every
/// other separator in the number is the opposite character.
fn decimal_separator(word: &str) -> Option<char> {
    let core: String = word
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if core.len() < 4 || word.chars().any(|c| c == '/') {
        return None;
    }
    let bytes = core.as_bytes();
    let sep = bytes[core.len() - 3] as char;
    if !(sep == '.' || sep == ',') || !core[core.len() - 2..].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let head = &core[..core.len() - 3];
    if head.is_empty() || !head.starts_with(|c: char| c.is_ascii_digit()) || head.contains(sep) {
        return None;
    }
    Some(sep)
}

fn most_common_year(tokens: &[DateToken]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for t in tokens {
        if let Some(y) = t.shape.year() {
            *counts.entry(y).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(y, _)| y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::FindingKind;

    fn lines(texts: &[&str]) -> Vec<NormalizedLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| NormalizedLine::new(0, i, *t, 1.0))
            .collect()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_first_by_default() {
        let inf = infer_locale(&lines(&["01/02/2024 Grocery -45.20"]), &ExtractOptions::default());
        assert_eq!(inf.locale.date_order, DateOrder::DayFirst);
        assert!(inf.findings.is_empty());
        let tok = &find_dates("01/02/2024")[0];
        assert_eq!(inf.locale.resolve(tok), Ok(ymd(2024, 2, 1)));
    }

    #[test]
    fn test_month_first_forced_by_evidence() {
        let inf = infer_locale(
            &lines(&["01/02/2024 a 1.00", "01/15/2024 b 2.00"]),
            &ExtractOptions::default(),
        );
        assert_eq!(inf.locale.date_order, DateOrder::MonthFirst);
        assert!(inf.findings.is_empty());
        let tok = &find_dates("01/02/2024")[0];
        assert_eq!(inf.locale.resolve(tok), Ok(ymd(2024, 1, 2)));
    }

    #[test]
    fn test_mixed_orders_flag_ambiguity() {
        // 13/01 only reads day-first, 01/13 only month-first
        let inf = infer_locale(
            &lines(&["13/01/2024 a 1.00", "14/01/2024 b 1.00", "01/13/2024 c 2.00"]),
            &ExtractOptions::default(),
        );
        assert_eq!(inf.locale.date_order, DateOrder::DayFirst);
        assert_eq!(inf.findings.len(), 1);
        assert_eq!(inf.findings[0].kind(), FindingKind::DateFormatAmbiguous);
        match &inf.findings[0] {
            Finding::DateFormatAmbiguous { unparsed, .. } => assert_eq!(unparsed, &vec!["01/13/2024".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tie_goes_to_priority() {
        let inf = infer_locale(
            &lines(&["13/01/2024 a 1.00", "01/13/2024 c 2.00"]),
            &ExtractOptions::default().with_date_orders(vec![DateOrder::MonthFirst, DateOrder::DayFirst]),
        );
        assert_eq!(inf.locale.date_order, DateOrder::MonthFirst);
        assert_eq!(inf.findings.len(), 1);
    }

    #[test]
    fn test_yearless_dates_use_period() {
        let locale = DocumentLocale {
            date_order: DateOrder::MonthFirst,
            period: Some(StatementPeriod::new(ymd(2023, 12, 15), ymd(2024, 1, 14))),
            ..DocumentLocale::default()
        };
        let dec = &find_dates("12/20 coffee")[0];
        let jan = &find_dates("01/05 coffee")[0];
        assert_eq!(locale.resolve(dec), Ok(ymd(2023, 12, 20)));
        assert_eq!(locale.resolve(jan), Ok(ymd(2024, 1, 5)));
    }

    #[test]
    fn test_yearless_without_context() {
        let locale = DocumentLocale::default();
        let tok = &find_dates("Jul 20 H-E-B")[0];
        assert_eq!(locale.resolve(tok), Err(DateError::NoYear));
        let locale = DocumentLocale {
            fallback_year: Some(2025),
            ..DocumentLocale::default()
        };
        assert_eq!(locale.resolve(tok), Ok(ymd(2025, 7, 20)));
    }

    #[test]
    fn test_fallback_year_from_full_dates() {
        let inf = infer_locale(
            &lines(&["Statement date 31 Jan 2024", "04/22 Discover -15.00 53.70"]),
            &ExtractOptions::default(),
        );
        assert_eq!(inf.locale.fallback_year, Some(2024));
        // 04/22 only reads month-first
        assert_eq!(inf.locale.date_order, DateOrder::MonthFirst);
    }

    #[test]
    fn test_invalid_components() {
        let locale = DocumentLocale::default();
        let tok = &find_dates("31/02/2024")[0];
        assert_eq!(locale.resolve(tok), Err(DateError::Invalid));
    }

    #[test]
    fn test_number_format_vote() {
        assert_eq!(
            infer_number_format(&lines(&["Saldo 1.234,56", "Betrag -45,20", "Total 12.50"])),
            NumberFormat::CommaDecimal
        );
        assert_eq!(
            infer_number_format(&lines(&["Balance 1,234.56", "-45.20"])),
            NumberFormat::DotDecimal
        );
        assert_eq!(infer_number_format(&lines(&["no numbers"])), NumberFormat::DotDecimal);
    }
}
