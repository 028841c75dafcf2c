//! Date and amount tokens inside a normalized line.
//!
//! Everything here works on single-spaced text (the normalizer's output)
//! and reports byte ranges into the line, so callers can cut tokens out of
//! a description.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;
use tally_core::Direction;

/// Which character separates the minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// 1,234.56
    #[default]
    DotDecimal,
    /// 1.234,56
    CommaDecimal,
}

/// A monetary value as printed.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountToken {
    pub start: usize,
    pub end: usize,
    /// Always non-negative
    pub magnitude: Decimal,
    /// Leading/trailing minus or parentheses
    pub negative: bool,
    pub explicit_plus: bool,
    /// CR / DR suffix
    pub marker: Option<Direction>,
}

impl AmountToken {
    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn has_sign_notation(&self) -> bool {
        self.negative || self.explicit_plus || self.marker.is_some()
    }

    /// Value with its printed sign. A DR suffix counts as negative.
    pub fn signed(&self) -> Decimal {
        let negative = self.negative || self.marker == Some(Direction::Debit);
        if negative { -self.magnitude } else { self.magnitude }
    }
}

/// One cell of the amount area of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Amount(AmountToken),
    /// A lone dash standing next to an amount: either an empty column or a
    /// detached minus sign, depending on the table layout
    Dash { start: usize, end: usize },
}

impl Cell {
    pub fn span(&self) -> (usize, usize) {
        match self {
            Cell::Amount(a) => (a.start, a.end),
            Cell::Dash { start, end } => (*start, *end),
        }
    }

    pub fn amount(&self) -> Option<&AmountToken> {
        match self {
            Cell::Amount(a) => Some(a),
            Cell::Dash { .. } => None,
        }
    }
}

/// Whitespace-separated words with their byte offsets.
pub fn words(line: &str) -> Vec<(usize, usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, i, &line[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, line.len(), &line[s..]));
    }
    out
}

const CURRENCY_PREFIXES: &[&str] = &[
    "Rs.", "Rs", "INR", "USD", "EUR", "GBP", "AUD", "CAD", "SGD", "AED", "CHF", "$", "€", "£", "₹", "¥",
];

fn is_currency_marker(word: &str) -> bool {
    CURRENCY_PREFIXES.contains(&word)
}

fn is_dash(word: &str) -> bool {
    !word.is_empty() && word.len() <= 3 && word.chars().all(|c| c == '-')
}

fn marker_word(word: &str) -> Option<Direction> {
    match word.trim_end_matches('.').to_ascii_uppercase().as_str() {
        "CR" => Some(Direction::Credit),
        "DR" => Some(Direction::Debit),
        _ => None,
    }
}

fn dot_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:\d{1,3}(?:[,']\d{2,3})+|\d+)\.\d{2}|\d{1,3}(?:[,']\d{3})+)$")
            .expect("valid dot-decimal regex")
    })
}

fn comma_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:\d{1,3}(?:[.']\d{3})+|\d+),\d{2}|\d{1,3}(?:[.']\d{3})+)$")
            .expect("valid comma-decimal regex")
    })
}

/// Parse the digits of an amount (no sign, no currency) per `format`.
pub fn parse_number(s: &str, format: NumberFormat) -> Option<Decimal> {
    let canonical: String = match format {
        NumberFormat::DotDecimal => {
            if !dot_number_re().is_match(s) {
                return None;
            }
            s.chars().filter(|c| *c != ',' && *c != '\'').collect()
        }
        NumberFormat::CommaDecimal => {
            if !comma_number_re().is_match(s) {
                return None;
            }
            s.chars()
                .filter(|c| *c != '.' && *c != '\'')
                .map(|c| if c == ',' { '.' } else { c })
                .collect()
        }
    };
    Decimal::from_str(&canonical).ok()
}

/// Parse one word as an amount: optional parentheses, sign, currency
/// prefix, trailing minus and glued CR/DR suffix.
pub fn parse_amount_word(word: &str, format: NumberFormat) -> Option<(Decimal, bool, bool, Option<Direction>)> {
    let mut s = word.trim_end_matches([';', ':']);
    let mut negative = false;
    let mut plus = false;
    let mut marker = None;

    if s.len() > 2 && s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = &s[1..s.len() - 1];
    }

    for (suffix, dir) in [("CR", Direction::Credit), ("DR", Direction::Debit)] {
        let upper = s.to_ascii_uppercase();
        let trimmed = upper.trim_end_matches('.');
        if trimmed.len() > 2 && trimmed.ends_with(suffix) {
            marker = Some(dir);
            s = &s[..trimmed.len() - 2];
            break;
        }
    }

    if s.len() > 2 && s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = &s[1..s.len() - 1];
    }

    // sign and currency can come in either order: -$45.20, $-45.20
    for _ in 0..2 {
        if let Some(rest) = s.strip_prefix('-') {
            negative = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('+') {
            plus = true;
            s = rest;
        }
        if let Some(prefix) = CURRENCY_PREFIXES.iter().find(|p| s.starts_with(**p)) {
            s = &s[prefix.len()..];
        }
    }

    if let Some(rest) = s.strip_suffix('-') {
        negative = true;
        s = rest;
    }

    let magnitude = parse_number(s, format)?;
    Some((magnitude, negative, plus, marker))
}

/// Amount cells at or after byte offset `from`, in line order.
///
/// A currency word ("Rs.", "$") directly before a number and a CR/DR word
/// directly after it are folded into the amount. Dashes are only reported
/// when they touch an amount.
pub fn scan_cells(line: &str, from: usize, format: NumberFormat) -> Vec<Cell> {
    let ws: Vec<_> = words(line).into_iter().filter(|(s, _, _)| *s >= from).collect();
    let mut cells: Vec<Cell> = Vec::new();
    let mut i = 0;

    while i < ws.len() {
        let (start, end, word) = ws[i];

        if is_currency_marker(word) {
            if let Some(&(_, next_end, next)) = ws.get(i + 1) {
                if let Some((magnitude, negative, explicit_plus, marker)) = parse_amount_word(next, format) {
                    let (marker, end, consumed) = trailing_marker(&ws, i + 2, marker, next_end);
                    cells.push(Cell::Amount(AmountToken {
                        start,
                        end,
                        magnitude,
                        negative,
                        explicit_plus,
                        marker,
                    }));
                    i += 2 + consumed;
                    continue;
                }
            }
        }

        if let Some((magnitude, negative, explicit_plus, marker)) = parse_amount_word(word, format) {
            let (marker, end, consumed) = trailing_marker(&ws, i + 1, marker, end);
            cells.push(Cell::Amount(AmountToken {
                start,
                end,
                magnitude,
                negative,
                explicit_plus,
                marker,
            }));
            i += 1 + consumed;
            continue;
        }

        if is_dash(word) {
            let after_amount = matches!(cells.last(), Some(Cell::Amount(a)) if is_adjacent(&ws, a.end, start));
            let before_amount = ws
                .get(i + 1)
                .map(|(_, _, next)| {
                    parse_amount_word(next, format).is_some()
                        || (is_currency_marker(next)
                            && ws.get(i + 2).is_some_and(|(_, _, n2)| parse_amount_word(n2, format).is_some()))
                })
                .unwrap_or(false);
            if after_amount || before_amount {
                cells.push(Cell::Dash { start, end });
            }
        }

        i += 1;
    }

    cells
}

fn trailing_marker(
    ws: &[(usize, usize, &str)],
    idx: usize,
    marker: Option<Direction>,
    end: usize,
) -> (Option<Direction>, usize, usize) {
    if marker.is_none() {
        if let Some(&(_, m_end, m_word)) = ws.get(idx) {
            if let Some(dir) = marker_word(m_word) {
                return (Some(dir), m_end, 1);
            }
        }
    }
    (marker, end, 0)
}

/// True when no other word sits between byte offsets `a_end` and `b_start`.
fn is_adjacent(ws: &[(usize, usize, &str)], a_end: usize, b_start: usize) -> bool {
    !ws.iter().any(|(s, _, _)| *s >= a_end && *s < b_start)
}

/// Amount values (dashes skipped) anywhere in the line.
pub fn amounts(line: &str, format: NumberFormat) -> Vec<AmountToken> {
    scan_cells(line, 0, format)
        .into_iter()
        .filter_map(|c| match c {
            Cell::Amount(a) => Some(a),
            Cell::Dash { .. } => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// A date as printed, before a component order is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateShape {
    /// `01/02/2024`, `01-02-24`, `04/22`: day/month order unknown
    Numeric { first: u32, second: u32, year: Option<i32> },
    /// `2024-02-01`
    YearFirst { year: i32, month: u32, day: u32 },
    /// `01 Feb 2024`, `Feb 1, 2024`, `Jul 20`
    Named { day: u32, month: u32, year: Option<i32> },
}

impl DateShape {
    /// Whether the day/month order matters for this token.
    pub fn is_order_ambiguous(&self) -> bool {
        matches!(self, DateShape::Numeric { .. })
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            DateShape::Numeric { year, .. } | DateShape::Named { year, .. } => *year,
            DateShape::YearFirst { year, .. } => Some(*year),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateToken {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub shape: DateShape,
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december",
];

/// Month number for "Feb", "february", "Sept" and the like.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let lower = lower.trim_end_matches('.');
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(lower) || (lower == "sept" && *m == "september"))
        .map(|i| i as u32 + 1)
}

/// Two-digit years pivot at 70: `24` is 2024, `85` is 1985.
pub fn expand_year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    match raw.len() {
        4 => Some(y),
        2 if y < 70 => Some(2000 + y),
        2 => Some(1900 + y),
        _ => None,
    }
}

fn ymd_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})[/.\-](\d{1,2})[/.\-](\d{1,2})\b").expect("valid ymd regex"))
}

fn numeric3_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})([/.\-])(\d{1,2})([/.\-])(\d{4}|\d{2})\b").expect("valid numeric date regex")
    })
}

fn numeric2_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").expect("valid short date regex"))
}

fn day_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)?[ \-/.]?([A-Za-z]{3,9})\b\.?").expect("valid day-month regex")
    })
}

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z]{3,9})\.? ?(\d{1,2})(?:st|nd|rd|th)?\b").expect("valid month-day regex")
    })
}

fn trailing_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ \-/.,]{0,2}(\d{4}|\d{2})\b").expect("valid year regex"))
}

/// The characters after a match must not continue a number ("12/05/24.50").
fn ends_cleanly(line: &str, end: usize) -> bool {
    let mut rest = line[end..].chars();
    match (rest.next(), rest.next()) {
        (Some('.') | Some(','), Some(c)) if c.is_ascii_digit() => false,
        _ => true,
    }
}

/// Optional year right after a named date, e.g. the `2024` of `Feb 1, 2024`.
fn year_after(line: &str, end: usize) -> Option<(i32, usize)> {
    let caps = trailing_year_re().captures(&line[end..])?;
    let m = caps.get(1)?;
    let year_end = end + m.end();
    if !ends_cleanly(line, year_end) {
        return None;
    }
    Some((expand_year(m.as_str())?, year_end))
}

/// All date-looking tokens in the line, ordered by position, without
/// overlaps. Validity of day/month values is checked later, once a
/// component order is known; only impossible components are dropped here.
pub fn find_dates(line: &str) -> Vec<DateToken> {
    let mut found: Vec<DateToken> = Vec::new();

    for caps in ymd_re().captures_iter(line) {
        let (Some(m), Ok(year), Ok(month), Ok(day)) = (
            caps.get(0),
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) else {
            continue;
        };
        if (1..=12).contains(&month) && (1..=31).contains(&day) && ends_cleanly(line, m.end()) {
            found.push(DateToken {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
                shape: DateShape::YearFirst { year, month, day },
            });
        }
    }

    for caps in numeric3_re().captures_iter(line) {
        let Some(m) = caps.get(0) else { continue };
        // 01/02-2024 is not a date
        if caps[2] != caps[4] || !ends_cleanly(line, m.end()) {
            continue;
        }
        let (Ok(first), Ok(second), Some(year)) =
            (caps[1].parse::<u32>(), caps[3].parse::<u32>(), expand_year(&caps[5]))
        else {
            continue;
        };
        if plausible_pair(first, second) {
            found.push(DateToken {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
                shape: DateShape::Numeric {
                    first,
                    second,
                    year: Some(year),
                },
            });
        }
    }

    for caps in numeric2_re().captures_iter(line) {
        let Some(m) = caps.get(0) else { continue };
        // followed by "/2024" means it is part of a longer date
        if line[m.end()..].starts_with('/') || !ends_cleanly(line, m.end()) {
            continue;
        }
        if m.start() > 0 && line[..m.start()].ends_with('/') {
            continue;
        }
        let (Ok(first), Ok(second)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            continue;
        };
        if plausible_pair(first, second) {
            found.push(DateToken {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
                shape: DateShape::Numeric {
                    first,
                    second,
                    year: None,
                },
            });
        }
    }

    for caps in day_month_re().captures_iter(line) {
        let Some(m) = caps.get(0) else { continue };
        let Some(month) = month_from_name(&caps[2]) else {
            continue;
        };
        let Ok(day) = caps[1].parse::<u32>() else { continue };
        if !(1..=31).contains(&day) {
            continue;
        }
        let (year, end) = match year_after(line, m.end()) {
            Some((y, e)) => (Some(y), e),
            None => (None, m.end()),
        };
        found.push(DateToken {
            start: m.start(),
            end,
            text: line[m.start()..end].to_string(),
            shape: DateShape::Named { day, month, year },
        });
    }

    for caps in month_day_re().captures_iter(line) {
        let Some(m) = caps.get(0) else { continue };
        let Some(month) = month_from_name(&caps[1]) else {
            continue;
        };
        let Ok(day) = caps[2].parse::<u32>() else { continue };
        if !(1..=31).contains(&day) || !ends_cleanly(line, m.end()) {
            continue;
        }
        let (year, end) = match year_after(line, m.end()) {
            Some((y, e)) => (Some(y), e),
            None => (None, m.end()),
        };
        found.push(DateToken {
            start: m.start(),
            end,
            text: line[m.start()..end].to_string(),
            shape: DateShape::Named { day, month, year },
        });
    }

    // earliest first, longest wins on a tie, then drop overlaps
    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut out: Vec<DateToken> = Vec::new();
    for tok in found {
        if out.last().is_some_and(|prev| tok.start < prev.end) {
            continue;
        }
        out.push(tok);
    }
    out
}

/// At least one of the two day/month orders must be possible.
fn plausible_pair(a: u32, b: u32) -> bool {
    let day_month = (1..=31).contains(&a) && (1..=12).contains(&b);
    let month_day = (1..=12).contains(&a) && (1..=31).contains(&b);
    day_month || month_day
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("1,234.56", NumberFormat::DotDecimal), Some(d("1234.56")));
        assert_eq!(parse_number("1,23,456.78", NumberFormat::DotDecimal), Some(d("123456.78")));
        assert_eq!(parse_number("1,500", NumberFormat::DotDecimal), Some(d("1500")));
        assert_eq!(parse_number("1.234,56", NumberFormat::CommaDecimal), Some(d("1234.56")));
        assert_eq!(parse_number("12,50", NumberFormat::CommaDecimal), Some(d("12.50")));
        assert_eq!(parse_number("500", NumberFormat::DotDecimal), None);
        assert_eq!(parse_number("1.234,56", NumberFormat::DotDecimal), None);
    }

    #[test]
    fn test_amount_notations() {
        let f = NumberFormat::DotDecimal;
        assert_eq!(parse_amount_word("-45.20", f), Some((d("45.20"), true, false, None)));
        assert_eq!(parse_amount_word("(1,000.00)", f), Some((d("1000.00"), true, false, None)));
        assert_eq!(parse_amount_word("$5.82", f), Some((d("5.82"), false, false, None)));
        assert_eq!(parse_amount_word("-$14.05", f), Some((d("14.05"), true, false, None)));
        assert_eq!(parse_amount_word("45.20-", f), Some((d("45.20"), true, false, None)));
        assert_eq!(
            parse_amount_word("1,000.00Cr", f),
            Some((d("1000.00"), false, false, Some(Direction::Credit)))
        );
        assert_eq!(parse_amount_word("Rs.250.00", f), Some((d("250.00"), false, false, None)));
        assert_eq!(parse_amount_word("+12.00", f), Some((d("12.00"), false, true, None)));
        assert_eq!(parse_amount_word("8148", f), None);
        assert_eq!(parse_amount_word("ID:", f), None);
    }

    #[test]
    fn test_scan_cells_with_separate_words() {
        let line = "Grocery Store $ 45.20 DR 954.80 Cr";
        let cells = scan_cells(line, 0, NumberFormat::DotDecimal);
        assert_eq!(cells.len(), 2);
        let first = cells[0].amount().unwrap();
        assert_eq!(first.magnitude, d("45.20"));
        assert_eq!(first.marker, Some(Direction::Debit));
        assert_eq!(&line[first.start..first.end], "$ 45.20 DR");
        assert_eq!(cells[1].amount().unwrap().marker, Some(Direction::Credit));
    }

    #[test]
    fn test_scan_cells_dashes() {
        let cells = scan_cells("SALARY ACME - 5,000.00 15,000.00", 0, NumberFormat::DotDecimal);
        assert_eq!(cells.len(), 3);
        assert!(matches!(cells[0], Cell::Dash { .. }));

        // a dash inside the description is just text
        let cells = scan_cells("ACME - PAYROLL 5,000.00", 0, NumberFormat::DotDecimal);
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn test_scan_cells_respects_offset() {
        let cells = scan_cells("12.50 Coffee 3.75", 6, NumberFormat::DotDecimal);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].amount().unwrap().magnitude, d("3.75"));
    }

    #[test]
    fn test_find_numeric_dates() {
        let dates = find_dates("01/02/2024 Grocery Store -45.20");
        assert_eq!(dates.len(), 1);
        assert_eq!(
            dates[0].shape,
            DateShape::Numeric {
                first: 1,
                second: 2,
                year: Some(2024)
            }
        );
        assert_eq!(dates[0].start, 0);

        let dates = find_dates("04/22 Discover E-Payment -15.00 53.70");
        assert_eq!(
            dates[0].shape,
            DateShape::Numeric {
                first: 4,
                second: 22,
                year: None
            }
        );

        let dates = find_dates("2024-02-01 fee 2.00");
        assert_eq!(
            dates[0].shape,
            DateShape::YearFirst {
                year: 2024,
                month: 2,
                day: 1
            }
        );
    }

    #[test]
    fn test_find_named_dates() {
        let dates = find_dates("05 Mar 2024 ATM WDL 500.00");
        assert_eq!(
            dates[0].shape,
            DateShape::Named {
                day: 5,
                month: 3,
                year: Some(2024)
            }
        );
        assert_eq!(dates[0].text, "05 Mar 2024");

        let dates = find_dates("Jul 20 Jul 22 H-E-B #455 $5.82");
        assert_eq!(dates.len(), 2);
        assert_eq!(
            dates[0].shape,
            DateShape::Named {
                day: 20,
                month: 7,
                year: None
            }
        );

        let dates = find_dates("Feb 1, 2024 Deposit 100.00");
        assert_eq!(dates[0].text, "Feb 1, 2024");
    }

    #[test]
    fn test_named_date_does_not_eat_amount() {
        let dates = find_dates("01 Mar 45.20");
        assert_eq!(dates.len(), 1);
        assert_eq!(
            dates[0].shape,
            DateShape::Named {
                day: 1,
                month: 3,
                year: None
            }
        );
    }

    #[test]
    fn test_amounts_are_not_dates() {
        assert!(find_dates("Balance 1,234.56 and 12.50").is_empty());
        assert!(find_dates("Ref 45/67/2024").is_empty());
        assert!(find_dates("Marketplace order").is_empty());
    }

    #[test]
    fn test_month_names() {
        assert_eq!(month_from_name("Feb"), Some(2));
        assert_eq!(month_from_name("SEPT"), Some(9));
        assert_eq!(month_from_name("december"), Some(12));
        assert_eq!(month_from_name("Debit"), None);
        assert_eq!(month_from_name("Ma"), None);
    }

    #[test]
    fn test_expand_year() {
        assert_eq!(expand_year("24"), Some(2024));
        assert_eq!(expand_year("85"), Some(1985));
        assert_eq!(expand_year("2024"), Some(2024));
        assert_eq!(expand_year("202"), None);
    }
}
