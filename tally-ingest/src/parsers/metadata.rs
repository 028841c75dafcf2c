//! Statement header fields.
//!
//! Each field has a list of label spellings matched case-insensitively and
//! tolerant of the usual OCR confusions (`0` for `o`, `1` for `l`, `5` for
//! `s`). Lines are scanned top to bottom and the first match per field wins,
//! except carry-forward subtotals: the last one stands in for the closing
//! balance when no closing label is found.

use regex::Regex;
use std::sync::OnceLock;
use tally_core::{AccountNumber, NormalizedLine, StatementMetadata, StatementPeriod};
use tracing::debug;

use crate::text::DocumentLocale;
use crate::text::tokens::{AmountToken, amounts, find_dates, words};

const HOLDER: &[&str] = &[
    "account holder name",
    "account holder",
    "account name",
    "customer name",
    "name of customer",
    "a/c name",
    "^name",
];

const ACCOUNT_NUMBER: &[&str] = &[
    "account number",
    "account no",
    "a/c number",
    "a/c no",
    "acct number",
    "acct no",
    "account #",
    "acct #",
    "^account",
];

const PERIOD: &[&str] = &["statement period", "for the period", "period", "statement from", "from"];

const OPENING: &[&str] = &[
    "opening balance",
    "beginning balance",
    "starting balance",
    "balance brought forward",
    "brought forward",
    "balance b/f",
    "previous balance",
    "balance forward",
    "opening bal",
];

const CLOSING: &[&str] = &[
    "closing balance",
    "ending balance",
    "new balance",
    "closing bal",
];

/// Page subtotals that repeat on multi-page statements.
const CARRIED: &[&str] = &["balance carried forward", "carried forward", "balance c/f"];

const CURRENCY: &[&str] = &["account currency", "currency"];

const ROUTING: &[&str] = &[
    "ifsc code",
    "ifsc",
    "routing number",
    "routing no",
    "aba number",
    "sort code",
    "bsb",
];

const BRANCH: &[&str] = &["branch name", "home branch", "branch"];

/// Column titles of a balance summary row that carry no field of their own.
const SUMMARY_OTHER: &[&str] = &[
    "total debits",
    "total credits",
    "total withdrawals",
    "total deposits",
    "debits",
    "credits",
    "withdrawals",
    "deposits",
];

const ISO_CODES: &[&str] = &[
    "INR", "USD", "EUR", "GBP", "AUD", "CAD", "SGD", "AED", "JPY", "CHF", "NZD", "ZAR", "HKD", "CNY", "SEK",
    "NOK", "DKK", "MYR", "THB", "PHP", "IDR", "LKR", "NPR", "BDT", "PKR", "KWD", "BHD", "OMR", "QAR", "SAR",
];

/// Regex fragment for a label that survives OCR letter/digit swaps.
fn fuzzy(label: &str) -> String {
    let mut out = String::new();
    for c in label.chars() {
        match c.to_ascii_lowercase() {
            '^' => out.push('^'),
            'o' => out.push_str("[o0]"),
            'l' => out.push_str("[l1i|]"),
            'i' => out.push_str("[i1l|]"),
            's' => out.push_str("[s5]"),
            ' ' => out.push_str(r"\s*"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out
}

fn alternation(labels: &[&str]) -> String {
    labels.iter().map(|l| fuzzy(l)).collect::<Vec<_>>().join("|")
}

/// `label ... rest-of-line`, with the label standing as whole words.
fn label_re(labels: &[&str]) -> Regex {
    let pattern = format!(r"(?i)(?:^|[^a-z0-9])(?:{})(?P<rest>[^a-z0-9].*)?$", alternation(labels));
    Regex::new(&pattern).expect("valid label regex")
}

struct Matchers {
    holder: Regex,
    account: Regex,
    period: Regex,
    opening: Regex,
    closing: Regex,
    carried: Regex,
    currency: Regex,
    routing: Regex,
    branch: Regex,
    any_label: Regex,
}

fn matchers() -> &'static Matchers {
    static M: OnceLock<Matchers> = OnceLock::new();
    M.get_or_init(|| {
        let all: Vec<&str> = [HOLDER, ACCOUNT_NUMBER, PERIOD, OPENING, CLOSING, CARRIED, CURRENCY, ROUTING, BRANCH]
            .concat()
            .into_iter()
            .filter(|l| !l.starts_with('^'))
            .collect();
        Matchers {
            holder: label_re(HOLDER),
            account: label_re(ACCOUNT_NUMBER),
            period: label_re(PERIOD),
            opening: label_re(OPENING),
            closing: label_re(CLOSING),
            carried: label_re(CARRIED),
            currency: label_re(CURRENCY),
            routing: label_re(ROUTING),
            branch: label_re(BRANCH),
            any_label: Regex::new(&format!(r"(?i)(?:^|[^a-z0-9])(?:{})(?:[^a-z0-9]|$)", alternation(&all)))
                .expect("valid label regex"),
        }
    })
}

/// Text after the label, stripped of separators.
fn rest<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    let caps = re.captures(line)?;
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    Some(rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '.' | '#' | '=')))
}

/// Cut a value where the next label on the same line begins.
fn until_next_label(value: &str) -> &str {
    let end = matchers()
        .any_label
        .find(value)
        .map(|m| m.start())
        .unwrap_or(value.len());
    value[..end].trim()
}

/// Pull statement metadata out of normalized lines. Absent fields stay
/// `None` (currency: "unknown"); nothing here fails.
pub fn extract_metadata(lines: &[NormalizedLine], locale: &DocumentLocale) -> StatementMetadata {
    let m = matchers();
    let mut meta = StatementMetadata::default();
    let mut currency_label: Option<String> = None;
    let mut carried = None;

    for (i, line) in lines.iter().enumerate() {
        let text = line.text.as_str();

        if meta.account_holder.is_none() {
            meta.account_holder = rest(&m.holder, text).and_then(holder_value);
        }
        if meta.account_number.is_none() {
            meta.account_number = rest(&m.account, text).and_then(account_value);
        }
        if meta.period.is_none() {
            meta.period = rest(&m.period, text).and_then(|r| period_value(r, locale));
        }
        if meta.opening_balance.is_none() {
            meta.opening_balance = rest(&m.opening, text).and_then(|r| balance_value(r, locale));
        }
        if meta.closing_balance.is_none() {
            meta.closing_balance = rest(&m.closing, text).and_then(|r| balance_value(r, locale));
        }
        if let Some(value) = rest(&m.carried, text).and_then(|r| balance_value(r, locale)) {
            carried = Some(value);
        }
        if currency_label.is_none() {
            currency_label = rest(&m.currency, text).and_then(currency_value);
        }
        if meta.routing_code.is_none() {
            meta.routing_code = rest(&m.routing, text).and_then(routing_value);
        }
        if meta.branch.is_none() {
            meta.branch = rest(&m.branch, text).and_then(text_value);
        }

        if meta.opening_balance.is_none() || meta.closing_balance.is_none() {
            if let Some(next) = lines.get(i + 1) {
                let (opening, closing) = summary_row(text, &next.text, locale);
                meta.opening_balance = meta.opening_balance.or(opening);
                meta.closing_balance = meta.closing_balance.or(closing);
            }
        }
    }

    meta.closing_balance = meta.closing_balance.or(carried);

    if meta.period.is_none() {
        meta.period = lines.iter().find_map(|l| bare_period(&l.text, locale));
    }

    meta.currency = currency_label
        .or_else(|| lines.iter().find_map(|l| iso_code(&l.text)))
        .or_else(|| lines.iter().find_map(|l| currency_symbol(&l.text)))
        .unwrap_or(meta.currency);

    debug!(fields = meta.present_fields().len(), currency = %meta.currency, "metadata extracted");
    meta
}

fn holder_value(rest: &str) -> Option<String> {
    let value = until_next_label(rest).trim_end_matches([',', ';', ':', '.']);
    let letters = value.chars().filter(|c| c.is_alphabetic()).count();
    (letters >= 2 && !value.chars().any(|c| c.is_ascii_digit())).then(|| value.to_string())
}

fn text_value(rest: &str) -> Option<String> {
    let value = until_next_label(rest).trim_end_matches([',', ';', ':', '.']);
    (value.chars().filter(|c| c.is_alphabetic()).count() >= 2).then(|| value.to_string())
}

/// Leading run of digit/mask words, joined. `1234 5678 9012` and
/// `XXXXXX1234` both qualify; OCR `O`/`l` inside the run are repaired.
fn account_value(rest: &str) -> Option<AccountNumber> {
    let mut value = String::new();
    for (_, _, word) in words(rest) {
        let word = word.trim_end_matches([',', ';']);
        let looks_numeric = word.chars().filter(|c| c.is_ascii_digit() || matches!(c, 'X' | 'x' | '*')).count() >= 2;
        if !looks_numeric {
            break;
        }
        let repaired: String = word
            .chars()
            .map(|c| match c {
                'O' | 'o' => '0',
                'l' | 'I' | '|' => '1',
                c => c,
            })
            .collect();
        if !repaired
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, 'X' | 'x' | '*' | '#' | '-'))
        {
            break;
        }
        value.push_str(&repaired);
    }
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    (value.len() >= 4 && digits >= 2).then(|| AccountNumber::new(value))
}

fn period_value(rest: &str, locale: &DocumentLocale) -> Option<StatementPeriod> {
    if !amounts(rest, locale.number_format).is_empty() {
        return None;
    }
    let dates: Vec<_> = find_dates(rest)
        .iter()
        .filter_map(|t| locale.resolve(t).ok())
        .collect();
    match dates.as_slice() {
        [a, b, ..] => Some(StatementPeriod::new(*a, *b)),
        _ => None,
    }
}

/// `01/01/2024 to 31/01/2024` on a line of its own.
fn bare_period(line: &str, locale: &DocumentLocale) -> Option<StatementPeriod> {
    let tokens = find_dates(line);
    if tokens.len() != 2 {
        return None;
    }
    let between = line[tokens[0].end..tokens[1].start].trim().to_ascii_lowercase();
    if !matches!(between.as_str(), "to" | "-" | "through" | "till" | "until") {
        return None;
    }
    let a = locale.resolve(&tokens[0]).ok()?;
    let b = locale.resolve(&tokens[1]).ok()?;
    Some(StatementPeriod::new(a, b))
}

fn balance_value(rest: &str, locale: &DocumentLocale) -> Option<rust_decimal::Decimal> {
    amounts(rest, locale.number_format)
        .first()
        .map(AmountToken::signed)
}

/// A label row such as `Opening Balance | Total Debits | Total Credits |
/// Closing Balance` followed by a row with exactly one amount per label.
fn summary_row(
    label_line: &str,
    value_line: &str,
    locale: &DocumentLocale,
) -> (Option<rust_decimal::Decimal>, Option<rust_decimal::Decimal>) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)(?P<open>{})|(?P<close>{}|{})|(?P<other>{})",
            alternation(OPENING),
            alternation(CLOSING),
            alternation(CARRIED),
            alternation(SUMMARY_OTHER)
        ))
        .expect("valid summary regex")
    });

    if !amounts(label_line, locale.number_format).is_empty() {
        return (None, None);
    }
    let columns: Vec<&str> = re
        .captures_iter(label_line)
        .filter_map(|c| {
            if c.name("open").is_some() {
                Some("open")
            } else if c.name("close").is_some() {
                Some("close")
            } else {
                c.name("other").map(|_| "other")
            }
        })
        .collect();
    if columns.len() < 2 || !columns.iter().any(|c| *c != "other") {
        return (None, None);
    }
    let values = amounts(value_line, locale.number_format);
    if values.len() != columns.len() {
        return (None, None);
    }
    let pick = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .map(|i| values[i].signed())
    };
    (pick("open"), pick("close"))
}

fn currency_value(rest: &str) -> Option<String> {
    let word = words(rest).into_iter().next()?.2;
    let code = word.trim_end_matches([',', ';', '.']).to_ascii_uppercase();
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())).then_some(code)
}

fn iso_code(line: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(&format!(r"\b({})\b", ISO_CODES.join("|"))).expect("valid ISO regex"));
    re.captures(line).map(|c| c[1].to_string())
}

fn currency_symbol(line: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(₹|€|£|¥|\bRs\.?\s?\d|\$)").expect("valid symbol regex"));
    let m = re.find(line)?;
    let code = match m.as_str().chars().next()? {
        '₹' | 'R' => "INR",
        '€' => "EUR",
        '£' => "GBP",
        '¥' => "JPY",
        _ => "USD",
    };
    Some(code.to_string())
}

fn routing_value(rest: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:(?P<ifsc>[a-z]{4}[0o][a-z0-9]{6})|(?P<sort>\d{2}-\d{2}-\d{2})|(?P<bsb>\d{3}-\d{3})|(?P<aba>\d{9}))\b")
            .expect("valid routing regex")
    });
    let caps = re.captures(rest)?;
    if let Some(ifsc) = caps.name("ifsc") {
        // the fifth character of an IFSC is always zero
        let mut code: Vec<char> = ifsc.as_str().to_ascii_uppercase().chars().collect();
        code[4] = '0';
        return Some(code.into_iter().collect());
    }
    caps.get(0).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn lines(texts: &[&str]) -> Vec<NormalizedLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| NormalizedLine::new(0, i, *t, 1.0))
            .collect()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_indian_savings_header() {
        let meta = extract_metadata(
            &lines(&[
                "STATE BANK OF INDIA",
                "Account Name: ASHA RAO Branch: KORAMANGALA",
                "Account Number: 3O12 4567 8901",
                "IFSC Code: SBINO001234",
                "Statement Period: 01/01/2024 to 31/01/2024",
                "Opening Balance: Rs. 10,000.00 Closing Balance: 12,500.50 Cr",
            ]),
            &DocumentLocale::default(),
        );
        assert_eq!(meta.account_holder.as_deref(), Some("ASHA RAO"));
        assert_eq!(meta.branch.as_deref(), Some("KORAMANGALA"));
        let account = meta.account_number.unwrap();
        assert_eq!(account.value, "301245678901");
        assert!(!account.masked);
        assert_eq!(meta.routing_code.as_deref(), Some("SBIN0001234"));
        assert_eq!(meta.period, Some(StatementPeriod::new(ymd(2024, 1, 1), ymd(2024, 1, 31))));
        assert_eq!(meta.opening_balance, Some(d("10000.00")));
        assert_eq!(meta.closing_balance, Some(d("12500.50")));
        assert_eq!(meta.currency, "INR");
    }

    #[test]
    fn test_ocr_damaged_labels() {
        let meta = extract_metadata(
            &lines(&["C1osing Ba1ance : 954.80", "0pening Balance 1,000.00"]),
            &DocumentLocale::default(),
        );
        assert_eq!(meta.closing_balance, Some(d("954.80")));
        assert_eq!(meta.opening_balance, Some(d("1000.00")));
    }

    #[test]
    fn test_masked_account_and_first_match_wins() {
        let meta = extract_metadata(
            &lines(&["Account No: XXXXXX1234", "Account No: 999999999"]),
            &DocumentLocale::default(),
        );
        let account = meta.account_number.unwrap();
        assert_eq!(account.value, "XXXXXX1234");
        assert!(account.masked);
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let meta = extract_metadata(&lines(&["01/02/2024 Grocery Store -45.20"]), &DocumentLocale::default());
        assert_eq!(meta, StatementMetadata::default());
        assert_eq!(meta.currency, "unknown");
    }

    #[test]
    fn test_overdrawn_balance() {
        let meta = extract_metadata(
            &lines(&["Opening Balance (250.00)", "Closing Balance 120.00 DR"]),
            &DocumentLocale::default(),
        );
        assert_eq!(meta.opening_balance, Some(d("-250.00")));
        assert_eq!(meta.closing_balance, Some(d("-120.00")));
    }

    #[test]
    fn test_summary_table() {
        let meta = extract_metadata(
            &lines(&[
                "Opening Balance Total Debits Total Credits Closing Balance",
                "1,000.00 45.20 0.00 954.80",
            ]),
            &DocumentLocale::default(),
        );
        assert_eq!(meta.opening_balance, Some(d("1000.00")));
        assert_eq!(meta.closing_balance, Some(d("954.80")));
    }

    #[test]
    fn test_currency_sources() {
        let by_label = extract_metadata(&lines(&["Currency: eur", "Total $5.00"]), &DocumentLocale::default());
        assert_eq!(by_label.currency, "EUR");
        let by_code = extract_metadata(&lines(&["Amounts in GBP", "£5.00"]), &DocumentLocale::default());
        assert_eq!(by_code.currency, "GBP");
        let by_symbol = extract_metadata(&lines(&["Total €5.00"]), &DocumentLocale::default());
        assert_eq!(by_symbol.currency, "EUR");
    }

    #[test]
    fn test_bare_period_line() {
        let meta = extract_metadata(&lines(&["01 Jan 2024 to 31 Jan 2024"]), &DocumentLocale::default());
        assert_eq!(meta.period, Some(StatementPeriod::new(ymd(2024, 1, 1), ymd(2024, 1, 31))));
    }

    #[test]
    fn test_carried_forward_is_not_the_closing_balance() {
        let meta = extract_metadata(
            &lines(&[
                "Opening Balance 1,000.00",
                "Balance carried forward 954.80",
                "Balance brought forward 954.80",
                "Closing Balance: 950.00",
            ]),
            &DocumentLocale::default(),
        );
        assert_eq!(meta.opening_balance, Some(d("1000.00")));
        assert_eq!(meta.closing_balance, Some(d("950.00")));
    }

    #[test]
    fn test_last_carried_forward_stands_in_for_closing() {
        let meta = extract_metadata(
            &lines(&["Balance c/f 954.80", "Balance c/f 950.00"]),
            &DocumentLocale::default(),
        );
        assert_eq!(meta.closing_balance, Some(d("950.00")));
    }

    #[test]
    fn test_routing_formats() {
        assert_eq!(routing_value("12-34-56 London"), Some("12-34-56".to_string()));
        assert_eq!(routing_value("021000021"), Some("021000021".to_string()));
        assert_eq!(routing_value("n/a"), None);
    }
}
