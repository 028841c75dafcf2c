//! Line group → [`Transaction`].
//!
//! Direction is decided in this order: the populated column of a split
//! debit/credit table; a CR/DR suffix, minus sign or parentheses; an
//! unsigned amount in a document that signs its debits; keywords in the
//! description. If none of these settles it the group is rejected rather
//! than guessed.

use rust_decimal::Decimal;
use tally_core::{Direction, ExtractOptions, Transaction};
use thiserror::Error;

use crate::text::tokens::{AmountToken, Cell, find_dates, scan_cells, words};
use crate::text::{DateError, DocumentLocale};
use crate::types::{ColumnLayout, LineGroup};

/// Why a group did not become a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("no date near the start of the line")]
    NoDate,
    #[error("date '{0}' has no year and none could be inferred")]
    DateUnresolved(String),
    #[error("'{0}' is not a valid date")]
    InvalidDate(String),
    #[error("no amount")]
    NoAmount,
    #[error("{found} amounts where the layout allows {allowed}")]
    TooManyAmounts { found: usize, allowed: usize },
    #[error("both the debit and the credit column hold an amount")]
    AmbiguousColumns,
    #[error("amount is zero")]
    ZeroAmount,
    #[error("cannot tell debit from credit")]
    UnresolvedDirection,
}

const DEBIT_KEYWORDS: &[&str] = &[
    "WITHDRAWAL", "WITHDRAWN", "WDL", "DEBIT", "DEBITED", "FEE", "FEES", "PURCHASE", "CHARGE", "CHARGES", "PAID",
    "ATM", "POS", "EMI",
];

const CREDIT_KEYWORDS: &[&str] = &[
    "DEPOSIT", "DEPOSITED", "CREDIT", "CREDITED", "REFUND", "INTEREST", "SALARY", "RECEIVED", "REVERSAL",
    "CASHBACK", "DIVIDEND",
];

/// A value cell or an empty one.
type Slot = Option<AmountToken>;

/// Amount cells of a group plus the byte ranges to cut from each line's
/// description.
struct Cells {
    slots: Vec<Slot>,
    cuts: Vec<Vec<(usize, usize)>>,
}

pub struct TransactionParser<'a> {
    locale: &'a DocumentLocale,
    date_window: usize,
    debit_keywords: Vec<String>,
    credit_keywords: Vec<String>,
    /// The document marks debits with a sign, so unsigned means credit
    signed_notation: bool,
}

impl<'a> TransactionParser<'a> {
    pub fn new(locale: &'a DocumentLocale, options: &ExtractOptions) -> Self {
        let extend = |base: &[&str], extra: &[String]| -> Vec<String> {
            base.iter()
                .map(|k| k.to_string())
                .chain(extra.iter().map(|k| k.trim().to_uppercase()).filter(|k| !k.is_empty()))
                .collect()
        };
        Self {
            locale,
            date_window: options.date_search_window,
            debit_keywords: extend(DEBIT_KEYWORDS, &options.debit_keywords),
            credit_keywords: extend(CREDIT_KEYWORDS, &options.credit_keywords),
            signed_notation: false,
        }
    }

    pub fn with_signed_notation(mut self, signed: bool) -> Self {
        self.signed_notation = signed;
        self
    }

    /// Whether any single-column group carries a minus or parentheses on its
    /// amount (not its balance).
    pub fn detect_signed_notation(&self, groups: &[LineGroup]) -> bool {
        groups
            .iter()
            .filter(|g| !matches!(g.layout, ColumnLayout::Split { .. }))
            .any(|g| {
                let Some(cells) = self.cells(g) else {
                    return false;
                };
                let values: Vec<&AmountToken> = cells.slots.iter().flatten().collect();
                // with two or more values the last one is the balance
                let amounts = match values.len() {
                    0 | 1 => &values[..],
                    n => &values[..n - 1],
                };
                amounts.iter().any(|a| a.negative)
            })
    }

    pub fn parse(&self, group: &LineGroup) -> Result<Transaction, ParseFailure> {
        let first = group.start();
        let dates = find_dates(&first.text);
        let date_token = dates
            .first()
            .filter(|d| d.start <= self.date_window)
            .ok_or(ParseFailure::NoDate)?;
        let date = self.locale.resolve(date_token).map_err(|e| match e {
            DateError::NoYear => ParseFailure::DateUnresolved(date_token.text.clone()),
            DateError::Invalid => ParseFailure::InvalidDate(date_token.text.clone()),
        })?;

        let cells = self.cells(group).ok_or(ParseFailure::NoDate)?;
        let description = self.description(group, &cells);
        let (amount, direction, balance) = self.read(group.layout, &cells.slots, &description)?;

        let mut txn = Transaction::new(date, description, amount, direction, group.span());
        txn.running_balance = balance.map(|b| b.signed());
        Ok(txn)
    }

    /// Amount cells after the date(s) on the first line and anywhere on
    /// continuation lines. `None` when the first line has no date.
    fn cells(&self, group: &LineGroup) -> Option<Cells> {
        let format = self.locale.number_format;
        let mut slots: Vec<Slot> = Vec::new();
        let mut cuts: Vec<Vec<(usize, usize)>> = Vec::with_capacity(group.lines.len());
        let split = matches!(group.layout, ColumnLayout::Split { .. });

        for (i, line) in group.lines.iter().enumerate() {
            let text = line.text.as_str();
            let mut line_cuts = Vec::new();
            let mut from = 0;
            if i == 0 {
                let dates = find_dates(text);
                let first = dates.first()?;
                line_cuts.push((first.start, first.end));
                from = first.end;
                // a value date printed right after the posting date
                for next in dates.iter().skip(1) {
                    if !text[from..next.start].trim().is_empty() {
                        break;
                    }
                    line_cuts.push((next.start, next.end));
                    from = next.end;
                }
            }

            let line_cells = scan_cells(text, from, format);
            let mut pending_sign = false;
            for (j, cell) in line_cells.iter().enumerate() {
                let (start, end) = cell.span();
                line_cuts.push((start, end));
                match cell {
                    Cell::Amount(a) => {
                        let mut a = a.clone();
                        if std::mem::take(&mut pending_sign) {
                            a.negative = true;
                        }
                        slots.push(Some(a));
                    }
                    Cell::Dash { .. } if split => slots.push(None),
                    Cell::Dash { .. } => {
                        let prev_amount = j > 0 && matches!(line_cells[j - 1], Cell::Amount(_));
                        let next_amount = matches!(line_cells.get(j + 1), Some(Cell::Amount(_)));
                        if next_amount && !prev_amount {
                            pending_sign = true;
                        } else if prev_amount && next_amount {
                            slots.push(None);
                        }
                    }
                }
            }
            cuts.push(line_cuts);
        }
        Some(Cells { slots, cuts })
    }

    /// Everything except dates and amount cells, lines joined by spaces.
    fn description(&self, group: &LineGroup, cells: &Cells) -> String {
        let mut out: Vec<&str> = Vec::new();
        for (line, cuts) in group.lines.iter().zip(&cells.cuts) {
            for (start, end, word) in words(&line.text) {
                if !cuts.iter().any(|(s, e)| start >= *s && end <= *e) {
                    out.push(word);
                }
            }
        }
        out.join(" ")
    }

    /// Amount, direction and optional balance per the group's layout.
    fn read(
        &self,
        layout: ColumnLayout,
        slots: &[Slot],
        description: &str,
    ) -> Result<(Decimal, Direction, Option<AmountToken>), ParseFailure> {
        let n = slots.len();
        if slots.iter().all(Option::is_none) {
            return Err(ParseFailure::NoAmount);
        }
        match layout {
            ColumnLayout::Split { debit_first, balance } => {
                let allowed = 2 + usize::from(balance);
                if n > allowed {
                    return Err(ParseFailure::TooManyAmounts { found: n, allowed });
                }
                if n == allowed {
                    let (debit, credit) = if debit_first {
                        (&slots[0], &slots[1])
                    } else {
                        (&slots[1], &slots[0])
                    };
                    let (amount, direction) = self.columns(debit, credit)?;
                    let bal = if balance { slots[2].clone() } else { None };
                    Ok((amount, direction, bal))
                } else if balance && n == 2 {
                    // the empty column was not printed at all
                    let (amount, direction) = self.single(&slots[0], description)?;
                    Ok((amount, direction, slots[1].clone()))
                } else {
                    let (amount, direction) = self.single(&slots[0], description)?;
                    Ok((amount, direction, None))
                }
            }
            ColumnLayout::Single { balance } => {
                let allowed = 1 + usize::from(balance);
                if n > allowed {
                    return Err(ParseFailure::TooManyAmounts { found: n, allowed });
                }
                let (amount, direction) = self.single(&slots[0], description)?;
                let bal = if n == 2 { slots[1].clone() } else { None };
                Ok((amount, direction, bal))
            }
            ColumnLayout::Unknown => match n {
                1 => {
                    let (amount, direction) = self.single(&slots[0], description)?;
                    Ok((amount, direction, None))
                }
                2 if slots.iter().any(is_empty) => {
                    let (amount, direction) = self.columns(&slots[0], &slots[1])?;
                    Ok((amount, direction, None))
                }
                2 => {
                    let (amount, direction) = self.single(&slots[0], description)?;
                    Ok((amount, direction, slots[1].clone()))
                }
                // debit, credit, balance: only with one column left empty
                3 if is_empty(&slots[0]) || is_empty(&slots[1]) => {
                    let (amount, direction) = self.columns(&slots[0], &slots[1])?;
                    Ok((amount, direction, slots[2].clone()))
                }
                _ => Err(ParseFailure::TooManyAmounts { found: n, allowed: 2 }),
            },
        }
    }

    /// Split columns: exactly one may hold a value.
    fn columns(&self, debit: &Slot, credit: &Slot) -> Result<(Decimal, Direction), ParseFailure> {
        match (non_empty(debit), non_empty(credit)) {
            (Some(d), None) => Ok((d.magnitude, Direction::Debit)),
            (None, Some(c)) => Ok((c.magnitude, Direction::Credit)),
            (Some(_), Some(_)) => Err(ParseFailure::AmbiguousColumns),
            (None, None) => Err(ParseFailure::ZeroAmount),
        }
    }

    /// One amount, direction from its notation or the description.
    fn single(&self, slot: &Slot, description: &str) -> Result<(Decimal, Direction), ParseFailure> {
        let amount = slot.as_ref().ok_or(ParseFailure::NoAmount)?;
        if amount.is_zero() {
            return Err(ParseFailure::ZeroAmount);
        }
        let direction = if let Some(marker) = amount.marker {
            marker
        } else if amount.negative {
            Direction::Debit
        } else if amount.explicit_plus || self.signed_notation {
            Direction::Credit
        } else {
            self.keyword_direction(description)
                .ok_or(ParseFailure::UnresolvedDirection)?
        };
        Ok((amount.magnitude, direction))
    }

    /// Keyword vote; `None` unless exactly one side matches.
    pub fn keyword_direction(&self, description: &str) -> Option<Direction> {
        let padded = format!(
            " {} ",
            description
                .to_uppercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let hit = |keywords: &[String]| keywords.iter().any(|k| padded.contains(&format!(" {k} ")));
        match (hit(&self.debit_keywords), hit(&self.credit_keywords)) {
            (true, false) => Some(Direction::Debit),
            (false, true) => Some(Direction::Credit),
            _ => None,
        }
    }
}

fn is_empty(slot: &Slot) -> bool {
    non_empty(slot).is_none()
}

fn non_empty(slot: &Slot) -> Option<&AmountToken> {
    slot.as_ref().filter(|a| !a.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;
    use tally_core::{DateOrder, NormalizedLine};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn group(layout: ColumnLayout, texts: &[&str]) -> LineGroup {
        let mut lines = texts
            .iter()
            .enumerate()
            .map(|(i, t)| NormalizedLine::new(0, i, *t, 1.0));
        let mut g = LineGroup::new(lines.next().unwrap(), layout);
        g.lines.extend(lines);
        g
    }

    fn parse(layout: ColumnLayout, texts: &[&str]) -> Result<Transaction, ParseFailure> {
        let locale = DocumentLocale::default();
        TransactionParser::new(&locale, &ExtractOptions::default()).parse(&group(layout, texts))
    }

    #[test]
    fn test_minus_sign_is_debit() {
        let t = parse(ColumnLayout::Unknown, &["01/02/2024 Grocery Store -45.20"]).unwrap();
        assert_eq!(t.date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(t.description, "Grocery Store");
        assert_eq!(t.amount, d("45.20"));
        assert_eq!(t.direction, Direction::Debit);
        assert_eq!(t.running_balance, None);
    }

    #[test]
    fn test_parentheses_and_balance() {
        let t = parse(ColumnLayout::Unknown, &["01/02/2024 Card fee (2.50) 997.50"]).unwrap();
        assert_eq!(t.amount, d("2.50"));
        assert_eq!(t.direction, Direction::Debit);
        assert_eq!(t.running_balance, Some(d("997.50")));
    }

    #[test]
    fn test_split_columns() {
        let layout = ColumnLayout::Split {
            debit_first: true,
            balance: true,
        };
        let t = parse(layout, &["01/02/2024 NEFT ACME PAYROLL - 5,000.00 15,000.00"]).unwrap();
        assert_eq!(t.direction, Direction::Credit);
        assert_eq!(t.amount, d("5000.00"));
        assert_eq!(t.running_balance, Some(d("15000.00")));
        assert_eq!(t.description, "NEFT ACME PAYROLL");

        let t = parse(layout, &["02/02/2024 ATM WDL 2,000.00 0.00 13,000.00"]).unwrap();
        assert_eq!(t.direction, Direction::Debit);

        let err = parse(layout, &["03/02/2024 ODD 1.00 2.00 3.00"]).unwrap_err();
        assert_eq!(err, ParseFailure::AmbiguousColumns);
    }

    #[test]
    fn test_credit_first_columns() {
        let layout = ColumnLayout::Split {
            debit_first: false,
            balance: false,
        };
        let t = parse(layout, &["01/02/2024 Transfer 0.00 75.00"]).unwrap();
        assert_eq!(t.direction, Direction::Debit);
        assert_eq!(t.amount, d("75.00"));
    }

    #[test]
    fn test_cr_dr_suffix() {
        let t = parse(ColumnLayout::Unknown, &["01/02/2024 IMPS from Ravi 500.00 Cr 1,500.00 Cr"]).unwrap();
        assert_eq!(t.direction, Direction::Credit);
        assert_eq!(t.running_balance, Some(d("1500.00")));
    }

    #[test]
    fn test_keywords_fallback() {
        let t = parse(ColumnLayout::Unknown, &["01/02/2024 Cash deposit branch 200.00"]).unwrap();
        assert_eq!(t.direction, Direction::Credit);
        let t = parse(ColumnLayout::Unknown, &["01/02/2024 Monthly fee 5.00"]).unwrap();
        assert_eq!(t.direction, Direction::Debit);
        let err = parse(ColumnLayout::Unknown, &["01/02/2024 Misc adjustment 5.00"]).unwrap_err();
        assert_eq!(err, ParseFailure::UnresolvedDirection);
        let err = parse(ColumnLayout::Unknown, &["01/02/2024 Refund of fee 5.00"]).unwrap_err();
        assert_eq!(err, ParseFailure::UnresolvedDirection);
    }

    #[test]
    fn test_signed_document_means_unsigned_credit() {
        let locale = DocumentLocale::default();
        let options = ExtractOptions::default();
        let groups = vec![
            group(ColumnLayout::Unknown, &["01/02/2024 Grocery -45.20 954.80"]),
            group(ColumnLayout::Unknown, &["02/02/2024 Misc adjustment 5.00 959.80"]),
        ];
        let parser = TransactionParser::new(&locale, &options);
        assert!(parser.detect_signed_notation(&groups));
        let parser = parser.with_signed_notation(true);
        assert_eq!(parser.parse(&groups[1]).unwrap().direction, Direction::Credit);
    }

    #[test]
    fn test_negative_balance_does_not_make_document_signed() {
        let locale = DocumentLocale::default();
        let groups = vec![group(ColumnLayout::Unknown, &["01/02/2024 Fee 5.00 -20.00"])];
        assert!(!TransactionParser::new(&locale, &ExtractOptions::default()).detect_signed_notation(&groups));
    }

    #[test]
    fn test_continuation_lines_join_description() {
        let t = parse(
            ColumnLayout::Single { balance: true },
            &["01/02/2024 02/02/2024 UPI/402211 -500.00 500.00", "TO ASHA RAO", "rent"],
        )
        .unwrap();
        assert_eq!(t.description, "UPI/402211 TO ASHA RAO rent");
        assert_eq!(t.source.start_line, 0);
        assert_eq!(t.source.end_line, 2);
    }

    #[test]
    fn test_failures() {
        assert_eq!(
            parse(ColumnLayout::Unknown, &["Grocery Store 45.20 954.80"]).unwrap_err(),
            ParseFailure::NoDate
        );
        assert_eq!(
            parse(ColumnLayout::Unknown, &["01/02/2024 a 1.00 2.00 3.00 4.00"]).unwrap_err(),
            ParseFailure::TooManyAmounts { found: 4, allowed: 2 }
        );
        assert_eq!(
            parse(ColumnLayout::Unknown, &["01/02/2024 a 1.00 2.00 3.00"]).unwrap_err(),
            ParseFailure::TooManyAmounts { found: 3, allowed: 2 }
        );
        assert_eq!(
            parse(ColumnLayout::Single { balance: false }, &["01/02/2024 a -1.00 2.00"]).unwrap_err(),
            ParseFailure::TooManyAmounts { found: 2, allowed: 1 }
        );
        assert_eq!(
            parse(ColumnLayout::Unknown, &["01/02/2024 Nothing -0.00"]).unwrap_err(),
            ParseFailure::ZeroAmount
        );
        assert_eq!(
            parse(ColumnLayout::Unknown, &["Jul 20 Coffee -3.00"]).unwrap_err(),
            ParseFailure::DateUnresolved("Jul 20".to_string())
        );
        assert_eq!(
            parse(ColumnLayout::Unknown, &["31/02/2024 Coffee -3.00"]).unwrap_err(),
            ParseFailure::InvalidDate("31/02/2024".to_string())
        );
    }

    #[test]
    fn test_month_first_locale() {
        let locale = DocumentLocale {
            date_order: DateOrder::MonthFirst,
            ..DocumentLocale::default()
        };
        let t = TransactionParser::new(&locale, &ExtractOptions::default())
            .parse(&group(ColumnLayout::Unknown, &["01/02/2024 Grocery -45.20"]))
            .unwrap();
        assert_eq!(t.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_extra_keywords() {
        let locale = DocumentLocale::default();
        let mut options = ExtractOptions::default();
        options.debit_keywords = vec!["standing order".into()];
        let parser = TransactionParser::new(&locale, &options);
        assert_eq!(parser.keyword_direction("STANDING ORDER to landlord"), Some(Direction::Debit));
    }
}
