//! Pull the other party of a transfer out of a free-text description.

use regex::Regex;
use std::sync::OnceLock;
use tally_core::Counterparty;

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{9,18}\b").expect("valid account regex"))
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:to|from)\b[\s:]*(.+)$").expect("valid name regex"))
}

fn long_digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{6,}\b").expect("valid digits regex"))
}

/// Account-like digit runs (9..18 digits) and the name after TO/FROM.
/// Returns `None` when neither is present.
pub fn extract_counterparty(description: &str) -> Option<Counterparty> {
    let account = account_re()
        .find(description)
        .map(|m| m.as_str().to_string());

    let name = name_re().captures(description).and_then(|caps| {
        let candidate = long_digits_re().replace_all(&caps[1], "");
        let candidate = candidate
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let candidate = candidate.trim_matches(|c: char| c == '/' || c == '-' || c.is_whitespace());
        if candidate.chars().any(|c| c.is_alphabetic()) {
            Some(candidate.to_string())
        } else {
            None
        }
    });

    let party = Counterparty { account, name };
    if party.is_empty() { None } else { Some(party) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_and_name() {
        let party = extract_counterparty("IMPS 50012345678 TRANSFER TO RAMESH KUMAR").unwrap();
        assert_eq!(party.account.as_deref(), Some("50012345678"));
        assert_eq!(party.name.as_deref(), Some("RAMESH KUMAR"));
    }

    #[test]
    fn test_name_strips_trailing_reference() {
        let party = extract_counterparty("Transfer from Jane Doe 40291833").unwrap();
        assert_eq!(party.name.as_deref(), Some("Jane Doe"));
        assert_eq!(party.account, None);
    }

    #[test]
    fn test_short_numbers_are_not_accounts() {
        assert_eq!(extract_counterparty("POS 4021 GROCERY STORE"), None);
    }

    #[test]
    fn test_digits_only_after_to_is_not_a_name() {
        let party = extract_counterparty("NEFT TO 123456789012").unwrap();
        assert_eq!(party.account.as_deref(), Some("123456789012"));
        assert_eq!(party.name, None);
    }
}
