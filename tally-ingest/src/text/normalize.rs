//! Page text cleanup.
//!
//! Two passes: each page is cleaned on its own (unicode repair, OCR digit
//! confusions, whitespace, page numbers, fragment merging), then lines that
//! repeat across many pages are recognized as headers/footers and only
//! their first occurrence is kept. Repeats are counted on merged lines.
//! Running the normalizer on its own output changes nothing.

use regex::Regex;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tally_core::{ExtractOptions, NormalizedLine, Page};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use super::tokens::{NumberFormat, amounts, find_dates};

#[derive(Debug, Clone)]
pub struct Normalizer {
    noise_page_ratio: f64,
    noise_min_pages: usize,
    date_search_window: usize,
}

impl Normalizer {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            noise_page_ratio: options.noise_page_ratio,
            noise_min_pages: options.noise_min_pages.max(2),
            date_search_window: options.date_search_window,
        }
    }

    /// Clean a single page. No cross-page noise detection.
    pub fn normalize_page(&self, page: &Page) -> Vec<NormalizedLine> {
        number(page.index, page.confidence, clean_page_text(&page.text))
    }

    /// Clean every page, then drop repeated headers and footers.
    ///
    /// Dropping a line can leave a continuation next to a new neighbour,
    /// and merging can produce a new repeat, so both steps run until
    /// neither changes anything.
    pub fn normalize_document(&self, pages: &[Page]) -> Vec<NormalizedLine> {
        let mut cleaned: Vec<Vec<String>> = pages.iter().map(|p| clean_page_text(&p.text)).collect();
        while self.drop_repeats(&mut cleaned) > 0 {
            for lines in &mut cleaned {
                *lines = merge_fragments(std::mem::take(lines));
            }
        }

        pages
            .iter()
            .zip(cleaned)
            .flat_map(|(page, lines)| number(page.index, page.confidence, lines))
            .collect()
    }

    /// Keep the first occurrence of each repeated line. Returns how many
    /// lines were dropped.
    fn drop_repeats(&self, pages: &mut [Vec<String>]) -> usize {
        let noise: HashSet<String> = self
            .repeated_lines(pages)
            .into_iter()
            .map(str::to_owned)
            .collect();
        if noise.is_empty() {
            return 0;
        }
        let mut seen: HashSet<String> = HashSet::new();
        let mut dropped = 0;
        for lines in pages.iter_mut() {
            lines.retain(|line| {
                let keep = !noise.contains(line) || seen.insert(line.clone());
                if !keep {
                    dropped += 1;
                }
                keep
            });
        }
        dropped
    }

    /// Run the document pass again over already-normalized lines.
    pub fn renormalize(&self, lines: &[NormalizedLine], page_count: usize) -> Vec<NormalizedLine> {
        let mut pages: Vec<Page> = (0..page_count).map(|i| Page::native(i, "")).collect();
        for line in lines {
            if line.page >= pages.len() {
                pages.resize_with(line.page + 1, || Page::native(0, ""));
                for (i, p) in pages.iter_mut().enumerate() {
                    p.index = i;
                }
            }
            let page = &mut pages[line.page];
            if !page.text.is_empty() {
                page.text.push('\n');
            }
            page.text.push_str(&line.text);
            page.confidence = line.confidence;
        }
        self.normalize_document(&pages)
    }

    /// Line texts found on at least `noise_page_ratio` of the pages.
    fn repeated_lines<'a>(&self, pages: &'a [Vec<String>]) -> HashSet<&'a str> {
        let mut noise = HashSet::new();
        if pages.len() < self.noise_min_pages {
            return noise;
        }
        let mut page_counts: HashMap<&str, usize> = HashMap::new();
        for lines in pages {
            let unique: HashSet<&str> = lines.iter().map(String::as_str).collect();
            for line in unique {
                *page_counts.entry(line).or_default() += 1;
            }
        }
        let threshold = (self.noise_page_ratio * pages.len() as f64).max(2.0);
        for (line, count) in page_counts {
            if count as f64 >= threshold && !self.looks_like_transaction(line) {
                noise.insert(line);
            }
        }
        debug!(pages = pages.len(), repeated = noise.len(), "cross-page noise");
        noise
    }

    fn looks_like_transaction(&self, line: &str) -> bool {
        let dated = find_dates(line)
            .first()
            .is_some_and(|d| d.start <= self.date_search_window);
        dated
            && (!amounts(line, NumberFormat::DotDecimal).is_empty()
                || !amounts(line, NumberFormat::CommaDecimal).is_empty())
    }
}

fn number(page: usize, confidence: f64, lines: Vec<String>) -> Vec<NormalizedLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| NormalizedLine::new(page, i, text, confidence))
        .collect()
}

/// Per-page cleanup short of fragment merging.
fn clean_lines(text: &str) -> Vec<String> {
    let text = repair_chars(text);
    text.lines()
        .map(|raw| {
            raw.split_whitespace()
                .map(repair_digits)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty() && !is_page_noise(line))
        .collect()
}

/// Full single-page cleanup.
pub fn clean_page_text(text: &str) -> Vec<String> {
    merge_fragments(clean_lines(text))
}

/// NFKC (ligatures, full-width digits, no-break spaces), then the few
/// characters NFKC leaves alone.
fn repair_chars(text: &str) -> String {
    text.nfkc()
        .filter_map(|c| match c {
            '\u{FFFD}' => None,
            '\r' | '\u{0C}' | '\u{2028}' | '\u{2029}' => Some('\n'),
            '\u{2212}' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' => Some('-'),
            '\u{2018}' | '\u{2019}' | '\u{201B}' => Some('\''),
            '\u{201C}' | '\u{201D}' => Some('"'),
            '\t' | '\n' => Some(c),
            c if c.is_control() => None,
            c if c.is_whitespace() => Some(' '),
            c => Some(c),
        })
        .collect()
}

fn is_confusable(c: char) -> bool {
    matches!(c, 'O' | 'o' | 'l' | 'I' | '|')
}

/// OCR reads 0 as O and 1 as l inside numbers: `1,O00.5O` becomes
/// `1,000.50`. Only words made of digits, confusables and number
/// punctuation are touched.
fn repair_digits(word: &str) -> Cow<'_, str> {
    let digits = word.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 2 || !word.chars().any(is_confusable) {
        return Cow::Borrowed(word);
    }
    let numeric = word
        .chars()
        .all(|c| c.is_ascii_digit() || is_confusable(c) || matches!(c, '.' | ',' | '/' | '-' | '(' | ')'));
    if !numeric {
        return Cow::Borrowed(word);
    }
    Cow::Owned(
        word.chars()
            .map(|c| match c {
                'O' | 'o' => '0',
                'l' | 'I' | '|' => '1',
                c => c,
            })
            .collect(),
    )
}

fn page_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:page|pg\.?)?\s*\d{1,4}(?:\s*(?:of|/)\s*\d{1,4})?$").expect("valid page number regex")
    })
}

fn page_of_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^-?\s*page\s+\d{1,4}\s+of\s+\d{1,4}\s*-?$").expect("valid page-of regex"))
}

fn continued_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:\(?continued\b|this page (?:is )?intentionally left blank)").expect("valid continued regex")
    })
}

/// Lines that are never content: page numbers, rules, "continued".
pub fn is_page_noise(line: &str) -> bool {
    page_number_re().is_match(line)
        || page_of_re().is_match(line)
        || continued_re().is_match(line)
        || line.chars().all(|c| !c.is_alphanumeric())
}

/// Rejoin lines that OCR or the PDF layer broke mid-sentence: a line
/// starting with a lowercase letter continues the previous one unless that
/// one ended a sentence. Only vertical order is known here, so lines are
/// merged regardless of column position.
fn merge_fragments(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let continues = line.starts_with(|c: char| c.is_lowercase());
        match out.last_mut() {
            Some(prev) if continues && !prev.ends_with(['.', ':', ';', '!', '?']) => {
                prev.push(' ');
                prev.push_str(&line);
            }
            _ => out.push(line),
        }
    }
    out
}
