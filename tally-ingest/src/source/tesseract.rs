use anyhow::{Context, Result};
use async_trait::async_trait;
use tally_core::PageImage;
use tracing::debug;

use super::process::run_with_stdin;
use super::{OcrEngine, OcrText};

/// OCR through the `tesseract` binary in TSV mode, so word positions can be
/// used to rebuild table rows that tesseract splits into blocks.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub command: String,
    pub language: String,
    /// Extra flags placed before the output format, e.g. `--psm 6`
    pub args: Vec<String>,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            args: Vec::new(),
        }
    }
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            args,
        }
    }

    fn invocation(&self) -> Vec<String> {
        let mut v = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];
        v.extend_from_slice(&self.args);
        v.push("tsv".to_string());
        v
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: PageImage) -> Result<OcrText> {
        let page = image.page_index;
        let out = run_with_stdin(&self.command, &self.invocation(), image.bytes)
            .await
            .with_context(|| format!("OCR of page {}", page + 1))?;
        let tsv = String::from_utf8_lossy(&out);
        let text = text_from_tsv(&tsv)?;
        debug!(page, confidence = text.confidence, "OCR finished");
        Ok(text)
    }
}

#[derive(Debug, Clone)]
struct Word {
    page: u32,
    left: f64,
    center_y: f64,
    height: f64,
    conf: f64,
    text: String,
}

/// Rebuild visual lines from tesseract's word boxes.
///
/// Words are grouped by vertical center rather than by tesseract's
/// block/line ids: a statement row whose columns land in different blocks
/// still comes out as one line, left to right. Frames of a multi-page image
/// are kept apart and joined with a form feed.
pub fn text_from_tsv(tsv: &str) -> Result<OcrText> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(tsv.as_bytes());

    let mut words: Vec<Word> = Vec::new();
    for record in rdr.records() {
        let record = record.context("reading tesseract TSV")?;
        if record.get(0) != Some("5") {
            continue;
        }
        let text = record.get(11).unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| record.get(i).and_then(|v| v.trim().parse::<f64>().ok()).unwrap_or(0.0);
        let (left, top, height, conf) = (num(6), num(7), num(9), num(10));
        words.push(Word {
            page: record.get(1).and_then(|v| v.trim().parse().ok()).unwrap_or(1),
            left,
            center_y: top + height / 2.0,
            height: height.max(1.0),
            conf,
            text: text.to_string(),
        });
    }

    let scored: Vec<f64> = words.iter().map(|w| w.conf).filter(|c| *c >= 0.0).collect();
    let confidence = if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64 / 100.0
    };

    words.sort_by(|a, b| a.page.cmp(&b.page).then(a.center_y.total_cmp(&b.center_y)));
    let mut rows: Vec<Vec<Word>> = Vec::new();
    for word in words {
        match rows.last_mut() {
            Some(row) if row[0].page == word.page && same_row(row, &word) => row.push(word),
            _ => rows.push(vec![word]),
        }
    }

    let mut text = String::new();
    let mut page = None;
    for mut row in rows {
        match page {
            Some(p) if p != row[0].page => text.push('\x0c'),
            Some(_) => text.push('\n'),
            None => {}
        }
        page = Some(row[0].page);
        row.sort_by(|a, b| a.left.total_cmp(&b.left));
        text.push_str(&row.into_iter().map(|w| w.text).collect::<Vec<_>>().join(" "));
    }

    Ok(OcrText {
        text,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

fn same_row(row: &[Word], word: &Word) -> bool {
    let n = row.len() as f64;
    let center = row.iter().map(|w| w.center_y).sum::<f64>() / n;
    let height = row.iter().map(|w| w.height).sum::<f64>() / n;
    (word.center_y - center).abs() <= height.max(word.height) / 2.0
}
