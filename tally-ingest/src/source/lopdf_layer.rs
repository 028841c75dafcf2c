use anyhow::{Context, Result, anyhow};

use super::TextLayer;

/// Embedded text via lopdf's content-stream text extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfTextLayer;

impl TextLayer for LopdfTextLayer {
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<Result<String>>> {
        let doc = lopdf::Document::load_mem(pdf).context("parsing PDF container")?;
        let pages = doc.get_pages();
        Ok(pages
            .keys()
            .map(|&number| {
                doc.extract_text(&[number])
                    .map_err(|e| anyhow!("text layer of page {number}: {e}"))
            })
            .collect())
    }
}
