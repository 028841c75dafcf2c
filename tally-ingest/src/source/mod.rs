//! Page text from a document: the PDF text layer where it exists, OCR
//! everywhere else.
//!
//! The collaborators (text layer, page renderer, OCR engine) are traits so
//! the pipeline can be driven without poppler or tesseract installed.

mod lopdf_layer;
mod pdftoppm;
mod process;
mod tesseract;

pub use lopdf_layer::LopdfTextLayer;
pub use pdftoppm::PdftoppmRenderer;
pub use process::locate;
pub use tesseract::{TesseractOcr, text_from_tsv};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Document, ExtractError, ExtractOptions, Page, PageImage, TextOrigin};
use tracing::{debug, info, warn};

/// Embedded text of every page of a PDF.
pub trait TextLayer: Send + Sync {
    /// One entry per page in document order. The outer error means the
    /// container itself is unreadable; an inner error fails only that page.
    fn page_texts(&self, pdf: &[u8]) -> Result<Vec<Result<String>>>;
}

/// Rasterizes one PDF page for OCR.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_page(&self, document: &Document, page_index: usize) -> Result<PageImage>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrText {
    pub text: String,
    /// 0..=1
    pub confidence: f64,
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: PageImage) -> Result<OcrText>;
}

/// Pages that need OCR, and where their pixels come from.
enum OcrJob {
    /// The uploaded file is the image
    Image,
    /// A PDF page with no usable text layer
    Render,
}

/// Produces the ordered pages of a document.
#[derive(Clone)]
pub struct TextSource {
    text_layer: Arc<dyn TextLayer>,
    renderer: Option<Arc<dyn PageRenderer>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    min_native_chars: usize,
    timeout: Duration,
    concurrency: usize,
}

impl TextSource {
    /// lopdf text layer, no OCR.
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            text_layer: Arc::new(LopdfTextLayer),
            renderer: None,
            ocr: None,
            min_native_chars: options.min_native_chars,
            timeout: options.ocr_timeout(),
            concurrency: options.ocr_concurrency.max(1),
        }
    }

    pub fn with_text_layer(mut self, layer: Arc<dyn TextLayer>) -> Self {
        self.text_layer = layer;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Overrides the per-page OCR budget (render plus recognition).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Every page of the document, in order.
    ///
    /// Only an unreadable PDF container is an error. A page that cannot be
    /// read comes back as a failed, empty [`Page`] carrying the reason.
    pub async fn extract(&self, document: &Document) -> tally_core::Result<Vec<Page>> {
        if document.kind().is_image() {
            let pages = self.run_ocr(document, vec![(0, OcrJob::Image)]).await;
            return Ok(pages.into_iter().flat_map(split_frames).collect());
        }

        let texts = self
            .text_layer
            .page_texts(document.bytes())
            .map_err(|e| ExtractError::UnreadablePdf {
                reason: format!("{e:#}"),
            })?;
        if texts.is_empty() {
            return Err(ExtractError::UnreadablePdf {
                reason: "document has no pages".to_string(),
            });
        }

        let mut pages: Vec<Option<Page>> = Vec::with_capacity(texts.len());
        let mut jobs = Vec::new();
        for (index, text) in texts.into_iter().enumerate() {
            match text {
                Ok(text) => {
                    let page = Page::native(index, text);
                    if page.visible_chars() >= self.min_native_chars {
                        pages.push(Some(page));
                    } else if self.can_ocr_pdf() {
                        debug!(page = index, chars = page.visible_chars(), "no usable text layer, routing to OCR");
                        jobs.push((index, OcrJob::Render));
                        pages.push(None);
                    } else if page.visible_chars() > 0 {
                        // short, but better than nothing
                        pages.push(Some(page));
                    } else {
                        warn!(page = index, "page has no text layer and no OCR is configured");
                        pages.push(Some(Page::failed(
                            index,
                            TextOrigin::Native,
                            "page has no text layer and no OCR engine is configured",
                        )));
                    }
                }
                Err(e) if self.can_ocr_pdf() => {
                    debug!(page = index, error = %e, "text layer failed, routing to OCR");
                    jobs.push((index, OcrJob::Render));
                    pages.push(None);
                }
                Err(e) => {
                    warn!(page = index, error = %e, "text layer failed");
                    pages.push(Some(Page::failed(index, TextOrigin::Native, format!("{e:#}"))));
                }
            }
        }

        for page in self.run_ocr(document, jobs).await {
            let index = page.index;
            pages[index] = Some(page);
        }

        let pages: Vec<Page> = pages.into_iter().flatten().collect();
        info!(
            pages = pages.len(),
            failed = pages.iter().filter(|p| p.is_failed()).count(),
            "text extracted"
        );
        Ok(pages)
    }

    fn can_ocr_pdf(&self) -> bool {
        self.renderer.is_some() && self.ocr.is_some()
    }

    /// OCR the given pages with bounded concurrency. Output order follows
    /// input order.
    async fn run_ocr(&self, document: &Document, jobs: Vec<(usize, OcrJob)>) -> Vec<Page> {
        stream::iter(jobs)
            .map(|(index, job)| async move {
                match tokio::time::timeout(self.timeout, self.ocr_page(document, index, job)).await {
                    Ok(Ok(text)) => Page::ocr(index, text.text, text.confidence),
                    Ok(Err(e)) => {
                        warn!(page = index, error = %e, "OCR failed");
                        Page::failed(index, TextOrigin::Ocr, format!("{e:#}"))
                    }
                    Err(_) => {
                        warn!(page = index, timeout = ?self.timeout, "OCR timed out");
                        Page::failed(
                            index,
                            TextOrigin::Ocr,
                            format!("OCR timed out after {}s", self.timeout.as_secs_f64()),
                        )
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn ocr_page(&self, document: &Document, index: usize, job: OcrJob) -> Result<OcrText> {
        let ocr = self.ocr.as_ref().ok_or_else(|| anyhow!("no OCR engine is configured"))?;
        let image = match job {
            OcrJob::Image => PageImage::new(index, document.kind(), document.bytes().to_vec()),
            OcrJob::Render => {
                let renderer = self
                    .renderer
                    .as_ref()
                    .ok_or_else(|| anyhow!("no page renderer is configured"))?;
                renderer.render_page(document, index).await?
            }
        };
        ocr.recognize(image).await
    }
}

/// OCR of a multi-page image returns one text with a form feed between
/// frames; each frame becomes its own page.
fn split_frames(page: Page) -> Vec<Page> {
    if page.is_failed() || !page.text.contains('\x0c') {
        return vec![page];
    }
    page.text
        .split('\x0c')
        .enumerate()
        .map(|(index, text)| Page::ocr(index, text, page.confidence))
        .collect()
}
