use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tally_core::{Document, DocumentKind, PageImage};
use tracing::debug;

use super::PageRenderer;
use super::process::run_with_stdin;

/// Rasterizes PDF pages with poppler's `pdftoppm`. The PDF goes in on
/// stdin and a single PNG comes back on stdout.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    pub command: String,
    pub dpi: u32,
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self {
            command: "pdftoppm".to_string(),
            dpi: 300,
        }
    }
}

impl PdftoppmRenderer {
    pub fn new(command: impl Into<String>, dpi: u32) -> Self {
        Self {
            command: command.into(),
            dpi: dpi.max(72),
        }
    }

    fn args(&self, page_index: usize) -> Vec<String> {
        let page = (page_index + 1).to_string();
        vec![
            "-f".to_string(),
            page.clone(),
            "-l".to_string(),
            page,
            "-r".to_string(),
            self.dpi.to_string(),
            "-png".to_string(),
            "-singlefile".to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render_page(&self, document: &Document, page_index: usize) -> Result<PageImage> {
        if document.kind() != DocumentKind::Pdf {
            bail!("only PDF pages can be rendered, got {}", document.kind());
        }
        let png = run_with_stdin(&self.command, &self.args(page_index), document.bytes().to_vec())
            .await
            .with_context(|| format!("rendering page {}", page_index + 1))?;
        if !DocumentKind::Png.matches_signature(&png) {
            bail!("{} produced no PNG for page {}", self.command, page_index + 1);
        }
        debug!(page = page_index, bytes = png.len(), "rendered page");
        Ok(PageImage::new(page_index, DocumentKind::Png, png))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_are_one_based() {
        let r = PdftoppmRenderer::new("pdftoppm", 200);
        assert_eq!(
            r.args(0),
            vec!["-f", "1", "-l", "1", "-r", "200", "-png", "-singlefile", "-"]
        );
    }

    #[tokio::test]
    async fn test_images_cannot_be_rendered() {
        let png = Document::new(b"\x89PNG\r\n\x1a\n....".to_vec(), DocumentKind::Png).unwrap();
        let err = PdftoppmRenderer::default().render_page(&png, 0).await.unwrap_err();
        assert!(err.to_string().contains("only PDF"));
    }
}
