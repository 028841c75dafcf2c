//! Pages of raw text and the normalized lines derived from them.

use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextOrigin {
    /// Embedded PDF text layer
    Native,
    /// OCR of a rendered or uploaded image
    Ocr,
}

/// One unit of extractable content, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position within the document
    pub index: usize,
    /// Raw text, possibly empty
    pub text: String,
    pub origin: TextOrigin,
    /// OCR confidence in 0..=1; native text is 1.0
    pub confidence: f64,
    /// Set when extraction failed and `text` was left empty
    pub error: Option<String>,
}

impl Page {
    pub fn native(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            origin: TextOrigin::Native,
            confidence: 1.0,
            error: None,
        }
    }

    pub fn ocr(index: usize, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            index,
            text: text.into(),
            origin: TextOrigin::Ocr,
            confidence: confidence.clamp(0.0, 1.0),
            error: None,
        }
    }

    /// An empty page standing in for one that could not be extracted.
    pub fn failed(index: usize, origin: TextOrigin, error: impl Into<String>) -> Self {
        Self {
            index,
            text: String::new(),
            origin,
            confidence: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Count of non-whitespace characters, used to decide whether a text
    /// layer is worth keeping.
    pub fn visible_chars(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// A rendered page image headed for OCR. Not `Clone`: it is handed to the
/// OCR engine once and dropped afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct PageImage {
    pub page_index: usize,
    pub format: DocumentKind,
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn new(page_index: usize, format: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            page_index,
            format,
            bytes,
        }
    }
}

/// A cleaned line of statement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLine {
    pub page: usize,
    /// Position within the page after normalization
    pub line: usize,
    pub text: String,
    /// Inherited from the page: OCR confidence, or 1.0 for native text
    pub confidence: f64,
}

impl NormalizedLine {
    pub fn new(page: usize, line: usize, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            page,
            line,
            text: text.into(),
            confidence,
        }
    }
}
