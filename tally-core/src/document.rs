//! Input documents: raw bytes plus a declared kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ExtractError, Result};

/// Declared kind of an uploaded statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl DocumentKind {
    /// Images always go through OCR; PDFs try their text layer first.
    pub fn is_image(&self) -> bool {
        !matches!(self, DocumentKind::Pdf)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" | "application/x-pdf" => Some(DocumentKind::Pdf),
            "image/png" => Some(DocumentKind::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(DocumentKind::Jpeg),
            "image/tiff" | "image/tif" => Some(DocumentKind::Tiff),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(DocumentKind::Bmp),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            "tif" | "tiff" => Some(DocumentKind::Tiff),
            "bmp" => Some(DocumentKind::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Basic magic-byte check. This is not content sniffing: it only
    /// confirms that the bytes plausibly are what the caller declared.
    pub fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            // Some generators prepend junk before the header; the PDF
            // reference allows it within the first 1024 bytes.
            DocumentKind::Pdf => {
                let head = &bytes[..bytes.len().min(1024)];
                head.windows(5).any(|w| w == b"%PDF-")
            }
            DocumentKind::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            DocumentKind::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            DocumentKind::Tiff => bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"),
            DocumentKind::Bmp => bytes.starts_with(b"BM"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Png => "png",
            DocumentKind::Jpeg => "jpeg",
            DocumentKind::Tiff => "tiff",
            DocumentKind::Bmp => "bmp",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
            .or_else(|| Self::from_mime(s))
            .ok_or_else(|| ExtractError::unsupported(format!("unknown document kind '{s}'")))
    }
}

/// An uploaded statement. Immutable once constructed; the pipeline only
/// ever borrows it.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    bytes: Vec<u8>,
    kind: DocumentKind,
}

impl Document {
    /// Wrap bytes of a declared kind, rejecting empty input and bytes whose
    /// signature contradicts the declaration.
    pub fn new(bytes: impl Into<Vec<u8>>, kind: DocumentKind) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ExtractError::unsupported("empty document"));
        }
        if !kind.matches_signature(&bytes) {
            return Err(ExtractError::unsupported(format!(
                "bytes do not look like a {kind} file"
            )));
        }
        Ok(Self { bytes, kind })
    }

    /// Same as [`Document::new`] with the kind taken from a MIME type.
    pub fn from_mime(bytes: impl Into<Vec<u8>>, mime: &str) -> Result<Self> {
        let kind = DocumentKind::from_mime(mime)
            .ok_or_else(|| ExtractError::unsupported(format!("MIME type '{mime}'")))?;
        Self::new(bytes, kind)
    }

    /// Read a file, taking the kind from its extension unless one is given.
    pub fn open(path: impl AsRef<Path>, kind: Option<DocumentKind>) -> Result<Self> {
        let path = path.as_ref();
        let kind = match kind.or_else(|| DocumentKind::from_path(path)) {
            Some(k) => k,
            None => {
                return Err(ExtractError::unsupported(format!(
                    "cannot tell the kind of {}",
                    path.display()
                )));
            }
        };
        let bytes = std::fs::read(path)?;
        Self::new(bytes, kind)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}
