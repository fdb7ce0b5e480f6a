//! Format normalization: turn an upload of a declared format into a
//! canonical, page-addressable PDF.
//!
//! ## Data Flow
//!
//! ```text
//! PageFormat   ──▶ pdf::validate ─────────────────────────▶ identity bytes
//! Image        ──▶ raster::image_to_pdf ──▶ pdf::validate ─▶ 1-page PDF
//! WordProcessor──▶ office::docx_to_pdf  ──▶ pdf::validate ─▶ rendered PDF
//! ```
//!
//! 1. [`pdf`]    — parse with lopdf and count pages; the only gate a document
//!    passes before it is considered canonical
//! 2. [`raster`] — decode PNG/JPEG, flatten alpha onto an opaque background,
//!    embed as a single full-page image
//! 3. [`office`] — hand DOCX to the external office renderer, bounded by a
//!    timeout
//!
//! Normalization is stateless and never touches the store. Parsing and
//! image transcoding are CPU-bound and run on the blocking pool.

pub mod office;
pub mod pdf;
pub mod raster;

use crate::error::{DocWeaveError, Result};
use office_auto::OfficeRenderer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Closed set of upload formats the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    /// PDF.
    PageFormat,
    /// PNG or JPEG raster.
    Image,
    /// DOCX.
    WordProcessor,
}

impl FormatTag {
    /// Detect the format from a filename's extension (case-insensitive, after
    /// the last dot).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(FormatTag::PageFormat),
            "png" | "jpg" | "jpeg" => Ok(FormatTag::Image),
            "docx" => Ok(FormatTag::WordProcessor),
            _ => Err(DocWeaveError::UnsupportedExtension {
                filename: filename.to_string(),
            }),
        }
    }

    /// Short name used on the wire (`pdf`, `image`, `docx`).
    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::PageFormat => "pdf",
            FormatTag::Image => "image",
            FormatTag::WordProcessor => "docx",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = DocWeaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" | "page_format" => Ok(FormatTag::PageFormat),
            "image" => Ok(FormatTag::Image),
            "docx" | "word_processor" => Ok(FormatTag::WordProcessor),
            _ => Err(DocWeaveError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// A validated PDF with a known page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDocument {
    bytes: Vec<u8>,
    page_count: usize,
}

impl CanonicalDocument {
    /// Validate `bytes` as a PDF with at least one page.
    ///
    /// Blocking; call from the blocking pool for large inputs.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let page_count = pdf::validate(&bytes)?;
        Ok(Self { bytes, page_count })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Knobs for the non-identity conversions.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Resolution at which one image pixel maps to page space. Default: 100.
    pub image_dpi: f32,
    /// Opaque colour transparent pixels are composited onto. Default: white.
    pub background: [u8; 3],
    /// DOCX renderer; `None` means DOCX conversion is unavailable.
    pub office: Option<OfficeRenderer>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            image_dpi: 100.0,
            background: [255, 255, 255],
            office: None,
        }
    }
}

/// Convert `raw` bytes of the declared `format` into a canonical document.
pub async fn normalize(
    raw: Vec<u8>,
    format: FormatTag,
    options: &NormalizeOptions,
) -> Result<CanonicalDocument> {
    debug!("Normalizing {} bytes as {}", raw.len(), format);
    match format {
        FormatTag::PageFormat => blocking(move || CanonicalDocument::from_bytes(raw)).await,
        FormatTag::Image => {
            let dpi = options.image_dpi;
            let background = options.background;
            blocking(move || {
                let pdf = raster::image_to_pdf(&raw, dpi, background)?;
                CanonicalDocument::from_bytes(pdf)
            })
            .await
        }
        FormatTag::WordProcessor => {
            let pdf = office::docx_to_pdf(options.office.as_ref(), &raw).await?;
            blocking(move || CanonicalDocument::from_bytes(pdf)).await
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocWeaveError::Internal(format!("Normalize task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(FormatTag::from_filename("a.pdf").unwrap(), FormatTag::PageFormat);
        assert_eq!(FormatTag::from_filename("Scan.JPEG").unwrap(), FormatTag::Image);
        assert_eq!(FormatTag::from_filename("x.y.png").unwrap(), FormatTag::Image);
        assert_eq!(FormatTag::from_filename("letter.docx").unwrap(), FormatTag::WordProcessor);
        assert!(matches!(
            FormatTag::from_filename("notes.txt"),
            Err(DocWeaveError::UnsupportedExtension { .. })
        ));
        assert!(FormatTag::from_filename("pdf").is_err());
    }

    #[test]
    fn tag_parsing_rejects_unknown() {
        assert_eq!("PDF".parse::<FormatTag>().unwrap(), FormatTag::PageFormat);
        assert!(matches!(
            "gif".parse::<FormatTag>(),
            Err(DocWeaveError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn pdf_normalization_is_identity() {
        let raw = pdf::tests::sample_pdf(3);
        let doc = normalize(raw.clone(), FormatTag::PageFormat, &NormalizeOptions::default())
            .await
            .unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.bytes(), raw.as_slice());
    }

    #[tokio::test]
    async fn garbage_pdf_is_corrupt() {
        let err = normalize(b"hello".to_vec(), FormatTag::PageFormat, &NormalizeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocWeaveError::CorruptDocument { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn docx_without_renderer_is_unavailable() {
        let err = normalize(b"PK\x03\x04".to_vec(), FormatTag::WordProcessor, &NormalizeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocWeaveError::ConversionUnavailable { .. }), "got: {err:?}");
    }
}
