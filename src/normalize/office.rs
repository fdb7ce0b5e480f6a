//! DOCX → PDF through the office renderer.

use crate::error::{DocWeaveError, Result};
use office_auto::OfficeRenderer;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Build the renderer used for DOCX uploads.
///
/// An explicit `soffice` path wins; otherwise the installation is
/// discovered. Returns `None` when nothing is found, which disables DOCX
/// conversion without affecting other formats.
pub fn discover_renderer(soffice: Option<&Path>, timeout: Duration) -> Option<OfficeRenderer> {
    if let Some(path) = soffice {
        return Some(OfficeRenderer::with_path(path, timeout));
    }
    match OfficeRenderer::discover(timeout) {
        Ok(renderer) => Some(renderer),
        Err(e) => {
            warn!("DOCX conversion disabled: {}", e);
            None
        }
    }
}

/// Render `raw` DOCX bytes to PDF bytes. The result is not validated here.
pub async fn docx_to_pdf(renderer: Option<&OfficeRenderer>, raw: &[u8]) -> Result<Vec<u8>> {
    let renderer = renderer.ok_or_else(|| DocWeaveError::ConversionUnavailable {
        detail: "no office renderer configured".into(),
    })?;
    let pdf = renderer.convert_to_pdf(raw, "docx").await?;
    info!("Rendered DOCX ({} bytes) to PDF ({} bytes)", raw.len(), pdf.len());
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = discover_renderer(Some(&dir.path().join("no-soffice")), Duration::from_secs(5));
        let err = docx_to_pdf(renderer.as_ref(), b"PK\x03\x04").await.unwrap_err();
        assert!(matches!(err, DocWeaveError::ConversionUnavailable { .. }), "got: {err:?}");
    }
}
