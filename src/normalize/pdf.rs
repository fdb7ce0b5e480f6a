//! PDF validation.
//!
//! A document is canonical when lopdf can parse it and its page tree yields at
//! least one page. Bytes are never rewritten here.

use crate::error::{DocWeaveError, Result};
use lopdf::Document;

fn corrupt(detail: impl Into<String>) -> DocWeaveError {
    DocWeaveError::CorruptDocument {
        detail: detail.into(),
    }
}

/// Parse a PDF from memory.
pub(crate) fn load(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| corrupt(format!("Failed to parse PDF: {e}")))
}

/// Validate `bytes` and return the page count.
pub fn validate(bytes: &[u8]) -> Result<usize> {
    let doc = load(bytes)?;
    match doc.get_pages().len() {
        0 => Err(corrupt("document has no pages")),
        n => Ok(n),
    }
}
