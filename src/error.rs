//! Error types for the docweave library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocWeaveError`] — **Fatal** for the current operation: the upload
//!   cannot be normalized, the composition resolved nothing, the store could
//!   not be written. Returned as `Err(DocWeaveError)` from the top-level
//!   operations.
//!
//! * [`ReferenceError`] — **Non-fatal**: one page reference of a composition
//!   could not be honoured (unknown document, page out of range) but the
//!   remaining references are fine. Stored inside
//!   [`crate::compose::SkippedReference`] so callers can see exactly which
//!   references were dropped and why.
//!
//! Neither type ever brings the process down: the service recovers every
//! error at the request boundary, and the sweeper recovers per entry.

use crate::store::DocumentId;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = DocWeaveError> = std::result::Result<T, E>;

/// All fatal errors returned by the docweave library.
///
/// Per-reference composition failures use [`ReferenceError`] and are stored
/// in [`crate::compose::SkippedReference`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocWeaveError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The declared format is not one of PDF / image / DOCX.
    #[error("Unsupported format '{format}'")]
    UnsupportedFormat { format: String },

    /// The uploaded filename has no accepted extension.
    #[error("Unsupported file extension for '{filename}' (accepted: pdf, png, jpg, jpeg, docx)")]
    UnsupportedExtension { filename: String },

    /// A composition request contained no page references at all.
    #[error("Composition request contains no pages")]
    EmptyComposition,

    /// Rotation outside {0, 90, 180, 270}.
    #[error("Invalid rotation {degrees}°: must be one of 0, 90, 180, 270")]
    InvalidRotation { degrees: i64 },

    /// A string that does not parse as a store identifier.
    #[error("Invalid document identifier '{input}'")]
    InvalidIdentifier { input: String },

    /// A request body that could not be decoded (malformed multipart or
    /// JSON, negative page index).
    #[error("Invalid request: {detail}")]
    InvalidRequest { detail: String },

    // ── Resolution errors ─────────────────────────────────────────────────
    /// The identifier is unknown, expired or was evicted.
    #[error("Document {id} not found")]
    NotFound { id: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The bytes are not a parseable document of the declared format.
    #[error("Document is corrupt: {detail}")]
    CorruptDocument { detail: String },

    /// The rendering capability needed for this format is not deployed.
    #[error("Conversion unavailable: {detail}")]
    ConversionUnavailable { detail: String },

    /// The rendering engine ran but failed.
    #[error("Conversion failed: {detail}")]
    ConversionError { detail: String },

    /// The rendering engine did not finish in time.
    #[error("Conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    // ── Composition errors ────────────────────────────────────────────────
    /// Every reference of a composition failed; there is nothing to write.
    #[error("No valid pages to process ({} reference(s) failed)", .failures.len())]
    NoValidPages {
        failures: Vec<crate::compose::SkippedReference>,
    },

    // ── Resource errors ───────────────────────────────────────────────────
    /// The composed document could not be serialised.
    #[error("Failed to serialise output document: {detail}")]
    SerializationError { detail: String },

    /// Reading or writing a store entry failed.
    #[error("Store I/O error on '{path}': {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used to pick a response status at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller sent something unacceptable.
    Input,
    /// Identifier unknown or evicted.
    NotFound,
    /// The upload could not be converted.
    Conversion,
    /// Server-side resource failure.
    Resource,
}

impl DocWeaveError {
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocWeaveError::Store {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(id: DocumentId) -> Self {
        DocWeaveError::NotFound { id: id.to_string() }
    }

    /// `true` for "no such document" outcomes, which are expected and common.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocWeaveError::NotFound { .. })
    }

    pub fn status_class(&self) -> ErrorClass {
        match self {
            DocWeaveError::UnsupportedFormat { .. }
            | DocWeaveError::UnsupportedExtension { .. }
            | DocWeaveError::EmptyComposition
            | DocWeaveError::InvalidRotation { .. }
            | DocWeaveError::InvalidRequest { .. }
            | DocWeaveError::NoValidPages { .. }
            | DocWeaveError::InvalidConfig(_) => ErrorClass::Input,
            DocWeaveError::InvalidIdentifier { .. } | DocWeaveError::NotFound { .. } => {
                ErrorClass::NotFound
            }
            DocWeaveError::CorruptDocument { .. }
            | DocWeaveError::ConversionUnavailable { .. }
            | DocWeaveError::ConversionError { .. }
            | DocWeaveError::ConversionTimeout { .. } => ErrorClass::Conversion,
            DocWeaveError::SerializationError { .. }
            | DocWeaveError::Store { .. }
            | DocWeaveError::Internal(_) => ErrorClass::Resource,
        }
    }

    /// Message safe to hand to an untrusted caller.
    ///
    /// Conversion and resource errors keep their category but drop the
    /// engine/OS diagnostic; input and resolution errors are returned as-is.
    pub fn public_message(&self) -> String {
        match self {
            DocWeaveError::CorruptDocument { .. } => "The file could not be read as a valid document".into(),
            DocWeaveError::ConversionUnavailable { .. } => {
                "Conversion of this file type is not available on this server".into()
            }
            DocWeaveError::ConversionError { .. } => "The file could not be converted".into(),
            DocWeaveError::ConversionTimeout { .. } => "Conversion of the file timed out".into(),
            DocWeaveError::SerializationError { .. }
            | DocWeaveError::Store { .. }
            | DocWeaveError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl From<office_auto::OfficeError> for DocWeaveError {
    fn from(e: office_auto::OfficeError) -> Self {
        use office_auto::OfficeError;
        match e {
            OfficeError::NotInstalled => DocWeaveError::ConversionUnavailable {
                detail: e.to_string(),
            },
            OfficeError::Timeout { secs } => DocWeaveError::ConversionTimeout { secs },
            OfficeError::Spawn { .. } => DocWeaveError::ConversionUnavailable {
                detail: e.to_string(),
            },
            OfficeError::Failed { .. } | OfficeError::NoOutput { .. } => DocWeaveError::ConversionError {
                detail: e.to_string(),
            },
            OfficeError::Io(source) => DocWeaveError::Internal(format!("office scratch I/O: {source}")),
        }
    }
}

/// A non-fatal error for a single page reference.
///
/// Stored alongside the reference's position in
/// [`crate::compose::SkippedReference`]. The composition continues unless
/// ALL references fail.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceError {
    /// The identifier is unknown, expired, evicted mid-request, or its entry
    /// is not a canonical source document.
    #[error("document {document_id} could not be resolved")]
    UnresolvedDocument { document_id: String },

    /// `page_index >= page_count` of the resolved document.
    #[error("page index {page_index} is out of range (document has {page_count} pages)")]
    PageIndexOutOfRange { page_index: usize, page_count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_errors_hide_diagnostics() {
        let e = DocWeaveError::ConversionError {
            detail: "/tmp/office-auto-x/input.docx: segfault in sw module".into(),
        };
        let msg = e.public_message();
        assert!(!msg.contains("segfault"), "got: {msg}");
        assert!(!msg.contains("/tmp"), "got: {msg}");
        assert_eq!(e.status_class(), ErrorClass::Conversion);
    }

    #[test]
    fn unavailable_is_distinguishable_from_malformed() {
        let unavailable = DocWeaveError::ConversionUnavailable { detail: "x".into() }.public_message();
        let malformed = DocWeaveError::ConversionError { detail: "x".into() }.public_message();
        assert_ne!(unavailable, malformed);
    }

    #[test]
    fn input_errors_keep_their_message() {
        let e = DocWeaveError::InvalidRotation { degrees: 45 };
        assert!(e.public_message().contains("45"));
        assert_eq!(e.status_class(), ErrorClass::Input);
    }

    #[test]
    fn malformed_requests_are_client_errors() {
        let e = DocWeaveError::InvalidRequest {
            detail: "incomplete multipart stream".into(),
        };
        assert_eq!(e.status_class(), ErrorClass::Input);
        assert!(e.public_message().contains("incomplete multipart stream"));
        assert!(!e.public_message().contains("Internal"));
    }

    #[test]
    fn not_found_classification() {
        let e = DocWeaveError::NotFound { id: "abc".into() };
        assert!(e.is_not_found());
        assert_eq!(e.status_class(), ErrorClass::NotFound);
    }

    #[test]
    fn no_valid_pages_display_counts_failures() {
        let e = DocWeaveError::NoValidPages { failures: vec![] };
        assert!(e.to_string().contains("0 reference(s)"));
    }

    #[test]
    fn office_timeout_maps_to_conversion_timeout() {
        let e: DocWeaveError = office_auto::OfficeError::Timeout { secs: 7 }.into();
        assert!(matches!(e, DocWeaveError::ConversionTimeout { secs: 7 }));
        let e: DocWeaveError = office_auto::OfficeError::NotInstalled.into();
        assert!(matches!(e, DocWeaveError::ConversionUnavailable { .. }));
    }

    #[test]
    fn reference_error_serialises_with_kind_tag() {
        let e = ReferenceError::PageIndexOutOfRange {
            page_index: 5,
            page_count: 2,
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"kind\":\"page_index_out_of_range\""), "got: {json}");
    }
}
