//! # docweave
//!
//! Assemble one PDF from pages of several uploaded documents, in any order,
//! with per-page rotation.
//!
//! ## Why this crate?
//!
//! Uploads arrive as PDFs, phone photos and word-processor files. Before any
//! page can be referenced by index they must share one page-addressable
//! representation, and nothing uploaded should outlive the session that
//! needed it. This crate normalizes every upload to PDF, keeps sources and
//! results in a time-bounded store under opaque identifiers, and composes
//! new documents from `(document, page, rotation)` references.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload ──▶ ingest ──▶ normalize ──▶ store (inbound)  ──▶ id
//!                        ├─ pdf      validate, identity
//!                        ├─ raster   PNG/JPEG → 1-page PDF, alpha flattened
//!                        └─ office   DOCX → PDF via headless LibreOffice
//!
//! [(id, page, rotation), …] ──▶ compose ──▶ store (outbound) ──▶ handle
//!
//! sweeper ──▶ deletes entries older than their partition's max age
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docweave::{CompositionRequest, DocWeave, PageReference, Rotation, ServiceConfig, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = DocWeave::new(ServiceConfig::from_env()?)?;
//!
//!     let report = service
//!         .ingest(vec![Upload::new("a.pdf", std::fs::read("a.pdf")?)])
//!         .await;
//!     let a = report.files[0].id;
//!
//!     let outcome = service
//!         .compose(CompositionRequest {
//!             pages: vec![
//!                 PageReference::new(a, 1, Rotation::Quarter),
//!                 PageReference::new(a, 0, Rotation::None),
//!             ],
//!             output_name: "swapped.pdf".into(),
//!         })
//!         .await?;
//!     let pdf = service
//!         .retrieve(&outcome.handle.id.to_string(), &outcome.handle.filename)
//!         .await?;
//!     std::fs::write("swapped.pdf", pdf)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `docweave` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | HTTP routes via axum, CORS and request tracing via tower-http |
//!
//! Disable both when embedding only the library:
//! ```toml
//! docweave = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compose;
pub mod config;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod store;
pub mod sweeper;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compose::{compose, Composition, CompositionRequest, PageReference, Rotation, SkippedReference};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{DocWeaveError, ErrorClass, ReferenceError, Result};
pub use ingest::{ingest, ingest_batch, IngestReport, IngestedFile, RejectedFile, Upload};
pub use normalize::{normalize, CanonicalDocument, FormatTag, NormalizeOptions};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{sanitize_output_name, ComposeOutcome, DocWeave, OutputHandle};
pub use store::{
    DocumentId, EphemeralStore, ObjectKind, Partition, Retention, StoredFormat, StoredObject, SweepReport,
};
pub use sweeper::{SweepPolicy, Sweeper, SweeperHandle};
