//! The DocWeave service: store, normalizer and configuration behind the four
//! external operations.
//!
//! ```text
//! ingest(files)          ──▶ ingest::ingest_batch ──▶ store (inbound)
//! compose(request)       ──▶ compose::compose     ──▶ store (outbound)
//! retrieve(id, filename) ◀── store (outbound)
//! preview(id)            ◀── store (inbound, canonical only)
//! ```
//!
//! Transport layers (the HTTP router, the CLI) hold a `DocWeave` and do
//! nothing but decode requests and encode results.

use crate::compose::{self, CompositionRequest, SkippedReference};
use crate::config::ServiceConfig;
use crate::error::{DocWeaveError, Result};
use crate::ingest::{self, IngestReport, Upload};
use crate::normalize::{office, NormalizeOptions};
use crate::progress::IngestProgressCallback;
use crate::store::{DocumentId, EphemeralStore, ObjectKind, Partition, StoredFormat};
use crate::sweeper::{Sweeper, SweeperHandle};
use office_auto::OfficeRenderer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Longest output filename, extension included.
const MAX_OUTPUT_NAME_LEN: usize = 120;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Where a composed document can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHandle {
    pub id: DocumentId,
    pub filename: String,
}

impl OutputHandle {
    /// Relative download path, as served by the HTTP surface.
    pub fn download_path(&self) -> String {
        format!("/download/{}/{}", self.id, self.filename)
    }
}

/// Result of a successful composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOutcome {
    pub handle: OutputHandle,
    /// Pages in the output document.
    pub pages: usize,
    pub skipped: Vec<SkippedReference>,
}

/// Turn a client-chosen name into a safe single path component ending in
/// `.pdf`.
pub fn sanitize_output_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_start_matches(['.', '_']);

    // Only ASCII survives the regex, so byte slicing is safe.
    let stem = if cleaned.len() >= 4 && cleaned[cleaned.len() - 4..].eq_ignore_ascii_case(".pdf") {
        &cleaned[..cleaned.len() - 4]
    } else {
        cleaned
    };
    let stem: String = stem.chars().take(MAX_OUTPUT_NAME_LEN - 4).collect();
    let stem = stem.trim_end_matches('.');
    if stem.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}

/// The ephemeral document store plus page composition engine.
#[derive(Debug, Clone)]
pub struct DocWeave {
    config: ServiceConfig,
    store: EphemeralStore,
    normalize: NormalizeOptions,
}

impl DocWeave {
    /// Open the store and discover the office renderer.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let office = office::discover_renderer(config.soffice_path.as_deref(), config.conversion_timeout);
        Self::with_office(config, office)
    }

    /// Like [`new`](Self::new) with an explicit (or no) DOCX renderer.
    pub fn with_office(config: ServiceConfig, office: Option<OfficeRenderer>) -> Result<Self> {
        let store = EphemeralStore::open(&config.store_root, config.retention())?;
        let normalize = NormalizeOptions {
            image_dpi: config.image_dpi,
            background: config.flatten_background,
            office,
        };
        info!(
            store = %config.store_root.display(),
            docx = normalize.office.is_some(),
            "DocWeave ready"
        );
        Ok(Self {
            config,
            store,
            normalize,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &EphemeralStore {
        &self.store
    }

    /// Start the retention sweeper for this service's store.
    pub fn start_sweeper(&self, token: CancellationToken) -> SweeperHandle {
        Sweeper::spawn(self.store.clone(), self.config.sweep_policy(), token)
    }

    /// Ingest a batch of uploads.
    pub async fn ingest(&self, uploads: Vec<Upload>) -> IngestReport {
        ingest::ingest_batch(
            &self.store,
            &self.normalize,
            uploads,
            self.config.ingest_concurrency,
            None,
        )
        .await
    }

    /// [`ingest`](Self::ingest) with per-file progress events.
    pub async fn ingest_with_progress(
        &self,
        uploads: Vec<Upload>,
        progress: &dyn IngestProgressCallback,
    ) -> IngestReport {
        ingest::ingest_batch(
            &self.store,
            &self.normalize,
            uploads,
            self.config.ingest_concurrency,
            Some(progress),
        )
        .await
    }

    /// Compose and store an output document.
    pub async fn compose(&self, request: CompositionRequest) -> Result<ComposeOutcome> {
        let filename = sanitize_output_name(&request.output_name);
        let composition = compose::compose(&self.store, &request.pages).await?;
        let pages = composition.document.page_count();

        let id = self
            .store
            .put(
                ObjectKind::OutputDocument,
                StoredFormat::Canonical,
                Some(filename.clone()),
                composition.document.into_bytes(),
            )
            .await
            .map_err(|e| DocWeaveError::SerializationError {
                detail: format!("Failed to write composed output: {e}"),
            })?;

        info!(%id, pages, skipped = composition.skipped.len(), "Stored output '{}'", filename);
        Ok(ComposeOutcome {
            handle: OutputHandle { id, filename },
            pages,
            skipped: composition.skipped,
        })
    }

    /// Bytes of a composed output. `filename` must be the name it was
    /// stored under.
    pub async fn retrieve(&self, id: &str, filename: &str) -> Result<Vec<u8>> {
        let id: DocumentId = id.parse()?;
        let object = self.store.get(Partition::Outbound, id).await?;
        if object.name.as_deref() != Some(filename) {
            debug!(%id, requested = filename, "Output filename mismatch");
            return Err(DocWeaveError::NotFound { id: id.to_string() });
        }
        Ok(object.bytes)
    }

    /// Canonical bytes of an ingested source document.
    pub async fn preview(&self, id: &str) -> Result<Vec<u8>> {
        let id: DocumentId = id.parse()?;
        Ok(self.store.get_canonical(id).await?.bytes)
    }
}
