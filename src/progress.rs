//! Progress-callback trait for per-file ingestion events.
//!
//! Pass an [`IngestProgressCallback`] to [`crate::ingest::ingest_batch`] (or
//! [`crate::service::DocWeave::ingest_with_progress`]) to observe a batch as
//! each file finishes. The CLI uses it to drive a terminal progress bar; a
//! server could forward the same events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use docweave::IngestProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counting(AtomicUsize);
//!
//! impl IngestProgressCallback for Counting {
//!     fn on_file_complete(&self, _index: usize, _total: usize, _name: &str, _pages: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the ingestion coordinator as it processes each file.
///
/// Files of one batch are ingested concurrently, so methods may be called
/// from several tasks at once. All methods default to no-ops.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once before any file is processed.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file has been normalized and stored.
    ///
    /// # Arguments
    /// * `index` — 0-based position of the file in the batch
    /// * `name`  — the file's original name
    /// * `pages` — page count of the canonical document
    fn on_file_complete(&self, index: usize, total_files: usize, name: &str, pages: usize) {
        let _ = (index, total_files, name, pages);
    }

    /// Called when a file is rejected. `reason` is safe to show to users.
    fn on_file_error(&self, index: usize, total_files: usize, name: &str, reason: &str) {
        let _ = (index, total_files, name, reason);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, accepted: usize) {
        let _ = (total_files, accepted);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Shared, dynamically dispatched callback.
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;
