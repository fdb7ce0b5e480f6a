//! Ingestion: uploaded file → canonical source document in the store.
//!
//! Per file:
//!
//! 1. Detect the format from the filename extension.
//! 2. For non-PDF uploads, keep the raw bytes as a `RawUploaded` entry.
//! 3. Normalize to PDF.
//! 4. Store the result as a `Canonical` source and return its identifier.
//!
//! A failure in step 3 evicts the raw entry again. Files of a batch are
//! independent: one rejected file never affects the others.

use crate::error::{DocWeaveError, Result};
use crate::normalize::{normalize, FormatTag, NormalizeOptions};
use crate::progress::IngestProgressCallback;
use crate::store::{DocumentId, EphemeralStore, ObjectKind, Partition, StoredFormat};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One file as received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// A file that was normalized and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedFile {
    pub id: DocumentId,
    pub original_name: String,
    pub format: FormatTag,
    pub pages: usize,
}

/// A file that was not accepted. `reason` is safe to show to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedFile {
    pub original_name: String,
    pub reason: String,
}

/// Outcome of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files: Vec<IngestedFile>,
    pub rejected: Vec<RejectedFile>,
}

/// Strip any client-side directory components from a declared filename.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

/// Ingest a single file.
pub async fn ingest(
    store: &EphemeralStore,
    options: &NormalizeOptions,
    filename: &str,
    raw: Vec<u8>,
) -> Result<IngestedFile> {
    let start = Instant::now();
    let name = base_name(filename).to_string();
    let format = FormatTag::from_filename(&name)?;

    let raw_id = match format {
        FormatTag::PageFormat => None,
        _ => Some(
            store
                .put(
                    ObjectKind::SourceDocument,
                    StoredFormat::RawUploaded,
                    Some(name.clone()),
                    raw.clone(),
                )
                .await?,
        ),
    };

    let canonical = match normalize(raw, format, options).await {
        Ok(doc) => doc,
        Err(e) => {
            if let Some(id) = raw_id {
                discard_raw(store, id).await;
            }
            return Err(e);
        }
    };

    let pages = canonical.page_count();
    let id = store
        .put(
            ObjectKind::SourceDocument,
            StoredFormat::Canonical,
            Some(name.clone()),
            canonical.into_bytes(),
        )
        .await?;

    info!(
        %id,
        format = %format,
        pages,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Ingested '{}'",
        name
    );
    Ok(IngestedFile {
        id,
        original_name: name,
        format,
        pages,
    })
}

async fn discard_raw(store: &EphemeralStore, id: DocumentId) {
    match store.evict(Partition::Inbound, id).await {
        Ok(_) => debug!(%id, "Discarded raw upload after failed normalization"),
        Err(e) => warn!(%id, "Failed to discard raw upload: {}", e),
    }
}

/// Ingest every file of a batch independently, at most `concurrency` at a
/// time. Both lists of the report keep the input order.
pub async fn ingest_batch(
    store: &EphemeralStore,
    options: &NormalizeOptions,
    uploads: Vec<Upload>,
    concurrency: usize,
    progress: Option<&dyn IngestProgressCallback>,
) -> IngestReport {
    let total = uploads.len();
    if let Some(cb) = progress {
        cb.on_batch_start(total);
    }

    let outcomes: Vec<(String, Result<IngestedFile>)> = stream::iter(uploads.into_iter().enumerate())
        .map(|(index, upload)| async move {
            let name = base_name(&upload.filename).to_string();
            let result = ingest(store, options, &upload.filename, upload.bytes).await;
            if let Some(cb) = progress {
                match &result {
                    Ok(file) => cb.on_file_complete(index, total, &file.original_name, file.pages),
                    Err(e) => cb.on_file_error(index, total, &name, &e.public_message()),
                }
            }
            (name, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut report = IngestReport::default();
    for (name, result) in outcomes {
        match result {
            Ok(file) => report.files.push(file),
            Err(e) => {
                log_rejection(&name, &e);
                report.rejected.push(RejectedFile {
                    original_name: name,
                    reason: e.public_message(),
                });
            }
        }
    }

    if let Some(cb) = progress {
        cb.on_batch_complete(total, report.files.len());
    }
    info!(
        accepted = report.files.len(),
        rejected = report.rejected.len(),
        "Batch ingestion complete"
    );
    report
}

fn log_rejection(name: &str, e: &DocWeaveError) {
    match e.status_class() {
        crate::error::ErrorClass::Resource => warn!("Rejected '{}' (server-side failure): {}", name, e),
        _ => info!("Rejected '{}': {}", name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::pdf::tests::sample_pdf;
    use crate::progress::IngestProgressCallback;
    use crate::store::Retention;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn store() -> (TempDir, EphemeralStore) {
        let dir = TempDir::new().unwrap();
        let store = EphemeralStore::open(dir.path(), Retention::default()).unwrap();
        (dir, store)
    }

    fn png() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 128, 255, 100])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn inbound_entries(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("inbound")).unwrap().count()
    }

    #[test]
    fn base_name_strips_client_paths() {
        assert_eq!(base_name("C:\\Users\\me\\scan.png"), "scan.png");
        assert_eq!(base_name("../../a.pdf"), "a.pdf");
        assert_eq!(base_name("plain.docx"), "plain.docx");
    }

    #[tokio::test]
    async fn pdf_is_stored_verbatim() {
        let (_dir, store) = store();
        let raw = sample_pdf(2);
        let file = ingest(&store, &NormalizeOptions::default(), "a.pdf", raw.clone())
            .await
            .unwrap();
        assert_eq!(file.pages, 2);
        assert_eq!(file.format, FormatTag::PageFormat);
        assert_eq!(store.get_canonical(file.id).await.unwrap().bytes, raw);
    }

    #[tokio::test]
    async fn image_keeps_raw_upload_alongside_canonical() {
        let (dir, store) = store();
        let file = ingest(&store, &NormalizeOptions::default(), "b.PNG", png())
            .await
            .unwrap();
        assert_eq!(file.format, FormatTag::Image);
        assert_eq!(file.pages, 1);
        assert_eq!(inbound_entries(&dir), 2);
    }

    #[tokio::test]
    async fn unsupported_extension_stores_nothing() {
        let (dir, store) = store();
        let err = ingest(&store, &NormalizeOptions::default(), "notes.txt", b"hi".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, DocWeaveError::UnsupportedExtension { .. }));
        assert_eq!(inbound_entries(&dir), 0);
    }

    #[tokio::test]
    async fn failed_normalization_discards_raw_upload() {
        let (dir, store) = store();
        let err = ingest(&store, &NormalizeOptions::default(), "broken.jpg", b"nope".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, DocWeaveError::CorruptDocument { .. }));
        assert_eq!(inbound_entries(&dir), 0);
    }

    #[tokio::test]
    async fn batch_keeps_order_and_isolates_failures() {
        let (_dir, store) = store();
        let uploads = vec![
            Upload::new("one.pdf", sample_pdf(1)),
            Upload::new("bad.txt", b"x".to_vec()),
            Upload::new("two.png", png()),
            Upload::new("letter.docx", b"PK\x03\x04".to_vec()),
            Upload::new("three.pdf", sample_pdf(3)),
        ];

        struct Count(AtomicUsize, AtomicUsize);
        impl IngestProgressCallback for Count {
            fn on_file_complete(&self, _: usize, _: usize, _: &str, _: usize) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn on_file_error(&self, _: usize, _: usize, _: &str, _: &str) {
                self.1.fetch_add(1, Ordering::SeqCst);
            }
        }
        let counter = Count(AtomicUsize::new(0), AtomicUsize::new(0));

        let report = ingest_batch(&store, &NormalizeOptions::default(), uploads, 3, Some(&counter)).await;

        let names: Vec<_> = report.files.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names, vec!["one.pdf", "two.png", "three.pdf"]);
        assert_eq!(report.files[2].pages, 3);
        let rejected: Vec<_> = report.rejected.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(rejected, vec!["bad.txt", "letter.docx"]);
        assert!(report.rejected[1].reason.contains("not available"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
        assert_eq!(counter.1.load(Ordering::SeqCst), 2);
    }
}
