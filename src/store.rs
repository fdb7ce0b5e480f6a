//! Ephemeral, identifier-addressed document store.
//!
//! ## Layout
//!
//! ```text
//! <root>/inbound/<id>.dwv    normalized sources (+ raw uploads)
//! <root>/outbound/<id>.dwv   composed outputs
//! <root>/.staging/           temp files not yet renamed into place
//! ```
//!
//! Every entry is ONE file: `DWV1` magic, a little-endian `u32` header
//! length, a JSON [`EntryHeader`] carrying the `(kind, format)` tag and the
//! creation time, then the blob. Keeping tag and bytes in the same file means
//! a lookup never has to guess an entry's format from its name.
//!
//! ## Concurrency
//!
//! There is no store-wide lock. Each operation touches exactly one file:
//!
//! * `put` writes into `.staging` and renames into place without clobbering,
//!   so readers only ever see complete entries.
//! * `get` opens the file once and reads it to the end. If the sweeper
//!   unlinks the entry first, the open fails and the caller sees
//!   [`DocWeaveError::NotFound`]; if it unlinks afterwards, the open handle
//!   keeps the data readable until the read completes.
//! * `sweep` unlinks single files and treats "already gone" as success.

use crate::error::{DocWeaveError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAGIC: &[u8; 4] = b"DWV1";
const ENTRY_EXT: &str = "dwv";
const STAGING_DIR: &str = ".staging";
/// Upper bound for a JSON header; anything larger is a corrupt entry.
const MAX_HEADER_LEN: u32 = 64 * 1024;

// ── Identifiers and tags ─────────────────────────────────────────────────

/// Opaque 128-bit random identifier issued by the store.
///
/// Rendered and parsed only in the hyphenated lowercase UUID form, so an
/// identifier can never be mistaken for (or smuggle in) a filesystem path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// A fresh random identifier. The store issues these on `put`.
    pub fn random() -> Self {
        DocumentId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = DocWeaveError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DocWeaveError::InvalidIdentifier { input: s.to_string() };
        let uuid = Uuid::try_parse(s).map_err(|_| invalid())?;
        // Reject braced / urn / simple spellings: one identifier, one string.
        if uuid.hyphenated().to_string() != s {
            return Err(invalid());
        }
        Ok(DocumentId(uuid))
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DocWeaveError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.to_string()
    }
}

/// Logical subdivision of the store, each with its own retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Uploaded sources, normalized or raw.
    Inbound,
    /// Composed output documents.
    Outbound,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Inbound, Partition::Outbound];

    fn dir_name(self) -> &'static str {
        match self {
            Partition::Inbound => "inbound",
            Partition::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.dir_name())
    }
}

/// What an entry is. Determines its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    SourceDocument,
    OutputDocument,
}

impl ObjectKind {
    pub fn partition(self) -> Partition {
        match self {
            ObjectKind::SourceDocument => Partition::Inbound,
            ObjectKind::OutputDocument => Partition::Outbound,
        }
    }
}

/// Representation of the stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredFormat {
    /// A validated PDF.
    Canonical,
    /// Bytes exactly as uploaded, before normalization.
    RawUploaded,
}

/// Header persisted in front of every blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHeader {
    id: DocumentId,
    kind: ObjectKind,
    format: StoredFormat,
    name: Option<String>,
    created_at: DateTime<Utc>,
    len: u64,
}

/// A complete store entry as returned by [`EphemeralStore::get`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub id: DocumentId,
    pub kind: ObjectKind,
    pub format: StoredFormat,
    /// Declared filename of a raw upload, or sanitized name of an output.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub bytes: Vec<u8>,
}

// ── Retention ────────────────────────────────────────────────────────────

/// Maximum entry age per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub inbound: Duration,
    pub outbound: Duration,
}

impl Retention {
    pub fn uniform(max_age: Duration) -> Self {
        Self {
            inbound: max_age,
            outbound: max_age,
        }
    }

    pub fn max_age(&self, partition: Partition) -> Duration {
        match partition {
            Partition::Inbound => self.inbound,
            Partition::Outbound => self.outbound,
        }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(30 * 60))
    }
}

/// `now - created_at > max_age`. Entries stamped in the future never expire
/// early.
fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match now.signed_duration_since(created_at).to_std() {
        Ok(age) => age > max_age,
        Err(_) => false,
    }
}

/// Outcome of one sweep over one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entry files examined.
    pub scanned: usize,
    /// Entries deleted by this sweep.
    pub removed: usize,
    /// Entries still within their retention window.
    pub retained: usize,
    /// Expired entries someone else removed first.
    pub vanished: usize,
    /// Entries that could not be inspected or deleted (retried next sweep).
    pub failed: usize,
    /// Orphaned staging files removed.
    pub staging_removed: usize,
}

// ── Store ────────────────────────────────────────────────────────────────

/// Time-bounded blob store with an inbound and an outbound partition.
#[derive(Debug, Clone)]
pub struct EphemeralStore {
    root: PathBuf,
    retention: Retention,
}

impl EphemeralStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>, retention: Retention) -> Result<Self> {
        let store = Self {
            root: root.as_ref().to_path_buf(),
            retention,
        };
        store.ensure_layout()?;
        Ok(store)
    }

    /// Create the partition and staging directories.
    ///
    /// Synchronous: it runs once at startup and is not worth an async
    /// constructor.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.partition_dir(Partition::Inbound),
            self.partition_dir(Partition::Outbound),
            self.staging_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| DocWeaveError::store(&dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.dir_name())
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn entry_path(&self, partition: Partition, id: DocumentId) -> PathBuf {
        self.partition_dir(partition)
            .join(format!("{}.{}", id, ENTRY_EXT))
    }

    /// Persist a new immutable entry and return its fresh identifier.
    pub async fn put(
        &self,
        kind: ObjectKind,
        format: StoredFormat,
        name: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<DocumentId> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.put_blocking(kind, format, name, &bytes))
            .await
            .map_err(|e| DocWeaveError::Internal(format!("Store write task panicked: {e}")))?
    }

    fn put_blocking(
        &self,
        kind: ObjectKind,
        format: StoredFormat,
        name: Option<String>,
        bytes: &[u8],
    ) -> Result<DocumentId> {
        let staging = self.staging_dir();

        // A v4 collision is astronomically unlikely, but an identifier must
        // never alias a live entry, so the rename refuses to clobber and we
        // draw again.
        for _ in 0..3 {
            let header = EntryHeader {
                id: DocumentId::random(),
                kind,
                format,
                name: name.clone(),
                created_at: Utc::now(),
                len: bytes.len() as u64,
            };
            let header_json = serde_json::to_vec(&header)
                .map_err(|e| DocWeaveError::Internal(format!("header encode: {e}")))?;

            let mut tmp = tempfile::NamedTempFile::new_in(&staging)
                .map_err(|e| DocWeaveError::store(&staging, e))?;
            let write = |f: &mut fs::File| -> std::io::Result<()> {
                f.write_all(MAGIC)?;
                f.write_all(&(header_json.len() as u32).to_le_bytes())?;
                f.write_all(&header_json)?;
                f.write_all(bytes)?;
                f.sync_all()
            };
            write(tmp.as_file_mut()).map_err(|e| DocWeaveError::store(tmp.path(), e))?;

            let dest = self.entry_path(kind.partition(), header.id);
            match tmp.persist_noclobber(&dest) {
                Ok(_) => {
                    debug!(
                        id = %header.id,
                        partition = %kind.partition(),
                        bytes = bytes.len(),
                        "Stored entry"
                    );
                    return Ok(header.id);
                }
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    warn!(id = %header.id, "Identifier collision; drawing a new one");
                    continue;
                }
                Err(e) => return Err(DocWeaveError::store(dest, e.error)),
            }
        }

        Err(DocWeaveError::Internal(
            "could not allocate a unique identifier".into(),
        ))
    }

    /// Exact lookup in `partition`.
    ///
    /// Entries older than the partition's retention are reported as
    /// [`DocWeaveError::NotFound`] even if no sweep has removed them yet.
    pub async fn get(&self, partition: Partition, id: DocumentId) -> Result<StoredObject> {
        self.get_at(partition, id, Utc::now()).await
    }

    /// [`get`](Self::get) against an explicit clock.
    pub async fn get_at(
        &self,
        partition: Partition,
        id: DocumentId,
        now: DateTime<Utc>,
    ) -> Result<StoredObject> {
        let path = self.entry_path(partition, id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%id, %partition, "Lookup miss");
                return Err(DocWeaveError::not_found(id));
            }
            Err(e) => return Err(DocWeaveError::store(path, e)),
        };

        let (header, body) = decode_entry(&raw).map_err(|e| {
            warn!(%id, "Unreadable store entry: {}", e);
            DocWeaveError::store(&path, e)
        })?;

        if header.id != id {
            warn!(%id, header_id = %header.id, "Entry header does not match its file name");
            return Err(DocWeaveError::not_found(id));
        }
        if is_expired(header.created_at, now, self.retention.max_age(partition)) {
            debug!(%id, %partition, "Lookup hit an expired entry");
            return Err(DocWeaveError::not_found(id));
        }

        Ok(StoredObject {
            id,
            kind: header.kind,
            format: header.format,
            name: header.name,
            created_at: header.created_at,
            bytes: body.to_vec(),
        })
    }

    /// Look up a normalized source document. Raw uploads are not canonical
    /// and are reported as not found.
    pub async fn get_canonical(&self, id: DocumentId) -> Result<StoredObject> {
        let object = self.get(Partition::Inbound, id).await?;
        if object.kind != ObjectKind::SourceDocument || object.format != StoredFormat::Canonical {
            debug!(%id, format = ?object.format, "Entry is not a canonical source");
            return Err(DocWeaveError::not_found(id));
        }
        Ok(object)
    }

    /// Remove an entry now. Returns `false` when it was already gone.
    pub async fn evict(&self, partition: Partition, id: DocumentId) -> Result<bool> {
        let path = self.entry_path(partition, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%id, %partition, "Evicted entry");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DocWeaveError::store(path, e)),
        }
    }

    /// Delete every entry of `partition` older than `max_age`.
    ///
    /// Runs on the blocking pool. Never fails as a whole: per-entry problems
    /// are logged and counted in the report.
    pub async fn sweep(&self, partition: Partition, max_age: Duration) -> SweepReport {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.sweep_at(partition, max_age, Utc::now())).await {
            Ok(report) => report,
            Err(e) => {
                warn!(%partition, "Sweep task panicked: {}", e);
                SweepReport {
                    failed: 1,
                    ..SweepReport::default()
                }
            }
        }
    }

    /// Blocking sweep against an explicit clock.
    pub fn sweep_at(&self, partition: Partition, max_age: Duration, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let dir = self.partition_dir(partition);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(%partition, "Cannot list {}: {}", dir.display(), e);
                report.failed += 1;
                return report;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(%partition, "Directory iteration error: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            report.scanned += 1;

            let expired = match read_header(&path) {
                Ok(header) => is_expired(header.created_at, now, max_age),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.vanished += 1;
                    continue;
                }
                Err(e) => {
                    // No trustworthy timestamp inside; fall back to the mtime.
                    debug!("Unreadable header in {}: {}", path.display(), e);
                    match modified_at(&path) {
                        Some(mtime) => is_expired(mtime, now, max_age),
                        None => {
                            warn!("Cannot determine age of {}", path.display());
                            report.failed += 1;
                            continue;
                        }
                    }
                }
            };

            if !expired {
                report.retained += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Swept {}", path.display());
                    report.removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => report.vanished += 1,
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report.staging_removed = self.sweep_staging(max_age, now);

        if report.removed > 0 || report.failed > 0 {
            info!(
                %partition,
                removed = report.removed,
                retained = report.retained,
                failed = report.failed,
                "Sweep complete"
            );
        } else {
            debug!(%partition, retained = report.retained, "Sweep complete; nothing expired");
        }
        report
    }

    /// Remove temp files left behind by writers that died mid-put.
    fn sweep_staging(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let Ok(entries) = fs::read_dir(self.staging_dir()) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| modified_at(p).is_some_and(|m| is_expired(m, now, max_age)))
            .filter(|p| fs::remove_file(p).is_ok())
            .count()
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn invalid_data(msg: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

/// Split a full entry into its header and blob.
fn decode_entry(raw: &[u8]) -> std::io::Result<(EntryHeader, &[u8])> {
    if raw.len() < 8 || &raw[..4] != MAGIC {
        return Err(invalid_data("bad magic"));
    }
    let header_len = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    if header_len > MAX_HEADER_LEN {
        return Err(invalid_data("header too large"));
    }
    let body_start = 8 + header_len as usize;
    if raw.len() < body_start {
        return Err(invalid_data("truncated header"));
    }
    let header: EntryHeader = serde_json::from_slice(&raw[8..body_start])
        .map_err(|e| invalid_data(format!("header: {e}")))?;
    let body = &raw[body_start..];
    if body.len() as u64 != header.len {
        return Err(invalid_data(format!(
            "length mismatch: header says {}, found {}",
            header.len,
            body.len()
        )));
    }
    Ok((header, body))
}

/// Read only the header of an entry file.
fn read_header(path: &Path) -> std::io::Result<EntryHeader> {
    let mut f = fs::File::open(path)?;
    let mut prefix = [0u8; 8];
    f.read_exact(&mut prefix)?;
    if &prefix[..4] != MAGIC {
        return Err(invalid_data("bad magic"));
    }
    let header_len = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
    if header_len > MAX_HEADER_LEN {
        return Err(invalid_data("header too large"));
    }
    let mut buf = vec![0u8; header_len as usize];
    f.read_exact(&mut buf)?;
    serde_json::from_slice(&buf).map_err(|e| invalid_data(format!("header: {e}")))
}
