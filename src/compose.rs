//! Page composition: an ordered list of `(document, page, rotation)`
//! references → one new PDF.
//!
//! ## Algorithm
//!
//! ```text
//! references ──▶ resolve distinct ids (once each) ──▶ validate per reference
//!            ──▶ copy page objects in request order ──▶ prune ──▶ serialise
//! ```
//!
//! Every reference yields a *fresh* page object, so the same source page can
//! appear several times with different rotations. Inheritable attributes
//! (`Resources`, `MediaBox`, `CropBox`, `Rotate`) are copied down from the
//! source page tree onto the new page because the source `Pages` nodes are
//! not carried over. Content streams and resources are moved as-is.
//!
//! A reference that cannot be honoured is recorded as a
//! [`SkippedReference`] and the rest of the composition proceeds. Only when
//! *nothing* resolves does the call fail, with
//! [`DocWeaveError::NoValidPages`].

use crate::error::{DocWeaveError, ReferenceError, Result};
use crate::normalize::{pdf, CanonicalDocument};
use crate::store::{DocumentId, EphemeralStore};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Guard against cyclic `Parent` chains in malformed sources.
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page and all its ancestors lack a `MediaBox`.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

// ── Request types ────────────────────────────────────────────────────────

/// Clockwise page rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(self) -> i64 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    /// Apply on top of an existing `/Rotate` value, normalized to `[0, 360)`.
    pub fn apply_to(self, existing: i64) -> i64 {
        (existing + self.degrees()).rem_euclid(360)
    }
}

impl TryFrom<i64> for Rotation {
    type Error = DocWeaveError;

    fn try_from(degrees: i64) -> Result<Self> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Quarter),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::ThreeQuarter),
            _ => Err(DocWeaveError::InvalidRotation { degrees }),
        }
    }
}

impl From<Rotation> for i64 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}

/// One page of the output: page `page_index` (0-based) of `document_id`,
/// rotated by `rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference {
    pub document_id: DocumentId,
    pub page_index: usize,
    #[serde(default)]
    pub rotation: Rotation,
}

impl PageReference {
    pub fn new(document_id: DocumentId, page_index: usize, rotation: Rotation) -> Self {
        Self {
            document_id,
            page_index,
            rotation,
        }
    }
}

/// Output pages in order plus the requested output filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRequest {
    pub pages: Vec<PageReference>,
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

pub(crate) fn default_output_name() -> String {
    "document.pdf".to_string()
}

// ── Result types ─────────────────────────────────────────────────────────

/// A reference that was dropped from the output, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedReference {
    /// 0-based position of the reference in the request.
    pub position: usize,
    pub document_id: DocumentId,
    pub page_index: usize,
    pub reason: ReferenceError,
}

/// A composed document and the references that did not make it in.
#[derive(Debug, Clone)]
pub struct Composition {
    pub document: CanonicalDocument,
    pub skipped: Vec<SkippedReference>,
}

// ── Entry point ──────────────────────────────────────────────────────────

/// Compose `references` into a new document.
///
/// Each distinct identifier is looked up once. A source evicted by the
/// sweeper mid-request is reported as
/// [`ReferenceError::UnresolvedDocument`], never as a crash.
pub async fn compose(store: &EphemeralStore, references: &[PageReference]) -> Result<Composition> {
    if references.is_empty() {
        return Err(DocWeaveError::EmptyComposition);
    }

    let mut distinct: Vec<DocumentId> = Vec::new();
    for r in references {
        if !distinct.contains(&r.document_id) {
            distinct.push(r.document_id);
        }
    }

    let lookups = futures::future::join_all(distinct.iter().map(|&id| store.get_canonical(id))).await;
    let sources: Vec<(DocumentId, Option<Vec<u8>>)> = distinct
        .into_iter()
        .zip(lookups)
        .map(|(id, lookup)| match lookup {
            Ok(object) => (id, Some(object.bytes)),
            Err(e) if e.is_not_found() => {
                debug!(%id, "Source document not found");
                (id, None)
            }
            Err(e) => {
                warn!(%id, "Source document unreadable: {}", e);
                (id, None)
            }
        })
        .collect();

    let references = references.to_vec();
    let composition = tokio::task::spawn_blocking(move || assemble(sources, &references))
        .await
        .map_err(|e| DocWeaveError::Internal(format!("Compose task panicked: {e}")))??;

    info!(
        pages = composition.document.page_count(),
        skipped = composition.skipped.len(),
        "Composition complete"
    );
    Ok(composition)
}

// ── Assembly (blocking) ──────────────────────────────────────────────────

/// A parsed source renumbered into its own object-id range.
struct Source {
    doc: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
    used: bool,
}

fn assemble(
    sources: Vec<(DocumentId, Option<Vec<u8>>)>,
    references: &[PageReference],
) -> Result<Composition> {
    // Parse every resolved source once, into disjoint id ranges.
    let mut next_id: u32 = 1;
    let mut parsed: HashMap<DocumentId, Source> = HashMap::new();
    for (id, bytes) in sources {
        let Some(bytes) = bytes else { continue };
        match pdf::load(&bytes) {
            Ok(mut doc) => {
                doc.renumber_objects_with(next_id);
                next_id = doc.max_id + 1;
                let pages = doc.get_pages().into_values().collect();
                parsed.insert(
                    id,
                    Source {
                        doc,
                        pages,
                        used: false,
                    },
                );
            }
            Err(e) => warn!(%id, "Stored canonical document failed to parse: {}", e),
        }
    }

    // Validate every reference before touching the output.
    let mut skipped = Vec::new();
    let mut valid: Vec<(DocumentId, ObjectId, Rotation)> = Vec::new();
    for (position, r) in references.iter().enumerate() {
        let reason = match parsed.get_mut(&r.document_id) {
            None => ReferenceError::UnresolvedDocument {
                document_id: r.document_id.to_string(),
            },
            Some(source) => match source.pages.get(r.page_index) {
                Some(&page_id) => {
                    source.used = true;
                    valid.push((r.document_id, page_id, r.rotation));
                    continue;
                }
                None => ReferenceError::PageIndexOutOfRange {
                    page_index: r.page_index,
                    page_count: source.pages.len(),
                },
            },
        };
        match reason {
            ReferenceError::UnresolvedDocument { .. } => {
                debug!(position, document_id = %r.document_id, "Skipping reference: {}", reason)
            }
            ReferenceError::PageIndexOutOfRange { .. } => {
                warn!(position, document_id = %r.document_id, page_index = r.page_index, "Skipping reference: {}", reason)
            }
        }
        skipped.push(SkippedReference {
            position,
            document_id: r.document_id,
            page_index: r.page_index,
            reason,
        });
    }

    if valid.is_empty() {
        return Err(DocWeaveError::NoValidPages { failures: skipped });
    }

    let mut output = Document::with_version("1.7");
    output.max_id = next_id - 1;
    let pages_id = output.new_object_id();

    let mut kids = Vec::with_capacity(valid.len());
    let mut emitted: HashSet<ObjectId> = HashSet::new();
    // Source annotation ids and the output page that now owns them.
    let mut annotation_owners: Vec<(ObjectId, ObjectId)> = Vec::new();
    for (document_id, page_id, rotation) in &valid {
        let source = parsed
            .get(document_id)
            .ok_or_else(|| DocWeaveError::Internal("validated source vanished".into()))?;
        let mut page = materialize_page(&source.doc, *page_id)?;
        let existing = page.get(b"Rotate").and_then(|o| o.as_i64()).unwrap_or(0);
        page.set("Rotate", Object::Integer(rotation.apply_to(existing)));
        page.set("Parent", Object::Reference(pages_id));

        let new_page_id = output.new_object_id();
        let annotations = page_annotations(&source.doc, &page);
        if emitted.insert(*page_id) {
            annotation_owners.extend(annotations.iter().filter_map(|a| match a {
                Object::Reference(id) => Some((*id, new_page_id)),
                _ => None,
            }));
        } else if !annotations.is_empty() {
            // A repeated page gets its own copy of every annotation; an
            // annotation belongs to exactly one page.
            let copies = annotations
                .iter()
                .filter_map(|a| {
                    let mut dict = match a {
                        Object::Reference(id) => source.doc.get_dictionary(*id).ok()?.clone(),
                        Object::Dictionary(dict) => dict.clone(),
                        _ => return None,
                    };
                    dict.set("P", Object::Reference(new_page_id));
                    Some(Object::Reference(output.add_object(dict)))
                })
                .collect();
            page.set("Annots", Object::Array(copies));
        }

        output.objects.insert(new_page_id, Object::Dictionary(page));
        kids.push(Object::Reference(new_page_id));
    }

    // Move everything but the page tree structure over from used sources.
    for source in parsed.into_values().filter(|s| s.used) {
        for (object_id, object) in source.doc.objects {
            match object.type_name().unwrap_or("") {
                "Catalog" | "Pages" | "Page" | "Outlines" | "Outline" => {}
                _ => {
                    output.objects.insert(object_id, object);
                }
            }
        }
    }

    for (annotation_id, owner) in annotation_owners {
        if let Some(Object::Dictionary(dict)) = output.objects.get_mut(&annotation_id) {
            dict.set("P", Object::Reference(owner));
        }
    }

    let page_count = kids.len();
    output.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(page_count as i64)),
        ])),
    );
    let catalog_id = output.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    output.trailer.set("Root", Object::Reference(catalog_id));

    let pruned = output.prune_objects().len();
    let dangling = null_dangling_references(&mut output);
    output.renumber_objects();
    debug!(pruned, dangling, objects = output.objects.len(), "Output object graph finalized");

    let mut bytes = Vec::new();
    output
        .save_to(&mut bytes)
        .map_err(|e| DocWeaveError::SerializationError {
            detail: format!("Failed to save composed PDF: {e}"),
        })?;

    let document = CanonicalDocument::from_bytes(bytes).map_err(|e| DocWeaveError::SerializationError {
        detail: format!("Composed PDF failed validation: {e}"),
    })?;
    Ok(Composition { document, skipped })
}

/// Clone a page dictionary with its inherited attributes made explicit.
fn materialize_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| DocWeaveError::Internal(format!("page object {page_id:?}: {e}")))?
        .clone();

    for key in INHERITABLE {
        if page.has(key.as_bytes()) {
            continue;
        }
        if let Some(value) = inherited(doc, &page, key.as_bytes()) {
            page.set(key, value);
        }
    }
    if !page.has(b"MediaBox") {
        page.set(
            "MediaBox",
            Object::Array(DEFAULT_MEDIA_BOX.iter().map(|&v| Object::Integer(v)).collect()),
        );
    }
    Ok(page)
}

/// Entries of a page's `/Annots` array, which may itself be indirect.
fn page_annotations(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Annots") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .and_then(|o| o.as_array())
            .map(|items| items.clone())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Replace references to objects that were not carried over (source pages,
/// outlines) with `null`, so renumbering cannot alias them onto live objects.
fn null_dangling_references(doc: &mut Document) -> usize {
    let live: BTreeSet<ObjectId> = doc.objects.keys().copied().collect();
    let mut count = 0;
    for object in doc.objects.values_mut() {
        count += null_dangling(object, &live);
    }
    count
}

fn null_dangling(object: &mut Object, live: &BTreeSet<ObjectId>) -> usize {
    match object {
        Object::Reference(id) => {
            if live.contains(id) {
                0
            } else {
                *object = Object::Null;
                1
            }
        }
        Object::Array(items) => items.iter_mut().map(|o| null_dangling(o, live)).sum(),
        Object::Dictionary(dict) => dict.iter_mut().map(|(_, v)| null_dangling(v, live)).sum(),
        Object::Stream(stream) => stream.dict.iter_mut().map(|(_, v)| null_dangling(v, live)).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::pdf::tests::labelled_pdf;
    use crate::store::{ObjectKind, Retention, StoredFormat};
    use tempfile::TempDir;

    /// `(label, rotate)` for each output page, in order.
    fn describe(bytes: &[u8]) -> Vec<(String, i64)> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let page = doc.get_dictionary(id).unwrap();
                let rotate = page.get(b"Rotate").and_then(|o| o.as_i64()).unwrap_or(0);
                let content = doc.get_page_content(id).unwrap();
                let text = String::from_utf8_lossy(&content);
                let start = text.find('(').unwrap() + 1;
                let end = text[start..].find(')').unwrap() + start;
                (text[start..end].to_string(), rotate)
            })
            .collect()
    }

    async fn setup() -> (TempDir, EphemeralStore, DocumentId, DocumentId) {
        let dir = TempDir::new().unwrap();
        let store = EphemeralStore::open(dir.path(), Retention::default()).unwrap();
        let a = store
            .put(ObjectKind::SourceDocument, StoredFormat::Canonical, None, labelled_pdf("a", 2))
            .await
            .unwrap();
        let b = store
            .put(ObjectKind::SourceDocument, StoredFormat::Canonical, None, labelled_pdf("b", 3))
            .await
            .unwrap();
        (dir, store, a, b)
    }

    #[test]
    fn rotation_values() {
        for d in [0, 90, 180, 270] {
            assert_eq!(Rotation::try_from(d).unwrap().degrees(), d);
        }
        for d in [45, -90, 360, 1] {
            assert!(matches!(
                Rotation::try_from(d),
                Err(DocWeaveError::InvalidRotation { degrees }) if degrees == d
            ));
        }
        assert_eq!(Rotation::Quarter.apply_to(270), 0);
        assert_eq!(Rotation::Half.apply_to(-90), 90);
    }

    #[test]
    fn rotation_serde_is_plain_degrees() {
        let r: PageReference = serde_json::from_str(&format!(
            r#"{{"document_id":"{}","page_index":1,"rotation":270}}"#,
            DocumentId::random()
        ))
        .unwrap();
        assert_eq!(r.rotation, Rotation::ThreeQuarter);
        let bad = format!(
            r#"{{"document_id":"{}","page_index":1,"rotation":45}}"#,
            DocumentId::random()
        );
        assert!(serde_json::from_str::<PageReference>(&bad).is_err());
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let (_dir, store, _, _) = setup().await;
        assert!(matches!(
            compose(&store, &[]).await,
            Err(DocWeaveError::EmptyComposition)
        ));
    }

    #[tokio::test]
    async fn interleaves_sources_in_request_order() {
        let (_dir, store, a, b) = setup().await;
        let refs = [
            PageReference::new(b, 2, Rotation::None),
            PageReference::new(a, 0, Rotation::Quarter),
            PageReference::new(b, 0, Rotation::Half),
            PageReference::new(a, 1, Rotation::None),
        ];
        let out = compose(&store, &refs).await.unwrap();
        assert!(out.skipped.is_empty());
        assert_eq!(
            describe(out.document.bytes()),
            vec![
                ("b 2".to_string(), 0),
                ("a 0".to_string(), 90),
                ("b 0".to_string(), 180),
                ("a 1".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn same_page_twice_gets_distinct_rotations() {
        let (_dir, store, a, _) = setup().await;
        let refs = [
            PageReference::new(a, 0, Rotation::Quarter),
            PageReference::new(a, 0, Rotation::ThreeQuarter),
        ];
        let out = compose(&store, &refs).await.unwrap();
        let pages = describe(out.document.bytes());
        assert_eq!(pages, vec![("a 0".to_string(), 90), ("a 0".to_string(), 270)]);
    }

    #[tokio::test]
    async fn inherited_attributes_are_materialized() {
        let (_dir, store, a, _) = setup().await;
        let out = compose(&store, &[PageReference::new(a, 1, Rotation::None)]).await.unwrap();
        let doc = Document::load_mem(out.document.bytes()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }

    #[tokio::test]
    async fn partial_failures_are_reported_with_positions() {
        let (_dir, store, a, _) = setup().await;
        let ghost = DocumentId::random();
        let refs = [
            PageReference::new(ghost, 0, Rotation::None),
            PageReference::new(a, 1, Rotation::None),
            PageReference::new(a, 9, Rotation::None),
        ];
        let out = compose(&store, &refs).await.unwrap();
        assert_eq!(describe(out.document.bytes()), vec![("a 1".to_string(), 0)]);
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(out.skipped[0].position, 0);
        assert!(matches!(out.skipped[0].reason, ReferenceError::UnresolvedDocument { .. }));
        assert_eq!(out.skipped[1].position, 2);
        assert_eq!(
            out.skipped[1].reason,
            ReferenceError::PageIndexOutOfRange {
                page_index: 9,
                page_count: 2
            }
        );
    }

    #[tokio::test]
    async fn nothing_valid_is_an_error() {
        let (_dir, store, a, _) = setup().await;
        let err = compose(&store, &[PageReference::new(a, 5, Rotation::None)])
            .await
            .unwrap_err();
        match err {
            DocWeaveError::NoValidPages { failures } => assert_eq!(failures.len(), 1),
            other => panic!("expected NoValidPages, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn raw_entries_do_not_resolve() {
        let (_dir, store, _, _) = setup().await;
        let raw = store
            .put(ObjectKind::SourceDocument, StoredFormat::RawUploaded, None, labelled_pdf("r", 1))
            .await
            .unwrap();
        let err = compose(&store, &[PageReference::new(raw, 0, Rotation::None)])
            .await
            .unwrap_err();
        assert!(matches!(err, DocWeaveError::NoValidPages { .. }));
    }

    #[test]
    fn dangling_references_become_null() {
        let mut doc = Document::with_version("1.5");
        let live = doc.add_object(Object::Integer(1));
        let holder = doc.add_object(Object::Array(vec![
            Object::Reference(live),
            Object::Reference((99, 0)),
        ]));
        assert_eq!(null_dangling_references(&mut doc), 1);
        let arr = doc.get_object(holder).unwrap().as_array().unwrap();
        assert!(matches!(arr[0], Object::Reference(id) if id == live));
        assert!(matches!(arr[1], Object::Null));
    }

    /// One-page PDF whose page carries a text annotation.
    fn annotated_pdf() -> Vec<u8> {
        let mut doc = Document::load_mem(&labelled_pdf("n", 1)).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let annot = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Annot".to_vec())),
            ("Subtype", Object::Name(b"Text".to_vec())),
            ("Rect", Object::Array(vec![0.into(), 0.into(), 10.into(), 10.into()])),
            ("P", Object::Reference(page_id)),
        ]));
        doc.get_dictionary_mut(page_id)
            .unwrap()
            .set("Annots", Object::Array(vec![Object::Reference(annot)]));
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn repeated_page_gets_its_own_annotations() {
        let (_dir, store, _, _) = setup().await;
        let n = store
            .put(ObjectKind::SourceDocument, StoredFormat::Canonical, None, annotated_pdf())
            .await
            .unwrap();
        let out = compose(
            &store,
            &[
                PageReference::new(n, 0, Rotation::None),
                PageReference::new(n, 0, Rotation::Quarter),
            ],
        )
        .await
        .unwrap();

        let doc = Document::load_mem(out.document.bytes()).unwrap();
        let mut seen = Vec::new();
        for (_, page_id) in doc.get_pages() {
            let annots = doc
                .get_dictionary(page_id)
                .unwrap()
                .get(b"Annots")
                .unwrap()
                .as_array()
                .unwrap()
                .clone();
            assert_eq!(annots.len(), 1);
            let annot_id = annots[0].as_reference().unwrap();
            let owner = doc.get_dictionary(annot_id).unwrap().get(b"P").unwrap().as_reference().unwrap();
            assert_eq!(owner, page_id);
            seen.push(annot_id);
        }
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Everything logged at WARN or above while `f` runs on this thread.
    fn capture_warnings(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn missing_documents_are_not_warnings() {
        let a = DocumentId::random();
        let ghost = DocumentId::random();
        let refs = [
            PageReference::new(a, 0, Rotation::None),
            PageReference::new(ghost, 0, Rotation::None),
        ];
        let logs = capture_warnings(|| {
            let out = assemble(vec![(a, Some(labelled_pdf("a", 2))), (ghost, None)], &refs).unwrap();
            assert_eq!(out.skipped.len(), 1);
        });
        assert!(!logs.contains("Skipping reference"), "got: {logs}");
    }

    #[test]
    fn out_of_range_pages_are_warnings() {
        let a = DocumentId::random();
        let refs = [
            PageReference::new(a, 0, Rotation::None),
            PageReference::new(a, 9, Rotation::None),
        ];
        let logs = capture_warnings(|| {
            assemble(vec![(a, Some(labelled_pdf("a", 2)))], &refs).unwrap();
        });
        assert!(logs.contains("Skipping reference"), "got: {logs}");
    }
}
