//! Fixtures shared by the integration tests: in-memory PDFs and images, and
//! a service over a temporary store.

#![allow(dead_code)]

use docweave::{DocWeave, ServiceConfig, Upload};
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;
use tempfile::TempDir;

/// Service with no DOCX renderer over a fresh temporary store. Keep the
/// `TempDir` alive for the duration of the test.
pub fn service() -> (TempDir, DocWeave) {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig::builder().store_root(dir.path()).build().unwrap();
    let service = DocWeave::with_office(config, None).unwrap();
    (dir, service)
}

/// PDF whose page `i` draws `"{label} {i}"`.
pub fn labelled_pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));

    let mut kids = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("{label} {i}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("MediaBox", Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()])),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter([(
                    "Font",
                    Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
                )])),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(pages as i64)),
            ("Kids", Object::Array(kids)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Half-transparent RGBA PNG.
pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x % 2 == 0 {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Ingest one file and return its identifier.
pub async fn ingest_one(service: &DocWeave, name: &str, bytes: Vec<u8>) -> docweave::DocumentId {
    let report = service.ingest(vec![Upload::new(name, bytes)]).await;
    assert!(report.rejected.is_empty(), "rejected: {:?}", report.rejected);
    report.files[0].id
}

/// `(content, rotate)` per output page. `content` is the drawn label, or
/// `"image"` for a page that paints an image XObject.
pub fn describe(bytes: &[u8]) -> Vec<(String, i64)> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let rotate = page.get(b"Rotate").and_then(|o| o.as_i64()).unwrap_or(0);
            let content = doc.get_page_content(id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let label = match (text.find('('), text.find(')')) {
                (Some(start), Some(end)) => text[start + 1..end].to_string(),
                _ if text.contains("Do") => "image".to_string(),
                _ => String::new(),
            };
            (label, rotate)
        })
        .collect()
}

/// Every image XObject stream in the document.
pub fn image_streams(bytes: &[u8]) -> Vec<Dictionary> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.objects
        .values()
        .filter_map(|o| match o {
            Object::Stream(s) if s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice()) => {
                Some(s.dict.clone())
            }
            _ => None,
        })
        .collect()
}
