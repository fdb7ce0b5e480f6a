//! Raster image → single-page PDF.
//!
//! The page is exactly the image: one XObject drawn over the full
//! `MediaBox`, whose size is the pixel size at the configured resolution.
//! Transparency is flattened onto an opaque background before embedding, so
//! the PDF never carries an `SMask` and always uses `DeviceRGB`.

use crate::error::{DocWeaveError, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;
use tracing::debug;

/// Decode `raw` (PNG or JPEG) and wrap it in a one-page PDF.
pub fn image_to_pdf(raw: &[u8], dpi: f32, background: [u8; 3]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(raw).map_err(|e| DocWeaveError::CorruptDocument {
        detail: format!("Failed to decode image: {e}"),
    })?;
    if img.width() == 0 || img.height() == 0 {
        return Err(DocWeaveError::CorruptDocument {
            detail: "image has zero size".into(),
        });
    }
    let had_alpha = img.color().has_alpha();
    let rgb = flatten(img, background);
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(|e| DocWeaveError::Internal(format!("JPEG encoding failed: {e}")))?;

    debug!(
        "Embedding {}x{} px image ({} bytes JPEG, alpha flattened: {})",
        width,
        height,
        jpeg.len(),
        had_alpha
    );

    let scale = 72.0 / dpi;
    let page_w = width as f32 * scale;
    let page_h = height as f32 * scale;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(
        Stream::new(
            Dictionary::from_iter([
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(i64::from(width))),
                ("Height", Object::Integer(i64::from(height))),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
                ("Filter", Object::Name(b"DCTDecode".to_vec())),
            ]),
            jpeg,
        )
        .with_compression(false),
    );

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(page_w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(page_h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| DocWeaveError::Internal(format!("content stream encoding failed: {e}")))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

    let resources = Dictionary::from_iter([(
        "XObject",
        Object::Dictionary(Dictionary::from_iter([("Im0", Object::Reference(image_id))])),
    )]);
    let page_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_w),
                Object::Real(page_h),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
    ]));

    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| DocWeaveError::SerializationError {
            detail: format!("Failed to save image PDF: {e}"),
        })?;
    Ok(out)
}

/// Composite onto `background` and drop the alpha channel.
fn flatten(img: DynamicImage, background: [u8; 3]) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let [br, bg, bb] = background;
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([blend(r, br, a), blend(g, bg, a), blend(b, bb, a)])
    })
}

fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let (fg, bg, a) = (u32::from(fg), u32::from(bg), u32::from(alpha));
    ((fg * a + bg * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn only_image_xobject(doc: &Document) -> &Stream {
        doc.objects
            .values()
            .find_map(|o| match o {
                Object::Stream(s) if s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice()) => Some(s),
                _ => None,
            })
            .expect("image xobject")
    }

    #[test]
    fn blend_extremes() {
        assert_eq!(blend(10, 255, 255), 10);
        assert_eq!(blend(10, 255, 0), 255);
        assert_eq!(blend(0, 255, 128), 127);
    }

    #[test]
    fn rgba_png_becomes_opaque_rgb_page() {
        let mut rgba = RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255]));
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let pdf = image_to_pdf(&png(DynamicImage::ImageRgba8(rgba)), 100.0, [255, 255, 255]).unwrap();

        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let xobj = only_image_xobject(&doc);
        assert!(xobj.dict.get(b"SMask").is_err());
        assert_eq!(xobj.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceRGB");
        assert_eq!(xobj.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");

        let decoded = image::load_from_memory(&xobj.content).unwrap();
        assert!(!decoded.color().has_alpha());
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn transparent_pixels_take_background() {
        let rgba = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 0]));
        let rgb = flatten(DynamicImage::ImageRgba8(rgba), [255, 255, 255]);
        assert!(rgb.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn page_size_follows_resolution() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, Rgb([1, 2, 3])));
        let pdf = image_to_pdf(&png(img), 100.0, [255, 255, 255]).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let media_box = doc.get_dictionary(page_id).unwrap().get(b"MediaBox").unwrap().as_array().unwrap().clone();
        let w = match media_box[2] {
            Object::Real(v) => v,
            Object::Integer(v) => v as f32,
            _ => panic!("bad MediaBox"),
        };
        assert!((w - 72.0).abs() < 0.01, "width {w}");
    }

    #[test]
    fn undecodable_image_is_corrupt() {
        let err = image_to_pdf(b"definitely not a png", 100.0, [255, 255, 255]).unwrap_err();
        assert!(matches!(err, DocWeaveError::CorruptDocument { .. }));
    }
}
