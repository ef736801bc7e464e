//! Watermarking with file-based content: donor PDFs and raster images.

use pdf_stamp::filters;
use pdf_stamp::object::{Dictionary, Object};
use pdf_stamp::watermark::{add_watermarks, Watermark};
use pdf_stamp::{Document, Error};
use std::collections::HashSet;
use std::path::PathBuf;

fn dict(entries: Vec<(&str, Object)>) -> Dictionary {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn host_doc() -> Document {
    let mut doc = Document::new();
    let content = doc.xref.add_object(Object::Stream {
        dict: dict(vec![("Length", Object::Integer(9))]),
        data: bytes::Bytes::from_static(b"0 0 m 1 S"),
    });
    let page = doc.xref.add_object(Object::Dictionary(dict(vec![
        ("Type", Object::Name("Page".to_string())),
        ("Contents", Object::Reference(content)),
        ("Resources", Object::Dictionary(Dictionary::new())),
    ])));
    let pages = doc.xref.add_object(Object::Dictionary(dict(vec![
        ("Type", Object::Name("Pages".to_string())),
        ("Count", Object::Integer(1)),
        ("Kids", Object::Array(vec![Object::Reference(page)])),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        ),
    ])));
    let catalog = doc.xref.add_object(Object::Dictionary(dict(vec![
        ("Type", Object::Name("Catalog".to_string())),
        ("Pages", Object::Reference(pages)),
    ])));
    doc.xref.set_root(catalog);
    doc
}

/// Assemble a one-page donor PDF with a font resource, as raw bytes.
fn donor_pdf_bytes(content: &str) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    let mut offsets = Vec::new();

    buf.extend_from_slice(b"%PDF-1.4\n");

    let objects: Vec<(u32, String)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 595 842 ] >>".to_string(),
        ),
        (
            3,
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> /ProcSet [ /PDF /Text ] >> >>"
                .to_string(),
        ),
        (
            4,
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        ),
        (
            5,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ),
    ];

    for (id, body) in &objects {
        offsets.push(buf.len());
        buf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }

    let xref_offset = buf.len();
    buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    buf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        buf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    buf.extend_from_slice(b"trailer\n<< /Size 6 /Root 1 0 R >>\n");
    buf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());

    buf
}

/// Write a uniquely named fixture into the temp dir.
fn fixture(name: &str, data: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("pdf_stamp_{}_{}", std::process::id(), name));
    std::fs::write(&path, data).unwrap();
    path
}

fn form_of_page(doc: &Document, nr: usize) -> (Dictionary, Vec<u8>) {
    let (_, attrs) = doc.xref.page_dict(nr).unwrap();
    let res = doc.xref.resources_dict(attrs.resources.unwrap()).unwrap();
    let xobjects = res.get("XObject").unwrap().as_dict().unwrap();
    let form_ref = xobjects.get("Fm0").unwrap().as_reference().unwrap();
    match doc.xref.object(form_ref).unwrap() {
        Object::Stream { dict, data } => {
            (dict.clone(), filters::decode_stream(dict, data).unwrap())
        },
        other => panic!("expected stream, got {}", other.type_name()),
    }
}

#[test]
fn test_pdf_donor_watermark_migrates_resources() {
    let donor = fixture("donor.pdf", &donor_pdf_bytes("BT /F1 12 Tf (Hi) Tj ET"));
    let mut doc = host_doc();

    let spec = format!("{}:1,sc:1", donor.display());
    let wm = Watermark::parse(&spec, false).unwrap();
    assert!(wm.is_pdf());

    let selected: HashSet<usize> = [1].into_iter().collect();
    add_watermarks(&mut doc, &selected, &wm).unwrap();

    let (form_dict, form_content) = form_of_page(&doc, 1);
    let text = String::from_utf8_lossy(&form_content);
    assert!(text.ends_with("BT /F1 12 Tf (Hi) Tj ET"));
    assert!(text.contains(" cm "));

    // The form resources are the migrated donor resource dict: its font
    // reference must resolve inside the host table.
    let res_ref = form_dict.get("Resources").unwrap();
    let res = doc.xref.resolve_dict(res_ref).unwrap();
    let f1 = res.get("Font").unwrap().as_dict().unwrap().get("F1").unwrap();
    let font = doc.xref.resolve_dict(f1).unwrap();
    assert_eq!(font.get("BaseFont").unwrap().as_name(), Some("Helvetica"));

    std::fs::remove_file(donor).ok();
}

#[test]
fn test_pdf_donor_unknown_page() {
    let donor = fixture("donor_page.pdf", &donor_pdf_bytes("BT ET"));
    let mut doc = host_doc();

    let spec = format!("{}:2", donor.display());
    let wm = Watermark::parse(&spec, false).unwrap();
    assert_eq!(wm.page, 2);

    let selected: HashSet<usize> = [1].into_iter().collect();
    match add_watermarks(&mut doc, &selected, &wm) {
        Err(Error::UnknownPage(2)) => {},
        other => panic!("unexpected: {:?}", other),
    }

    std::fs::remove_file(donor).ok();
}

#[test]
fn test_pdf_donor_empty_content() {
    let donor = fixture("donor_empty.pdf", &donor_pdf_bytes(""));
    let mut doc = host_doc();

    let spec = donor.display().to_string();
    let wm = Watermark::parse(&spec, false).unwrap();

    let selected: HashSet<usize> = [1].into_iter().collect();
    match add_watermarks(&mut doc, &selected, &wm) {
        Err(Error::NoContent) => {},
        other => panic!("unexpected: {:?}", other),
    }

    std::fs::remove_file(donor).ok();
}

#[test]
fn test_image_watermark_builds_image_form() {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        64,
        32,
        image::Rgb([10, 20, 30]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    let logo = fixture("logo.png", &buf.into_inner());

    let mut doc = host_doc();
    let spec = format!("{},sc:0.5 abs,op:0.4", logo.display());
    let wm = Watermark::parse(&spec, false).unwrap();
    assert!(wm.is_image());

    let selected: HashSet<usize> = [1].into_iter().collect();
    add_watermarks(&mut doc, &selected, &wm).unwrap();

    let (form_dict, form_content) = form_of_page(&doc, 1);
    let text = String::from_utf8_lossy(&form_content);
    // 0.5 x 64 = 32 wide, aspect preserved.
    assert_eq!(text, "q 32.000000 0 0 16.000000 0 0 cm /Im0 Do Q");

    let res = doc.xref.resolve_dict(form_dict.get("Resources").unwrap()).unwrap();
    let im0 = res.get("XObject").unwrap().as_dict().unwrap().get("Im0").unwrap();
    let image_dict = doc.xref.resolve_dict(im0).unwrap();
    assert_eq!(image_dict.get("Width").unwrap().as_integer(), Some(64));
    assert_eq!(image_dict.get("Height").unwrap().as_integer(), Some(32));

    std::fs::remove_file(logo).ok();
}

#[test]
fn test_missing_image_file_errors() {
    let mut doc = host_doc();
    let wm = Watermark::parse("/no/such/file.png", false).unwrap();

    let selected: HashSet<usize> = [1].into_iter().collect();
    assert!(matches!(add_watermarks(&mut doc, &selected, &wm), Err(Error::Io(_))));
}
