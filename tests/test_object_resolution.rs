//! Resolution of raw object graphs into the working tree.

mod common;

use common::{build_pdf, deflate, stream_body};
use pdf_assembler::source::MemorySource;
use pdf_assembler::{Document, Error, Object, ObjectRef, ParserOptions, StreamData, Value};

fn dict(entries: &[(&str, Object)]) -> Object {
    Object::Dictionary(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

fn r(id: u32) -> Object {
    Object::Reference(ObjectRef::new(id, 0))
}

fn name(n: &str) -> Object {
    Object::Name(n.to_string())
}

/// Catalog 1, pages 2, page 3 whose `/Self` points back at itself and whose
/// annotations share one appearance dictionary.
fn cyclic_source() -> MemorySource {
    let mut source = MemorySource::new();
    source.insert(ObjectRef::new(1, 0), dict(&[("Type", name("Catalog")), ("Pages", r(2))]));
    source.insert(
        ObjectRef::new(2, 0),
        dict(&[("Type", name("Pages")), ("Kids", Object::Array(vec![r(3)])), ("Count", Object::Integer(1))]),
    );
    source.insert(
        ObjectRef::new(3, 0),
        dict(&[
            ("Type", name("Page")),
            ("Parent", r(2)),
            ("Self", r(3)),
            ("Annots", Object::Array(vec![r(4), r(5)])),
        ]),
    );
    source.insert(ObjectRef::new(4, 0), dict(&[("AP", r(6))]));
    source.insert(ObjectRef::new(5, 0), dict(&[("AP", r(6))]));
    source.insert(ObjectRef::new(6, 0), dict(&[("N", Object::Null)]));
    source.set_root(ObjectRef::new(1, 0));
    source
}

#[test]
fn test_self_reference_is_true_aliasing() {
    let mut source = cyclic_source();
    let mut doc = Document::from_source(&mut source, &ParserOptions::default()).unwrap();
    let page = doc.pages().unwrap()[0];
    assert_eq!(doc.tree().child(page, "Self"), Some(page));
    assert_eq!(doc.tree().child(page, "Parent"), Some(doc.pages_node().unwrap()));
}

#[test]
fn test_shared_objects_resolve_to_one_node() {
    let mut source = cyclic_source();
    let mut doc = Document::from_source(&mut source, &ParserOptions::default()).unwrap();
    let page = doc.pages().unwrap()[0];
    let tree = doc.tree();
    let annots = tree.array(tree.child(page, "Annots").unwrap()).unwrap();
    let aps: Vec<_> = annots
        .iter()
        .map(|a| tree.child(a.as_node().unwrap(), "AP").unwrap())
        .collect();
    assert_eq!(aps[0], aps[1]);
}

#[test]
fn test_cyclic_document_assembles() {
    let mut source = cyclic_source();
    let mut doc = Document::from_source(&mut source, &ParserOptions::default()).unwrap();
    let pdf = pdf_assembler::writer::assemble_document(&mut doc, &Default::default()).unwrap();
    let text = String::from_utf8_lossy(&pdf);
    // page is object 3 after renumbering: catalog, pages, page
    assert!(text.contains("3 0 obj<</Type/Page/Parent 2 0 R/Self 3 0 R"));
}

#[test]
fn test_missing_root_is_invalid() {
    let mut source = MemorySource::new();
    source.insert(ObjectRef::new(1, 0), Object::Integer(1));
    assert!(matches!(
        Document::from_source(&mut source, &ParserOptions::default()),
        Err(Error::InvalidPdf(_))
    ));
    source.set_root(ObjectRef::new(1, 0));
    assert!(matches!(
        Document::from_source(&mut source, &ParserOptions::default()),
        Err(Error::InvalidPdf(_))
    ));
}

#[test]
fn test_load_decodes_content_and_keeps_images() {
    let content = b"BT /F1 12 Tf (caf\xE9) Tj ET";
    let image = deflate(&[0u8, 255, 0, 255, 7, 7]);
    let mut image_entries = b"<< /Type /XObject /Subtype /Image /Width 2 /Height 1 /BitsPerComponent 8 /ColorSpace /DeviceRGB /Filter /FlateDecode".to_vec();
    image_entries.extend_from_slice(format!(" /Length {} >>\nstream\n", image.len()).as_bytes());
    image_entries.extend_from_slice(&image);
    image_entries.extend_from_slice(b"\nendstream");

    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /XObject << /Im1 5 0 R >> >> >>",
            &stream_body("/Filter /FlateDecode", &deflate(content)),
            &image_entries,
        ],
        "<< /Size 6 /Root 1 0 R >>",
    );

    let mut doc = Document::load(pdf, &ParserOptions::default()).unwrap();
    let page = doc.pages().unwrap()[0];
    let tree = doc.tree();

    let contents = tree.stream(tree.child(page, "Contents").unwrap()).unwrap();
    assert!(contents.dict.is_empty());
    assert_eq!(contents.data, StreamData::text_from_bytes(content));
    assert_eq!(contents.data.to_bytes().as_ref(), content);

    let resources = tree.child(page, "Resources").unwrap();
    let xobjects = tree.child(resources, "XObject").unwrap();
    let image_stream = tree.stream(tree.child(xobjects, "Im1").unwrap()).unwrap();
    assert_eq!(image_stream.dict.get("Filter"), Some(&Value::name("FlateDecode")));
    assert_eq!(image_stream.data.to_bytes().as_ref(), image.as_slice());
}

#[test]
fn test_binary_payload_stays_binary() {
    let payload = [0x00u8, 0x9F, 0xFF, 0x10];
    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 2 0 R /Thumb 3 0 R >>",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
            &stream_body("", &payload),
        ],
        "<< /Size 4 /Root 1 0 R >>",
    );
    let doc = Document::load(pdf, &ParserOptions::default()).unwrap();
    let thumb = doc.tree().child(doc.root(), "Thumb").unwrap();
    assert!(matches!(doc.tree().stream(thumb).unwrap().data, StreamData::Binary(_)));
}

#[test]
fn test_encrypted_input_is_unsupported() {
    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
            b"<< /Filter /Standard /V 2 /R 3 /O <00> /U <00> /P -4 >>",
        ],
        "<< /Size 4 /Root 1 0 R /Encrypt 3 0 R /ID [<01> <01>] >>",
    );
    assert!(matches!(
        Document::load(pdf, &ParserOptions::default()),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn test_nested_page_tree_is_flattened_on_load() {
    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 2 0 R >>",
            b"<< /Type /Pages /Kids [3 0 R 5 0 R] /Count 3 /MediaBox [0 0 595 842] /Rotate 90 >>",
            b"<< /Type /Pages /Parent 2 0 R /Kids [4 0 R] /Count 1 /Rotate 180 >>",
            b"<< /Type /Page /Parent 3 0 R >>",
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >>",
        ],
        "<< /Size 6 /Root 1 0 R >>",
    );
    let mut doc = Document::load(pdf, &ParserOptions::default()).unwrap();
    let pages = doc.pages().unwrap();
    assert_eq!(pages.len(), 2);

    let tree = doc.tree();
    let rotate = |page| tree.dict(page).unwrap().get("Rotate").and_then(Value::as_integer);
    let media_width = |page| {
        let media_box = tree.array(tree.child(page, "MediaBox").unwrap()).unwrap();
        media_box[2].as_integer()
    };
    assert_eq!(rotate(pages[0]), Some(180));
    assert_eq!(rotate(pages[1]), Some(90));
    assert_eq!(media_width(pages[0]), Some(595));
    assert_eq!(media_width(pages[1]), Some(100));

    let root = doc.pages_node().unwrap();
    assert!(!tree.dict(root).unwrap().contains_key("MediaBox"));
    assert_eq!(tree.dict(root).unwrap().get("Count"), Some(&Value::Integer(2)));
}

#[test]
fn test_dangling_reference_becomes_null() {
    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 2 0 R /Outlines 40 0 R >>",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
        ],
        "<< /Size 3 /Root 1 0 R >>",
    );
    let doc = Document::load(pdf, &ParserOptions::default()).unwrap();
    assert_eq!(doc.catalog().unwrap().get("Outlines"), Some(&Value::Null));
}

#[test]
fn test_array_cycle_through_alias_assembles() {
    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 4 0 R /Ring 2 0 R >>",
            b"[3 0 R]",
            b"2 0 R",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
        ],
        "<< /Size 5 /Root 1 0 R >>",
    );
    let mut doc = Document::load(pdf, &ParserOptions::default()).unwrap();
    let out = pdf_assembler::writer::assemble_document(&mut doc, &Default::default()).unwrap();

    let reloaded = Document::load(out, &ParserOptions::default()).unwrap();
    let ring = reloaded.tree().child(reloaded.root(), "Ring").unwrap();
    assert_eq!(reloaded.tree().array(ring).unwrap(), &vec![Value::Node(ring)]);
}
