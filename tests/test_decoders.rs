//! Filter chains undone while loading.

mod common;

use common::{build_pdf, deflate, stream_body};
use pdf_assembler::{Document, Error, NodeId, ParserOptions, StreamData, Value};
use weezl::{encode::Encoder as LzwEncoder, BitOrder};

fn hex(data: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = data.iter().flat_map(|b| format!("{:02x}", b).into_bytes()).collect();
    out.push(b'>');
    out
}

/// Load a file whose catalog holds the given stream under `/Payload`.
fn load_payload(entries: &str, data: &[u8], options: &ParserOptions) -> pdf_assembler::Result<(Document, NodeId)> {
    let pdf = build_pdf(
        &[
            b"<< /Type /Catalog /Pages 2 0 R /Payload 3 0 R >>",
            b"<< /Type /Pages /Kids [] /Count 0 >>",
            &stream_body(entries, data),
        ],
        "<< /Size 4 /Root 1 0 R >>",
    );
    let doc = Document::load(pdf, options)?;
    let payload = doc.tree().child(doc.root(), "Payload").expect("payload stream");
    Ok((doc, payload))
}

#[test]
fn test_hex_then_flate_chain() {
    let content = b"q 1 0 0 1 72 72 cm /Im0 Do Q";
    let encoded = hex(&deflate(content));
    let (doc, payload) =
        load_payload("/Filter [/AHx /Fl]", &encoded, &ParserOptions::default()).unwrap();
    let stream = doc.tree().stream(payload).unwrap();
    assert!(stream.dict.is_empty());
    assert_eq!(stream.data, StreamData::text_from_bytes(content));
}

#[test]
fn test_flate_with_png_predictor() {
    // two rows of three bytes, both using the Up filter
    let rows = [2u8, 1, 2, 3, 2, 1, 1, 1];
    let (doc, payload) = load_payload(
        "/Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns 3 >>",
        &deflate(&rows),
        &ParserOptions::default(),
    )
    .unwrap();
    let stream = doc.tree().stream(payload).unwrap();
    assert!(!stream.dict.contains_key("DecodeParms"));
    assert_eq!(stream.data.to_bytes().as_ref(), &[1, 2, 3, 2, 3, 4]);
}

#[test]
fn test_lzw_early_change() {
    let content = b"BT /F1 24 Tf 100 700 Td (TOBEORNOTTOBEORTOBEORNOT) Tj ET";
    let encoded = LzwEncoder::with_tiff_size_switch(BitOrder::Msb, 8).encode(content).unwrap();
    let (doc, payload) = load_payload("/Filter /LZWDecode", &encoded, &ParserOptions::default()).unwrap();
    let stream = doc.tree().stream(payload).unwrap();
    assert_eq!(stream.data.to_bytes().as_ref(), content);
}

#[test]
fn test_unknown_first_filter_leaves_stream_encoded() {
    let data = [0x12u8, 0x34, 0x56];
    let (doc, payload) = load_payload("/Filter /JBIG2Decode", &data, &ParserOptions::default()).unwrap();
    let stream = doc.tree().stream(payload).unwrap();
    assert_eq!(stream.dict.get("Filter"), Some(&Value::name("JBIG2Decode")));
    assert_eq!(stream.data, StreamData::Binary(data.to_vec().into()));
}

#[test]
fn test_decompression_limit_fails_load() {
    let bomb = deflate(&vec![0u8; 1 << 20]);
    let options = ParserOptions::default().with_max_decompressed_size(4096);
    assert!(matches!(
        load_payload("/Filter /FlateDecode", &bomb, &options),
        Err(Error::LimitExceeded(_))
    ));
}
