//! Helpers shared by the integration tests.

#![allow(dead_code)]

use pdf_assembler::{Document, Node, Stream, StreamData, Value};

/// Build a classic PDF from object bodies numbered 1..=n, computing xref offsets.
pub fn build_pdf(objects: &[&[u8]], trailer: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(format!("trailer\n{}\nstartxref\n{}\n%%EOF\n", trailer, xref_at).as_bytes());
    out
}

/// A stream object body with a correct `/Length`.
pub fn stream_body(dict_entries: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

/// Zlib-compress `data`.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A blank document grown to `pages` pages, each with its own content stream.
pub fn document_with_pages(pages: usize) -> Document {
    let mut doc = Document::blank();
    let root = doc.pages_node().unwrap();
    let tree = doc.tree_mut();
    let mut kids = Vec::with_capacity(pages);
    for i in 0..pages {
        let contents = tree.add(Node::Stream(Stream {
            dict: Default::default(),
            data: StreamData::Text(format!("BT (page {}) Tj ET", i + 1)),
        }));
        let page = tree.add_dict([("Type", Value::name("Page")), ("Contents", Value::Node(contents))]);
        kids.push(Value::Node(page));
    }
    let kids = tree.add_array(kids);
    tree.dict_mut(root).unwrap().insert("Kids", Value::Node(kids));
    doc
}

/// Offsets listed in the xref table of an assembled file, by object number.
pub fn xref_offsets(pdf: &[u8]) -> Vec<usize> {
    let text = String::from_utf8_lossy(pdf);
    let start = text.rfind("\nxref\n").expect("xref section") + "\nxref\n".len();
    let mut lines = text[start..].lines();
    let header = lines.next().unwrap();
    let size: usize = header.split_whitespace().nth(1).unwrap().parse().unwrap();
    lines
        .take(size)
        .map(|row| row[..10].parse().unwrap())
        .collect()
}
