//! Tree to PDF syntax.
//!
//! [`PdfSerializer`] renders nodes of a numbered [`Tree`]. Nodes with an
//! object number become `N G obj ... endobj` blocks, collected in the order
//! they finish; everything else is written inline where it is referenced.
//!
//! Layout follows the indent setting. With no indent the output is as tight
//! as the syntax allows, e.g. `<</Type/Page/Count 3/Parent 2 0 R>>`: a space
//! is written between two tokens only when the second does not start with a
//! delimiter.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use lazy_static::lazy_static;

use crate::config::AssemblerOptions;
use crate::error::{Error, Result};
use crate::tree::{Dictionary, Node, NodeId, ObjectId, Stream, Tree, Value};

/// Bytes a `/Filter/FlateDecode` entry adds to the stream dictionary.
const FILTER_ENTRY_COST: usize = 19;

lazy_static! {
    /// Literal string form of every byte.
    static ref LITERAL_ESCAPES: Vec<Vec<u8>> = (0u8..=255).map(escape_byte).collect();
}

fn escape_byte(byte: u8) -> Vec<u8> {
    match byte {
        0x08 => b"\\b".to_vec(),
        b'\t' => b"\\t".to_vec(),
        b'\n' => b"\\n".to_vec(),
        0x0C => b"\\f".to_vec(),
        b'\r' => b"\\r".to_vec(),
        b'(' | b')' | b'\\' => vec![b'\\', byte],
        0x20..=0x7E | 0xA1..=0xFF => vec![byte],
        _ => format!("\\{:03o}", byte).into_bytes(),
    }
}

fn is_name_escape(byte: u8) -> bool {
    matches!(
        byte,
        b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ' | b'#' | b'%' | b'(' | b')' | b'/' | b'<' | b'>' | b'['
            | b']' | b'{' | b'}'
    )
}

/// `/name` with delimiters and whitespace escaped as `#xx`.
///
/// Each char up to U+00FF is one byte of the name; wider chars are written
/// as UTF-8.
pub fn render_name(name: &str) -> Vec<u8> {
    let mut raw = Vec::with_capacity(name.len());
    for c in name.chars() {
        match u8::try_from(c) {
            Ok(byte) => raw.push(byte),
            Err(_) => raw.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }

    let mut out = Vec::with_capacity(raw.len() + 1);
    out.push(b'/');
    for byte in raw {
        if is_name_escape(byte) {
            out.extend_from_slice(format!("#{:02x}", byte).as_bytes());
        } else {
            out.push(byte);
        }
    }
    out
}

/// A string as `(literal)` or `<hex>`, whichever is shorter.
pub fn render_string(bytes: &[u8]) -> Vec<u8> {
    let literal_len: usize = bytes.iter().map(|b| LITERAL_ESCAPES[*b as usize].len()).sum();
    if literal_len < bytes.len() * 2 {
        let mut out = Vec::with_capacity(literal_len + 2);
        out.push(b'(');
        for byte in bytes {
            out.extend_from_slice(&LITERAL_ESCAPES[*byte as usize]);
        }
        out.push(b')');
        out
    } else {
        let mut out = Vec::with_capacity(bytes.len() * 2 + 2);
        out.push(b'<');
        for byte in bytes {
            out.extend_from_slice(format!("{:02x}", byte).as_bytes());
        }
        out.push(b'>');
        out
    }
}

fn render_real(value: f64) -> Vec<u8> {
    if !value.is_finite() {
        log::warn!("writing non-finite number {} as 0", value);
        return b"0".to_vec();
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        (value as i64).to_string().into_bytes()
    } else {
        value.to_string().into_bytes()
    }
}

/// Compress data using Flate/Deflate compression.
pub(crate) fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    InProgress,
    Done,
}

/// Renders one numbered tree into indirect object blocks.
#[derive(Debug)]
pub struct PdfSerializer<'t> {
    tree: &'t Tree,
    unit: String,
    newline: &'static str,
    compress: bool,
    slots: HashMap<u32, SlotState>,
    finished: Vec<(ObjectId, Vec<u8>)>,
    inline_path: HashSet<NodeId>,
}

impl<'t> PdfSerializer<'t> {
    /// Create a serializer using the layout and compression settings of `options`.
    pub fn new(tree: &'t Tree, options: &AssemblerOptions) -> Self {
        let unit = options.indent.unit().unwrap_or_default();
        let newline = if unit.is_empty() { "" } else { "\n" };
        Self {
            tree,
            unit,
            newline,
            compress: options.compress,
            slots: HashMap::new(),
            finished: Vec::new(),
            inline_path: HashSet::new(),
        }
    }

    /// Render the numbered node `id` and everything it reaches.
    ///
    /// Rendering an object twice is a no-op. Returns its object id.
    pub fn render_object(&mut self, id: NodeId) -> Result<ObjectId> {
        match self.tree.object_id(id) {
            Some(object_id) if !object_id.is_unnumbered() => {
                self.write_indirect(id, object_id)?;
                Ok(object_id)
            },
            _ => Err(Error::Serialize(format!("node {:?} has no object number", id))),
        }
    }

    /// Render a value as it would appear inside a top-level object.
    pub fn render_value(&mut self, value: &Value) -> Result<Vec<u8>> {
        self.value(value, 0)
    }

    /// Finished objects in completion order.
    pub fn finish(self) -> Vec<(ObjectId, Vec<u8>)> {
        self.finished
    }

    fn value(&mut self, value: &Value, depth: usize) -> Result<Vec<u8>> {
        Ok(match value {
            Value::Null => b"null".to_vec(),
            Value::Boolean(true) => b"true".to_vec(),
            Value::Boolean(false) => b"false".to_vec(),
            Value::Integer(i) => i.to_string().into_bytes(),
            Value::Real(r) => render_real(*r),
            Value::Name(name) => render_name(name),
            Value::String(bytes) => render_string(bytes),
            Value::Node(id) => self.node(*id, depth)?,
        })
    }

    fn node(&mut self, id: NodeId, depth: usize) -> Result<Vec<u8>> {
        match self.tree.object_id(id) {
            Some(object_id) if object_id.is_unnumbered() => Err(Error::Serialize(format!(
                "node {:?} must be indirect but was never numbered",
                id
            ))),
            Some(object_id) => {
                self.write_indirect(id, object_id)?;
                Ok(object_id.to_string().into_bytes())
            },
            None => self.inline(id, depth),
        }
    }

    fn inline(&mut self, id: NodeId, depth: usize) -> Result<Vec<u8>> {
        if !self.inline_path.insert(id) {
            return Err(Error::Serialize(format!("direct object {:?} contains itself", id)));
        }
        let tree = self.tree;
        let rendered = match tree.get(id) {
            Node::Array(items) => self.array(items, depth),
            Node::Dictionary(dict) => self.dictionary(dict, depth),
            Node::Stream(_) => Err(Error::Serialize(format!("stream {:?} has no object number", id))),
            Node::Pending => Err(Error::Serialize(format!("node {:?} was never filled", id))),
        };
        self.inline_path.remove(&id);
        rendered
    }

    fn write_indirect(&mut self, id: NodeId, object_id: ObjectId) -> Result<()> {
        match self.slots.get(&object_id.num) {
            Some(SlotState::Done) => return Ok(()),
            Some(SlotState::InProgress) => {
                log::trace!("object {} refers back to itself", object_id);
                return Ok(());
            },
            None => {},
        }
        self.slots.insert(object_id.num, SlotState::InProgress);

        let tree = self.tree;
        let mut block = Vec::new();
        write!(block, "{} {} obj{}", object_id.num, object_id.gen, self.newline)?;
        match tree.get(id) {
            Node::Array(items) => {
                let body = self.array(items, 0)?;
                block.extend_from_slice(&body);
                writeln!(block, "{}endobj", self.newline)?;
            },
            Node::Dictionary(dict) => {
                let body = self.dictionary(dict, 0)?;
                block.extend_from_slice(&body);
                writeln!(block, "{}endobj", self.newline)?;
            },
            Node::Stream(stream) => self.stream(stream, &mut block)?,
            Node::Pending => {
                return Err(Error::Serialize(format!("object {} was never filled", object_id)));
            },
        }

        self.finished.push((object_id, block));
        self.slots.insert(object_id.num, SlotState::Done);
        Ok(())
    }

    fn stream(&mut self, stream: &Stream, block: &mut Vec<u8>) -> Result<()> {
        let mut dict = stream.dict.clone();
        let mut data = stream.data.to_bytes().to_vec();

        if self.compress && !dict.contains_key("Filter") && !data.is_empty() {
            let compressed = compress_data(&data)?;
            if compressed.len() + FILTER_ENTRY_COST < data.len() {
                data = compressed;
                dict.insert("Filter", Value::name("FlateDecode"));
            }
        }
        dict.insert("Length", Value::Integer(data.len() as i64));

        let head = self.dictionary(&dict, 0)?;
        block.extend_from_slice(&head);
        block.extend_from_slice(b"\nstream\n");
        block.extend_from_slice(&data);
        block.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    fn indent(&self, depth: usize) -> String {
        format!("{}{}", self.newline, self.unit.repeat(depth + 1))
    }

    fn closer(&self, depth: usize, token: &str) -> String {
        format!("{}{}{}", self.newline, self.unit.repeat(depth), token)
    }

    fn array(&mut self, items: &[Value], depth: usize) -> Result<Vec<u8>> {
        let mut out = b"[".to_vec();
        for (i, item) in items.iter().enumerate() {
            let token = self.value(item, depth + 1)?;
            let lead = if !self.unit.is_empty() || i > 0 {
                Some(self.indent(depth))
            } else {
                None
            };
            push_token(&mut out, lead.as_deref(), &token);
        }
        out.extend_from_slice(self.closer(depth, "]").as_bytes());
        Ok(out)
    }

    fn dictionary(&mut self, dict: &Dictionary, depth: usize) -> Result<Vec<u8>> {
        let separator = if self.unit.is_empty() { "" } else { " " };
        let mut out = b"<<".to_vec();
        for (key, value) in dict.iter() {
            let lead = self.indent(depth);
            push_token(&mut out, Some(&lead), &render_name(key));
            let token = self.value(value, depth + 1)?;
            push_token(&mut out, Some(separator), &token);
        }
        out.extend_from_slice(self.closer(depth, ">>").as_bytes());
        Ok(out)
    }
}

/// Append `token` after `lead`. An empty lead means "separate only if needed".
fn push_token(out: &mut Vec<u8>, lead: Option<&str>, token: &[u8]) {
    match lead {
        None => {},
        Some("") => {
            if !matches!(token.first(), Some(b'/' | b'[' | b'(' | b'<')) {
                out.push(b' ');
            }
        },
        Some(lead) => out.extend_from_slice(lead.as_bytes()),
    }
    out.extend_from_slice(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Indent;
    use crate::tree::StreamData;
    use bytes::Bytes;

    fn render(tree: &Tree, value: &Value, options: &AssemblerOptions) -> String {
        let mut serializer = PdfSerializer::new(tree, options);
        String::from_utf8(serializer.render_value(value).unwrap()).unwrap()
    }

    #[test]
    fn test_name_escaping() {
        assert_eq!(render_name("A#B"), b"/A#23B");
        assert_eq!(render_name("a b/c"), b"/a#20b#2fc");
        assert_eq!(render_name("Type"), b"/Type");
    }

    #[test]
    fn test_name_bytes_above_ascii() {
        assert_eq!(render_name("caf\u{e9}"), b"/caf\xe9");
        assert_eq!(render_name("\u{263A}"), "/\u{263A}".as_bytes());
    }

    #[test]
    fn test_string_form_choice() {
        assert_eq!(render_string(b"Hello"), b"(Hello)");
        assert_eq!(render_string(&[0x01]), b"<01>");
        assert_eq!(render_string(b""), b"<>");
        assert_eq!(render_string(b"a(b)\\"), b"(a\\(b\\)\\\\)");
        assert_eq!(render_string(b"x\ny"), b"(x\\ny)");
        assert_eq!(render_string(&[b'a', 0x80, b'b', b'c', b'd']), b"(a\\200bcd)");
        assert_eq!(render_string(&[0xE9, 0xE8]), b"(\xE9\xE8)");
        assert_eq!(render_string(&[0x00, 0xFF]), b"<00ff>");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(render_real(3.0), b"3");
        assert_eq!(render_real(0.5), b"0.5");
        assert_eq!(render_real(-12.25), b"-12.25");
        assert_eq!(render_real(f64::NAN), b"0");
    }

    #[test]
    fn test_compact_layout() {
        let mut tree = Tree::new();
        let parent = tree.add_dict([]);
        tree.set_object_id(parent, Some(ObjectId::new(2, 0)));
        let dict = tree.add_dict([
            ("Type", Value::name("Page")),
            ("Count", Value::Integer(3)),
            ("Parent", Value::Node(parent)),
        ]);
        let options = AssemblerOptions::default();
        assert_eq!(render(&tree, &Value::Node(dict), &options), "<</Type/Page/Count 3/Parent 2 0 R>>");

        let array = tree.add_array(vec![Value::Integer(0), Value::Integer(0), Value::Real(612.0), Value::name("X")]);
        assert_eq!(render(&tree, &Value::Node(array), &options), "[0 0 612/X]");
        let empty = tree.add_array(vec![]);
        assert_eq!(render(&tree, &Value::Node(empty), &options), "[]");
    }

    #[test]
    fn test_pretty_layout() {
        let mut tree = Tree::new();
        let media_box = tree.add_array(vec![Value::Integer(0), Value::Integer(1)]);
        let dict = tree.add_dict([("Type", Value::name("Page")), ("MediaBox", Value::Node(media_box))]);
        let options = AssemblerOptions::default().with_indent(Indent::Width(2));
        assert_eq!(
            render(&tree, &Value::Node(dict), &options),
            "<<\n  /Type /Page\n  /MediaBox [\n    0\n    1\n  ]\n>>"
        );
    }

    #[test]
    fn test_indirect_objects_in_completion_order() {
        let mut tree = Tree::new();
        let child = tree.add_dict([("Leaf", Value::Boolean(true))]);
        let root = tree.add_dict([("Child", Value::Node(child)), ("Again", Value::Node(child))]);
        tree.set_object_id(root, Some(ObjectId::new(1, 0)));
        tree.set_object_id(child, Some(ObjectId::new(2, 0)));

        let mut serializer = PdfSerializer::new(&tree, &AssemblerOptions::default());
        assert_eq!(serializer.render_object(root).unwrap(), ObjectId::new(1, 0));
        let blocks = serializer.finish();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].1, b"2 0 obj<</Leaf true>>endobj\n");
        assert_eq!(blocks[1].1, b"1 0 obj<</Child 2 0 R/Again 2 0 R>>endobj\n");
    }

    #[test]
    fn test_cycle_through_indirect_object() {
        let mut tree = Tree::new();
        let root = tree.reserve();
        tree.set(root, Node::Dictionary([("Me", Value::Node(root))].into_iter().collect()));
        tree.set_object_id(root, Some(ObjectId::new(1, 0)));
        let mut serializer = PdfSerializer::new(&tree, &AssemblerOptions::default());
        serializer.render_object(root).unwrap();
        assert_eq!(serializer.finish()[0].1, b"1 0 obj<</Me 1 0 R>>endobj\n");
    }

    #[test]
    fn test_unnumbered_and_direct_cycles_fail() {
        let mut tree = Tree::new();
        let tagged = tree.add_indirect(Node::Dictionary(Dictionary::new()));
        let options = AssemblerOptions::default();
        assert!(PdfSerializer::new(&tree, &options).render_value(&Value::Node(tagged)).is_err());

        let looped = tree.reserve();
        tree.set(looped, Node::Array(vec![Value::Node(looped)]));
        assert!(PdfSerializer::new(&tree, &options).render_value(&Value::Node(looped)).is_err());
    }

    fn stream_tree(data: StreamData) -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let id = tree.add(Node::Stream(Stream {
            dict: [("Length", Value::Integer(999)), ("Type", Value::name("XObject"))].into_iter().collect(),
            data,
        }));
        tree.set_object_id(id, Some(ObjectId::new(1, 0)));
        (tree, id)
    }

    #[test]
    fn test_stream_left_uncompressed_when_small() {
        let (tree, id) = stream_tree(StreamData::Text("q Q".to_string()));
        let mut serializer = PdfSerializer::new(&tree, &AssemblerOptions::default());
        serializer.render_object(id).unwrap();
        assert_eq!(
            serializer.finish()[0].1,
            b"1 0 obj<</Length 3/Type/XObject>>\nstream\nq Q\nendstream\nendobj\n"
        );
    }

    #[test]
    fn test_stream_compressed_when_worth_it() {
        let text = "0 0 m 100 100 l S\n".repeat(64);
        let (tree, id) = stream_tree(StreamData::Text(text.clone()));
        let mut serializer = PdfSerializer::new(&tree, &AssemblerOptions::default());
        serializer.render_object(id).unwrap();
        let block = serializer.finish().remove(0).1;
        let expected = compress_data(text.as_bytes()).unwrap();
        let head = format!("1 0 obj<</Length {}/Type/XObject/Filter/FlateDecode>>\nstream\n", expected.len());
        assert!(block.starts_with(head.as_bytes()));
        assert!(block.ends_with(b"\nendstream\nendobj\n"));
        assert_eq!(block.len(), head.len() + expected.len() + b"\nendstream\nendobj\n".len());
    }

    #[test]
    fn test_stream_compression_disabled_or_filtered() {
        let data = Bytes::from(vec![b'a'; 500]);
        let (mut tree, id) = stream_tree(StreamData::Binary(data));
        let options = AssemblerOptions::default().with_compress(false);
        let mut serializer = PdfSerializer::new(&tree, &options);
        serializer.render_object(id).unwrap();
        assert!(!serializer.finish()[0].1.windows(6).any(|w| w == b"Filter"));

        if let Node::Stream(stream) = tree.get_mut(id) {
            stream.dict.insert("Filter", Value::name("DCTDecode"));
        }
        let mut serializer = PdfSerializer::new(&tree, &AssemblerOptions::default());
        serializer.render_object(id).unwrap();
        let block = serializer.finish().remove(0).1;
        assert!(block.starts_with(b"1 0 obj<</Length 500/Type/XObject/Filter/DCTDecode>>"));
    }
}
