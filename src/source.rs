//! Where raw objects come from.
//!
//! The resolver only needs two things from a source: fetch an indirect object
//! by reference, and read the trailer. [`SourceDocument`] serves them from
//! the bytes of a PDF file, [`MemorySource`] from a graph built in memory.

use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;

use crate::decoders::decode_stream_object;
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Object, ObjectDict, ObjectRef};
use crate::objstm::{parse_object_stream, ObjectStream};
use crate::parser::{parse_indirect_object, parse_object};
use crate::parser_config::ParserOptions;
use crate::xref::{find_xref_offset, parse_xref_chain, CrossRefTable, XRefEntry};

/// A supplier of raw indirect objects.
pub trait ObjectSource {
    /// Fetch the object `id` refers to.
    ///
    /// Returns [`Error::ObjectNotFound`] for numbers the source does not
    /// define; other errors mean the object exists but could not be read.
    fn fetch(&mut self, id: ObjectRef) -> Result<Rc<Object>>;

    /// The trailer dictionary (`/Root`, `/Info`, `/Encrypt`, ...).
    fn trailer(&self) -> &ObjectDict;
}

/// Fail on encrypted input before anything tries to decode it.
pub(crate) fn reject_encrypted(trailer: &ObjectDict) -> Result<()> {
    if trailer.contains_key("Encrypt") {
        return Err(Error::Unsupported("encrypted PDF documents".to_string()));
    }
    Ok(())
}

/// A PDF file held in memory, read lazily through its cross-reference data.
pub struct SourceDocument {
    data: Bytes,
    version: String,
    xref: CrossRefTable,
    trailer: ObjectDict,
    options: ParserOptions,
    cache: HashMap<ObjectRef, Rc<Object>>,
    object_streams: HashMap<u32, Rc<ObjectStream>>,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("len", &self.data.len())
            .field("version", &self.version)
            .field("objects", &self.xref.len())
            .finish()
    }
}

impl SourceDocument {
    /// Read the header, cross-reference chain and trailer of a PDF file.
    ///
    /// Objects themselves are parsed on first [`fetch`](ObjectSource::fetch).
    pub fn load(data: impl Into<Bytes>, options: ParserOptions) -> Result<Self> {
        let data: Bytes = data.into();
        if options.max_file_size > 0 && data.len() > options.max_file_size {
            return Err(Error::LimitExceeded(format!(
                "file is {} bytes, limit is {}",
                data.len(),
                options.max_file_size
            )));
        }

        let (header_at, version) = read_header(&data, &options)?;
        if header_at > 0 {
            log::warn!("{} bytes of junk before the PDF header", header_at);
        }
        // offsets in the file are relative to the header
        let data = data.slice(header_at..);
        log::debug!("loading PDF {} ({} bytes)", version, data.len());

        let xref = match find_xref_offset(&data).and_then(|start| parse_xref_chain(&data, start, &options)) {
            Ok(xref) => xref,
            Err(e) if !options.strict => {
                log::warn!("cross-reference data unusable ({}), scanning for objects", e);
                reconstruct_xref(&data)?
            },
            Err(e) => return Err(e),
        };

        let trailer = xref.trailer().cloned().unwrap_or_default();
        reject_encrypted(&trailer)?;
        if !trailer.contains_key("Root") {
            return Err(Error::InvalidPdf("trailer has no /Root".to_string()));
        }

        Ok(Self {
            data,
            version,
            xref,
            trailer,
            options,
            cache: HashMap::new(),
            object_streams: HashMap::new(),
        })
    }

    /// Version from the `%PDF-x.y` header.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The merged cross-reference table.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    fn read_uncompressed(&self, id: ObjectRef, offset: usize) -> Result<Object> {
        let body = self.data.get(offset..).ok_or(Error::UnexpectedEof)?;
        let (_, (found, object)) = parse_indirect_object(body).map_err(|e| Error::ParseError {
            offset,
            reason: format!("object {}: {}", id, e),
        })?;
        if found.id != id.id {
            if self.options.strict {
                return Err(Error::ParseError {
                    offset,
                    reason: format!("expected object {}, found {}", id, found),
                });
            }
            log::warn!("xref entry for {} points at {}", id, found);
        }
        Ok(object)
    }

    fn object_stream(&mut self, stream_id: u32) -> Result<Rc<ObjectStream>> {
        if let Some(stream) = self.object_streams.get(&stream_id) {
            return Ok(Rc::clone(stream));
        }
        let container = self.fetch(ObjectRef::new(stream_id, 0))?;
        let dict = container.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: container.type_name().to_string(),
        })?;
        let decoded = decode_stream_object(&container, &self.options)?;
        let stream = Rc::new(parse_object_stream(dict, &decoded)?);
        log::debug!("unpacked object stream {} ({} objects)", stream_id, stream.len());
        self.object_streams.insert(stream_id, Rc::clone(&stream));
        Ok(stream)
    }
}

impl ObjectSource for SourceDocument {
    fn fetch(&mut self, id: ObjectRef) -> Result<Rc<Object>> {
        if let Some(obj) = self.cache.get(&id) {
            return Ok(Rc::clone(obj));
        }

        let object = match self.xref.get(id.id).copied() {
            Some(XRefEntry::Uncompressed { offset, gen }) if gen == id.gen => {
                self.read_uncompressed(id, offset)?
            },
            Some(XRefEntry::Compressed { stream_id, index }) if id.gen == 0 => {
                if stream_id == id.id {
                    return Err(Error::InvalidPdf(format!("object stream {} contains itself", id)));
                }
                let stream = self.object_stream(stream_id)?;
                stream
                    .get(id.id, index)
                    .cloned()
                    .ok_or(Error::ObjectNotFound(id.id, id.gen))?
            },
            _ => return Err(Error::ObjectNotFound(id.id, id.gen)),
        };

        log::trace!("fetched {} ({})", id, object.type_name());
        let object = Rc::new(object);
        self.cache.insert(id, Rc::clone(&object));
        Ok(object)
    }

    fn trailer(&self) -> &ObjectDict {
        &self.trailer
    }
}

fn read_header(data: &[u8], options: &ParserOptions) -> Result<(usize, String)> {
    const MAGIC: &[u8] = b"%PDF-";
    let window = if options.strict { MAGIC.len() } else { 1024 };
    let searched = &data[..data.len().min(window)];
    let at = searched
        .windows(MAGIC.len())
        .position(|w| w == MAGIC)
        .ok_or_else(|| Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned()))?;

    let version: String = data[at + MAGIC.len()..]
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'.')
        .map(|&c| char::from(c))
        .collect();
    if version.is_empty() {
        return Err(Error::InvalidHeader(format!("%PDF-{}", version)));
    }
    Ok((at, version))
}

/// Rebuild a cross-reference table by scanning for `N G obj` headers.
///
/// The last definition of each number wins. The trailer is the last
/// `trailer` dictionary in the file or, failing that, one pointing at the
/// first catalog found.
fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut i = 0;
    while i < data.len() {
        let starts_token = i == 0 || crate::lexer::is_whitespace(data[i - 1]);
        if starts_token && data[i].is_ascii_digit() {
            if let Some((id, gen, len)) = object_header(&data[i..]) {
                table.insert(id, XRefEntry::Uncompressed { offset: i, gen });
                i += len;
                continue;
            }
        }
        i += 1;
    }
    if table.is_empty() {
        return Err(Error::InvalidXref);
    }

    let trailer = data
        .windows(7)
        .rposition(|w| w == b"trailer")
        .and_then(|pos| match parse_object(&data[pos + 7..]) {
            Ok((_, Object::Dictionary(dict))) if dict.contains_key("Root") => Some(dict),
            _ => None,
        })
        .or_else(|| find_catalog(data, &table));

    if let Some(trailer) = trailer {
        table.set_trailer(trailer);
    }
    log::debug!("reconstructed {} cross-reference entries", table.len());
    Ok(table)
}

fn object_header(input: &[u8]) -> Option<(u32, u16, usize)> {
    let (rest, id) = token(input).ok()?;
    let (rest, gen) = token(rest).ok()?;
    let (rest, kw) = token(rest).ok()?;
    match (id, gen, kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart) => {
            Some((u32::try_from(id).ok()?, u16::try_from(gen).ok()?, input.len() - rest.len()))
        },
        _ => None,
    }
}

fn find_catalog(data: &[u8], table: &CrossRefTable) -> Option<ObjectDict> {
    table.iter().find_map(|(id, entry)| {
        let XRefEntry::Uncompressed { offset, gen } = *entry else {
            return None;
        };
        let (_, (_, object)) = parse_indirect_object(&data[offset..]).ok()?;
        let is_catalog = object.as_dict()?.get("Type").and_then(Object::as_name) == Some("Catalog");
        is_catalog.then(|| {
            let mut trailer = ObjectDict::new();
            trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(id, gen)));
            trailer
        })
    })
}

/// An in-memory object graph.
///
/// ```
/// use pdf_assembler::object::{Object, ObjectDict, ObjectRef};
/// use pdf_assembler::source::{MemorySource, ObjectSource};
///
/// let mut source = MemorySource::new();
/// source.insert(ObjectRef::new(1, 0), Object::Dictionary(ObjectDict::new()));
/// source.set_root(ObjectRef::new(1, 0));
/// assert!(source.fetch(ObjectRef::new(1, 0)).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    objects: HashMap<ObjectRef, Rc<Object>>,
    trailer: ObjectDict,
}

impl MemorySource {
    /// Create an empty source with an empty trailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) an indirect object.
    pub fn insert(&mut self, id: ObjectRef, object: Object) {
        self.objects.insert(id, Rc::new(object));
    }

    /// Point the trailer's `/Root` at `id`.
    pub fn set_root(&mut self, id: ObjectRef) {
        self.trailer.insert("Root".to_string(), Object::Reference(id));
    }

    /// Point the trailer's `/Info` at `id`.
    pub fn set_info(&mut self, id: ObjectRef) {
        self.trailer.insert("Info".to_string(), Object::Reference(id));
    }

    /// Mutable access to the trailer dictionary.
    pub fn trailer_mut(&mut self) -> &mut ObjectDict {
        &mut self.trailer
    }
}

impl ObjectSource for MemorySource {
    fn fetch(&mut self, id: ObjectRef) -> Result<Rc<Object>> {
        self.objects
            .get(&id)
            .cloned()
            .ok_or(Error::ObjectNotFound(id.id, id.gen))
    }

    fn trailer(&self) -> &ObjectDict {
        &self.trailer
    }
}
