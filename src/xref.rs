//! Cross-reference tables and streams.
//!
//! A source file may carry any mix of classic `xref` tables and
//! cross-reference streams (PDF 1.5+), chained through `/Prev` by incremental
//! updates. Hybrid files also point at an extra stream via `/XRefStm`.
//! [`parse_xref_chain`] walks the whole chain and merges it into one table in
//! which newer sections shadow older ones.

use std::collections::{BTreeMap, HashSet};

use crate::decoders::decode_stream_object;
use crate::error::{Error, Result};
use crate::lexer::is_whitespace;
use crate::object::{Object, ObjectDict};
use crate::parser::{parse_indirect_object, parse_object};
use crate::parser_config::ParserOptions;

/// Where an object lives, as recorded by the cross-reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Deleted or never used.
    Free {
        /// Generation to use if the number is reused
        gen: u16,
    },
    /// Stored directly in the file body.
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Stored inside an object stream.
    Compressed {
        /// Object number of the containing `/Type /ObjStm` stream
        stream_id: u32,
        /// Position within that stream
        index: u32,
    },
}

/// Merged cross-reference data for a file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Option<ObjectDict>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, replacing any existing one for the same number.
    pub fn insert(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in object-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// The trailer dictionary (for a stream section, the stream dictionary).
    pub fn trailer(&self) -> Option<&ObjectDict> {
        self.trailer.as_ref()
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: ObjectDict) {
        self.trailer = Some(trailer);
    }

    /// Fold in an older section: its entries and trailer keys only fill gaps.
    pub fn merge_from(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if let Some(older_trailer) = older.trailer {
            let trailer = self.trailer.get_or_insert_with(ObjectDict::new);
            for (key, value) in older_trailer {
                if !matches!(key.as_str(), "Prev" | "XRefStm") && !trailer.contains_key(&key) {
                    trailer.insert(key, value);
                }
            }
        }
    }
}

/// Locate the offset named by the last `startxref` in the file.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    const KEYWORD: &[u8] = b"startxref";
    let window_start = data.len().saturating_sub(4096);
    let tail = &data[window_start..];
    let pos = tail
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .ok_or(Error::InvalidXref)?;

    let digits: Vec<u8> = tail[pos + KEYWORD.len()..]
        .iter()
        .copied()
        .skip_while(|&c| is_whitespace(c))
        .take_while(u8::is_ascii_digit)
        .collect();
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&offset| offset < data.len())
        .ok_or(Error::InvalidXref)
}

/// Parse every cross-reference section reachable from `start`.
pub fn parse_xref_chain(data: &[u8], start: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let mut merged: Option<CrossRefTable> = None;
    let mut visited = HashSet::new();
    let mut next = Some(start);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("cross-reference chain loops back to offset {}", offset);
            break;
        }
        if visited.len() > options.max_xref_sections as usize {
            return Err(Error::LimitExceeded(format!(
                "more than {} cross-reference sections",
                options.max_xref_sections
            )));
        }

        let mut section = parse_section(data, offset, options)?;
        let trailer = section.trailer().cloned().unwrap_or_default();

        if let Some(stm_offset) = offset_entry(&trailer, "XRefStm") {
            if visited.insert(stm_offset) {
                match parse_xref_stream(data, stm_offset, options) {
                    Ok(hybrid) => section.merge_from(hybrid),
                    Err(e) if !options.strict => {
                        log::warn!("ignoring unreadable /XRefStm at {}: {}", stm_offset, e)
                    },
                    Err(e) => return Err(e),
                }
            }
        }

        next = offset_entry(&trailer, "Prev");
        match merged.as_mut() {
            Some(table) => table.merge_from(section),
            None => merged = Some(section),
        }
    }

    merged.ok_or(Error::InvalidXref)
}

fn offset_entry(trailer: &ObjectDict, key: &str) -> Option<usize> {
    trailer
        .get(key)
        .and_then(Object::as_integer)
        .and_then(|v| usize::try_from(v).ok())
}

fn parse_section(data: &[u8], offset: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let body = data.get(offset..).ok_or(Error::InvalidXref)?;
    let skipped = body.iter().take_while(|&&c| is_whitespace(c)).count();
    log::debug!("reading cross-reference section at offset {}", offset);
    if body[skipped..].starts_with(b"xref") {
        parse_xref_table(data, offset + skipped + 4, options)
    } else {
        parse_xref_stream(data, offset, options)
    }
}

/// Read a classic table. `pos` points just past the `xref` keyword.
fn parse_xref_table(data: &[u8], pos: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let mut cursor = Cursor { data, pos };
    let mut table = CrossRefTable::new();

    loop {
        cursor.skip_ws();
        if cursor.rest().starts_with(b"trailer") {
            cursor.pos += b"trailer".len();
            let (_, trailer) = parse_object(cursor.rest()).map_err(|e| Error::ParseError {
                offset: cursor.pos,
                reason: format!("trailer: {}", e),
            })?;
            match trailer {
                Object::Dictionary(dict) => table.set_trailer(dict),
                other => {
                    return Err(Error::InvalidObjectType {
                        expected: "Dictionary".to_string(),
                        found: other.type_name().to_string(),
                    })
                },
            }
            return Ok(table);
        }

        let first = cursor.number().ok_or(Error::InvalidXref)?;
        let count = cursor.number().ok_or(Error::InvalidXref)?;
        // each row needs at least 18 bytes
        if count.saturating_mul(18) > cursor.rest().len() as u64 {
            return Err(Error::InvalidPdf(format!("xref subsection claims {} rows", count)));
        }

        for i in 0..count {
            let row = cursor.row();
            let id = u32::try_from(first + i).map_err(|_| Error::InvalidXref)?;
            match row {
                Some((offset, gen, b'n')) => {
                    let offset = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
                    table.insert(id, XRefEntry::Uncompressed { offset, gen });
                },
                Some((_, gen, b'f')) => table.insert(id, XRefEntry::Free { gen }),
                _ if options.strict => {
                    return Err(Error::ParseError {
                        offset: cursor.pos,
                        reason: format!("malformed xref row for object {}", id),
                    })
                },
                _ => {
                    log::warn!("skipping malformed xref row for object {}", id);
                    cursor.skip_line();
                },
            }
        }
    }
}

/// Byte cursor for the fixed-format table rows.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn rest(&self) -> &[u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn skip_ws(&mut self) {
        loop {
            let rest = self.rest();
            match rest.first() {
                Some(&c) if is_whitespace(c) => self.pos += 1,
                Some(b'%') => self.skip_line(),
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        let rest = self.rest();
        let line = rest.iter().position(|&c| c == b'\n' || c == b'\r').unwrap_or(rest.len());
        self.pos += line;
        while matches!(self.rest().first(), Some(b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Option<u64> {
        self.skip_ws();
        let digits = self.rest().iter().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let value = std::str::from_utf8(&self.rest()[..digits]).ok()?.parse().ok()?;
        self.pos += digits;
        Some(value)
    }

    fn row(&mut self) -> Option<(u64, u16, u8)> {
        let offset = self.number()?;
        let gen = u16::try_from(self.number()?).ok()?;
        self.skip_ws();
        let kind = *self.rest().first()?;
        self.pos += 1;
        Some((offset, gen, kind))
    }
}

fn parse_xref_stream(data: &[u8], offset: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let body = data.get(offset..).ok_or(Error::InvalidXref)?;
    let (_, (id, stream)) = parse_indirect_object(body).map_err(|e| Error::ParseError {
        offset,
        reason: format!("cross-reference stream: {}", e),
    })?;
    let dict = match &stream {
        Object::Stream { dict, .. } => dict.clone(),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    match dict.get("Type").and_then(Object::as_name) {
        Some("XRef") => {},
        found if options.strict => {
            return Err(Error::InvalidPdf(format!(
                "object {} is not an XRef stream (type {:?})",
                id, found
            )))
        },
        _ => log::warn!("cross-reference stream {} lacks /Type /XRef", id),
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .filter_map(Object::as_integer)
                .filter_map(|v| usize::try_from(v).ok())
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidPdf(format!("bad /W {:?} in xref stream {}", widths, id)));
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
    let index: Vec<i64> = match dict.get("Index").and_then(Object::as_array) {
        Some(items) => items.iter().filter_map(Object::as_integer).collect(),
        None => vec![0, size],
    };

    let decoded = decode_stream_object(&stream, options)?;
    let row_len: usize = widths.iter().sum();
    let mut rows = decoded.chunks_exact(row_len.max(1));
    let mut table = CrossRefTable::new();

    for pair in index.chunks_exact(2) {
        let (first, count) = (pair[0], pair[1]);
        for i in 0..count.max(0) {
            let Some(row) = rows.next() else {
                log::warn!("xref stream {} ends before its /Index does", id);
                table.set_trailer(dict);
                return Ok(table);
            };
            let (kind_bytes, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { be_uint(kind_bytes) };
            let (f2, f3) = (be_uint(f2), be_uint(f3));

            let id = u32::try_from(first + i).map_err(|_| Error::InvalidXref)?;
            let entry = match kind {
                0 => XRefEntry::Free { gen: f3 as u16 },
                1 => XRefEntry::Uncompressed {
                    offset: f2 as usize,
                    gen: f3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: f2 as u32,
                    index: f3 as u32,
                },
                // unknown types are treated as null references
                _ => continue,
            };
            table.insert(id, entry);
        }
    }

    table.set_trailer(dict);
    Ok(table)
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | u64::from(b))
}
