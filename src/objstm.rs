//! Object streams (`/Type /ObjStm`, PDF 1.5+).
//!
//! The decoded stream starts with `/N` pairs of integers, each an object
//! number and an offset relative to `/First`, followed by the objects
//! themselves:
//!
//! ```text
//! 10 0 11 15 12 28
//! << /Type /Font ... >> [ 0 0 612 792 ] << /Kids [...] >>
//! ```

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Object, ObjectDict};
use crate::parser::parse_object;

/// Objects unpacked from one object stream, in stream order.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    objects: Vec<(u32, Object)>,
}

impl ObjectStream {
    /// Object stored at `index`, provided its number matches `id`.
    ///
    /// Falls back to a search by number when the index is stale.
    pub fn get(&self, id: u32, index: u32) -> Option<&Object> {
        match self.objects.get(index as usize) {
            Some((found, obj)) if *found == id => Some(obj),
            _ => self.objects.iter().find(|(found, _)| *found == id).map(|(_, obj)| obj),
        }
    }

    /// Number of objects in the stream.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Parse decoded object stream data described by `dict`.
pub fn parse_object_stream(dict: &ObjectDict, decoded: &[u8]) -> Result<ObjectStream> {
    if let Some(kind) = dict.get("Type").and_then(Object::as_name) {
        if kind != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let count = required_count(dict, "N")?;
    let first = required_count(dict, "First")?;
    if first > decoded.len() {
        return Err(Error::InvalidPdf(format!(
            "object stream /First {} is past its {} bytes",
            first,
            decoded.len()
        )));
    }
    // every header pair takes at least four bytes
    if count.saturating_mul(4) > first {
        return Err(Error::InvalidPdf(format!("object stream claims {} objects", count)));
    }

    let mut header = &decoded[..first];
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let (rest, id) = header_integer(header)?;
        let (rest, offset) = header_integer(rest)?;
        offsets.push((id, offset));
        header = rest;
    }

    let body = &decoded[first..];
    let mut objects = Vec::with_capacity(count);
    for (id, offset) in offsets {
        let id = u32::try_from(id).map_err(|_| Error::InvalidPdf(format!("object number {}", id)))?;
        let start = usize::try_from(offset).ok().filter(|&o| o <= body.len()).ok_or_else(|| {
            Error::InvalidPdf(format!("object {} offset {} outside object stream", id, offset))
        })?;
        match parse_object(&body[start..]) {
            Ok((_, obj)) => objects.push((id, obj)),
            Err(e) => {
                log::warn!("object {} in object stream is unreadable: {}", id, e);
                objects.push((id, Object::Null));
            },
        }
    }

    Ok(ObjectStream { objects })
}

fn required_count(dict: &ObjectDict, key: &str) -> Result<usize> {
    let value = dict
        .get(key)
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf(format!("object stream missing /{}", key)))?;
    usize::try_from(value).map_err(|_| Error::InvalidPdf(format!("object stream /{} is {}", key, value)))
}

fn header_integer(input: &[u8]) -> Result<(&[u8], i64)> {
    match token(input) {
        Ok((rest, Token::Integer(value))) => Ok((rest, value)),
        _ => Err(Error::InvalidPdf("malformed object stream header".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_dict(n: i64, first: i64) -> ObjectDict {
        let mut dict = ObjectDict::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        dict
    }

    #[test]
    fn test_parse_object_stream() {
        let header = b"10 0 11 14 ";
        let mut data = header.to_vec();
        data.extend_from_slice(b"<< /A 1 >>    [1 2 3]");
        let stream = parse_object_stream(&stream_dict(2, header.len() as i64), &data).unwrap();

        assert_eq!(stream.len(), 2);
        assert!(matches!(stream.get(10, 0), Some(Object::Dictionary(_))));
        assert_eq!(stream.get(11, 1).and_then(Object::as_array).map(Vec::len), Some(3));
    }

    #[test]
    fn test_stale_index_falls_back_to_number() {
        let header = b"7 0 ";
        let mut data = header.to_vec();
        data.extend_from_slice(b"42");
        let stream = parse_object_stream(&stream_dict(1, 4), &data).unwrap();
        assert_eq!(stream.get(7, 5), Some(&Object::Integer(42)));
        assert_eq!(stream.get(8, 0), None);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let mut dict = stream_dict(0, 0);
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        assert!(parse_object_stream(&dict, b"").is_err());
    }

    #[test]
    fn test_missing_first_and_bad_header() {
        let mut dict = stream_dict(1, 4);
        dict.shift_remove("First");
        assert!(parse_object_stream(&dict, b"1 0 true").is_err());
        assert!(parse_object_stream(&stream_dict(1, 4), b"/X 0 true").is_err());
        assert!(parse_object_stream(&stream_dict(100, 4), b"1 0 true").is_err());
    }
}
