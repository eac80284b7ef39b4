//! PDF object parser.
//!
//! Combines lexer tokens into complete objects: arrays, dictionaries,
//! streams and indirect references. Recursive descent; every function
//! returns a nom `IResult`.

use crate::error::{Error, Result};
use crate::lexer::{hex_value, is_whitespace, token, Token};
use crate::object::{Object, ObjectDict, ObjectRef};
use nom::IResult;

/// Deepest array/dictionary nesting accepted before the parser gives up.
pub const MAX_NESTING: usize = 256;

fn fail(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Decode escape sequences in the raw body of a literal string.
///
/// Handles `\n \r \t \b \f \( \) \\`, 1-3 digit octal escapes, and
/// backslash line continuations. Unknown escapes drop the backslash.
///
/// ```
/// # use pdf_assembler::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Section \\247 71"), b"Section \xa7 71");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let byte = raw[i];
        i += 1;
        if byte == b'\r' {
            // A bare end-of-line inside a string reads as a single LF
            if raw.get(i) == Some(&b'\n') {
                i += 1;
            }
            out.push(b'\n');
            continue;
        }
        if byte != b'\\' || i >= raw.len() {
            out.push(byte);
            continue;
        }

        let escaped = raw[i];
        i += 1;
        match escaped {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut code = (escaped - b'0') as u32;
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + (d - b'0') as u32;
                            i += 1;
                        },
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }

    out
}

/// Decode the body of a hex string. Whitespace is ignored and an odd final
/// digit is padded with 0.
///
/// ```
/// # use pdf_assembler::parser::decode_hex;
/// assert_eq!(decode_hex(b"48 65 6C 6C 6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes.iter().copied().filter(|&c| !is_whitespace(c)).collect();
    if let Some(bad) = digits.iter().find(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::ParseError {
            offset: 0,
            reason: format!("invalid hex digit '{}'", *bad as char),
        });
    }
    Ok(digits
        .chunks(2)
        .map(|pair| (hex_value(pair[0]) << 4) | pair.get(1).map_or(0, |&low| hex_value(low)))
        .collect())
}

/// Parse a PDF object from input bytes.
///
/// ```
/// use pdf_assembler::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Kids [3 0 R 4 0 R] /Count 2 >>").unwrap();
/// assert_eq!(obj.as_dict().unwrap()["Count"].as_integer(), Some(2));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0)
}

fn parse_nested(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }

    let (rest, tok) = token(input)?;
    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Integer(id) => {
            // `id gen R` is a reference; otherwise the integer stands alone
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(id), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((rest, Object::Integer(id)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::HexDigit,
            ))),
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::ArrayStart => parse_array(rest, depth),
        Token::DictStart => {
            let (rest, dict) = parse_dictionary(rest, depth)?;
            match token(rest) {
                Ok((stream_input, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(stream_input, &dict)?;
                    Ok((
                        rest,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::from(data),
                        },
                    ))
                },
                _ => Ok((rest, Object::Dictionary(dict))),
            }
        },
        _ => Err(fail(input, nom::error::ErrorKind::Tag)),
    }
}

fn parse_array(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    let mut remaining = input;
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_nested(remaining, depth + 1)?;
        items.push(item);
        remaining = rest;
    }
}

fn parse_dictionary(input: &[u8], depth: usize) -> IResult<&[u8], ObjectDict> {
    let mut dict = ObjectDict::new();
    let mut remaining = input;
    loop {
        let (rest, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_nested(rest, depth + 1)?;
                dict.insert(key, value);
                remaining = rest;
            },
            _ => return Err(fail(remaining, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Read stream bytes following the `stream` keyword.
///
/// A direct integer `/Length` is trusted when `endstream` follows it;
/// otherwise the data runs up to the next `endstream`, minus one EOL marker.
fn parse_stream_data<'a>(input: &'a [u8], dict: &ObjectDict) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        if length <= input.len() {
            if let Ok((rest, Token::StreamEnd)) = token(&input[length..]) {
                return Ok((rest, input[..length].to_vec()));
            }
        }
        log::debug!("Stream /Length {} does not line up with endstream, scanning", length);
    }

    let keyword = b"endstream";
    let pos = input
        .windows(keyword.len())
        .position(|window| window == keyword)
        .ok_or_else(|| fail(input, nom::error::ErrorKind::Eof))?;
    let mut data = &input[..pos];
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&input[pos + keyword.len()..], data.to_vec()))
}

/// Parse an indirect object definition: `id gen obj <object> endobj`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (rest, id) = token(input)?;
    let (rest, gen) = token(rest)?;
    let (rest, obj_kw) = token(rest)?;
    let obj_ref = match (id, gen, obj_kw) {
        (Token::Integer(id), Token::Integer(gen), Token::ObjStart) => {
            match (u32::try_from(id), u16::try_from(gen)) {
                (Ok(id), Ok(gen)) => ObjectRef::new(id, gen),
                _ => return Err(fail(input, nom::error::ErrorKind::Digit)),
            }
        },
        _ => return Err(fail(input, nom::error::ErrorKind::Tag)),
    };

    let (rest, object) = parse_object(rest)?;
    match token(rest) {
        Ok((after, Token::ObjEnd)) => Ok((after, (obj_ref, object))),
        _ => Ok((rest, (obj_ref, object))),
    }
}
