//! PDF lexer (tokenizer).
//!
//! Splits raw PDF bytes into tokens: numbers, literal and hex strings, names,
//! keywords and delimiters. Whitespace (space, \t, \r, \n, \0, \f) and
//! comments (`%` to end of line) between tokens are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5, 4.)
    Real(f64),
    /// Raw body of a literal string, escapes still encoded
    LiteralString(&'a [u8]),
    /// Raw body of a hex string, whitespace included
    HexString(&'a [u8]),
    /// Name with `#xx` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` in `10 0 R`
    R,
}

/// PDF whitespace bytes (ISO 32000-1, Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Bytes that end a name or keyword.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip any run of whitespace and comments. Never fails.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, ws) = take_while(is_whitespace)(remaining)?;
        remaining = rest;
        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) if ws.is_empty() => return Ok((remaining, ())),
            Err(_) => {},
        }
    }
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Integers and reals, including the `.5`, `5.` and `+17` spellings.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)?;
    let text = std::str::from_utf8(text).map_err(|_| digit_error(input))?;

    if !text.contains('.') {
        if let Ok(int) = text.parse::<i64>() {
            return Ok((rest, Token::Integer(int)));
        }
    }
    // Oversized integers degrade to reals rather than failing the whole object
    let normalized = text.trim_start_matches('+');
    let real = if normalized.ends_with('.') {
        format!("{}0", normalized).parse::<f64>()
    } else {
        normalized.parse::<f64>()
    }
    .map_err(|_| digit_error(input))?;
    Ok((rest, Token::Real(real)))
}

/// Literal string with balanced parentheses; escapes are skipped, not decoded.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)), Token::HexString),
        char('>'),
    )(input)
}

/// Decode `#xx` escapes in a raw name.
///
/// Each resulting byte maps to the char with the same code point, so names
/// survive a parse/serialize round trip byte for byte.
///
/// ```
/// # use pdf_assembler::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#'
            && i + 2 < raw.len()
            && raw[i + 1].is_ascii_hexdigit()
            && raw[i + 2].is_ascii_hexdigit()
        {
            out.push(((hex_value(raw[i + 1]) << 4) | hex_value(raw[i + 2])) as char);
            i += 3;
            continue;
        }
        out.push(raw[i] as char);
        i += 1;
    }
    out
}

/// Value of an ASCII hex digit; callers check `is_ascii_hexdigit` first.
pub(crate) fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(|c| !is_whitespace(c) && !is_delimiter(c)), |raw: &[u8]| {
            Token::Name(decode_name_escapes(raw))
        }),
    )(input)
}

/// Keywords must end at whitespace, a delimiter, or the end of input.
fn keyword<'a>(
    word: &'static [u8],
    token: Token<'static>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Token<'a>> {
    move |input: &'a [u8]| {
        let (rest, _) = tag(word)(input)?;
        match rest.first() {
            Some(&c) if !is_whitespace(c) && !is_delimiter(c) => {
                Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
            },
            _ => Ok((rest, token.clone())),
        }
    }
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        keyword(b"false", Token::False),
        keyword(b"true", Token::True),
        keyword(b"null", Token::Null),
        keyword(b"obj", Token::ObjStart),
        keyword(b"endobj", Token::ObjEnd),
        keyword(b"endstream", Token::StreamEnd),
        keyword(b"stream", Token::StreamStart),
        keyword(b"R", Token::R),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}
