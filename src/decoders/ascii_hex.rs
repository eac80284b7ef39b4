//! ASCIIHexDecode.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter. Whitespace is skipped, `>` ends the data and an odd
/// trailing digit is completed with `0`.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if c.is_ascii_whitespace() || c == 0 {
                continue;
            }
            let nibble = nibble(c).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: '{}' is not a hex digit", c as char))
            })?;
            match high.take() {
                Some(h) => output.push(h << 4 | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(h) = high {
            output.push(h << 4);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

fn nibble(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}
