//! LZWDecode.
//!
//! PDF LZW uses MSB-first codes starting at 9 bits, a clear code of 256 and
//! an end-of-data code of 257. With `/EarlyChange 1` (the default) the code
//! width grows one code earlier than in GIF, which is what weezl calls the
//! TIFF size switch.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use weezl::{decode::Decoder, BitOrder};

const CLEAR: usize = 256;
const END: usize = 257;
const MAX_WIDTH: u32 = 12;

/// LZWDecode filter.
pub struct LzwDecoder {
    /// `/EarlyChange` from the decode parameters.
    pub early_change: bool,
}

impl Default for LzwDecoder {
    fn default() -> Self {
        Self { early_change: true }
    }
}

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = if self.early_change {
            Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        } else {
            Decoder::new(BitOrder::Msb, 8)
        };
        match decoder.decode(input) {
            Ok(output) => Ok(output),
            Err(err) => {
                log::debug!("weezl rejected LZW data ({:?}), using table decoder", err);
                decode_table(input, self.early_change)
            },
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

/// Plain table decoder that stops at the first truncated code instead of
/// failing the whole stream.
fn decode_table(input: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = fresh_table();
    let mut bits = BitCursor { data: input, pos: 0 };
    let mut width = 9;
    let mut previous: Option<usize> = None;
    let mut output = Vec::new();

    while let Some(code) = bits.take(width) {
        let code = code as usize;
        if code == END {
            break;
        }
        if code == CLEAR {
            table = fresh_table();
            width = 9;
            previous = None;
            continue;
        }

        let entry = match (table.get(code), previous) {
            (Some(entry), _) => entry.clone(),
            (None, Some(prev)) if code == table.len() => {
                let mut entry = table[prev].clone();
                entry.push(table[prev][0]);
                entry
            },
            _ => {
                return Err(Error::Decode(format!(
                    "LZWDecode: code {} outside table of {}",
                    code,
                    table.len()
                )))
            },
        };
        output.extend_from_slice(&entry);

        if let Some(prev) = previous {
            if table.len() < 1 << MAX_WIDTH {
                let mut grown = table[prev].clone();
                grown.push(entry[0]);
                table.push(grown);
            }
        }
        previous = Some(code);

        let threshold = (1usize << width) - usize::from(early_change);
        if table.len() >= threshold && width < MAX_WIDTH {
            width += 1;
        }
    }

    Ok(output)
}

fn fresh_table() -> Vec<Vec<u8>> {
    // 256 literals plus placeholders for the clear and end codes
    let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    table.push(Vec::new());
    table.push(Vec::new());
    table
}

struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl BitCursor<'_> {
    fn take(&mut self, width: u32) -> Option<u32> {
        let width = width as usize;
        if self.pos + width > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..width {
            let byte = self.data[self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | u32::from(bit);
            self.pos += 1;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weezl::encode::Encoder;

    fn encode_pdf_lzw(data: &[u8]) -> Vec<u8> {
        Encoder::with_tiff_size_switch(BitOrder::Msb, 8).encode(data).unwrap()
    }

    #[test]
    fn test_lzw_decode_simple() {
        let original = b"ABCABCABCABC";
        let decoded = LzwDecoder::default().decode(&encode_pdf_lzw(original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_lzw_decode_long_input_grows_width() {
        let original: Vec<u8> = (0..4000u32).map(|i| (i * 7 % 251) as u8).collect();
        let decoded = LzwDecoder::default().decode(&encode_pdf_lzw(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_lzw_without_early_change() {
        let original = b"The quick brown fox jumps over the lazy dog. ".repeat(10);
        let compressed = Encoder::new(BitOrder::Msb, 8).encode(&original).unwrap();
        let decoder = LzwDecoder { early_change: false };
        assert_eq!(decoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_table_decoder_matches_weezl() {
        let original = b"-----A---B-----A---B-----".repeat(30);
        let compressed = encode_pdf_lzw(&original);
        assert_eq!(decode_table(&compressed, true).unwrap(), original);
    }

    #[test]
    fn test_table_decoder_literal_codes() {
        // 9-bit codes: 'A' (65), 'B' (66), END (257), packed MSB first
        let input = [0x20, 0x90, 0xA0, 0x20];
        assert_eq!(decode_table(&input, true).unwrap(), b"AB");
    }
}
