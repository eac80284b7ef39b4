//! ASCII85Decode: five characters in `!`..=`u` per four bytes, `z` for a
//! zero group, `~>` to end.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCII85Decode filter.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let body = input.strip_prefix(b"<~").unwrap_or(input);
        let mut output = Vec::with_capacity(body.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut filled = 0;

        for &c in body {
            match c {
                b'~' => break,
                b'z' if filled == 0 => output.extend_from_slice(&[0; 4]),
                b'z' => return Err(Error::Decode("ASCII85Decode: 'z' inside a group".to_string())),
                b'!'..=b'u' => {
                    group[filled] = c - b'!';
                    filled += 1;
                    if filled == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        filled = 0;
                    }
                },
                c if c.is_ascii_whitespace() || c == 0 => {},
                other => {
                    return Err(Error::Decode(format!(
                        "ASCII85Decode: unexpected byte 0x{:02x}",
                        other
                    )))
                },
            }
        }

        match filled {
            0 => {},
            1 => return Err(Error::Decode("ASCII85Decode: dangling final character".to_string())),
            n => {
                // pad with the highest digit, keep n - 1 bytes
                group[n..].fill(84);
                let bytes = group_value(&group)?.to_be_bytes();
                output.extend_from_slice(&bytes[..n - 1]);
            },
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &digit| acc * 85 + u64::from(digit));
    u32::try_from(value).map_err(|_| Error::Decode("ASCII85Decode: group overflows".to_string()))
}
