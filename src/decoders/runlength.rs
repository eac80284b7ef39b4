//! RunLengthDecode.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// RunLengthDecode filter.
///
/// A length byte `n` below 128 copies the next `n + 1` bytes, 128 ends the
/// data, and anything above repeats the next byte `257 - n` times.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut rest = input;

        while let Some((&length, tail)) = rest.split_first() {
            rest = tail;
            match length {
                128 => break,
                0..=127 => {
                    let count = usize::from(length) + 1;
                    if rest.len() < count {
                        return Err(Error::Decode(format!(
                            "RunLengthDecode: literal run of {} with {} bytes left",
                            count,
                            rest.len()
                        )));
                    }
                    let (run, tail) = rest.split_at(count);
                    output.extend_from_slice(run);
                    rest = tail;
                },
                _ => {
                    let (&byte, tail) = rest.split_first().ok_or_else(|| {
                        Error::Decode("RunLengthDecode: repeat run without a byte".to_string())
                    })?;
                    output.extend(std::iter::repeat(byte).take(257 - usize::from(length)));
                    rest = tail;
                },
            }
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
