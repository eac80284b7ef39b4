//! FlateDecode (zlib/deflate).

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter.
///
/// Reads a zlib stream first. When the zlib wrapper is damaged the payload is
/// retried as raw deflate. Output produced before a mid-stream error is kept.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let zlib_err = match inflate(ZlibDecoder::new(input)) {
            Inflated::Complete(data) => return Ok(data),
            Inflated::Partial(data, err) => {
                log::warn!("FlateDecode recovered {} bytes before error: {}", data.len(), err);
                return Ok(data);
            },
            Inflated::Failed(err) => err,
        };

        log::debug!("zlib decode failed ({}), retrying as raw deflate", zlib_err);
        match inflate(DeflateDecoder::new(input)) {
            Inflated::Complete(data) => Ok(data),
            Inflated::Partial(data, err) => {
                log::warn!("raw deflate recovered {} bytes before error: {}", data.len(), err);
                Ok(data)
            },
            Inflated::Failed(_) => Err(Error::Decode(format!("FlateDecode: {}", zlib_err))),
        }
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

enum Inflated {
    Complete(Vec<u8>),
    Partial(Vec<u8>, std::io::Error),
    Failed(std::io::Error),
}

fn inflate<R: Read>(mut reader: R) -> Inflated {
    let mut output = Vec::new();
    match reader.read_to_end(&mut output) {
        Ok(_) => Inflated::Complete(output),
        Err(err) if output.is_empty() => Inflated::Failed(err),
        Err(err) => Inflated::Partial(output, err),
    }
}
