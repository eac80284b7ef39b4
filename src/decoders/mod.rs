//! Stream filter decoders used while loading a source file.
//!
//! Only filters whose output is plain bytes are decoded here: FlateDecode,
//! LZWDecode, ASCII85Decode, ASCIIHexDecode and RunLengthDecode, each with
//! optional predictor parameters. Image codecs (DCT, JPX, JBIG2, CCITT) are
//! never decoded; streams carrying them keep their encoded bytes.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectDict};
use crate::parser_config::{ParserOptions, RATIO_CHECK_FLOOR};

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{decode_predictor, DecodeParams};
pub use runlength::RunLengthDecoder;

/// Filters this module can undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (zlib/deflate)
    Flate,
    /// LZWDecode
    Lzw,
    /// ASCII85Decode
    Ascii85,
    /// ASCIIHexDecode
    AsciiHex,
    /// RunLengthDecode
    RunLength,
}

impl Filter {
    /// Look up a filter by its `/Filter` name, abbreviations included.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Filter::Flate),
            "LZWDecode" | "LZW" => Some(Filter::Lzw),
            "ASCII85Decode" | "A85" => Some(Filter::Ascii85),
            "ASCIIHexDecode" | "AHx" => Some(Filter::AsciiHex),
            "RunLengthDecode" | "RL" => Some(Filter::RunLength),
            _ => None,
        }
    }

    fn decoder(self, params: Option<&DecodeParams>) -> Box<dyn StreamDecoder> {
        match self {
            Filter::Flate => Box::new(FlateDecoder),
            Filter::Lzw => Box::new(LzwDecoder {
                early_change: params.map_or(true, |p| p.early_change),
            }),
            Filter::Ascii85 => Box::new(Ascii85Decoder),
            Filter::AsciiHex => Box::new(AsciiHexDecoder),
            Filter::RunLength => Box::new(RunLengthDecoder),
        }
    }

    /// Whether predictor parameters apply after this filter.
    fn takes_predictor(self) -> bool {
        matches!(self, Filter::Flate | Filter::Lzw)
    }
}

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Apply one filter (and its predictor, if any) under the load limits.
pub fn decode_filter(
    data: &[u8],
    filter: Filter,
    params: Option<&DecodeParams>,
    options: &ParserOptions,
) -> Result<Vec<u8>> {
    let decoder = filter.decoder(params);
    let mut decoded = decoder.decode(data)?;

    if filter.takes_predictor() {
        if let Some(params) = params.filter(|p| p.predictor > 1) {
            decoded = decode_predictor(&decoded, params)?;
        }
    }

    if options.max_decompressed_size > 0 && decoded.len() > options.max_decompressed_size {
        return Err(Error::LimitExceeded(format!(
            "{} produced {} bytes, limit is {}",
            decoder.name(),
            decoded.len(),
            options.max_decompressed_size
        )));
    }
    if options.max_decompression_ratio > 0 && decoded.len() > RATIO_CHECK_FLOOR {
        let ratio = decoded.len() / data.len().max(1);
        if ratio > options.max_decompression_ratio as usize {
            return Err(Error::LimitExceeded(format!(
                "{} expanded {} bytes to {} (ratio {}:1, limit {}:1)",
                decoder.name(),
                data.len(),
                decoded.len(),
                ratio,
                options.max_decompression_ratio
            )));
        }
    }

    Ok(decoded)
}

/// Decode parameters for the filter at `index` of a stream's chain.
///
/// `/DecodeParms` is a dictionary when the chain has one filter and an array
/// (entries may be null) when it has several.
pub fn decode_params_at(dict: &ObjectDict, index: usize) -> Option<DecodeParams> {
    match dict.get("DecodeParms").or_else(|| dict.get("DP"))? {
        Object::Dictionary(params) if index == 0 => Some(DecodeParams::from_dict(params)),
        Object::Array(items) => match items.get(index)? {
            Object::Dictionary(params) => Some(DecodeParams::from_dict(params)),
            _ => None,
        },
        _ => None,
    }
}

/// Fully decode a stream whose whole filter chain must be understood, such
/// as a cross-reference or object stream.
pub fn decode_stream_object(obj: &Object, options: &ParserOptions) -> Result<Vec<u8>> {
    let (dict, data) = match obj {
        Object::Stream { dict, data } => (dict, data),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    let mut current = data.to_vec();
    for (index, name) in obj.filter_names().iter().enumerate() {
        let filter = Filter::from_name(name).ok_or_else(|| Error::UnsupportedFilter(name.clone()))?;
        current = decode_filter(&current, filter, decode_params_at(dict, index).as_ref(), options)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_names_and_abbreviations() {
        assert_eq!(Filter::from_name("FlateDecode"), Some(Filter::Flate));
        assert_eq!(Filter::from_name("AHx"), Some(Filter::AsciiHex));
        assert_eq!(Filter::from_name("DCTDecode"), None);
        assert_eq!(Filter::from_name("JBIG2Decode"), None);
    }

    #[test]
    fn test_decode_stream_object_chain() {
        let mut dict = ObjectDict::new();
        dict.insert(
            "Filter".to_string(),
            Object::Array(vec![
                Object::Name("ASCIIHexDecode".to_string()),
                Object::Name("RunLengthDecode".to_string()),
            ]),
        );
        // RunLength: literal run of 2 bytes "Hi", then EOD
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"01 48 69 80>"),
        };
        let decoded = decode_stream_object(&stream, &ParserOptions::default()).unwrap();
        assert_eq!(decoded, b"Hi");
    }

    #[test]
    fn test_decode_stream_object_unsupported() {
        let mut dict = ObjectDict::new();
        dict.insert("Filter".to_string(), Object::Name("DCTDecode".to_string()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::new(),
        };
        match decode_stream_object(&stream, &ParserOptions::default()) {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "DCTDecode"),
            other => panic!("expected UnsupportedFilter, got {:?}", other),
        }
    }

    #[test]
    fn test_size_limit() {
        let options = ParserOptions::default().with_max_decompressed_size(4);
        let result = decode_filter(b"4142434445", Filter::AsciiHex, None, &options);
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_decode_params_at() {
        let mut params = ObjectDict::new();
        params.insert("Predictor".to_string(), Object::Integer(12));
        params.insert("Columns".to_string(), Object::Integer(4));

        let mut dict = ObjectDict::new();
        dict.insert("DecodeParms".to_string(), Object::Dictionary(params.clone()));
        assert_eq!(decode_params_at(&dict, 0).map(|p| p.predictor), Some(12));
        assert!(decode_params_at(&dict, 1).is_none());

        dict.insert(
            "DecodeParms".to_string(),
            Object::Array(vec![Object::Null, Object::Dictionary(params)]),
        );
        assert!(decode_params_at(&dict, 0).is_none());
        assert_eq!(decode_params_at(&dict, 1).map(|p| p.columns), Some(4));
    }
}
