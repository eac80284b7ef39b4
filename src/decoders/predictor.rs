//! Predictor post-processing for FlateDecode and LZWDecode output.
//!
//! Predictor 2 is the TIFF horizontal differencing scheme; 10 through 15
//! are PNG row filters, where every row carries its own filter tag byte.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectDict};

/// `/DecodeParms` entries relevant to the decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// 1 = none, 2 = TIFF, 10-15 = PNG
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
    /// LZW `/EarlyChange`; any value other than 0 means enabled.
    pub early_change: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
            early_change: true,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` dictionary, falling back to the
    /// defaults for absent or non-positive entries.
    pub fn from_dict(dict: &ObjectDict) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, fallback: usize| {
            dict.get(key)
                .and_then(Object::as_integer)
                .and_then(|v| usize::try_from(v).ok())
                .filter(|&v| v > 0)
                .unwrap_or(fallback)
        };
        Self {
            predictor: dict
                .get("Predictor")
                .and_then(Object::as_integer)
                .unwrap_or(defaults.predictor),
            columns: positive("Columns", defaults.columns),
            colors: positive("Colors", defaults.colors),
            bits_per_component: positive("BitsPerComponent", defaults.bits_per_component),
            early_change: dict
                .get("EarlyChange")
                .and_then(Object::as_integer)
                .map_or(defaults.early_change, |v| v != 0),
        }
    }

    /// Bytes of sample data in one row, without a PNG tag byte.
    pub fn row_len(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous sample.
    fn sample_stride(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Undo the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => tiff_predictor(data, params),
        10..=15 => png_predictor(data, params),
        other => Err(Error::Decode(format!("unsupported predictor {}", other))),
    }
}

fn tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let stride = params.colors;
    let mut output = data.to_vec();
    for row in output.chunks_mut(params.row_len().max(1)) {
        for i in stride..row.len() {
            row[i] = row[i].wrapping_add(row[i - stride]);
        }
    }
    Ok(output)
}

fn png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_len();
    let stride = params.sample_stride();
    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&tag, encoded) = match chunk.split_first() {
            Some(parts) => parts,
            None => break,
        };
        let mut row = encoded.to_vec();
        for i in 0..row.len() {
            let left = if i >= stride { row[i - stride] } else { 0 };
            let up = previous[i];
            let up_left = if i >= stride { previous[i - stride] } else { 0 };
            let prediction = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("invalid PNG row filter {}", other)))
                },
            };
            row[i] = row[i].wrapping_add(prediction);
        }
        output.extend_from_slice(&row);
        previous[..row.len()].copy_from_slice(&row);
    }
    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (i16::from(a), i16::from(b), i16::from(c));
    let p = ia + ib - ic;
    let (pa, pb, pc) = ((p - ia).abs(), (p - ib).abs(), (p - ic).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(columns: usize) -> DecodeParams {
        DecodeParams {
            predictor: 12,
            columns,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_predictor() {
        assert_eq!(decode_predictor(b"abc", &DecodeParams::default()).unwrap(), b"abc");
    }

    #[test]
    fn test_png_up_rows() {
        let encoded = [2, 10, 20, 30, 2, 5, 5, 5];
        assert_eq!(decode_predictor(&encoded, &png(3)).unwrap(), vec![10, 20, 30, 15, 25, 35]);
    }

    #[test]
    fn test_png_per_row_tags() {
        // row 0 Sub, row 1 None, row 2 Average
        let encoded = [1, 1, 1, 1, 0, 4, 4, 4, 3, 0, 0, 0];
        let decoded = decode_predictor(&encoded, &png(3)).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4, 4, 4, 2, 3, 3]);
    }

    #[test]
    fn test_png_paeth() {
        let encoded = [4, 7, 1, 4, 0, 0];
        assert_eq!(decode_predictor(&encoded, &png(2)).unwrap(), vec![7, 8, 7, 8]);
    }

    #[test]
    fn test_png_bad_tag() {
        assert!(decode_predictor(&[9, 1, 2], &png(2)).is_err());
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 3,
            ..Default::default()
        };
        assert_eq!(decode_predictor(&[1, 1, 1, 5, 0, 0], &params).unwrap(), vec![1, 2, 3, 5, 5, 5]);
    }

    #[test]
    fn test_from_dict() {
        let mut dict = ObjectDict::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(5));
        dict.insert("EarlyChange".to_string(), Object::Integer(0));
        dict.insert("Colors".to_string(), Object::Integer(-2));
        let params = DecodeParams::from_dict(&dict);
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.colors, 1);
        assert!(!params.early_change);
        assert_eq!(params.row_len(), 5);
    }
}
