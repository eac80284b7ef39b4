//! Load-path options: how forgiving the parser is and which resource limits
//! apply while reading and decoding a source file.
//!
//! # Example
//!
//! ```
//! use pdf_assembler::parser_config::ParserOptions;
//!
//! let strict = ParserOptions::strict();
//! let lenient = ParserOptions::lenient();
//! let custom = ParserOptions::default().with_max_decompressed_size(16 * 1024 * 1024);
//! assert!(strict.strict && !lenient.strict);
//! assert_eq!(custom.max_decompressed_size, 16 * 1024 * 1024);
//! ```

/// Parser options for the load path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Reject deviations the lenient parser would repair: a header that does
    /// not start at byte 0, and malformed cross-reference rows.
    pub strict: bool,

    /// Maximum decompression ratio (decoded:encoded) for a single stream.
    ///
    /// Only checked once the decoded data passes [`RATIO_CHECK_FLOOR`]
    /// bytes, so small, highly repetitive streams are never rejected.
    /// Set to 0 to disable.
    pub max_decompression_ratio: u32,

    /// Maximum decoded stream size in bytes. Set to 0 to disable.
    pub max_decompressed_size: usize,

    /// Maximum length of a reference-to-reference chain before the target
    /// is treated as null.
    pub max_reference_hops: u32,

    /// Maximum number of `/Prev` cross-reference sections followed.
    pub max_xref_sections: u32,

    /// Maximum PDF file size in bytes. Set to 0 to disable.
    pub max_file_size: usize,
}

/// Decoded size below which the ratio limit is not applied.
pub const RATIO_CHECK_FLOOR: usize = 1024 * 1024;

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: fail on structural deviations.
    pub fn strict() -> Self {
        Self {
            strict: true,
            max_decompression_ratio: 100,
            max_decompressed_size: 100 * 1024 * 1024,
            max_reference_hops: 16,
            max_xref_sections: 100,
            max_file_size: 500 * 1024 * 1024,
        }
    }

    /// Lenient mode: repair what can be repaired, with wider limits.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_decompression_ratio: 1000,
            max_decompressed_size: 250 * 1024 * 1024,
            max_reference_hops: 32,
            max_xref_sections: 500,
            max_file_size: 0,
        }
    }

    /// Set the decoded size limit.
    pub fn with_max_decompressed_size(mut self, bytes: usize) -> Self {
        self.max_decompressed_size = bytes;
        self
    }

    /// Set the decompression ratio limit.
    pub fn with_max_decompression_ratio(mut self, ratio: u32) -> Self {
        self.max_decompression_ratio = ratio;
        self
    }

    /// Set the file size limit.
    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }
}
