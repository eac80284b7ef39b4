//! Error types for the PDF assembler.
//!
//! One error enum covers the whole pipeline: loading and decoding the source
//! file, working on the tree, and writing the output.

/// Result type alias for PDF assembler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, editing, or assembling a PDF.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Options could not be read from JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported feature (encrypted documents among others)
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure in the source file
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// A configured resource limit was hit while loading
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// The working tree is missing something the pipeline requires
    #[error("Invalid document tree: {0}")]
    InvalidTree(String),

    /// Rendering the tree to PDF bytes failed
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Assembler options are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The document worker is gone and can no longer accept or answer jobs
    #[error("Document queue closed")]
    QueueClosed,

    /// A queued job panicked; only that job's result is affected
    #[error("Queued operation panicked: {0}")]
    TaskPanicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = Error::ParseError {
            offset: 512,
            reason: "unterminated dictionary".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to parse object at byte 512: unterminated dictionary");
        assert_eq!(Error::ObjectNotFound(7, 2).to_string(), "Object not found: 7 2 R");
        assert!(Error::InvalidTree("no /Pages".to_string()).to_string().contains("no /Pages"));
    }

    #[test]
    fn test_conversions() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "in.pdf").into();
        assert!(matches!(io, Error::Io(_)));

        let json = serde_json::from_str::<u32>("{").unwrap_err();
        assert!(matches!(Error::from(json), Error::Json(_)));
    }

    #[test]
    fn test_errors_cross_threads() {
        fn send_sync<T: Send + Sync + 'static>() {}
        send_sync::<Error>();
    }
}
