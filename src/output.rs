//! Output forms for an assembled file.

use bytes::Bytes;

/// How the caller wants the assembled bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// An owned byte vector
    ArrayBuffer,
    /// Shared immutable bytes
    Uint8Array,
    /// A named file payload
    File(String),
}

impl From<&str> for OutputFormat {
    fn from(name: &str) -> Self {
        match name {
            "ArrayBuffer" => OutputFormat::ArrayBuffer,
            "Uint8Array" => OutputFormat::Uint8Array,
            other => OutputFormat::File(other.to_string()),
        }
    }
}

impl From<String> for OutputFormat {
    fn from(name: String) -> Self {
        OutputFormat::from(name.as_str())
    }
}

/// A named PDF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFile {
    /// File name, always ending in `.pdf`
    pub file_name: String,
    /// `application/pdf`
    pub mime_type: String,
    /// File content
    pub data: Bytes,
}

impl PdfFile {
    /// Wrap `data` under `name`, appending `.pdf` if missing.
    pub fn new(name: &str, data: impl Into<Bytes>) -> Self {
        let file_name = if name.to_ascii_lowercase().ends_with(".pdf") {
            name.to_string()
        } else {
            format!("{}.pdf", name)
        };
        Self {
            file_name,
            mime_type: "application/pdf".to_string(),
            data: data.into(),
        }
    }
}

/// An assembled file in the requested form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfOutput {
    /// For [`OutputFormat::ArrayBuffer`]
    Buffer(Vec<u8>),
    /// For [`OutputFormat::Uint8Array`]
    Bytes(Bytes),
    /// For [`OutputFormat::File`]
    File(PdfFile),
}

impl PdfOutput {
    /// Wrap assembled bytes according to `format`.
    pub fn from_pdf(pdf: Vec<u8>, format: &OutputFormat) -> Self {
        match format {
            OutputFormat::ArrayBuffer => PdfOutput::Buffer(pdf),
            OutputFormat::Uint8Array => PdfOutput::Bytes(Bytes::from(pdf)),
            OutputFormat::File(name) => PdfOutput::File(PdfFile::new(name, pdf)),
        }
    }

    /// The file content.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PdfOutput::Buffer(data) => data,
            PdfOutput::Bytes(data) => data,
            PdfOutput::File(file) => &file.data,
        }
    }

    /// Take the file content.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            PdfOutput::Buffer(data) => data,
            PdfOutput::Bytes(data) => data.to_vec(),
            PdfOutput::File(file) => file.data.to_vec(),
        }
    }
}
