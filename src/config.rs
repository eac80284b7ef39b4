//! Assembly options.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pretty-printing of the output.
///
/// Deserializes from the loose forms callers pass around: `true`/`false`, a
/// number of spaces, or the literal indent string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndentRepr", into = "IndentRepr")]
pub enum Indent {
    /// Compact output, no newlines
    #[default]
    Off,
    /// One tab per level
    Tab,
    /// `n` spaces per level (0 is compact)
    Width(usize),
    /// Custom string per level (empty is compact)
    Unit(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IndentRepr {
    Flag(bool),
    Width(usize),
    Unit(String),
}

impl From<IndentRepr> for Indent {
    fn from(repr: IndentRepr) -> Self {
        match repr {
            IndentRepr::Flag(true) => Indent::Tab,
            IndentRepr::Flag(false) => Indent::Off,
            IndentRepr::Width(n) => Indent::Width(n),
            IndentRepr::Unit(unit) => Indent::Unit(unit),
        }
    }
}

impl From<Indent> for IndentRepr {
    fn from(indent: Indent) -> Self {
        match indent {
            Indent::Off => IndentRepr::Flag(false),
            Indent::Tab => IndentRepr::Flag(true),
            Indent::Width(n) => IndentRepr::Width(n),
            Indent::Unit(unit) => IndentRepr::Unit(unit),
        }
    }
}

impl Indent {
    /// The string written once per nesting level, or `None` for compact output.
    pub fn unit(&self) -> Option<String> {
        match self {
            Indent::Off | Indent::Width(0) => None,
            Indent::Tab => Some("\t".to_string()),
            Indent::Width(n) => Some(" ".repeat(*n)),
            Indent::Unit(unit) if unit.is_empty() => None,
            Indent::Unit(unit) => Some(unit.clone()),
        }
    }
}

/// Options for one assembled output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssemblerOptions {
    /// Pretty-printing
    pub indent: Indent,
    /// Flate-compress unfiltered streams when it pays off
    pub compress: bool,
    /// Rebuild the page tree as a balanced tree
    pub group_pages: bool,
    /// Maximum kids per page tree node when grouping
    pub page_group_size: usize,
    /// Version written to the header and the catalog's `/Version`
    pub pdf_version: String,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            indent: Indent::Off,
            compress: true,
            group_pages: true,
            page_group_size: 16,
            pdf_version: "1.7".to_string(),
        }
    }
}

impl AssemblerOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compressed, unindented output.
    pub fn compact() -> Self {
        Self::default()
    }

    /// Uncompressed output indented with two spaces, for reading.
    pub fn pretty() -> Self {
        Self::default().with_indent(Indent::Width(2)).with_compress(false)
    }

    /// Set the indent.
    pub fn with_indent(mut self, indent: Indent) -> Self {
        self.indent = indent;
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Enable or disable page tree grouping.
    pub fn with_group_pages(mut self, group_pages: bool) -> Self {
        self.group_pages = group_pages;
        self
    }

    /// Set the page tree branch size.
    pub fn with_page_group_size(mut self, size: usize) -> Self {
        self.page_group_size = size;
        self
    }

    /// Set the output PDF version.
    pub fn with_pdf_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Check the options before use.
    pub fn validate(&self) -> Result<()> {
        if self.group_pages && self.page_group_size < 2 {
            return Err(Error::InvalidConfig(format!(
                "pageGroupSize must be at least 2, got {}",
                self.page_group_size
            )));
        }
        let valid_version = self
            .pdf_version
            .split_once('.')
            .is_some_and(|(major, minor)| is_digits(major) && is_digits(minor));
        if !valid_version {
            return Err(Error::InvalidConfig(format!("pdfVersion {:?} is not of the form 1.7", self.pdf_version)));
        }
        Ok(())
    }

    /// Read options from JSON, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Branch size passed to the page tree grouping step.
    pub(crate) fn branch_size(&self) -> usize {
        if self.group_pages {
            self.page_group_size
        } else {
            usize::MAX
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
