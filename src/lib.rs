// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::enum_variant_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::should_implement_trait)]

//! # PDF Assembler
//!
//! Load a PDF into an editable object tree, restructure it, and write it back
//! out as a fresh, fully renumbered PDF file.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──[SourceDocument]──> raw object graph (Object / ObjectRef)
//!       ──[ObjectGraphResolver]──> working Tree (arena, aliasing and cycles kept)
//!       ──[page_tree::flatten / group]──> balanced page tree
//!       ──[ObjectIdAllocator]──> object numbers 1..N
//!       ──[PdfSerializer / write_document]──> header, objects, xref, trailer
//! ```
//!
//! The resolver runs once per load. Every assemble call re-runs the page tree
//! normalizer, the allocator and the serializer against the working tree.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_assembler::{AssemblerOptions, OutputFormat, PdfAssembler};
//!
//! # fn main() -> pdf_assembler::Result<()> {
//! let bytes = std::fs::read("input.pdf")?;
//! let assembler = PdfAssembler::from_bytes(bytes)?;
//! println!("{} pages", assembler.count_pages().wait()?);
//!
//! assembler.remove_root_entries(None).wait()?;
//! assembler
//!     .set_options(AssemblerOptions::default().with_page_group_size(8))
//!     .wait()?;
//! let output = assembler.assemble(OutputFormat::from("merged")).wait()?;
//! std::fs::write("merged.pdf", output.as_bytes())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Documents without an assembler
//!
//! The [`Document`] type can be driven directly on the current thread:
//!
//! ```ignore
//! use pdf_assembler::{AssemblerOptions, Document};
//!
//! let mut doc = Document::blank();
//! let pdf = pdf_assembler::writer::assemble_document(&mut doc, &AssemblerOptions::default())?;
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Source parsing (raw object graph)
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod source;
pub mod xref;

// Stream decoders
pub mod decoders;

// Working tree and its passes
pub mod allocator;
pub mod page_tree;
pub mod resolver;
pub mod tree;

// Output
pub mod output;
pub mod writer;

// Documents and configuration
pub mod assembler;
pub mod config;
pub mod date;
pub mod document;

// Re-exports
pub use assembler::{Pending, PdfAssembler, PdfInput};
pub use config::{AssemblerOptions, Indent};
pub use document::Document;
pub use error::{Error, Result};
pub use object::{Object, ObjectRef};
pub use output::{OutputFormat, PdfFile, PdfOutput};
pub use parser_config::ParserOptions;
pub use tree::{Dictionary, Node, NodeId, ObjectId, Stream, StreamData, Tree, Value};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
