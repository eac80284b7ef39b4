//! PDF writing.
//!
//! ```text
//! Document (working tree)
//!     ↓
//! [page_tree::flatten / page_tree::group]
//!     ↓
//! [ObjectIdAllocator] (numbers 1..=N)
//!     ↓
//! [PdfSerializer] (objects in completion order)
//!     ↓
//! [write_document] (header, objects, xref, trailer)
//!     ↓
//! PDF bytes
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::{render_name, render_string, PdfSerializer};
pub use pdf_writer::{assemble_document, write_document};
