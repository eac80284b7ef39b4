//! Whole-file assembly.
//!
//! Lays out header, objects, a classic xref table and the trailer:
//!
//! ```text
//! %PDF-1.7
//! %âãÏÓ
//! 3 0 obj ... endobj      objects, in the order they finished rendering
//! 2 0 obj ... endobj
//! 1 0 obj ... endobj
//! xref
//! 0 4
//! 0000000000 65535 f
//! 0000000071 00000 n      one row per object number
//! ...
//! trailer
//! <</Root 1 0 R/Info 4 0 R/Size 5>>
//! startxref
//! 512
//! %%EOF
//! ```

use std::io::Write;

use super::object_serializer::PdfSerializer;
use crate::config::AssemblerOptions;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::page_tree;
use crate::tree::{NodeId, Tree, Value};

/// Binary marker comment written after the header line.
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

/// Normalize, number and write a document.
///
/// The page tree is flattened and regrouped, every object is renumbered, and
/// the catalog's `/Version` is set to the output version before writing.
pub fn assemble_document(document: &mut Document, options: &AssemblerOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let root = document.root;
    let info = document.info;

    let pages = page_tree::pages_root(&document.tree, root)?;
    page_tree::flatten(&mut document.tree, pages)?;
    page_tree::group(&mut document.tree, pages, options.branch_size())?;

    let count = document.allocator.allocate(&mut document.tree, root, info)?;
    if let Some(catalog) = document.tree.dict_mut(root) {
        catalog.insert("Version", Value::name(&options.pdf_version));
    }

    let pdf = write_document(&document.tree, root, info, options)?;
    log::debug!("assembled {} objects into {} bytes", count, pdf.len());
    Ok(pdf)
}

/// Write an already numbered tree.
///
/// `info` is written only when it has entries.
pub fn write_document(tree: &Tree, root: NodeId, info: NodeId, options: &AssemblerOptions) -> Result<Vec<u8>> {
    let mut serializer = PdfSerializer::new(tree, options);
    let root_id = serializer.render_object(root)?;
    let info_id = match tree.dict(info) {
        Some(dict) if !dict.is_empty() => Some(serializer.render_object(info)?),
        _ => None,
    };
    let objects = serializer.finish();

    let mut out = Vec::new();
    writeln!(out, "%PDF-{}", options.pdf_version)?;
    out.extend_from_slice(BINARY_MARKER);

    let size = objects.iter().map(|(id, _)| id.num as usize).max().unwrap_or(0) + 1;
    let mut offsets = vec![None; size];
    for (id, block) in &objects {
        offsets[id.num as usize] = Some((out.len(), id.gen));
        out.extend_from_slice(block);
    }

    let xref_offset = out.len();
    write!(out, "xref\n0 {}\n0000000000 65535 f \n", size)?;
    for (num, entry) in offsets.iter().enumerate().skip(1) {
        let (offset, gen) =
            entry.ok_or_else(|| Error::Serialize(format!("object {} is numbered but unreachable", num)))?;
        write!(out, "{:010} {:05} n \n", offset, gen)?;
    }

    let unit = options.indent.unit().unwrap_or_default();
    let nl = if unit.is_empty() { "" } else { "\n" };
    write!(out, "trailer\n<<{nl}{unit}/Root {root_id}")?;
    if let Some(info_id) = info_id {
        write!(out, "{nl}{unit}/Info {info_id}")?;
    }
    write!(out, "{nl}{unit}/Size {size}{nl}>>\nstartxref\n{xref_offset}\n%%EOF\n")?;
    Ok(out)
}
