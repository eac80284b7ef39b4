//! Object number assignment.
//!
//! Every assemble call renumbers the tree from scratch: the numbers are
//! handed out in depth-first order starting at 1, so the set of numbers in
//! use is always exactly `1..=N`.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::tree::{NodeId, ObjectId, Tree};

/// Structure types (or the keys they hang under) that are always written as
/// indirect objects.
pub const INDIRECT_TYPES: [&str; 10] = [
    "AcroForm",
    "MarkInfo",
    "Metadata",
    "Names",
    "Outlines",
    "StructTreeRoot",
    "ViewerPreferences",
    "Catalog",
    "Pages",
    "OCG",
];

/// Per-document numbering state.
#[derive(Debug, Clone, Default)]
pub struct ObjectIdAllocator {
    next: u32,
    visited: HashSet<NodeId>,
}

impl ObjectIdAllocator {
    /// Create an allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number every node under `root`, then `info` if it has any entries.
    ///
    /// A node is numbered when it is tagged indirect, holds a stream, or its
    /// `/Type` (or the key it is reached through) is one of
    /// [`INDIRECT_TYPES`]. Returns the highest number assigned.
    pub fn allocate(&mut self, tree: &mut Tree, root: NodeId, info: NodeId) -> Result<u32> {
        if tree.dict(root).is_none() {
            return Err(Error::InvalidTree("document root is not a dictionary".to_string()));
        }
        self.next = 1;
        self.visited.clear();

        tree.mark_indirect(root);
        self.walk(tree, root);

        let has_info = tree.dict(info).is_some_and(|d| !d.is_empty());
        if has_info {
            tree.mark_indirect(info);
            self.walk(tree, info);
        } else if !self.visited.contains(&info) {
            tree.set_object_id(info, None);
        }

        let count = self.next - 1;
        log::debug!("allocated {} object numbers", count);
        Ok(count)
    }

    fn walk(&mut self, tree: &mut Tree, start: NodeId) {
        let mut stack: Vec<(NodeId, Option<String>)> = vec![(start, None)];
        while let Some((node, key)) = stack.pop() {
            if !self.visited.insert(node) {
                continue;
            }
            if needs_number(tree, node, key.as_deref()) {
                tree.set_object_id(node, Some(ObjectId::new(self.next, 0)));
                self.next += 1;
            }
            let children: Vec<(Option<String>, NodeId)> = tree
                .get(node)
                .children()
                .into_iter()
                .map(|(k, id)| (k.map(str::to_string), id))
                .collect();
            stack.extend(children.into_iter().rev().map(|(k, id)| (id, k)));
        }
    }
}

fn needs_number(tree: &Tree, node: NodeId, key: Option<&str>) -> bool {
    if tree.is_indirect(node) || tree.stream(node).is_some() {
        return true;
    }
    let kind = tree.dict(node).and_then(|d| d.type_name());
    [kind, key]
        .into_iter()
        .flatten()
        .any(|name| INDIRECT_TYPES.contains(&name))
}
