//! Page tree normalization.
//!
//! [`flatten`] collapses a nested page tree into one `Kids` list of leaf pages,
//! pushing inheritable attributes down onto the leaves. [`group`] then builds a
//! balanced tree of intermediate `/Pages` nodes over that list. Running both
//! again on their own output reproduces the same structure.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::tree::{Dictionary, Node, NodeId, Tree, Value};

/// Page attributes a leaf inherits from its ancestors.
pub const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// The catalog's `/Pages` node.
pub fn pages_root(tree: &Tree, catalog: NodeId) -> Result<NodeId> {
    tree.child(catalog, "Pages")
        .filter(|id| tree.dict(*id).is_some())
        .ok_or_else(|| Error::InvalidTree("catalog has no /Pages dictionary".to_string()))
}

/// Node ids listed in a node's `/Kids` array, skipping anything that is not a node.
pub fn kids(tree: &Tree, node: NodeId) -> Vec<NodeId> {
    tree.child(node, "Kids")
        .and_then(|kids| tree.array(kids))
        .map(|items| items.iter().filter_map(Value::as_node).collect())
        .unwrap_or_default()
}

fn is_pages(dict: &Dictionary) -> bool {
    match dict.type_name() {
        Some(kind) => kind == "Pages",
        None => dict.contains_key("Kids"),
    }
}

/// Flatten the tree under `root` into a single list of leaves.
///
/// Interior nodes are dropped from the tree in favour of their leaves, in
/// document order. Intermediate nodes built by an earlier [`group`] are
/// released back to the arena. An inheritable attribute found on an interior node (or on
/// `root` itself) is copied onto every leaf below it that lacks one and then
/// removed from the interior node. Returns the leaf count, which is also
/// written to `root`'s `/Count`.
pub fn flatten(tree: &mut Tree, root: NodeId) -> Result<usize> {
    if tree.dict(root).is_none() {
        return Err(Error::InvalidTree("page tree root is not a dictionary".to_string()));
    }

    let mut leaves = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut stack: Vec<(NodeId, Vec<(String, Value)>)> = vec![(root, Vec::new())];

    while let Some((node, mut inherited)) = stack.pop() {
        let interior = match tree.dict(node) {
            Some(dict) => node == root || is_pages(dict),
            None => {
                log::warn!("dropping page tree kid {:?} that is not a dictionary", node);
                continue;
            },
        };

        if !interior {
            if let Some(dict) = tree.dict_mut(node) {
                for (key, value) in &inherited {
                    if !dict.contains_key(key) {
                        dict.insert(key.clone(), value.clone());
                    }
                }
            }
            leaves.push(node);
            continue;
        }

        let children = kids(tree, node);
        if let Some(dict) = tree.dict_mut(node) {
            for key in INHERITABLE {
                if let Some(value) = dict.remove(key) {
                    inherited.retain(|(k, _)| k != key);
                    inherited.push((key.to_string(), value));
                }
            }
        }
        for kid in children.into_iter().rev() {
            if visited.insert(kid) {
                stack.push((kid, inherited.clone()));
            } else {
                log::warn!("page tree node {:?} is listed more than once, keeping the first", kid);
            }
        }
        if node != root && tree.is_page_branch(node) {
            // built by an earlier `group`; its slots go to the next one
            if let Some(kids) = tree.child(node, "Kids") {
                tree.release(kids);
            }
            tree.release(node);
        }
    }

    let items = leaves.iter().map(|leaf| Value::Node(*leaf)).collect();
    set_kids(tree, root, items);
    for leaf in &leaves {
        if let Some(dict) = tree.dict_mut(*leaf) {
            dict.insert("Parent", Value::Node(root));
        }
    }
    set_count(tree, root, leaves.len());

    log::debug!("flattened page tree to {} pages", leaves.len());
    Ok(leaves.len())
}

/// Rebuild the leaves listed under `root` as a balanced tree.
///
/// With at most `branch_size` leaves, they hang directly off `root`. Otherwise
/// the leaves are cut into `ceil(n / branch_size)` runs of `branch_size`, or,
/// once `n` exceeds `branch_size²`, into `branch_size` runs of
/// `ceil(n / branch_size)`. Each run of more than one leaf becomes a new
/// `/Pages` node built the same way.
pub fn group(tree: &mut Tree, root: NodeId, branch_size: usize) -> Result<()> {
    if branch_size < 2 {
        return Err(Error::InvalidConfig(format!("page group size {} is below 2", branch_size)));
    }
    let leaves = kids(tree, root);
    let items = build_level(tree, root, &leaves, branch_size);
    set_kids(tree, root, items);
    set_count(tree, root, leaves.len());
    Ok(())
}

fn build_level(tree: &mut Tree, parent: NodeId, leaves: &[NodeId], branch_size: usize) -> Vec<Value> {
    let n = leaves.len();
    if n <= branch_size {
        return leaves.iter().map(|leaf| attach(tree, parent, *leaf)).collect();
    }

    let chunk = if n > branch_size.saturating_mul(branch_size) {
        n.div_ceil(branch_size)
    } else {
        branch_size
    };

    let mut items = Vec::with_capacity(n.div_ceil(chunk));
    for run in leaves.chunks(chunk) {
        if let [single] = run {
            items.push(attach(tree, parent, *single));
            continue;
        }
        let branch = tree.add_indirect(Node::Dictionary(
            [
                ("Type", Value::name("Pages")),
                ("Parent", Value::Node(parent)),
                ("Count", Value::Integer(run.len() as i64)),
            ]
            .into_iter()
            .collect(),
        ));
        tree.note_page_branch(branch);
        let below = build_level(tree, branch, run, branch_size);
        let kids = tree.add_array(below);
        if let Some(dict) = tree.dict_mut(branch) {
            dict.insert("Kids", Value::Node(kids));
        }
        items.push(Value::Node(branch));
    }
    items
}

fn attach(tree: &mut Tree, parent: NodeId, leaf: NodeId) -> Value {
    if let Some(dict) = tree.dict_mut(leaf) {
        dict.insert("Parent", Value::Node(parent));
    }
    tree.mark_indirect(leaf);
    Value::Node(leaf)
}

fn set_kids(tree: &mut Tree, node: NodeId, items: Vec<Value>) {
    if let Some(existing) = tree.child(node, "Kids") {
        if let Some(array) = tree.array_mut(existing) {
            *array = items;
            return;
        }
    }
    let kids = tree.add_array(items);
    if let Some(dict) = tree.dict_mut(node) {
        dict.insert("Kids", Value::Node(kids));
    }
}

fn set_count(tree: &mut Tree, node: NodeId, count: usize) {
    if let Some(dict) = tree.dict_mut(node) {
        dict.insert("Count", Value::Integer(count as i64));
    }
}

/// Depth of the page tree under `root`, counting `root` as level one.
pub fn depth(tree: &Tree, root: NodeId) -> usize {
    let mut deepest = 0;
    let mut visited = HashSet::new();
    let mut stack = vec![(root, 1)];
    while let Some((node, level)) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        deepest = deepest.max(level);
        if tree.dict(node).is_some_and(|d| node == root || is_pages(d)) {
            stack.extend(kids(tree, node).into_iter().map(|kid| (kid, level + 1)));
        }
    }
    deepest
}
