//! Page tree flattening, grouping and page-level document operations.

mod common;

use common::document_with_pages;
use pdf_assembler::page_tree::{self, kids};
use pdf_assembler::writer::assemble_document;
use pdf_assembler::{AssemblerOptions, Document, NodeId, ParserOptions, Tree, Value};
use proptest::prelude::*;

fn count(tree: &Tree, node: NodeId) -> i64 {
    tree.dict(node).unwrap().get("Count").and_then(Value::as_integer).unwrap()
}

fn is_pages(tree: &Tree, node: NodeId) -> bool {
    tree.dict(node).unwrap().type_name() == Some("Pages")
}

/// Leaves under `node` in order, checking every interior `/Count` and `/Parent` on the way.
fn checked_leaves(tree: &Tree, node: NodeId) -> Vec<NodeId> {
    let mut leaves = Vec::new();
    for kid in kids(tree, node) {
        assert_eq!(tree.child(kid, "Parent"), Some(node));
        if is_pages(tree, kid) {
            let below = checked_leaves(tree, kid);
            assert_eq!(count(tree, kid) as usize, below.len());
            leaves.extend(below);
        } else {
            leaves.push(kid);
        }
    }
    leaves
}

fn depth(tree: &Tree, node: NodeId) -> usize {
    if !is_pages(tree, node) {
        return 1;
    }
    1 + kids(tree, node).into_iter().map(|k| depth(tree, k)).max().unwrap_or(0)
}

#[test]
fn test_fifty_pages_sixteen_per_node() {
    let mut doc = document_with_pages(50);
    let root = doc.pages_node().unwrap();
    let before = doc.pages().unwrap();
    assert_eq!(before.len(), 50);

    page_tree::group(doc.tree_mut(), root, 16).unwrap();
    let tree = doc.tree();
    assert_eq!(count(tree, root), 50);
    assert!(depth(tree, root) > 2);
    assert_eq!(checked_leaves(tree, root), before);
}

#[test]
fn test_assemble_is_idempotent() {
    let mut doc = document_with_pages(40);
    let options = AssemblerOptions::default().with_page_group_size(4);
    let first = assemble_document(&mut doc, &options).unwrap();
    let second = assemble_document(&mut doc, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_repeated_assemble_keeps_arena_size() {
    let mut doc = document_with_pages(50);
    let options = AssemblerOptions::default();
    let first = assemble_document(&mut doc, &options).unwrap();
    let size = doc.tree().len();
    for _ in 0..100 {
        assert_eq!(assemble_document(&mut doc, &options).unwrap(), first);
    }
    assert_eq!(doc.tree().len(), size);
}

#[test]
fn test_grouping_disabled_keeps_flat_tree() {
    let mut doc = document_with_pages(40);
    let options = AssemblerOptions::default().with_group_pages(false);
    let pdf = assemble_document(&mut doc, &options).unwrap();
    let root = doc.pages_node().unwrap();
    assert_eq!(kids(doc.tree(), root).len(), 40);

    let reloaded = Document::load(pdf, &ParserOptions::default()).unwrap();
    let root = reloaded.pages_node().unwrap();
    assert_eq!(kids(reloaded.tree(), root).len(), 40);
}

#[test]
fn test_grouped_output_reloads_with_same_pages() {
    let mut doc = document_with_pages(300);
    let pdf = assemble_document(&mut doc, &AssemblerOptions::default()).unwrap();

    let mut reloaded = Document::load(pdf, &ParserOptions::default()).unwrap();
    let pages = reloaded.pages().unwrap();
    assert_eq!(pages.len(), 300);
    for (i, page) in pages.iter().enumerate() {
        let contents = reloaded.tree().child(*page, "Contents").unwrap();
        let data = reloaded.tree().stream(contents).unwrap().data.to_bytes();
        assert_eq!(data.as_ref(), format!("BT (page {}) Tj ET", i + 1).as_bytes());
    }
}

#[test]
fn test_append_pages_from_loaded_document() {
    let mut donor = document_with_pages(3);
    let pdf = assemble_document(&mut donor, &AssemblerOptions::default()).unwrap();
    let donor = Document::load(pdf, &ParserOptions::default()).unwrap();

    let mut doc = Document::blank();
    assert_eq!(doc.append_pages(&donor).unwrap(), 4);
    let merged = assemble_document(&mut doc, &AssemblerOptions::default()).unwrap();
    let mut merged = Document::load(merged, &ParserOptions::default()).unwrap();
    assert_eq!(merged.page_count().unwrap(), 4);
}

#[test]
fn test_missing_page_tree_fails_to_assemble() {
    let mut doc = Document::blank();
    doc.remove_root_entries(Some(&["Pages"]));
    assert!(assemble_document(&mut doc, &AssemblerOptions::default()).is_err());
}

proptest! {
    #[test]
    fn grouping_keeps_counts_and_order(n in 0usize..600, branch in 2usize..12) {
        let mut doc = document_with_pages(n);
        let root = doc.pages_node().unwrap();
        let before = doc.pages().unwrap();
        page_tree::group(doc.tree_mut(), root, branch).unwrap();

        let tree = doc.tree();
        prop_assert_eq!(count(tree, root) as usize, before.len());
        prop_assert_eq!(checked_leaves(tree, root), before.clone());
        prop_assert!(kids(tree, root).len() <= branch);

        // depth is bounded by the number of times n must be divided by the branch size
        let mut levels = 1;
        let mut capacity = branch;
        while capacity < before.len() {
            capacity = capacity.saturating_mul(branch);
            levels += 1;
        }
        prop_assert!(depth(tree, root) <= levels + 1);
    }

    #[test]
    fn regrouping_reproduces_structure(n in 1usize..200, branch in 2usize..8) {
        let mut doc = document_with_pages(n);
        let root = doc.pages_node().unwrap();
        page_tree::flatten(doc.tree_mut(), root).unwrap();
        page_tree::group(doc.tree_mut(), root, branch).unwrap();
        let shape = |tree: &Tree| -> Vec<i64> {
            kids(tree, root).into_iter().map(|k| if is_pages(tree, k) { count(tree, k) } else { 0 }).collect()
        };
        let first = shape(doc.tree());
        page_tree::flatten(doc.tree_mut(), root).unwrap();
        page_tree::group(doc.tree_mut(), root, branch).unwrap();
        prop_assert_eq!(shape(doc.tree()), first);
    }
}
