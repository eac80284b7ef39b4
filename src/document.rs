//! Document model.
//!
//! A [`Document`] is a working [`Tree`] plus the two nodes a trailer points
//! at: the catalog and the information dictionary.

use bytes::Bytes;

use crate::allocator::ObjectIdAllocator;
use crate::date;
use crate::error::{Error, Result};
use crate::page_tree;
use crate::parser_config::ParserOptions;
use crate::resolver::resolve_document;
use crate::source::{ObjectSource, SourceDocument};
use crate::tree::{Dictionary, Node, NodeId, Tree, Value};

/// Producer recorded in documents this crate creates or rewrites.
pub const PRODUCER: &str = "PDF Assembler";

/// Catalog keys kept by [`Document::remove_root_entries`] when no keys are named.
const REQUIRED_ROOT_KEYS: [&str; 2] = ["Type", "Pages"];

/// A PDF document held as a working tree.
///
/// # Example
///
/// ```
/// use pdf_assembler::Document;
///
/// let mut doc = Document::blank();
/// assert_eq!(doc.page_count()?, 1);
/// # Ok::<(), pdf_assembler::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) tree: Tree,
    pub(crate) root: NodeId,
    pub(crate) info: NodeId,
    pub(crate) allocator: ObjectIdAllocator,
}

impl Document {
    /// A document with a single empty US Letter page.
    pub fn blank() -> Self {
        let mut tree = Tree::new();
        let now = date::now();
        let info = tree.add_dict([
            ("Producer", Value::text(PRODUCER)),
            ("CreationDate", Value::text(&now)),
            ("ModDate", Value::text(&now)),
        ]);

        let media_box = tree.add_array([0, 0, 612, 792].into_iter().map(Value::Integer).collect());
        let contents = tree.add_array(Vec::new());
        let resources = tree.add_dict([]);
        let page = tree.add_indirect(Node::Dictionary(
            [
                ("Type", Value::name("Page")),
                ("MediaBox", Value::Node(media_box)),
                ("Contents", Value::Node(contents)),
                ("Resources", Value::Node(resources)),
            ]
            .into_iter()
            .collect(),
        ));
        let kids = tree.add_array(vec![Value::Node(page)]);
        let pages = tree.add_indirect(Node::Dictionary(
            [
                ("Type", Value::name("Pages")),
                ("Count", Value::Integer(1)),
                ("Kids", Value::Node(kids)),
            ]
            .into_iter()
            .collect(),
        ));
        if let Some(page) = tree.dict_mut(page) {
            page.insert("Parent", Value::Node(pages));
        }
        let root = tree.add_indirect(Node::Dictionary(
            [("Type", Value::name("Catalog")), ("Pages", Value::Node(pages))].into_iter().collect(),
        ));

        Self::assemble_parts(tree, root, info)
    }

    /// Wrap a pre-built tree.
    ///
    /// `root` and `info` must be dictionaries.
    pub fn from_tree(mut tree: Tree, root: NodeId, info: NodeId) -> Result<Self> {
        for (node, what) in [(root, "catalog"), (info, "info dictionary")] {
            if node.index() >= tree.len() || tree.dict(node).is_none() {
                return Err(Error::InvalidTree(format!("{} is not a dictionary", what)));
            }
        }
        tree.mark_indirect(root);
        Ok(Self::assemble_parts(tree, root, info))
    }

    /// Resolve a document from any object source.
    pub fn from_source<S: ObjectSource>(source: &mut S, options: &ParserOptions) -> Result<Self> {
        let resolved = resolve_document(source, options)?;
        Ok(Self::assemble_parts(resolved.tree, resolved.root, resolved.info))
    }

    /// Parse and resolve PDF bytes.
    ///
    /// The info dictionary is stamped with this crate as producer and the
    /// current time as modification date, and the page tree is flattened.
    pub fn load(data: impl Into<Bytes>, options: &ParserOptions) -> Result<Self> {
        let mut source = SourceDocument::load(data, *options)?;
        let mut document = Self::from_source(&mut source, options)?;

        if let Some(info) = document.tree.dict_mut(document.info) {
            info.insert("Producer", Value::text(PRODUCER));
            info.insert("ModDate", Value::text(&date::now()));
        }
        if let Ok(pages) = page_tree::pages_root(&document.tree, document.root) {
            let count = page_tree::flatten(&mut document.tree, pages)?;
            log::debug!("loaded PDF {} with {} pages", source.version(), count);
        } else {
            log::warn!("loaded PDF {} has no page tree", source.version());
        }
        Ok(document)
    }

    fn assemble_parts(tree: Tree, root: NodeId, info: NodeId) -> Self {
        Self {
            tree,
            root,
            info,
            allocator: ObjectIdAllocator::new(),
        }
    }

    /// The working tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable access to the working tree.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Catalog node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Information dictionary node.
    pub fn info(&self) -> NodeId {
        self.info
    }

    /// Catalog dictionary.
    pub fn catalog(&self) -> Option<&Dictionary> {
        self.tree.dict(self.root)
    }

    /// Root of the page tree.
    pub fn pages_node(&self) -> Result<NodeId> {
        page_tree::pages_root(&self.tree, self.root)
    }

    /// Leaf pages in order. Flattens the page tree.
    pub fn pages(&mut self) -> Result<Vec<NodeId>> {
        let pages = self.pages_node()?;
        page_tree::flatten(&mut self.tree, pages)?;
        Ok(page_tree::kids(&self.tree, pages))
    }

    /// Number of leaf pages. Flattens the page tree.
    pub fn page_count(&mut self) -> Result<usize> {
        let pages = self.pages_node()?;
        page_tree::flatten(&mut self.tree, pages)
    }

    /// Remove entries from the catalog.
    ///
    /// With `None` or an empty list, everything except `/Type` and `/Pages`
    /// goes.
    pub fn remove_root_entries(&mut self, keys: Option<&[&str]>) {
        let Some(catalog) = self.tree.dict_mut(self.root) else {
            return;
        };
        match keys {
            Some(keys) if !keys.is_empty() => {
                for key in keys {
                    catalog.remove(key);
                }
            },
            _ => catalog.retain(|key, _| REQUIRED_ROOT_KEYS.contains(&key)),
        }
    }

    /// Append copies of `other`'s pages after this document's pages.
    ///
    /// Everything the copied pages reach comes along; objects shared between
    /// them stay shared. Returns the new page count.
    pub fn append_pages(&mut self, other: &Document) -> Result<usize> {
        let mut donor = other.clone();
        let theirs = donor.pages()?;
        for page in &theirs {
            if let Some(dict) = donor.tree.dict_mut(*page) {
                dict.remove("Parent");
            }
        }

        let pages = self.pages_node()?;
        let mut leaves = self.pages()?;
        let imported = self.tree.import(&donor.tree, &theirs);
        for page in &imported {
            if let Some(dict) = self.tree.dict_mut(*page) {
                dict.insert("Parent", Value::Node(pages));
            }
            self.tree.mark_indirect(*page);
        }
        leaves.extend(imported);

        let kids = self.tree.add_array(leaves.iter().map(|p| Value::Node(*p)).collect());
        if let Some(dict) = self.tree.dict_mut(pages) {
            dict.insert("Kids", Value::Node(kids));
            dict.insert("Count", Value::Integer(leaves.len() as i64));
        }
        log::debug!("appended {} pages", theirs.len());
        Ok(leaves.len())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::blank()
    }
}
