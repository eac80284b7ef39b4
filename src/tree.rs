//! The editable working tree.
//!
//! Resolved documents live in an arena: every array, dictionary and stream is
//! a [`Node`] addressed by a [`NodeId`], and containers point at each other
//! through [`Value::Node`]. Two owners holding the same `NodeId` share one
//! node, so aliasing and cycles from the source file survive resolution and
//! editing without duplicated data.
//!
//! Indirect-object bookkeeping sits beside the node rather than inside its
//! dictionary: a slot tagged with an [`ObjectId`] is written as an indirect
//! object, an untagged one inline.

use std::collections::{HashMap, HashSet};
use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;

/// Handle of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Indirect object number and generation.
///
/// Number 0 marks a node that must be indirect but has not been numbered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// Object number
    pub num: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectId {
    /// The "needs a number" tag.
    pub const UNNUMBERED: ObjectId = ObjectId { num: 0, gen: 0 };

    /// Create an object id.
    pub fn new(num: u32, gen: u16) -> Self {
        Self { num, gen }
    }

    /// Whether this is the [`UNNUMBERED`](Self::UNNUMBERED) tag.
    pub fn is_unnumbered(self) -> bool {
        self.num == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// A value held by a dictionary entry or an array element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// Name, without the slash. Each char is one byte of the name.
    Name(String),
    /// String bytes, written as a literal or hex string
    String(Vec<u8>),
    /// Array, dictionary or stream in the same tree
    Node(NodeId),
}

impl Value {
    /// Name value from a `&str`.
    pub fn name(name: &str) -> Self {
        Value::Name(name.to_string())
    }

    /// String value from text.
    pub fn text(text: &str) -> Self {
        Value::String(text.as_bytes().to_vec())
    }

    /// The name, if this is one.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The node handle, if this is one.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }
}

/// Dictionary entries in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<String, Value>);

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up an entry for modification.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Set an entry. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove an entry, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.0.retain(|key, value| keep(key, value));
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    /// Values in order.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.0.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `/Type` as a name.
    pub fn type_name(&self) -> Option<&str> {
        self.get("Type").and_then(Value::as_name)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Stream payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// Text, one char per byte when loaded from a file
    Text(String),
    /// Opaque bytes
    Binary(Bytes),
}

impl StreamData {
    /// Text payload from bytes, mapping each byte to the char of the same value.
    pub fn text_from_bytes(bytes: &[u8]) -> Self {
        StreamData::Text(bytes.iter().map(|&b| char::from(b)).collect())
    }

    /// The bytes to write.
    ///
    /// Text whose chars all fit in one byte is written byte for byte;
    /// anything else is written as UTF-8.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            StreamData::Binary(bytes) => bytes.clone(),
            StreamData::Text(text) => {
                let latin1: Option<Vec<u8>> = text.chars().map(|c| u8::try_from(c).ok()).collect();
                match latin1 {
                    Some(bytes) => Bytes::from(bytes),
                    None => Bytes::copy_from_slice(text.as_bytes()),
                }
            },
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            StreamData::Text(text) => text.is_empty(),
            StreamData::Binary(bytes) => bytes.is_empty(),
        }
    }
}

/// A stream: dictionary plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary. `/Length` is computed when writing.
    pub dict: Dictionary,
    /// Payload
    pub data: StreamData,
}

/// A container node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered values
    Array(Vec<Value>),
    /// Key/value entries
    Dictionary(Dictionary),
    /// Dictionary plus payload
    Stream(Stream),
    /// Reserved slot whose content is still being built
    Pending,
}

impl Node {
    /// Node handles directly below this node, in order, with the dictionary
    /// key that holds each one (`None` for array elements).
    pub fn children(&self) -> Vec<(Option<&str>, NodeId)> {
        match self {
            Node::Array(items) => items.iter().filter_map(Value::as_node).map(|id| (None, id)).collect(),
            Node::Dictionary(dict) => dict_children(dict),
            Node::Stream(stream) => dict_children(&stream.dict),
            Node::Pending => Vec::new(),
        }
    }
}

fn dict_children(dict: &Dictionary) -> Vec<(Option<&str>, NodeId)> {
    dict.iter()
        .filter_map(|(k, v)| v.as_node().map(|id| (Some(k), id)))
        .collect()
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    object_id: Option<ObjectId>,
}

/// Arena of nodes.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<NodeId>,
    page_branches: HashSet<NodeId>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots in the arena, reachable or not. Released slots are
    /// reused before the arena grows.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no node was ever added.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Handles of every node in the arena, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.slots.len() as u32).map(NodeId)
    }

    /// Add a node that is written inline unless the allocator decides otherwise.
    pub fn add(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Slot {
                node,
                object_id: None,
            };
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot {
            node,
            object_id: None,
        });
        id
    }

    /// Add a node that must be written as an indirect object.
    pub fn add_indirect(&mut self, node: Node) -> NodeId {
        let id = self.add(node);
        self.mark_indirect(id);
        id
    }

    /// Add a dictionary node from entries.
    pub fn add_dict<'k>(&mut self, entries: impl IntoIterator<Item = (&'k str, Value)>) -> NodeId {
        self.add(Node::Dictionary(entries.into_iter().collect()))
    }

    /// Add an array node.
    pub fn add_array(&mut self, items: Vec<Value>) -> NodeId {
        self.add(Node::Array(items))
    }

    /// Reserve a slot to be filled later with [`set`](Self::set).
    pub fn reserve(&mut self) -> NodeId {
        self.add(Node::Pending)
    }

    /// Replace a node's content, keeping its identity and object id.
    pub fn set(&mut self, id: NodeId, node: Node) {
        self.slots[id.index()].node = node;
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.slots[id.index()].node
    }

    /// The node behind `id`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.slots[id.index()].node
    }

    /// Dictionary of a dictionary or stream node.
    pub fn dict(&self, id: NodeId) -> Option<&Dictionary> {
        match self.get(id) {
            Node::Dictionary(dict) => Some(dict),
            Node::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Dictionary of a dictionary or stream node, mutably.
    pub fn dict_mut(&mut self, id: NodeId) -> Option<&mut Dictionary> {
        match self.get_mut(id) {
            Node::Dictionary(dict) => Some(dict),
            Node::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    /// Items of an array node.
    pub fn array(&self, id: NodeId) -> Option<&Vec<Value>> {
        match self.get(id) {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Items of an array node, mutably.
    pub fn array_mut(&mut self, id: NodeId) -> Option<&mut Vec<Value>> {
        match self.get_mut(id) {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The stream behind `id`, if it is one.
    pub fn stream(&self, id: NodeId) -> Option<&Stream> {
        match self.get(id) {
            Node::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Follow `key` in the dictionary `id` to another node.
    pub fn child(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.dict(id)?.get(key)?.as_node()
    }

    /// Current object id tag of a node.
    pub fn object_id(&self, id: NodeId) -> Option<ObjectId> {
        self.slots[id.index()].object_id
    }

    /// Set or clear the object id tag.
    pub fn set_object_id(&mut self, id: NodeId, object_id: Option<ObjectId>) {
        self.slots[id.index()].object_id = object_id;
    }

    /// Require the node to be written as an indirect object. An existing
    /// number is left in place.
    pub fn mark_indirect(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index()];
        slot.object_id.get_or_insert(ObjectId::UNNUMBERED);
    }

    /// Whether the node is tagged as indirect.
    pub fn is_indirect(&self, id: NodeId) -> bool {
        self.object_id(id).is_some()
    }

    /// Give a slot back to the arena for reuse by a later [`add`](Self::add).
    ///
    /// Any value still pointing at `id` will see whatever node takes the slot
    /// next, so only release nodes nothing else refers to.
    pub fn release(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index()];
        slot.node = Node::Pending;
        slot.object_id = None;
        self.page_branches.remove(&id);
        self.free.push(id);
    }

    /// Record an intermediate `/Pages` node built by page tree grouping.
    pub(crate) fn note_page_branch(&mut self, id: NodeId) {
        self.page_branches.insert(id);
    }

    /// Whether `id` is an intermediate `/Pages` node built by grouping.
    pub(crate) fn is_page_branch(&self, id: NodeId) -> bool {
        self.page_branches.contains(&id)
    }

    /// Copy everything reachable from `roots` in `src` into this tree.
    ///
    /// Nodes reachable from several roots, or several times from one, are
    /// copied once, so sharing and cycles carry over. Indirect tags carry
    /// over unnumbered. Returns the new handles of `roots`, in order.
    pub fn import(&mut self, src: &Tree, roots: &[NodeId]) -> Vec<NodeId> {
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut order = Vec::new();
        let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if mapping.contains_key(&id) {
                continue;
            }
            mapping.insert(id, self.reserve());
            order.push(id);
            for (_, child) in src.get(id).children().into_iter().rev() {
                stack.push(child);
            }
        }

        let remap = |value: &Value| match value {
            Value::Node(old) => Value::Node(mapping[old]),
            other => other.clone(),
        };
        for old in order {
            let copied = match src.get(old) {
                Node::Array(items) => Node::Array(items.iter().map(&remap).collect()),
                Node::Dictionary(dict) => Node::Dictionary(remap_dict(dict, &remap)),
                Node::Stream(stream) => Node::Stream(Stream {
                    dict: remap_dict(&stream.dict, &remap),
                    data: stream.data.clone(),
                }),
                Node::Pending => Node::Pending,
            };
            let new = mapping[&old];
            self.set(new, copied);
            if src.is_indirect(old) {
                self.set_object_id(new, Some(ObjectId::UNNUMBERED));
            }
        }

        roots.iter().map(|id| mapping[id]).collect()
    }
}

fn remap_dict(dict: &Dictionary, remap: &impl Fn(&Value) -> Value) -> Dictionary {
    dict.iter().map(|(k, v)| (k, remap(v))).collect()
}
