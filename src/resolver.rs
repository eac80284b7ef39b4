//! Raw object graph to working tree.
//!
//! [`ObjectGraphResolver`] pulls indirect objects from an [`ObjectSource`]
//! and builds [`Tree`] nodes for them. Each reference is resolved once: the
//! first visit reserves the destination slot and records it before any child
//! is visited, so a reference met again while its target is still being built
//! (a cycle) simply receives the reserved handle. Later visits reuse the
//! finished value, which keeps shared objects shared.
//!
//! Non-image streams are decoded on the way in as far as the decoders can go,
//! and payloads that are text (page contents, XML metadata, 7-bit data) are
//! stored as [`StreamData::Text`].

use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;

use crate::decoders::{decode_filter, decode_params_at, Filter};
use crate::error::{Error, Result};
use crate::object::{Object, ObjectDict, ObjectRef};
use crate::parser_config::ParserOptions;
use crate::source::{reject_encrypted, ObjectSource};
use crate::tree::{Dictionary, Node, NodeId, Stream, StreamData, Tree, Value};

/// Resolves references from one source into one tree.
pub struct ObjectGraphResolver<'s, S: ObjectSource> {
    source: &'s mut S,
    options: ParserOptions,
    tree: Tree,
    by_ref: HashMap<ObjectRef, Value>,
    by_identity: HashMap<*const Object, NodeId>,
    // keeps every raw object alive so `by_identity` keys stay valid
    retained: Vec<Rc<Object>>,
}

/// Catalog and info dictionary resolved from a trailer.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    /// The working tree
    pub tree: Tree,
    /// Catalog node
    pub root: NodeId,
    /// Document information dictionary (empty if the source has none)
    pub info: NodeId,
}

impl<'s, S: ObjectSource> ObjectGraphResolver<'s, S> {
    /// Create a resolver building into a fresh tree.
    pub fn new(source: &'s mut S, options: ParserOptions) -> Self {
        Self {
            source,
            options,
            tree: Tree::new(),
            by_ref: HashMap::new(),
            by_identity: HashMap::new(),
            retained: Vec::new(),
        }
    }

    /// Resolve an indirect reference.
    ///
    /// References the source does not define resolve to null.
    pub fn resolve_ref(&mut self, id: ObjectRef) -> Result<Value> {
        self.reference(id, false)
    }

    /// Resolve a raw object, following any references it contains.
    pub fn resolve(&mut self, object: Object) -> Result<Value> {
        let object = Rc::new(object);
        self.retained.push(Rc::clone(&object));
        self.value(&object, false)
    }

    /// The tree built so far.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Finish and take the tree.
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    fn reference(&mut self, id: ObjectRef, in_contents: bool) -> Result<Value> {
        if let Some(done) = self.by_ref.get(&id) {
            if let Value::Node(node) = done {
                if matches!(self.tree.get(*node), Node::Pending) {
                    // cycle back into an object under construction
                    self.tree.mark_indirect(*node);
                }
            }
            return Ok(done.clone());
        }

        let Some((chain, target)) = self.follow(id)? else {
            self.by_ref.insert(id, Value::Null);
            return Ok(Value::Null);
        };
        log::trace!("resolving {} ({})", id, target.type_name());

        let value = match &*target {
            Object::Array(_) | Object::Dictionary(_) | Object::Stream { .. } => {
                let node = match self.by_identity.get(&Rc::as_ptr(&target)).copied() {
                    Some(existing) => {
                        if matches!(self.tree.get(existing), Node::Pending) {
                            // reached again through another reference while still being built
                            self.tree.mark_indirect(existing);
                        }
                        existing
                    },
                    None => {
                        let slot = self.tree.reserve();
                        self.by_identity.insert(Rc::as_ptr(&target), slot);
                        for link in &chain {
                            self.by_ref.insert(*link, Value::Node(slot));
                        }
                        let built = self.container(&target, in_contents)?;
                        self.tree.set(slot, built);
                        slot
                    },
                };
                if !matches!(&*target, Object::Array(_)) {
                    self.tree.mark_indirect(node);
                }
                Value::Node(node)
            },
            _ => self.value(&target, in_contents)?,
        };

        for link in chain {
            self.by_ref.insert(link, value.clone());
        }
        Ok(value)
    }

    /// Fetch `id`, following reference-to-reference chains. Returns the chain
    /// of references walked and the final object, or `None` when the chain
    /// dangles, loops or runs too long.
    fn follow(&mut self, id: ObjectRef) -> Result<Option<(Vec<ObjectRef>, Rc<Object>)>> {
        let mut chain = vec![id];
        let mut current = id;
        loop {
            let object = match self.source.fetch(current) {
                Ok(object) => object,
                Err(Error::ObjectNotFound(num, gen)) => {
                    log::warn!("reference {} {} R points at no object, using null", num, gen);
                    return Ok(None);
                },
                Err(e) => return Err(e),
            };
            self.retained.push(Rc::clone(&object));
            match &*object {
                Object::Reference(next) => {
                    if chain.contains(next) || chain.len() > self.options.max_reference_hops as usize {
                        log::warn!("reference chain from {} does not end, using null", id);
                        return Ok(None);
                    }
                    chain.push(*next);
                    current = *next;
                },
                _ => return Ok(Some((chain, object))),
            }
        }
    }

    fn value(&mut self, object: &Object, in_contents: bool) -> Result<Value> {
        Ok(match object {
            Object::Null => Value::Null,
            Object::Boolean(b) => Value::Boolean(*b),
            Object::Integer(i) => Value::Integer(*i),
            Object::Real(r) => Value::Real(*r),
            Object::Name(name) => Value::Name(name.clone()),
            Object::String(bytes) => Value::String(bytes.clone()),
            Object::Reference(id) => self.reference(*id, in_contents)?,
            Object::Array(_) | Object::Dictionary(_) | Object::Stream { .. } => {
                let key = object as *const Object;
                if let Some(existing) = self.by_identity.get(&key) {
                    return Ok(Value::Node(*existing));
                }
                let slot = self.tree.reserve();
                self.by_identity.insert(key, slot);
                let built = self.container(object, in_contents)?;
                self.tree.set(slot, built);
                if matches!(object, Object::Stream { .. }) {
                    self.tree.mark_indirect(slot);
                }
                Value::Node(slot)
            },
        })
    }

    fn container(&mut self, object: &Object, in_contents: bool) -> Result<Node> {
        match object {
            Object::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.value(item, in_contents)?);
                }
                Ok(Node::Array(values))
            },
            Object::Dictionary(dict) => Ok(Node::Dictionary(self.dictionary(dict)?)),
            Object::Stream { dict, data } => self.stream(dict, data, in_contents),
            other => Err(Error::InvalidObjectType {
                expected: "Array, Dictionary or Stream".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    fn dictionary(&mut self, raw: &ObjectDict) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        for (key, value) in raw {
            let resolved = self.value(value, key == "Contents")?;
            dict.insert(key.clone(), resolved);
        }
        Ok(dict)
    }

    fn stream(&mut self, raw: &ObjectDict, data: &Bytes, in_contents: bool) -> Result<Node> {
        let mut dict = self.dictionary(raw)?;
        dict.remove("Length");

        let subtype = dict.get("Subtype").and_then(Value::as_name).map(str::to_string);
        let filters = self.filter_chain(&dict);
        let mut payload = data.to_vec();
        let mut consumed = 0;

        if subtype.as_deref() != Some("Image") {
            for (index, name) in filters.iter().enumerate() {
                let Some(filter) = Filter::from_name(name) else {
                    break;
                };
                let params = decode_params_at(raw, index);
                payload = decode_filter(&payload, filter, params.as_ref(), &self.options)?;
                consumed += 1;
            }
        }
        if consumed > 0 {
            self.drop_consumed_filters(&mut dict, consumed, filters.len());
        }

        let fully_decoded = consumed == filters.len();
        let is_text = fully_decoded
            && (in_contents || subtype.as_deref() == Some("XML") || payload.iter().all(|&b| b < 0x80));
        let data = if is_text {
            StreamData::text_from_bytes(&payload)
        } else {
            StreamData::Binary(Bytes::from(payload))
        };
        Ok(Node::Stream(Stream { dict, data }))
    }

    fn filter_chain(&self, dict: &Dictionary) -> Vec<String> {
        match dict.get("Filter") {
            Some(Value::Name(name)) => vec![name.clone()],
            Some(Value::Node(id)) => self
                .tree
                .array(*id)
                .map(|items| items.iter().filter_map(Value::as_name).map(str::to_string).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Remove the first `consumed` filters and their parameters, under
    /// either parameter key.
    fn drop_consumed_filters(&mut self, dict: &mut Dictionary, consumed: usize, total: usize) {
        if consumed == total {
            for key in FILTER_KEYS {
                dict.remove(key);
            }
            return;
        }
        for key in FILTER_KEYS {
            let remaining = match dict.get(key) {
                Some(Value::Node(id)) => self.tree.array(*id).map(|items| items[consumed.min(items.len())..].to_vec()),
                _ => None,
            };
            if let Some(remaining) = remaining {
                let node = self.tree.add_array(remaining);
                dict.insert(key, Value::Node(node));
            } else if key != "Filter" {
                // a lone parameter dictionary belonged to the first filter
                dict.remove(key);
            }
        }
    }
}

const FILTER_KEYS: [&str; 3] = ["Filter", "DecodeParms", "DP"];

/// Resolve the catalog and info dictionary named by a source's trailer.
pub fn resolve_document<S: ObjectSource>(source: &mut S, options: &ParserOptions) -> Result<ResolvedDocument> {
    let trailer = source.trailer().clone();
    reject_encrypted(&trailer)?;

    let mut resolver = ObjectGraphResolver::new(source, *options);
    let root_raw = trailer
        .get("Root")
        .cloned()
        .ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
    let root = match resolver.resolve(root_raw)? {
        Value::Node(id) if resolver.tree().dict(id).is_some() => id,
        other => {
            return Err(Error::InvalidPdf(format!("/Root is not a dictionary: {:?}", other)))
        },
    };

    let info = match trailer.get("Info").cloned() {
        Some(raw) => match resolver.resolve(raw)? {
            Value::Node(id) if resolver.tree().dict(id).is_some() => Some(id),
            _ => {
                log::warn!("ignoring /Info that is not a dictionary");
                None
            },
        },
        None => None,
    };

    let mut tree = resolver.into_tree();
    let info = info.unwrap_or_else(|| tree.add(Node::Dictionary(Dictionary::new())));
    tree.mark_indirect(root);
    log::debug!("resolved document into {} nodes", tree.len());
    Ok(ResolvedDocument { tree, root, info })
}
