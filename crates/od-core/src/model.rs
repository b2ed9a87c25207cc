//! Arena-backed document object graph.
//!
//! Objects live in a table keyed by `ObjectId`; containment is expressed
//! through property values (`Value::Object` / `Value::Array`) holding child
//! IDs, plus an explicit parent back-reference on each child. Ownership is
//! a strict tree: every non-root object has exactly one owner, and no two
//! graphs ever share a node.
//!
//! Subtrees move in and out of the arena as `Detached` values — an owned
//! bundle of nodes with stable IDs. Clone, load, and the undo history all
//! trade in `Detached`, so a subtree dropped from both undo stacks is
//! freed with the command that held it.

use crate::id::ObjectId;
use std::collections::HashMap;

// ─── Values ──────────────────────────────────────────────────────────────

/// Runtime value of one declared property.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    /// Enum variant, stored as its string form.
    Enum(String),
    /// Owned child object.
    Object(ObjectId),
    /// Ordered, owned child objects.
    Array(Vec<ObjectId>),
    /// Opaque by-name reference token, resolved lazily on access.
    Reference(String),
    /// Schema-opaque raw JSON.
    Any(serde_json::Value),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) | Value::Reference(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

// ─── Objects ─────────────────────────────────────────────────────────────

/// Back-reference from a child to the property that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub owner: ObjectId,
    pub prop: String,
}

impl ParentLink {
    pub fn new(owner: ObjectId, prop: &str) -> Self {
        Self {
            owner,
            prop: prop.to_string(),
        }
    }
}

/// One object in the document graph.
#[derive(Debug, Clone)]
pub struct DocObject {
    pub id: ObjectId,
    /// Registered class name.
    pub class: String,
    pub props: HashMap<String, Value>,
    /// `None` only for the root object and for detached subtree roots.
    pub parent: Option<ParentLink>,
}

impl DocObject {
    pub fn new(class: &str) -> Self {
        Self {
            id: ObjectId::fresh(class),
            class: class.to_string(),
            props: HashMap::new(),
            parent: None,
        }
    }

    pub fn get(&self, prop: &str) -> Option<&Value> {
        self.props.get(prop)
    }

    pub fn number(&self, prop: &str) -> Option<f64> {
        self.props.get(prop).and_then(Value::as_number)
    }

    pub fn string(&self, prop: &str) -> Option<&str> {
        self.props.get(prop).and_then(Value::as_str)
    }

    pub fn boolean(&self, prop: &str) -> Option<bool> {
        self.props.get(prop).and_then(Value::as_bool)
    }

    /// Child held by an Object-kind property.
    pub fn child(&self, prop: &str) -> Option<ObjectId> {
        match self.props.get(prop) {
            Some(Value::Object(id)) => Some(*id),
            _ => None,
        }
    }

    /// Children held by an Array-kind property (empty when absent).
    pub fn children(&self, prop: &str) -> &[ObjectId] {
        match self.props.get(prop) {
            Some(Value::Array(ids)) => ids,
            _ => &[],
        }
    }
}

// ─── Detached subtrees ───────────────────────────────────────────────────

/// An owned subtree outside any arena. IDs stay stable across
/// extract/adopt, so undo can reinsert the exact objects it removed.
#[derive(Debug, Clone)]
pub struct Detached {
    pub root: ObjectId,
    /// Every node of the subtree, root included. Order is unspecified.
    pub nodes: Vec<DocObject>,
}

impl Detached {
    /// The root node of the subtree.
    pub fn root_object(&self) -> &DocObject {
        // A Detached is only ever built with its root present.
        self.nodes
            .iter()
            .find(|n| n.id == self.root)
            .unwrap_or_else(|| panic!("detached subtree lost its root {}", self.root))
    }

    pub fn class(&self) -> &str {
        &self.root_object().class
    }
}

// ─── Graph ───────────────────────────────────────────────────────────────

/// The live object graph of one document.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    nodes: HashMap<ObjectId, DocObject>,
    root: Option<ObjectId>,
}

impl ObjectGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a subtree as the document root. Replaces any prior content.
    pub fn set_root(&mut self, subtree: Detached) -> ObjectId {
        self.nodes.clear();
        let root = subtree.root;
        for node in subtree.nodes {
            self.nodes.insert(node.id, node);
        }
        self.root = Some(root);
        root
    }

    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    pub fn get(&self, id: ObjectId) -> Option<&DocObject> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut DocObject> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocObject> {
        self.nodes.values()
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<&ParentLink> {
        self.nodes.get(&id).and_then(|n| n.parent.as_ref())
    }

    /// Position of an array-held object within its owning array.
    pub fn index_in_parent(&self, id: ObjectId) -> Option<usize> {
        let link = self.parent_of(id)?;
        let owner = self.get(link.owner)?;
        match owner.props.get(&link.prop) {
            Some(Value::Array(ids)) => ids.iter().position(|&c| c == id),
            _ => None,
        }
    }

    /// Check if `ancestor` is a parent/grandparent/etc. of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: ObjectId, descendant: ObjectId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut current = descendant;
        while let Some(link) = self.parent_of(current) {
            if link.owner == ancestor {
                return true;
            }
            current = link.owner;
        }
        false
    }

    /// All IDs of the subtree rooted at `id`, depth-first, root first.
    pub fn subtree_ids(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.get(current) {
                for value in node.props.values() {
                    match value {
                        Value::Object(child) => stack.push(*child),
                        Value::Array(children) => stack.extend(children.iter().copied()),
                        _ => {}
                    }
                }
            }
        }
        out
    }

    /// Remove the subtree rooted at `id` from the arena, severing the
    /// owner's property slot and the root's back-reference. Returns the
    /// owned subtree; `None` when `id` is not in this graph.
    pub fn extract(&mut self, id: ObjectId) -> Option<Detached> {
        if !self.contains(id) {
            return None;
        }

        // Sever the owner's slot first.
        if let Some(link) = self.parent_of(id).cloned()
            && let Some(owner) = self.get_mut(link.owner)
        {
            match owner.props.get_mut(&link.prop) {
                Some(Value::Array(ids)) => ids.retain(|&c| c != id),
                Some(Value::Object(child)) if *child == id => {
                    owner.props.remove(&link.prop);
                }
                _ => {}
            }
        }

        let ids = self.subtree_ids(id);
        let mut nodes = Vec::with_capacity(ids.len());
        for node_id in ids {
            if let Some(mut node) = self.nodes.remove(&node_id) {
                if node_id == id {
                    node.parent = None;
                }
                nodes.push(node);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        Some(Detached { root: id, nodes })
    }

    /// Re-insert a detached subtree under an owner property. For Array-kind
    /// slots `index` gives the insertion position (clamped to the array
    /// length); for Object-kind slots it is ignored.
    pub fn adopt(&mut self, subtree: Detached, link: ParentLink, index: Option<usize>) {
        let root = subtree.root;
        for mut node in subtree.nodes {
            if node.id == root {
                node.parent = Some(link.clone());
            }
            self.nodes.insert(node.id, node);
        }
        if let Some(owner) = self.get_mut(link.owner) {
            match index {
                Some(i) => {
                    let slot = owner
                        .props
                        .entry(link.prop)
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(ids) = slot {
                        let at = i.min(ids.len());
                        ids.insert(at, root);
                    }
                }
                None => {
                    owner.props.insert(link.prop, Value::Object(root));
                }
            }
        }
    }

    /// Deep-copy a subtree with freshly minted IDs throughout. The copy is
    /// returned detached — callers insert it explicitly.
    pub fn deep_clone(&self, id: ObjectId) -> Option<Detached> {
        let ids = self.subtree_ids(id);
        if ids.is_empty() || !self.contains(id) {
            return None;
        }

        let mut fresh: HashMap<ObjectId, ObjectId> = HashMap::with_capacity(ids.len());
        for &old in &ids {
            let class = &self.get(old)?.class;
            fresh.insert(old, ObjectId::fresh(class));
        }

        let mut nodes = Vec::with_capacity(ids.len());
        for &old in &ids {
            let source = self.get(old)?;
            let mut copy = source.clone();
            copy.id = fresh[&old];
            copy.parent = if old == id {
                None
            } else {
                source.parent.as_ref().map(|link| ParentLink {
                    owner: fresh[&link.owner],
                    prop: link.prop.clone(),
                })
            };
            for value in copy.props.values_mut() {
                match value {
                    Value::Object(child) => *child = fresh[child],
                    Value::Array(children) => {
                        for child in children {
                            *child = fresh[child];
                        }
                    }
                    _ => {}
                }
            }
            nodes.push(copy);
        }

        Some(Detached {
            root: fresh[&id],
            nodes,
        })
    }
}
