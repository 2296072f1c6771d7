#![forbid(unsafe_code)]

//! In-memory document.
//!
//! Nodes live in an arena owned by the [`Document`] and are addressed by
//! [`NodeId`]. Removing a node detaches it; its id stays valid for the
//! lifetime of the document, so a removed element can be inserted again.
//!
//! Slots are never reclaimed: ids are not reused, and a document grows by
//! one node per created element or text node until it is dropped. Hosts
//! that create and destroy view-models indefinitely should rotate
//! documents (one per page or session).
//!
//! # Invariants
//!
//! 1. A node has at most one parent and appears once in that parent's
//!    children.
//! 2. The tree rooted at [`Document::document_element`] is acyclic; inserts
//!    that would break this fail with [`DomError::HierarchyRequest`].
//! 3. Text nodes never have children.
//! 4. Class lists are stored in the `class` attribute, space separated.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::DomError;
use crate::selector::{SelectorList, SelectorTree};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Arena slot of this node.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct DocumentInner {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl DocumentInner {
    fn node(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes.get(id.index()).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes.get_mut(id.index()).ok_or(DomError::UnknownNode(id))
    }

    fn attributes_mut(&mut self, id: NodeId) -> Result<&mut IndexMap<String, String>, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current.index()).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, child: NodeId) -> Result<(), DomError> {
        if let Some(parent) = self.node(child)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.node(child)?;
        if matches!(self.node(parent)?.kind, NodeKind::Text(_))
            || child == self.root
            || self.contains(child, parent)
        {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference
            && self.node(reference)?.parent != Some(parent)
        {
            return Err(DomError::NotFound(format!(
                "{reference} is not a child of {parent}"
            )));
        }
        if reference == Some(child) {
            return Ok(());
        }
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let at = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn preorder(&self, from: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(from.index()) else {
            return;
        };
        for &child in &node.children {
            out.push(child);
            self.preorder(child, out);
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.index()) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => escape_into(out, text, false),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_into(out, value, true);
                        out.push('"');
                    }
                }
                out.push('>');
                for &child in &node.children {
                    self.serialize(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// Append `text` with markup characters escaped. Quotes are escaped only
/// inside attribute values.
fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

impl SelectorTree for DocumentInner {
    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.index())?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index())?.parent
    }
}

/// Shared, clonable document handle.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing `<html><head></head><body></body></html>`.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = DocumentInner {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        let element = |tag: &str| NodeKind::Element {
            tag: tag.to_owned(),
            attributes: IndexMap::new(),
        };
        inner.root = inner.push(element("html"));
        inner.head = inner.push(element("head"));
        inner.body = inner.push(element("body"));
        for child in [inner.head, inner.body] {
            inner.nodes[child.index()].parent = Some(inner.root);
            inner.nodes[inner.root.index()].children.push(child);
        }
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// The `<html>` element.
    #[must_use]
    pub fn document_element(&self) -> NodeId {
        self.inner.borrow().root
    }

    /// The `<head>` element.
    #[must_use]
    pub fn head(&self) -> NodeId {
        self.inner.borrow().head
    }

    /// The `<body>` element.
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    /// Create a detached element. Tag names are stored lowercase.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .push(NodeKind::Text(text.to_owned()))
    }

    /// Whether `node` belongs to this document.
    #[must_use]
    pub fn exists(&self, node: NodeId) -> bool {
        node.index() < self.inner.borrow().nodes.len()
    }

    /// Tag name of an element, `None` for text nodes and unknown ids.
    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.borrow().tag_name(node).map(str::to_owned)
    }

    /// Whether `node` is an element.
    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner.borrow().tag_name(node).is_some()
    }

    /// Concatenated text of `node` and its descendants.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut nodes = vec![node];
        inner.preorder(node, &mut nodes);
        nodes
            .into_iter()
            .filter_map(|id| match &inner.nodes.get(id.index())?.kind {
                NodeKind::Text(text) => Some(text.as_str()),
                NodeKind::Element { .. } => None,
            })
            .collect()
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.borrow().attribute(node, name).map(str::to_owned)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner.borrow().attribute(node, name).is_some()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.inner
            .borrow_mut()
            .attributes_mut(node)?
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    /// Remove an attribute. Returns its previous value.
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, DomError> {
        Ok(self
            .inner
            .borrow_mut()
            .attributes_mut(node)?
            .shift_remove(name))
    }

    /// Classes of an element in attribute order.
    #[must_use]
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.get_attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    /// Add a class if absent.
    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        let mut classes = self.classes(node);
        if classes.iter().any(|c| c == class) {
            return Ok(());
        }
        classes.push(class.to_owned());
        self.set_attribute(node, "class", &classes.join(" "))
    }

    /// Remove a class. The attribute is dropped when no class remains.
    pub fn remove_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        let mut classes = self.classes(node);
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() == before {
            return Ok(());
        }
        if classes.is_empty() {
            self.remove_attribute(node, "class")?;
            Ok(())
        } else {
            self.set_attribute(node, "class", &classes.join(" "))
        }
    }

    /// Append `child` to `parent`, detaching it from its current parent.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.inner.borrow_mut().insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or last when `None`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.inner
            .borrow_mut()
            .insert_before(parent, child, reference)
    }

    /// Detach `child` from `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        inner.node(parent)?;
        if inner.node(child)?.parent != Some(parent) {
            return Err(DomError::NotFound(format!(
                "{child} is not a child of {parent}"
            )));
        }
        inner.detach(child)
    }

    #[must_use]
    pub fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(node.index())?.parent
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(node.index())
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(node.index())?
            .children
            .first()
            .copied()
    }

    #[must_use]
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, 1)
    }

    #[must_use]
    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, -1)
    }

    fn sibling(&self, node: NodeId, offset: isize) -> Option<NodeId> {
        let inner = self.inner.borrow();
        let parent = inner.nodes.get(node.index())?.parent?;
        let siblings = &inner.nodes.get(parent.index())?.children;
        let at = siblings.iter().position(|c| *c == node)?;
        siblings.get(at.checked_add_signed(offset)?).copied()
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.borrow().contains(ancestor, node)
    }

    /// Whether `node` is attached under the document element.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        let inner = self.inner.borrow();
        inner.contains(inner.root, node)
    }

    /// First connected element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Every connected element matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        let inner = self.inner.borrow();
        let mut nodes = vec![inner.root];
        inner.preorder(inner.root, &mut nodes);
        Ok(nodes
            .into_iter()
            .filter(|id| list.matches(&*inner, *id))
            .collect())
    }

    /// Serialized markup for `node` and its subtree.
    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.inner.borrow().serialize(node, &mut out);
        out
    }

    /// Whether two handles refer to the same document.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.inner.borrow().nodes.len())
            .finish()
    }
}
