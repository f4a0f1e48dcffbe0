//! Document tree data structures
//!
//! A [`Document`] is an arena of element [`Node`]s. Element and attribute
//! names are interned; text runs are kept in document order next to child
//! elements so that text content can be reassembled exactly.

use lasso::{Rodeo, Spur};
use rustc_hash::FxHashMap;

/// Unique identifier for a node (index into `Document::nodes`)
pub type NodeId = usize;

/// Name of the synthetic wrapper node some readers put above the real root
pub const DOCUMENT_NODE_NAME: &str = "#document";

/// One item of an element's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Element(NodeId),
    Text(String),
}

/// An element node
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: Spur,
    pub attributes: FxHashMap<Spur, String>,
    pub content: Vec<Content>,
    pub parent: Option<NodeId>,
}

impl Node {
    fn new(id: NodeId, name: Spur, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name,
            attributes: FxHashMap::default(),
            content: Vec::new(),
            parent,
        }
    }

    /// Ids of the child elements, in document order
    pub fn child_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.content.iter().filter_map(|item| match item {
            Content::Element(id) => Some(*id),
            Content::Text(_) => None,
        })
    }
}

/// A materialized document
#[derive(Debug, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub root_id: Option<NodeId>,
    names: Rodeo,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the root element
    ///
    /// Calling this again replaces the root; earlier nodes stay in the arena
    /// but are no longer reachable from it.
    pub fn create_root(&mut self, name: &str) -> NodeId {
        let id = self.push_node(name, None);
        self.root_id = Some(id);
        id
    }

    /// Append a child element to `parent`
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.push_node(name, Some(parent));
        self.nodes[parent].content.push(Content::Element(id));
        id
    }

    /// Append text to `parent`, merging with a directly preceding text run
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        let content = &mut self.nodes[parent].content;
        match content.last_mut() {
            Some(Content::Text(run)) => run.push_str(text),
            _ => content.push(Content::Text(text.to_string())),
        }
    }

    /// Set (or overwrite) an attribute on `node`
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let key = self.names.get_or_intern(name);
        self.nodes[node].attributes.insert(key, value.to_string());
    }

    fn push_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        let name = self.names.get_or_intern(name);
        self.nodes.push(Node::new(id, name, parent));
        id
    }

    /// True if the document has no root element
    pub fn is_empty(&self) -> bool {
        self.root_id.is_none()
    }

    pub fn root(&self) -> Option<&Node> {
        self.root_id.map(|id| &self.nodes[id])
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Name of a node
    pub fn name(&self, node: &Node) -> &str {
        self.names.resolve(&node.name)
    }

    /// Value of the named attribute, if present
    pub fn attribute<'a>(&self, node: &'a Node, name: &str) -> Option<&'a str> {
        let key = self.names.get(name)?;
        node.attributes.get(&key).map(String::as_str)
    }

    /// All attributes of a node (unordered)
    pub fn attributes<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = (&'a str, &'a str)> {
        node.attributes
            .iter()
            .map(|(key, value)| (self.names.resolve(key), value.as_str()))
    }

    /// Child elements of a node, in document order
    pub fn children<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> {
        node.child_ids().map(|id| &self.nodes[id])
    }

    pub fn first_child<'a>(&'a self, node: &'a Node) -> Option<&'a Node> {
        self.children(node).next()
    }

    pub fn parent(&self, node: &Node) -> Option<&Node> {
        node.parent.map(|id| &self.nodes[id])
    }

    /// Concatenated text of the node and all its descendants, in document order
    pub fn text_content(&self, node: &Node) -> String {
        let mut text = String::new();
        self.collect_text(node, &mut text);
        text
    }

    /// Walks with an explicit stack of content cursors, one per open element
    fn collect_text(&self, node: &Node, out: &mut String) {
        let mut stack = vec![node.content.iter()];
        while let Some(items) = stack.last_mut() {
            match items.next() {
                Some(Content::Text(run)) => out.push_str(run),
                Some(Content::Element(id)) => stack.push(self.nodes[*id].content.iter()),
                None => {
                    stack.pop();
                }
            }
        }
    }
}
