//! XML node representation.
//!
//! Uses NodeId (u32) for compact, cache-friendly node references within
//! the arena document.

use crate::event::{Attribute, QName, TextNode};

/// Compact node identifier (index into the arena)
pub type NodeId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Character data; the payload's own kind distinguishes text, CDATA,
    /// comment and entity content
    Text,
}

/// An XML node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for the document root)
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Element name (elements only)
    pub name: Option<QName>,
    /// Element attributes
    pub attributes: Vec<Attribute>,
    /// Character data payload (text nodes only)
    pub text: Option<TextNode>,
    /// Depth in the document tree
    pub depth: u16,
}

impl Node {
    /// Create the document root node
    pub fn document() -> Self {
        Node {
            kind: NodeKind::Document,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            name: None,
            attributes: Vec::new(),
            text: None,
            depth: 0,
        }
    }

    /// Create an element node
    pub fn element(name: QName, attributes: Vec<Attribute>, parent: NodeId, depth: u16) -> Self {
        Node {
            kind: NodeKind::Element,
            parent: Some(parent),
            first_child: None,
            last_child: None,
            next_sibling: None,
            name: Some(name),
            attributes,
            text: None,
            depth,
        }
    }

    /// Create a character-data node
    pub fn text(payload: TextNode, parent: NodeId, depth: u16) -> Self {
        Node {
            kind: NodeKind::Text,
            parent: Some(parent),
            first_child: None,
            last_child: None,
            next_sibling: None,
            name: None,
            attributes: Vec::new(),
            text: Some(payload),
            depth,
        }
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Check if this is a character-data node
    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    /// Element local name, if this is an element.
    pub fn local_name(&self) -> Option<&str> {
        self.name.as_ref().map(|n| n.local_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let doc = Node::document();
        assert_eq!(doc.kind, NodeKind::Document);
        assert!(doc.parent.is_none());
        assert_eq!(doc.depth, 0);
    }

    #[test]
    fn test_element_node() {
        let elem = Node::element(QName::new("item"), vec![], 0, 1);
        assert!(elem.is_element());
        assert_eq!(elem.parent, Some(0));
        assert_eq!(elem.local_name(), Some("item"));
        assert_eq!(elem.depth, 1);
    }
}
