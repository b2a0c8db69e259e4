//! Arena-based XML document.
//!
//! Nodes live in a flat vector and reference each other through u32
//! indices, so traversal stays cache-friendly and the whole tree drops in
//! one deallocation. Built from the same event stream the streaming
//! engine consumes.

use crate::error::{FilterError, Result};
use crate::event::{TextKind, XmlEvent};
use crate::reader::XmlEventReader;

use super::node::{Node, NodeId, NodeKind};

/// A materialized XML document.
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// An empty document holding only the root node.
    pub fn new() -> Self {
        Document {
            nodes: vec![Node::document()],
        }
    }

    /// Build a document from an event stream.
    pub fn from_events<I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = XmlEvent>,
    {
        let mut doc = Document::new();
        let mut stack: Vec<NodeId> = vec![0];

        for event in events {
            match event {
                XmlEvent::StartElement { name, attributes } => {
                    let parent = *stack.last().expect("document node always present");
                    let depth = stack.len() as u16;
                    let id = doc.append(parent, Node::element(name, attributes, parent, depth));
                    stack.push(id);
                }
                XmlEvent::EndElement { .. } => {
                    if stack.len() <= 1 {
                        return Err(FilterError::Parse("unbalanced end of element".into()));
                    }
                    stack.pop();
                }
                XmlEvent::Text(text) => {
                    let parent = *stack.last().expect("document node always present");
                    // Character data outside the root element is dropped.
                    if parent != 0 {
                        let depth = stack.len() as u16;
                        doc.append(parent, Node::text(text, parent, depth));
                    }
                }
                XmlEvent::EndDocument => {}
            }
        }

        if stack.len() > 1 {
            return Err(FilterError::Parse("document ended with open elements".into()));
        }
        Ok(doc)
    }

    /// Parse a document string into a tree.
    pub fn parse_str(xml: &str) -> Result<Self> {
        let events = XmlEventReader::new(xml).collect::<Result<Vec<_>>>()?;
        Document::from_events(events)
    }

    fn append(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        let parent_node = &mut self.nodes[parent as usize];
        match parent_node.last_child {
            Some(last) => {
                parent_node.last_child = Some(id);
                self.nodes[last as usize].next_sibling = Some(id);
            }
            None => {
                parent_node.first_child = Some(id);
                parent_node.last_child = Some(id);
            }
        }
        id
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    /// Number of nodes, the document node included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The root element, if the document has one.
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(0).find(|&id| self.node(id).is_element())
    }

    /// Iterate a node's children in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Concatenated descendant character data (comments excluded).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            let node = self.node(child);
            match node.kind {
                NodeKind::Text => {
                    if let Some(text) = &node.text {
                        if text.kind != TextKind::Comment {
                            out.push_str(&text.value);
                        }
                    }
                }
                NodeKind::Element => self.collect_text(child, out),
                NodeKind::Document => {}
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

/// Iterator over a node's children.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.node(id).next_sibling;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_tree() {
        let doc = Document::parse_str("<order><item>one</item><item>two</item></order>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node(root).local_name(), Some("order"));

        let items: Vec<_> = doc.children(root).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(doc.text_content(items[0]), "one");
        assert_eq!(doc.text_content(root), "onetwo");
    }

    #[test]
    fn test_depth_tracked() {
        let doc = Document::parse_str("<a><b><c/></b></a>").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a).next().unwrap();
        let c = doc.children(b).next().unwrap();
        assert_eq!(doc.node(a).depth, 1);
        assert_eq!(doc.node(b).depth, 2);
        assert_eq!(doc.node(c).depth, 3);
    }

    #[test]
    fn test_sibling_links() {
        let doc = Document::parse_str("<a><x/><y/><z/></a>").unwrap();
        let root = doc.root_element().unwrap();
        let names: Vec<_> = doc
            .children(root)
            .filter_map(|id| doc.node(id).local_name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_unbalanced_events_rejected() {
        let events = vec![XmlEvent::StartElement {
            name: crate::event::QName::new("a"),
            attributes: vec![],
        }];
        assert!(Document::from_events(events).is_err());
    }
}
