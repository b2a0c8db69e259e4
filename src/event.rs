//! XML event model shared by the SAX and DOM delivery modes.
//!
//! Events are owned (no borrowed spans): they cross the boundary from the
//! underlying parser into the dispatch engine, which may buffer text
//! fragments well past the parser's internal buffers.

use std::fmt;

/// Stable per-element identity within a single filtering run.
///
/// Assigned as a sequence number at element enter, never reused. Memento
/// keys are derived from it, so it must not depend on object identity.
pub type ElementId = u64;

/// A qualified element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Full name as written (may include a prefix)
    pub name: String,
    /// Local part after the colon
    pub local: String,
    /// Namespace prefix (before the colon), if any
    pub prefix: Option<String>,
    /// Resolved namespace URI, if known
    pub namespace: Option<String>,
}

impl QName {
    /// Create a name, splitting the prefix from the local part at the colon.
    pub fn new(name: &str) -> Self {
        match memchr::memchr(b':', name.as_bytes()) {
            Some(pos) => QName {
                name: name.to_string(),
                local: name[pos + 1..].to_string(),
                prefix: Some(name[..pos].to_string()),
                namespace: None,
            },
            None => QName {
                name: name.to_string(),
                local: name.to_string(),
                prefix: None,
                namespace: None,
            },
        }
    }

    /// Attach a resolved namespace URI.
    pub fn with_namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }

    /// The local part of the name.
    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Attribute {
            name: QName::new(name),
            value: value.into(),
        }
    }
}

/// Kind of character data delivered to child-text visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// Plain character data
    Text,
    /// CDATA section content
    CData,
    /// Comment content
    Comment,
    /// Unresolved entity reference
    Entity,
}

/// A fragment of character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub value: String,
    pub kind: TextKind,
}

impl TextNode {
    pub fn new(value: impl Into<String>, kind: TextKind) -> Self {
        TextNode {
            value: value.into(),
            kind,
        }
    }

    /// Plain text fragment.
    pub fn text(value: impl Into<String>) -> Self {
        TextNode::new(value, TextKind::Text)
    }
}

/// A parsing event delivered to the SAX engine.
#[derive(Debug, Clone)]
pub enum XmlEvent {
    /// Start of an element
    StartElement {
        name: QName,
        attributes: Vec<Attribute>,
    },
    /// End of an element
    EndElement { name: QName },
    /// Character data (text, CDATA, comment, entity)
    Text(TextNode),
    /// End of the document
    EndDocument,
}

impl XmlEvent {
    /// Element name, if this is a start or end event.
    pub fn element_name(&self) -> Option<&QName> {
        match self {
            XmlEvent::StartElement { name, .. } | XmlEvent::EndElement { name } => Some(name),
            _ => None,
        }
    }
}

/// The materialized element handed to visitors during traversal.
///
/// Holds the element identity, attributes, any text accumulated for it and,
/// when a visitor asked for subtree access, the completed child elements up
/// to the requested depth.
#[derive(Debug, Clone)]
pub struct SaxElement {
    name: QName,
    attributes: Vec<Attribute>,
    depth: usize,
    id: ElementId,
    text: Vec<TextNode>,
    children: Vec<SaxElement>,
}

impl SaxElement {
    /// Create a new element visitable.
    pub fn new(name: QName, attributes: Vec<Attribute>, depth: usize, id: ElementId) -> Self {
        SaxElement {
            name,
            attributes,
            depth,
            id,
            text: Vec::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &QName {
        &self.name
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        self.name.local_name()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute value by full name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.name == name)
            .map(|a| a.value.as_str())
    }

    /// Text fragments materialized on this element.
    pub fn text(&self) -> &[TextNode] {
        &self.text
    }

    /// Concatenated character data in document order (comments excluded).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for fragment in &self.text {
            if fragment.kind != TextKind::Comment {
                out.push_str(&fragment.value);
            }
        }
        out
    }

    /// Replace the materialized text content.
    pub fn set_text(&mut self, fragments: Vec<TextNode>) {
        self.text = fragments;
    }

    pub fn push_text(&mut self, fragment: TextNode) {
        self.text.push(fragment);
    }

    /// Drop materialized text content.
    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    /// Completed child elements, when subtree materialization was requested.
    pub fn children(&self) -> &[SaxElement] {
        &self.children
    }

    pub(crate) fn attach_child(&mut self, child: SaxElement) {
        self.children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_split() {
        let q = QName::new("svg:rect");
        assert_eq!(q.local_name(), "rect");
        assert_eq!(q.prefix.as_deref(), Some("svg"));
        assert_eq!(q.name, "svg:rect");
    }

    #[test]
    fn test_qname_no_prefix() {
        let q = QName::new("order");
        assert_eq!(q.local_name(), "order");
        assert!(q.prefix.is_none());
    }

    #[test]
    fn test_text_content_skips_comments() {
        let mut el = SaxElement::new(QName::new("a"), vec![], 0, 1);
        el.push_text(TextNode::text("one"));
        el.push_text(TextNode::new("note", TextKind::Comment));
        el.push_text(TextNode::new("two", TextKind::CData));
        assert_eq!(el.text_content(), "onetwo");
    }

    #[test]
    fn test_attribute_lookup() {
        let el = SaxElement::new(
            QName::new("item"),
            vec![Attribute::new("id", "42")],
            1,
            7,
        );
        assert_eq!(el.attribute("id"), Some("42"));
        assert_eq!(el.attribute("missing"), None);
    }
}
