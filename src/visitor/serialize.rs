//! Default serialization visitor.
//!
//! Writes the traversed document back out through the exclusive writer:
//! start tag on enter, character data as it streams past, end tag on
//! exit. Registered against `**` it reproduces the whole document; an
//! element-scoped writer owner can take over any subtree, since a
//! serializer's non-owning writes are dropped rather than rejected.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{SaxElement, TextKind, TextNode};
use crate::writer::WriterClaim;

use super::{Capabilities, ElementVisitor};

const CAPS: Capabilities = Capabilities::named("SerializerVisitor")
    .with_before()
    .with_after()
    .with_child_text()
    .as_serializer();

/// Streaming pass-through serializer.
#[derive(Debug, Default)]
pub struct SerializerVisitor;

impl SerializerVisitor {
    pub fn new() -> Self {
        SerializerVisitor
    }
}

impl ElementVisitor for SerializerVisitor {
    fn capabilities(&self) -> Capabilities {
        CAPS
    }

    fn visit_before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        let mut tag = String::with_capacity(16);
        tag.push('<');
        tag.push_str(&element.name().name);
        for attr in element.attributes() {
            tag.push(' ');
            tag.push_str(&attr.name.name);
            tag.push_str("=\"");
            tag.push_str(&escape_attribute(&attr.value));
            tag.push('"');
        }
        tag.push('>');
        ctx.write(&WriterClaim::new(element, &CAPS), &tag)
    }

    fn visit_child_text(
        &self,
        element: &mut SaxElement,
        text: &TextNode,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let rendered = match text.kind {
            TextKind::Text => escape_text(&text.value),
            TextKind::CData => format!("<![CDATA[{}]]>", text.value),
            TextKind::Comment => format!("<!--{}-->", text.value),
            TextKind::Entity => format!("&{};", text.value),
        };
        ctx.write(&WriterClaim::new(element, &CAPS), &rendered)
    }

    fn visit_after(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        let tag = format!("</{}>", element.name().name);
        ctx.write(&WriterClaim::new(element, &CAPS), &tag)
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisitorTable;
    use crate::sax::SaxFilter;
    use std::sync::Arc;

    fn round_trip(xml: &str) -> String {
        let table = VisitorTable::builder()
            .register("**", Arc::new(SerializerVisitor::new()))
            .unwrap()
            .build()
            .unwrap();
        SaxFilter::new(Arc::new(table)).filter_to_string(xml).unwrap()
    }

    #[test]
    fn test_serializes_document() {
        let xml = r#"<order id="1"><item>fish &amp; chips</item></order>"#;
        assert_eq!(round_trip(xml), xml);
    }

    #[test]
    fn test_serializes_cdata_and_comments() {
        let xml = "<a><![CDATA[<raw>]]><!--note--></a>";
        assert_eq!(round_trip(xml), xml);
    }

    #[test]
    fn test_attribute_escaping() {
        let xml = r#"<a title="a &quot;b&quot;"></a>"#;
        assert_eq!(round_trip(xml), xml);
    }

    #[test]
    fn test_self_closing_expands() {
        assert_eq!(round_trip("<a><b/></a>"), "<a><b></b></a>");
    }
}
