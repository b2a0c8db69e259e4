//! XML reader adapter.
//!
//! Bridges quick-xml's streaming API onto the crate's event model. The
//! parser itself is an external collaborator; nothing downstream of this
//! module sees quick-xml types.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{FilterError, Result};
use crate::event::{Attribute, QName, TextKind, TextNode, XmlEvent};

/// Streaming event source over an in-memory document.
pub struct XmlEventReader<'a> {
    reader: Reader<&'a [u8]>,
    /// Synthesized end event for a self-closing element.
    pending: Option<XmlEvent>,
    done: bool,
}

impl<'a> XmlEventReader<'a> {
    pub fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        // No trimming: text fragments are delivered verbatim, accumulation
        // happens downstream.
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        XmlEventReader {
            reader,
            pending: None,
            done: false,
        }
    }

    /// Pull the next event, `None` once the document is exhausted.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        if self.done {
            return Ok(None);
        }

        loop {
            match self.reader.read_event()? {
                Event::Start(e) => {
                    let (name, attributes) = self.element_parts(&e)?;
                    return Ok(Some(XmlEvent::StartElement { name, attributes }));
                }
                Event::Empty(e) => {
                    // Self-closing tag behaves like start followed by end.
                    let (name, attributes) = self.element_parts(&e)?;
                    self.pending = Some(XmlEvent::EndElement { name: name.clone() });
                    return Ok(Some(XmlEvent::StartElement { name, attributes }));
                }
                Event::End(e) => {
                    let name = self.decode(e.name().as_ref())?;
                    return Ok(Some(XmlEvent::EndElement {
                        name: QName::new(&name),
                    }));
                }
                Event::Text(e) => {
                    let text = e.decode().map_err(parse_err)?;
                    return Ok(Some(XmlEvent::Text(TextNode::new(text, TextKind::Text))));
                }
                Event::CData(e) => {
                    let text = self.decode(e.as_ref())?;
                    return Ok(Some(XmlEvent::Text(TextNode::new(text, TextKind::CData))));
                }
                Event::Comment(e) => {
                    let text = self.decode(e.as_ref())?;
                    return Ok(Some(XmlEvent::Text(TextNode::new(text, TextKind::Comment))));
                }
                Event::GeneralRef(e) => {
                    let name = self.decode(e.as_ref())?;
                    return Ok(Some(XmlEvent::Text(TextNode::new(name, TextKind::Entity))));
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Eof => {
                    self.done = true;
                    return Ok(Some(XmlEvent::EndDocument));
                }
            }
        }
    }

    fn element_parts(
        &self,
        e: &quick_xml::events::BytesStart<'_>,
    ) -> Result<(QName, Vec<Attribute>)> {
        let name = self.decode(e.name().as_ref())?;
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(parse_err)?;
            let key = self.decode(attr.key.as_ref())?;
            let value = attr.unescape_value().map_err(parse_err)?;
            attributes.push(Attribute::new(&key, value.into_owned()));
        }
        Ok((QName::new(&name), attributes))
    }

    fn decode(&self, raw: &[u8]) -> Result<String> {
        self.reader
            .decoder()
            .decode(raw)
            .map(|cow| cow.into_owned())
            .map_err(parse_err)
    }
}

fn parse_err(e: impl std::fmt::Display) -> FilterError {
    FilterError::Parse(e.to_string())
}

impl Iterator for XmlEventReader<'_> {
    type Item = Result<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Read a whole document into an owned event list.
pub fn read_events(xml: &str) -> Result<Vec<XmlEvent>> {
    XmlEventReader::new(xml).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_events() {
        let events = read_events(r#"<order id="1"><item/>text</order>"#).unwrap();
        match &events[0] {
            XmlEvent::StartElement { name, attributes } => {
                assert_eq!(name.local_name(), "order");
                assert_eq!(attributes[0].name.name, "id");
                assert_eq!(attributes[0].value, "1");
            }
            other => panic!("expected start, got {other:?}"),
        }
        // Self-closing item expands into start + end.
        assert!(matches!(&events[1], XmlEvent::StartElement { name, .. } if name.local == "item"));
        assert!(matches!(&events[2], XmlEvent::EndElement { name } if name.local == "item"));
        assert!(matches!(&events[3], XmlEvent::Text(t) if t.value == "text"));
        assert!(matches!(&events[4], XmlEvent::EndElement { name } if name.local == "order"));
        assert!(matches!(events.last(), Some(XmlEvent::EndDocument)));
    }

    #[test]
    fn test_entities_unescaped_in_text() {
        let events = read_events("<a>fish &amp; chips</a>").unwrap();
        assert!(matches!(&events[1], XmlEvent::Text(t) if t.value == "fish & chips"));
    }

    #[test]
    fn test_cdata_and_comment_kinds() {
        let events = read_events("<a><![CDATA[<raw>]]><!--note--></a>").unwrap();
        assert!(
            matches!(&events[1], XmlEvent::Text(t) if t.kind == TextKind::CData && t.value == "<raw>")
        );
        assert!(
            matches!(&events[2], XmlEvent::Text(t) if t.kind == TextKind::Comment && t.value == "note")
        );
    }

    #[test]
    fn test_namespaced_names_split() {
        let events = read_events("<ns:a xmlns:ns='urn:x'/>").unwrap();
        match &events[0] {
            XmlEvent::StartElement { name, .. } => {
                assert_eq!(name.local_name(), "a");
                assert_eq!(name.prefix.as_deref(), Some("ns"));
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_whitespace_preserved() {
        let events = read_events("<a>  spaced  </a>").unwrap();
        assert!(matches!(&events[1], XmlEvent::Text(t) if t.value == "  spaced  "));
    }

    #[test]
    fn test_malformed_reported() {
        assert!(read_events("<a><b></a>").is_err());
    }
}
