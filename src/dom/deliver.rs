//! DOM delivery mode.
//!
//! Walks a materialized document depth-first and produces the same visitor
//! ordering semantics as the streaming engine: before, child events in
//! document order, after (reversed by default), cleanup. The binding
//! table, interceptor chains, mementos and writer coordination are all
//! shared with the SAX path.

use std::sync::Arc;

use crate::config::VisitorTable;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{QName, SaxElement};
use crate::intercept::DispatchNode;
use crate::memento::TextMemento;
use crate::writer::{ExclusiveWriter, StringSink};

use super::document::Document;
use super::node::{NodeId, NodeKind};

/// Tree-walking filter over a materialized document.
pub struct DomFilter {
    table: Arc<VisitorTable>,
}

impl DomFilter {
    pub fn new(table: Arc<VisitorTable>) -> Self {
        DomFilter { table }
    }

    #[inline]
    pub fn table(&self) -> &Arc<VisitorTable> {
        &self.table
    }

    /// Filter the document tree.
    pub fn filter(&self, doc: &Document, ctx: &mut ExecutionContext) -> Result<()> {
        for binding in self.table.bindings() {
            binding.visitor().on_execution_start(ctx);
        }
        let mut ancestors: Vec<QName> = Vec::new();
        if let Some(root) = doc.root_element() {
            self.visit(doc, root, &mut ancestors, 0, ctx)?;
        }
        if let Some(writer) = ctx.writer_mut() {
            writer.flush()?;
        }
        for binding in self.table.bindings() {
            binding.visitor().on_execution_end(ctx);
        }
        Ok(())
    }

    /// Parse, materialize and filter a document string.
    pub fn filter_str(&self, xml: &str, ctx: &mut ExecutionContext) -> Result<()> {
        let doc = Document::parse_str(xml)?;
        self.filter(&doc, ctx)
    }

    /// Filter a document into a string through the exclusive writer.
    pub fn filter_to_string(&self, xml: &str) -> Result<String> {
        let sink = StringSink::new();
        let mut ctx = ExecutionContext::new(*self.table.settings());
        ctx.set_writer(ExclusiveWriter::new(Box::new(sink.clone())));
        self.filter_str(xml, &mut ctx)?;
        Ok(sink.take_string())
    }

    /// Visit one element subtree; returns the completed element for the
    /// parent's child-element notification.
    fn visit(
        &self,
        doc: &Document,
        id: NodeId,
        ancestors: &mut Vec<QName>,
        inherited_keep: usize,
        ctx: &mut ExecutionContext,
    ) -> Result<SaxElement> {
        let node = doc.node(id);
        let name = node.name.clone().expect("visit called on element node");
        let map = self.table.get(name.local_name());

        // Nearest-first ancestor chain for contextual selector matches.
        let nearest_first: Vec<QName> = ancestors.iter().rev().cloned().collect();
        let applies = |n: &Arc<dyn DispatchNode>| {
            n.binding()
                .config()
                .selector()
                .matches_context(&name, &nearest_first)
        };
        let filter = |list: &[Arc<dyn DispatchNode>]| -> Vec<Arc<dyn DispatchNode>> {
            list.iter().filter(|&n| applies(n)).cloned().collect()
        };
        let before = filter(map.before_visitors());
        let child = filter(map.child_visitors());
        let after = filter(map.after_visitors());
        let cleanup = filter(map.cleanup_visitors());
        let accumulate = map.accumulate_text();
        let keep_depth = map.max_node_depth().max(inherited_keep);

        let element_id = ctx.next_element_id();
        let mut element =
            SaxElement::new(name.clone(), node.attributes.clone(), ancestors.len(), element_id);

        for node in &before {
            node.before(&mut element, ctx)?;
        }
        for node in ctx.dynamic_visitors() {
            node.before(&mut element, ctx)?;
        }
        ctx.push_element(name.clone());

        ancestors.push(name);
        for child_id in doc.children(id) {
            let child_node = doc.node(child_id);
            match child_node.kind {
                NodeKind::Text => {
                    let text = child_node.text.clone().expect("text node has payload");
                    if accumulate {
                        let fragment = text.clone();
                        ctx.mementos().stash(TextMemento::new(element_id), |m| {
                            m.fragments.push(fragment);
                        });
                    }
                    for node in &child {
                        node.child_text(&mut element, &text, ctx)?;
                    }
                    for node in ctx.dynamic_visitors() {
                        node.child_text(&mut element, &text, ctx)?;
                    }
                }
                NodeKind::Element => {
                    let completed = self.visit(
                        doc,
                        child_id,
                        ancestors,
                        keep_depth.saturating_sub(1),
                        ctx,
                    )?;
                    for node in &child {
                        node.child_element(&mut element, &completed, ctx)?;
                    }
                    for node in ctx.dynamic_visitors() {
                        node.child_element(&mut element, &completed, ctx)?;
                    }
                    if keep_depth > 0 {
                        element.attach_child(completed);
                    }
                }
                NodeKind::Document => {}
            }
        }
        ancestors.pop();

        if accumulate {
            let mut memento = TextMemento::new(element_id);
            ctx.mementos().restore(&mut memento);
            element.set_text(memento.take_fragments());
        }

        let reverse = self.table.settings().reverse_visit_order_on_after;
        if reverse {
            for node in after.iter().rev() {
                node.after(&mut element, ctx)?;
            }
        } else {
            for node in &after {
                node.after(&mut element, ctx)?;
            }
        }
        for node in ctx.dynamic_visitors() {
            node.after(&mut element, ctx)?;
        }

        if reverse {
            for node in cleanup.iter().rev() {
                node.cleanup(&element, ctx);
            }
        } else {
            for node in &cleanup {
                node.cleanup(&element, ctx);
            }
        }

        ctx.mementos().forget(element_id);
        ctx.pop_element();
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisitorTable;
    use crate::error::Result;
    use crate::event::TextNode;
    use crate::visitor::{Capabilities, ElementVisitor};
    use std::sync::Mutex;

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ElementVisitor for Recorder {
        fn capabilities(&self) -> Capabilities {
            Capabilities::named("R")
                .with_before()
                .with_after()
                .with_child_text()
                .with_child_element()
        }

        fn visit_before(&self, element: &mut SaxElement, _ctx: &mut ExecutionContext) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("before:{}", element.local_name()));
            Ok(())
        }

        fn visit_child_text(
            &self,
            element: &mut SaxElement,
            text: &TextNode,
            _ctx: &mut ExecutionContext,
        ) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("text:{}:{}", element.local_name(), text.value));
            Ok(())
        }

        fn visit_child_element(
            &self,
            element: &mut SaxElement,
            child: &SaxElement,
            _ctx: &mut ExecutionContext,
        ) -> Result<()> {
            self.log.lock().unwrap().push(format!(
                "child:{}<-{}",
                element.local_name(),
                child.local_name()
            ));
            Ok(())
        }

        fn visit_after(&self, element: &mut SaxElement, _ctx: &mut ExecutionContext) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("after:{}", element.local_name()));
            Ok(())
        }
    }

    /// The DOM walk must produce the same ordering as the SAX engine.
    #[test]
    fn test_ordering_matches_streaming_mode() {
        let xml = "<order>a<item/>b</order>";

        let dom_log = Arc::new(Mutex::new(Vec::new()));
        let table = VisitorTable::builder()
            .register("*", Arc::new(Recorder { log: dom_log.clone() }))
            .unwrap()
            .build()
            .unwrap();
        DomFilter::new(Arc::new(table))
            .filter_str(xml, &mut ExecutionContext::default())
            .unwrap();

        let sax_log = Arc::new(Mutex::new(Vec::new()));
        let table = VisitorTable::builder()
            .register("*", Arc::new(Recorder { log: sax_log.clone() }))
            .unwrap()
            .build()
            .unwrap();
        crate::sax::SaxFilter::new(Arc::new(table))
            .filter_str(xml, &mut ExecutionContext::default())
            .unwrap();

        assert_eq!(*dom_log.lock().unwrap(), *sax_log.lock().unwrap());
    }

    #[test]
    fn test_text_accumulation_in_tree_mode() {
        struct TextAfter {
            seen: Arc<Mutex<String>>,
        }
        impl ElementVisitor for TextAfter {
            fn capabilities(&self) -> Capabilities {
                Capabilities::named("TextAfter").with_after().consumes_text()
            }
            fn visit_after(
                &self,
                element: &mut SaxElement,
                _ctx: &mut ExecutionContext,
            ) -> Result<()> {
                *self.seen.lock().unwrap() = element.text_content();
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(String::new()));
        let table = VisitorTable::builder()
            .register("name", Arc::new(TextAfter { seen: seen.clone() }))
            .unwrap()
            .build()
            .unwrap();

        DomFilter::new(Arc::new(table))
            .filter_str("<doc><name>Ada<![CDATA[ L]]></name></doc>", &mut ExecutionContext::default())
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), "Ada L");
    }
}
