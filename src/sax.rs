//! SAX delivery engine.
//!
//! The streaming dispatcher: consumes parser events, maintains the element
//! stack, resolves each element's visitor configuration and invokes the
//! before/child/after/cleanup callbacks in strict nesting order.
//!
//! ## Dispatch order per element
//!
//! ```text
//! enter:  before-visitors (producers-first order), begin text buffering
//! child:  text -> buffered (if flagged) + child-visitors, in document order
//!         element -> full recursion, then completed child to child-visitors
//! exit:   flush buffered text once, after-visitors (reversed by default),
//!         cleanup-visitors, discard the element's mementos
//! ```
//!
//! Traversal is a plain call stack driven synchronously by the parser; the
//! only blocking happens at the I/O boundary. Concurrency exists across
//! independent runs only: the filter itself is shared read-only.

use std::sync::Arc;

use tracing::trace;

use crate::config::VisitorTable;
use crate::context::ExecutionContext;
use crate::error::{FilterError, Result};
use crate::event::{Attribute, QName, SaxElement, TextNode, XmlEvent};
use crate::intercept::DispatchNode;
use crate::memento::TextMemento;
use crate::reader::XmlEventReader;
use crate::writer::{ExclusiveWriter, StringSink};

/// One open element on the traversal stack.
struct Frame {
    element: SaxElement,
    /// Context-filtered dispatch lists for this element instance.
    before: Vec<Arc<dyn DispatchNode>>,
    child: Vec<Arc<dyn DispatchNode>>,
    after: Vec<Arc<dyn DispatchNode>>,
    cleanup: Vec<Arc<dyn DispatchNode>>,
    accumulate: bool,
    /// Levels of completed children to materialize on the element.
    keep_depth: usize,
}

/// The streaming filter. Cheap to share; all mutable state lives in the
/// per-run execution context.
pub struct SaxFilter {
    table: Arc<VisitorTable>,
}

impl SaxFilter {
    pub fn new(table: Arc<VisitorTable>) -> Self {
        SaxFilter { table }
    }

    #[inline]
    pub fn table(&self) -> &Arc<VisitorTable> {
        &self.table
    }

    /// Filter a prepared event stream.
    pub fn filter_events<I>(&self, events: I, ctx: &mut ExecutionContext) -> Result<()>
    where
        I: IntoIterator<Item = XmlEvent>,
    {
        self.run_start(ctx);
        let mut frames: Vec<Frame> = Vec::new();
        for event in events {
            self.handle_event(event, &mut frames, ctx)?;
        }
        self.finish(&frames, ctx)?;
        self.run_end(ctx);
        Ok(())
    }

    /// Filter an XML document, streaming events straight off the reader.
    pub fn filter_str(&self, xml: &str, ctx: &mut ExecutionContext) -> Result<()> {
        self.run_start(ctx);
        let mut frames: Vec<Frame> = Vec::new();
        for event in XmlEventReader::new(xml) {
            self.handle_event(event?, &mut frames, ctx)?;
        }
        self.finish(&frames, ctx)?;
        self.run_end(ctx);
        Ok(())
    }

    /// Filter a document into a string through the exclusive writer.
    pub fn filter_to_string(&self, xml: &str) -> Result<String> {
        let sink = StringSink::new();
        let mut ctx = ExecutionContext::new(*self.table.settings());
        ctx.set_writer(ExclusiveWriter::new(Box::new(sink.clone())));
        self.filter_str(xml, &mut ctx)?;
        Ok(sink.take_string())
    }

    fn run_start(&self, ctx: &mut ExecutionContext) {
        for binding in self.table.bindings() {
            binding.visitor().on_execution_start(ctx);
        }
    }

    fn run_end(&self, ctx: &mut ExecutionContext) {
        for binding in self.table.bindings() {
            binding.visitor().on_execution_end(ctx);
        }
    }

    fn finish(&self, frames: &[Frame], ctx: &mut ExecutionContext) -> Result<()> {
        if let Some(open) = frames.last() {
            return Err(FilterError::Parse(format!(
                "document ended with unclosed element '{}'",
                open.element.local_name()
            )));
        }
        if let Some(writer) = ctx.writer_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn handle_event(
        &self,
        event: XmlEvent,
        frames: &mut Vec<Frame>,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        match event {
            XmlEvent::StartElement { name, attributes } => {
                self.start_element(name, attributes, frames, ctx)
            }
            XmlEvent::EndElement { .. } => self.end_element(frames, ctx),
            XmlEvent::Text(text) => self.text(text, frames, ctx),
            XmlEvent::EndDocument => Ok(()),
        }
    }

    fn start_element(
        &self,
        name: QName,
        attributes: Vec<Attribute>,
        frames: &mut Vec<Frame>,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let id = ctx.next_element_id();
        let depth = frames.len();
        let map = self.table.get(name.local_name());

        // Ancestor chain, nearest-first, for contextual selector matches.
        let ancestors: Vec<QName> = frames
            .iter()
            .rev()
            .map(|f| f.element.name().clone())
            .collect();
        let applies = |node: &Arc<dyn DispatchNode>| {
            node.binding()
                .config()
                .selector()
                .matches_context(&name, &ancestors)
        };
        let filter = |list: &[Arc<dyn DispatchNode>]| -> Vec<Arc<dyn DispatchNode>> {
            list.iter().filter(|&n| applies(n)).cloned().collect()
        };

        let inherited = frames
            .last()
            .map(|f| f.keep_depth.saturating_sub(1))
            .unwrap_or(0);
        let mut frame = Frame {
            element: SaxElement::new(name.clone(), attributes, depth, id),
            before: filter(map.before_visitors()),
            child: filter(map.child_visitors()),
            after: filter(map.after_visitors()),
            cleanup: filter(map.cleanup_visitors()),
            accumulate: map.accumulate_text(),
            keep_depth: map.max_node_depth().max(inherited),
        };

        trace!(element = name.local_name(), id, depth, "enter");
        for node in frame.before.clone() {
            node.before(&mut frame.element, ctx)?;
        }
        for node in ctx.dynamic_visitors() {
            node.before(&mut frame.element, ctx)?;
        }

        ctx.push_element(name);
        frames.push(frame);
        Ok(())
    }

    fn text(
        &self,
        text: TextNode,
        frames: &mut [Frame],
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        // Character data outside the root element is ignored.
        let Some(frame) = frames.last_mut() else {
            return Ok(());
        };

        if frame.accumulate {
            let fragment = text.clone();
            ctx.mementos()
                .stash(TextMemento::new(frame.element.id()), |m| {
                    m.fragments.push(fragment);
                });
        }

        for node in frame.child.clone() {
            node.child_text(&mut frame.element, &text, ctx)?;
        }
        for node in ctx.dynamic_visitors() {
            node.child_text(&mut frame.element, &text, ctx)?;
        }
        Ok(())
    }

    fn end_element(&self, frames: &mut Vec<Frame>, ctx: &mut ExecutionContext) -> Result<()> {
        let Some(mut frame) = frames.pop() else {
            return Err(FilterError::Parse("unbalanced end of element".into()));
        };
        trace!(element = frame.element.local_name(), id = frame.element.id(), "exit");

        // Flush accumulated text into the element exactly once.
        if frame.accumulate {
            let mut memento = TextMemento::new(frame.element.id());
            ctx.mementos().restore(&mut memento);
            frame.element.set_text(memento.take_fragments());
        }

        // After-visitors unwind in reverse registration order by default,
        // so consumers are notified before the producers that fed them.
        let reverse = self.table.settings().reverse_visit_order_on_after;
        let statics = frame.after.clone();
        if reverse {
            for node in statics.iter().rev() {
                node.after(&mut frame.element, ctx)?;
            }
        } else {
            for node in &statics {
                node.after(&mut frame.element, ctx)?;
            }
        }
        for node in ctx.dynamic_visitors() {
            node.after(&mut frame.element, ctx)?;
        }

        let cleanups = frame.cleanup.clone();
        if reverse {
            for node in cleanups.iter().rev() {
                node.cleanup(&frame.element, ctx);
            }
        } else {
            for node in &cleanups {
                node.cleanup(&frame.element, ctx);
            }
        }

        ctx.mementos().forget(frame.element.id());
        ctx.pop_element();

        // The completed child is reported to its parent's child-visitors.
        if let Some(parent) = frames.last_mut() {
            for node in parent.child.clone() {
                node.child_element(&mut parent.element, &frame.element, ctx)?;
            }
            for node in ctx.dynamic_visitors() {
                node.child_element(&mut parent.element, &frame.element, ctx)?;
            }
            if parent.keep_depth > 0 {
                parent.element.attach_child(frame.element);
            }
        }
        Ok(())
    }
}
