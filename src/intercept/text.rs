//! Accumulated-text restoration interceptor.
//!
//! Text fragments buffered for an element live in the memento store, not
//! on the element itself. Before an after-visitor that consumes text runs,
//! this interceptor materializes the buffered fragments onto the element;
//! afterwards the materialized content is cleared so it cannot be
//! serialized twice.

use super::DispatchNode;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{SaxElement, TextNode};
use crate::memento::TextMemento;
use crate::visitor::{Capabilities, VisitorBinding};

pub struct TextConsumerInterceptor {
    next: Box<dyn DispatchNode>,
}

impl TextConsumerInterceptor {
    pub fn new(next: Box<dyn DispatchNode>) -> Self {
        TextConsumerInterceptor { next }
    }

    /// A target consumes text when declared so, or when it is a leaf
    /// after-visitor bound through a `text()` selector.
    fn consumes_text(&self) -> bool {
        let caps = self.next.caps();
        caps.consumes_text
            || (caps.after
                && !caps.visits_children()
                && self.next.binding().config().selector().accesses_text())
    }
}

impl DispatchNode for TextConsumerInterceptor {
    fn caps(&self) -> &Capabilities {
        self.next.caps()
    }

    fn binding(&self) -> &VisitorBinding {
        self.next.binding()
    }

    fn before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        self.next.before(element, ctx)
    }

    fn child_text(
        &self,
        element: &mut SaxElement,
        text: &TextNode,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        self.next.child_text(element, text, ctx)
    }

    fn child_element(
        &self,
        element: &mut SaxElement,
        child: &SaxElement,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        self.next.child_element(element, child, ctx)
    }

    fn after(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        if !self.consumes_text() {
            return self.next.after(element, ctx);
        }

        if element.text().is_empty() {
            let mut memento = TextMemento::new(element.id());
            ctx.mementos().restore(&mut memento);
            element.set_text(memento.take_fragments());
        }
        let result = self.next.after(element, ctx);
        element.clear_text();
        result
    }

    fn cleanup(&self, element: &SaxElement, ctx: &mut ExecutionContext) {
        self.next.cleanup(element, ctx);
    }
}
