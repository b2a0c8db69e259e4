//! Exclusive-writer management interceptor.
//!
//! The first visitor annotated as writer owner acquires exclusive write
//! access for its element scope on entry and releases it on exit. The
//! ownership check itself happens in the writer; this layer only brackets
//! the owning visitor's scope.

use super::DispatchNode;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{SaxElement, TextNode};
use crate::visitor::{Capabilities, VisitorBinding};

pub struct WriterInterceptor {
    next: Box<dyn DispatchNode>,
}

impl WriterInterceptor {
    pub fn new(next: Box<dyn DispatchNode>) -> Self {
        WriterInterceptor { next }
    }
}

impl DispatchNode for WriterInterceptor {
    fn caps(&self) -> &Capabilities {
        self.next.caps()
    }

    fn binding(&self) -> &VisitorBinding {
        self.next.binding()
    }

    fn before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        let caps = self.next.caps();
        if caps.owns_writer {
            ctx.acquire_writer(element.id(), caps.name);
        }
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
        let result = self.next.after(element, ctx);
        let caps = self.next.caps();
        if caps.owns_writer {
            ctx.release_writer(element.id(), caps.name);
        }
        result
    }

    fn cleanup(&self, element: &SaxElement, ctx: &mut ExecutionContext) {
        self.next.cleanup(element, ctx);
    }
}
