//! Visitor interceptor chain.
//!
//! Every configured visitor is wrapped in a chain of interceptors adding
//! cross-cutting behavior: exception containment, accumulated-text
//! restoration, visit-phase gating and exclusive-writer management. The
//! chain is a singly linked list of decorators terminating at the real
//! visitor binding; each node owns the next.
//!
//! Chains are composed from a statically declared, ordered list of
//! factories. Declaration order determines nesting: the first declared
//! interceptor ends up outermost.

pub mod exception;
pub mod phase;
pub mod text;
pub mod writer;

pub use exception::ExceptionInterceptor;
pub use phase::VisitPhaseInterceptor;
pub use text::TextConsumerInterceptor;
pub use writer::WriterInterceptor;

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{SaxElement, TextNode};
use crate::visitor::{Capabilities, VisitorBinding};

/// Uniform dispatch surface for a wrapped visitor binding.
///
/// Capability resolution happened at bind time: callbacks the underlying
/// visitor does not implement resolve to no-ops at the terminal node, so
/// callers may dispatch unconditionally.
pub trait DispatchNode: Send + Sync {
    /// Capability snapshot of the terminal visitor.
    fn caps(&self) -> &Capabilities;

    /// The concrete binding, resolved past all interceptor layers.
    fn binding(&self) -> &VisitorBinding;

    fn before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()>;

    fn child_text(
        &self,
        element: &mut SaxElement,
        text: &TextNode,
        ctx: &mut ExecutionContext,
    ) -> Result<()>;

    fn child_element(
        &self,
        element: &mut SaxElement,
        child: &SaxElement,
        ctx: &mut ExecutionContext,
    ) -> Result<()>;

    fn after(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()>;

    fn cleanup(&self, element: &SaxElement, ctx: &mut ExecutionContext);
}

/// Terminal chain node holding the real visitor binding.
pub struct TargetNode {
    binding: VisitorBinding,
}

impl TargetNode {
    pub fn new(binding: VisitorBinding) -> Self {
        TargetNode { binding }
    }
}

impl DispatchNode for TargetNode {
    fn caps(&self) -> &Capabilities {
        self.binding.caps()
    }

    fn binding(&self) -> &VisitorBinding {
        &self.binding
    }

    fn before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        if self.binding.caps().before {
            self.binding.visitor().visit_before(element, ctx)
        } else {
            Ok(())
        }
    }

    fn child_text(
        &self,
        element: &mut SaxElement,
        text: &TextNode,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        if self.binding.caps().child_text {
            self.binding.visitor().visit_child_text(element, text, ctx)
        } else {
            Ok(())
        }
    }

    fn child_element(
        &self,
        element: &mut SaxElement,
        child: &SaxElement,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        if self.binding.caps().child_element {
            self.binding
                .visitor()
                .visit_child_element(element, child, ctx)
        } else {
            Ok(())
        }
    }

    fn after(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        if self.binding.caps().after {
            self.binding.visitor().visit_after(element, ctx)
        } else {
            Ok(())
        }
    }

    fn cleanup(&self, _element: &SaxElement, ctx: &mut ExecutionContext) {
        if self.binding.caps().cleanup {
            self.binding.visitor().on_cleanup(ctx);
        }
    }
}

/// Generic forwarding interceptor.
///
/// Used when a stack slot needs capability pass-through without behavior
/// of its own; producer/consumer and lifecycle calls flow straight to the
/// next node.
pub struct StaticProxyInterceptor {
    next: Box<dyn DispatchNode>,
}

impl StaticProxyInterceptor {
    pub fn new(next: Box<dyn DispatchNode>) -> Self {
        StaticProxyInterceptor { next }
    }
}

impl DispatchNode for StaticProxyInterceptor {
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
        self.next.after(element, ctx)
    }

    fn cleanup(&self, element: &SaxElement, ctx: &mut ExecutionContext) {
        self.next.cleanup(element, ctx);
    }
}

/// Factory producing one interceptor layer around the next node.
pub type InterceptorFactory =
    Arc<dyn Fn(Box<dyn DispatchNode>) -> Box<dyn DispatchNode> + Send + Sync>;

/// Ordered interceptor composition.
#[derive(Clone)]
pub struct InterceptorStack {
    factories: Vec<InterceptorFactory>,
}

impl InterceptorStack {
    /// No interceptors: dispatch goes straight to the target.
    pub fn empty() -> Self {
        InterceptorStack {
            factories: Vec::new(),
        }
    }

    /// The standard stack: exception containment outermost, then
    /// accumulated-text restoration, phase gating and writer management.
    pub fn standard() -> Self {
        let mut stack = InterceptorStack::empty();
        stack.push(|next| Box::new(ExceptionInterceptor::new(next)));
        stack.push(|next| Box::new(TextConsumerInterceptor::new(next)));
        stack.push(|next| Box::new(VisitPhaseInterceptor::new(next)));
        stack.push(|next| Box::new(WriterInterceptor::new(next)));
        stack
    }

    /// Append a factory. Earlier factories wrap later ones.
    pub fn push<F>(&mut self, factory: F)
    where
        F: Fn(Box<dyn DispatchNode>) -> Box<dyn DispatchNode> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
    }

    /// Wrap a binding into its dispatch chain.
    pub fn wrap(&self, binding: VisitorBinding) -> Arc<dyn DispatchNode> {
        let mut node: Box<dyn DispatchNode> = Box::new(TargetNode::new(binding));
        for factory in self.factories.iter().rev() {
            node = factory(node);
        }
        Arc::from(node)
    }
}

impl Default for InterceptorStack {
    fn default() -> Self {
        InterceptorStack::standard()
    }
}
