//! Exception containment interceptor.
//!
//! Wraps every dispatch: reports a visit event to the listener, converts
//! visitor failures into the crate's error type preserving the cause, and
//! applies the terminate/log policy. The cooperative termination signal is
//! always rethrown, regardless of the policy.

use tracing::warn;

use super::DispatchNode;
use crate::context::ExecutionContext;
use crate::error::{FilterError, Result};
use crate::event::{SaxElement, TextNode};
use crate::listen::{VisitEvent, VisitSequence};
use crate::visitor::{Capabilities, VisitorBinding};

pub struct ExceptionInterceptor {
    next: Box<dyn DispatchNode>,
}

impl ExceptionInterceptor {
    pub fn new(next: Box<dyn DispatchNode>) -> Self {
        ExceptionInterceptor { next }
    }

    fn event(
        &self,
        element: &SaxElement,
        sequence: VisitSequence,
        error: Option<String>,
    ) -> VisitEvent {
        VisitEvent {
            element: element.local_name().to_string(),
            element_id: element.id(),
            visitor: self.caps().name,
            sequence,
            error,
        }
    }

    /// Wrap a failure, keeping the original as source. Checked I/O errors
    /// and visitor domain failures both end up in the same shape.
    fn contain(&self, element: &SaxElement, error: FilterError) -> FilterError {
        match error {
            already @ FilterError::Visitor { .. } => already,
            other => FilterError::Visitor {
                visitor: self.caps().name.to_string(),
                element: element.local_name().to_string(),
                source: Box::new(other),
            },
        }
    }

    fn handle(
        &self,
        element: &SaxElement,
        sequence: VisitSequence,
        result: Result<()>,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                ctx.notify(self.event(element, sequence, None));
                Ok(())
            }
            Err(error) if error.is_terminate() => {
                ctx.notify(self.event(element, sequence, Some(error.to_string())));
                Err(error)
            }
            Err(error) => {
                let contained = self.contain(element, error);
                ctx.notify(self.event(element, sequence, Some(contained.to_string())));
                if ctx.suppress_visitor_errors() {
                    warn!(
                        visitor = self.caps().name,
                        element = element.local_name(),
                        error = %contained,
                        "visitor failed, continuing"
                    );
                    ctx.record_terminate_error(contained);
                    Ok(())
                } else {
                    Err(contained)
                }
            }
        }
    }
}

impl DispatchNode for ExceptionInterceptor {
    fn caps(&self) -> &Capabilities {
        self.next.caps()
    }

    fn binding(&self) -> &VisitorBinding {
        self.next.binding()
    }

    fn before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        let result = self.next.before(element, ctx);
        self.handle(element, VisitSequence::Before, result, ctx)
    }

    fn child_text(
        &self,
        element: &mut SaxElement,
        text: &TextNode,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let result = self.next.child_text(element, text, ctx);
        self.handle(element, VisitSequence::ChildText, result, ctx)
    }

    fn child_element(
        &self,
        element: &mut SaxElement,
        child: &SaxElement,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let result = self.next.child_element(element, child, ctx);
        self.handle(element, VisitSequence::ChildElement, result, ctx)
    }

    fn after(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        let result = self.next.after(element, ctx);
        self.handle(element, VisitSequence::After, result, ctx)
    }

    fn cleanup(&self, element: &SaxElement, ctx: &mut ExecutionContext) {
        self.next.cleanup(element, ctx);
        ctx.notify(self.event(element, VisitSequence::Cleanup, None));
    }
}
