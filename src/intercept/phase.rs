//! Visit-phase gating interceptor.
//!
//! Supports multi-pass traversal: a call is forwarded only when the
//! execution context's declared phase matches the visitor's own phase
//! tag. Cleanup is never gated.

use super::DispatchNode;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{SaxElement, TextNode};
use crate::visitor::{Capabilities, VisitorBinding};

pub struct VisitPhaseInterceptor {
    next: Box<dyn DispatchNode>,
}

impl VisitPhaseInterceptor {
    pub fn new(next: Box<dyn DispatchNode>) -> Self {
        VisitPhaseInterceptor { next }
    }

    #[inline]
    fn in_phase(&self, ctx: &ExecutionContext) -> bool {
        self.next.binding().phase() == ctx.phase()
    }
}

impl DispatchNode for VisitPhaseInterceptor {
    fn caps(&self) -> &Capabilities {
        self.next.caps()
    }

    fn binding(&self) -> &VisitorBinding {
        self.next.binding()
    }

    fn before(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        if self.in_phase(ctx) {
            self.next.before(element, ctx)
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
        if self.in_phase(ctx) {
            self.next.child_text(element, text, ctx)
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
        if self.in_phase(ctx) {
            self.next.child_element(element, child, ctx)
        } else {
            Ok(())
        }
    }

    fn after(&self, element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        if self.in_phase(ctx) {
            self.next.after(element, ctx)
        } else {
            Ok(())
        }
    }

    fn cleanup(&self, element: &SaxElement, ctx: &mut ExecutionContext) {
        self.next.cleanup(element, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::event::QName;
    use crate::intercept::InterceptorStack;
    use crate::visitor::{ElementVisitor, VisitPhase};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AssemblyOnly {
        calls: Arc<AtomicUsize>,
    }

    impl ElementVisitor for AssemblyOnly {
        fn capabilities(&self) -> Capabilities {
            Capabilities::named("AssemblyOnly").with_before()
        }

        fn phase(&self) -> VisitPhase {
            VisitPhase::Assembly
        }

        fn visit_before(
            &self,
            _element: &mut SaxElement,
            _ctx: &mut ExecutionContext,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_gated_until_phase_matches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = InterceptorStack::standard().wrap(VisitorBinding::new(
            Arc::new(AssemblyOnly {
                calls: calls.clone(),
            }),
            ResourceConfig::for_selector("order").unwrap(),
        ));

        let mut ctx = ExecutionContext::default();
        let mut el = SaxElement::new(QName::new("order"), vec![], 0, 1);

        // Default phase is Processing, the assembly visitor stays silent.
        chain.before(&mut el, &mut ctx).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        ctx.set_phase(VisitPhase::Assembly);
        chain.before(&mut el, &mut ctx).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
