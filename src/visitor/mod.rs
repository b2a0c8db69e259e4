//! Visitor capability model.
//!
//! A visitor implements whichever subset of the traversal callbacks it
//! needs and declares that subset once, as a [`Capabilities`] snapshot,
//! when it is bound. Dispatch never re-probes types: the snapshot travels
//! with the binding and uninvolved callbacks resolve to no-ops.
//!
//! Visitor instances are shared across concurrently executing runs, so the
//! callbacks take `&self`. Per-run mutable state belongs in the execution
//! context's memento store, never on the visitor itself.

pub mod serialize;

pub use serialize::SerializerVisitor;

use std::sync::Arc;

use crate::config::ResourceConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::event::{SaxElement, TextNode};

/// Multi-pass visit phase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitPhase {
    /// First pass: assemble supporting state.
    Assembly,
    /// Main pass (default).
    #[default]
    Processing,
}

/// Capability snapshot for one visitor instance.
///
/// Resolved once when the visitor is bound. The `name` identifies the
/// visitor in error messages and writer-ownership diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub name: &'static str,
    pub before: bool,
    pub after: bool,
    pub child_text: bool,
    pub child_element: bool,
    pub cleanup: bool,
    /// Consumes accumulated text in its after callback.
    pub consumes_text: bool,
    /// Claims exclusive ownership of the stream writer for its element scope.
    pub owns_writer: bool,
    /// Serialization visitor: non-owning writes are dropped, not rejected.
    pub serializer: bool,
    /// Depth of completed child elements to materialize for after access.
    pub max_node_depth: usize,
}

impl Capabilities {
    /// Start a snapshot for the named visitor, with no capabilities set.
    pub const fn named(name: &'static str) -> Self {
        Capabilities {
            name,
            before: false,
            after: false,
            child_text: false,
            child_element: false,
            cleanup: false,
            consumes_text: false,
            owns_writer: false,
            serializer: false,
            max_node_depth: 0,
        }
    }

    pub const fn with_before(mut self) -> Self {
        self.before = true;
        self
    }

    pub const fn with_after(mut self) -> Self {
        self.after = true;
        self
    }

    pub const fn with_child_text(mut self) -> Self {
        self.child_text = true;
        self
    }

    pub const fn with_child_element(mut self) -> Self {
        self.child_element = true;
        self
    }

    pub const fn with_cleanup(mut self) -> Self {
        self.cleanup = true;
        self
    }

    pub const fn consumes_text(mut self) -> Self {
        self.consumes_text = true;
        self
    }

    pub const fn owns_writer(mut self) -> Self {
        self.owns_writer = true;
        self
    }

    pub const fn as_serializer(mut self) -> Self {
        self.serializer = true;
        self
    }

    pub const fn with_max_node_depth(mut self, depth: usize) -> Self {
        self.max_node_depth = depth;
        self
    }

    /// Whether the visitor observes child events of either kind.
    #[inline]
    pub const fn visits_children(&self) -> bool {
        self.child_text || self.child_element
    }
}

/// A unit of behavior invoked at specific points of an element's traversal.
pub trait ElementVisitor: Send + Sync {
    /// The capability snapshot for this instance.
    fn capabilities(&self) -> Capabilities;

    /// Invoked when the element opens, before any of its children.
    fn visit_before(&self, _element: &mut SaxElement, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Invoked for each character-data child, in document order.
    fn visit_child_text(
        &self,
        _element: &mut SaxElement,
        _text: &TextNode,
        _ctx: &mut ExecutionContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Invoked for each completed child element, in document order.
    fn visit_child_element(
        &self,
        _element: &mut SaxElement,
        _child: &SaxElement,
        _ctx: &mut ExecutionContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Invoked when the element closes, after all of its children.
    fn visit_after(&self, _element: &mut SaxElement, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Invoked after the after-phase, when the element's scope is discarded.
    fn on_cleanup(&self, _ctx: &mut ExecutionContext) {}

    /// Invoked once when a filtering run starts, before any parser event.
    fn on_execution_start(&self, _ctx: &mut ExecutionContext) {}

    /// Invoked once when a filtering run completed without aborting.
    fn on_execution_end(&self, _ctx: &mut ExecutionContext) {}

    /// Context keys this visitor produces for sibling visitors.
    fn produces(&self) -> &[&'static str] {
        &[]
    }

    /// Context keys this visitor consumes from sibling visitors.
    fn consumes(&self) -> &[&'static str] {
        &[]
    }

    /// The pass this visitor participates in.
    fn phase(&self) -> VisitPhase {
        VisitPhase::default()
    }
}

/// A visitor paired with the configuration that selected it.
///
/// Created once at delivery-config build time and shared read-only across
/// all executions. The capability and phase snapshots are taken here so
/// dispatch never inspects the visitor type again.
#[derive(Clone)]
pub struct VisitorBinding {
    visitor: Arc<dyn ElementVisitor>,
    config: Arc<ResourceConfig>,
    caps: Capabilities,
    phase: VisitPhase,
}

impl VisitorBinding {
    pub fn new(visitor: Arc<dyn ElementVisitor>, config: Arc<ResourceConfig>) -> Self {
        let caps = visitor.capabilities();
        let phase = visitor.phase();
        VisitorBinding {
            visitor,
            config,
            caps,
            phase,
        }
    }

    #[inline]
    pub fn visitor(&self) -> &Arc<dyn ElementVisitor> {
        &self.visitor
    }

    #[inline]
    pub fn config(&self) -> &Arc<ResourceConfig> {
        &self.config
    }

    #[inline]
    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    pub fn phase(&self) -> VisitPhase {
        self.phase
    }

    /// Visitor name, for diagnostics.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.caps.name
    }
}

impl std::fmt::Debug for VisitorBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitorBinding")
            .field("visitor", &self.caps.name)
            .field("selector", &self.config.selector().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl ElementVisitor for Probe {
        fn capabilities(&self) -> Capabilities {
            Capabilities::named("Probe").with_before().with_after()
        }
    }

    #[test]
    fn test_capability_builder() {
        let caps = Capabilities::named("X")
            .with_before()
            .with_child_text()
            .consumes_text();
        assert!(caps.before);
        assert!(caps.child_text);
        assert!(caps.consumes_text);
        assert!(!caps.after);
        assert!(caps.visits_children());
    }

    #[test]
    fn test_binding_snapshots_capabilities() {
        let config = ResourceConfig::for_selector("order").unwrap();
        let binding = VisitorBinding::new(Arc::new(Probe), config);
        assert_eq!(binding.name(), "Probe");
        assert!(binding.caps().before);
        assert_eq!(binding.phase(), VisitPhase::Processing);
    }
}
