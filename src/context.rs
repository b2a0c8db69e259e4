//! Per-run execution context.
//!
//! Created for every filtering run and destroyed at its end. Everything
//! mutable during a traversal lives here: the memento store, the typed
//! value store shared between producer and consumer visitors, dynamically
//! registered visitors, the exclusive writer, index counters and the
//! termination-error slot. The delivery configuration itself stays
//! read-only and shared.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::FilterSettings;
use crate::error::{FilterError, Result};
use crate::event::{ElementId, QName};
use crate::intercept::DispatchNode;
use crate::listen::{ExecutionEventListener, VisitEvent};
use crate::memento::MementoCaretaker;
use crate::visitor::VisitPhase;
use crate::writer::{ExclusiveWriter, WriterClaim};

/// Mutable state for one filtering run.
pub struct ExecutionContext {
    settings: FilterSettings,
    phase: VisitPhase,
    mementos: MementoCaretaker,
    values: HashMap<String, Box<dyn Any + Send>>,
    dynamic: Vec<Arc<dyn DispatchNode>>,
    element_stack: Vec<QName>,
    writer: Option<ExclusiveWriter>,
    listener: Option<Arc<dyn ExecutionEventListener>>,
    terminate_error: Option<FilterError>,
    index_counters: HashMap<String, usize>,
    next_element_id: ElementId,
}

impl ExecutionContext {
    pub fn new(settings: FilterSettings) -> Self {
        ExecutionContext {
            settings,
            phase: VisitPhase::default(),
            mementos: MementoCaretaker::new(),
            values: HashMap::new(),
            dynamic: Vec::new(),
            element_stack: Vec::new(),
            writer: None,
            listener: None,
            terminate_error: None,
            index_counters: HashMap::new(),
            next_element_id: 0,
        }
    }

    /// A fresh child context for a nested filtering run.
    ///
    /// Dynamic visitors propagate from parent to child; everything else
    /// starts clean.
    pub fn child(&self) -> Self {
        let mut child = ExecutionContext::new(self.settings);
        child.phase = self.phase;
        child.dynamic = self.dynamic.clone();
        child.listener = self.listener.clone();
        child
    }

    #[inline]
    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    #[inline]
    pub fn phase(&self) -> VisitPhase {
        self.phase
    }

    /// Declare the current visit phase for multi-pass traversal.
    pub fn set_phase(&mut self, phase: VisitPhase) {
        self.phase = phase;
    }

    // ------------------------------------------------------------------
    // Memento store
    // ------------------------------------------------------------------

    #[inline]
    pub fn mementos(&mut self) -> &mut MementoCaretaker {
        &mut self.mementos
    }

    // ------------------------------------------------------------------
    // Typed value store (producer/consumer hand-off)
    // ------------------------------------------------------------------

    /// Store a typed value under a key.
    pub fn set_value<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Read a typed value by key.
    pub fn value<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Remove and return a typed value by key.
    pub fn take_value<T: Any>(&mut self, key: &str) -> Option<T> {
        let boxed = self.values.remove(key)?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(boxed) => {
                // Wrong type requested, put it back.
                self.values.insert(key.to_string(), boxed);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Dynamic visitors
    // ------------------------------------------------------------------

    /// Register a visitor for the remainder of the current traversal.
    ///
    /// Dynamic visitors run after statically configured visitors and are
    /// inherited by child contexts.
    pub fn add_dynamic_visitor(&mut self, node: Arc<dyn DispatchNode>) {
        self.dynamic.push(node);
    }

    /// Remove a dynamically registered visitor by name.
    pub fn remove_dynamic_visitor(&mut self, name: &str) {
        self.dynamic.retain(|n| n.caps().name != name);
    }

    /// Snapshot of the dynamic visitor list for dispatch.
    pub fn dynamic_visitors(&self) -> Vec<Arc<dyn DispatchNode>> {
        self.dynamic.clone()
    }

    pub fn has_dynamic_visitors(&self) -> bool {
        !self.dynamic.is_empty()
    }

    // ------------------------------------------------------------------
    // Element stack
    // ------------------------------------------------------------------

    pub(crate) fn push_element(&mut self, name: QName) {
        if self.settings.maintain_element_stack {
            self.element_stack.push(name);
        }
    }

    pub(crate) fn pop_element(&mut self) {
        if self.settings.maintain_element_stack {
            self.element_stack.pop();
        }
    }

    /// Ancestor names of the current element, outermost first.
    pub fn element_stack(&self) -> &[QName] {
        &self.element_stack
    }

    // ------------------------------------------------------------------
    // Writer
    // ------------------------------------------------------------------

    /// Attach the output writer for this run.
    pub fn set_writer(&mut self, writer: ExclusiveWriter) {
        self.writer = Some(writer);
    }

    pub fn writer_mut(&mut self) -> Option<&mut ExclusiveWriter> {
        self.writer.as_mut()
    }

    /// Write through the shared writer. Without a configured writer the
    /// output is discarded.
    pub fn write(&mut self, claim: &WriterClaim, data: &str) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_str(claim, data),
            None => Ok(()),
        }
    }

    pub(crate) fn acquire_writer(&mut self, element: ElementId, visitor: &'static str) {
        if let Some(writer) = self.writer.as_mut() {
            writer.acquire(element, visitor);
        }
    }

    pub(crate) fn release_writer(&mut self, element: ElementId, visitor: &'static str) {
        if let Some(writer) = self.writer.as_mut() {
            writer.release(element, visitor);
        }
    }

    // ------------------------------------------------------------------
    // Listener and termination
    // ------------------------------------------------------------------

    /// Attach an execution event listener.
    pub fn set_listener(&mut self, listener: Arc<dyn ExecutionEventListener>) {
        self.listener = Some(listener);
    }

    /// Report a dispatch event to the listener, if one is attached.
    pub fn notify(&self, event: VisitEvent) {
        if let Some(listener) = &self.listener {
            listener.on_event(event);
        }
    }

    /// Whether visitor failures are logged and suppressed instead of
    /// aborting the run.
    pub fn suppress_visitor_errors(&self) -> bool {
        !self.settings.terminate_on_visitor_error
            || self.listener.as_ref().is_some_and(|l| l.is_reporting())
    }

    /// Record the most recent suppressed visitor failure.
    pub fn record_terminate_error(&mut self, error: FilterError) {
        self.terminate_error = Some(error);
    }

    /// The last recorded visitor failure, if any.
    pub fn terminate_error(&self) -> Option<&FilterError> {
        self.terminate_error.as_ref()
    }

    // ------------------------------------------------------------------
    // Index counters
    // ------------------------------------------------------------------

    /// Increment the occurrence counter for a selector step.
    pub fn increment_index(&mut self, step_key: &str) {
        *self.index_counters.entry(step_key.to_string()).or_insert(0) += 1;
    }

    /// Current occurrence count for a selector step (0 if never seen).
    pub fn element_index(&self, step_key: &str) -> usize {
        self.index_counters.get(step_key).copied().unwrap_or(0)
    }

    /// Next stable element id for this run.
    pub(crate) fn next_element_id(&mut self) -> ElementId {
        self.next_element_id += 1;
        self.next_element_id
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext::new(FilterSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_value_store() {
        let mut ctx = ExecutionContext::default();
        ctx.set_value("total", 42u32);
        assert_eq!(ctx.value::<u32>("total"), Some(&42));
        assert_eq!(ctx.value::<String>("total"), None);
        assert_eq!(ctx.take_value::<u32>("total"), Some(42));
        assert_eq!(ctx.value::<u32>("total"), None);
    }

    #[test]
    fn test_take_value_wrong_type_keeps_entry() {
        let mut ctx = ExecutionContext::default();
        ctx.set_value("key", "text".to_string());
        assert_eq!(ctx.take_value::<u32>("key"), None);
        assert_eq!(ctx.value::<String>("key"), Some(&"text".to_string()));
    }

    #[test]
    fn test_index_counters() {
        let mut ctx = ExecutionContext::default();
        assert_eq!(ctx.element_index("order/item"), 0);
        ctx.increment_index("order/item");
        ctx.increment_index("order/item");
        assert_eq!(ctx.element_index("order/item"), 2);
    }

    #[test]
    fn test_element_ids_are_sequential() {
        let mut ctx = ExecutionContext::default();
        assert_eq!(ctx.next_element_id(), 1);
        assert_eq!(ctx.next_element_id(), 2);
    }

    #[test]
    fn test_suppression_follows_settings() {
        let ctx = ExecutionContext::default();
        assert!(!ctx.suppress_visitor_errors());

        let mut lenient = ExecutionContext::new(FilterSettings {
            terminate_on_visitor_error: false,
            ..FilterSettings::default()
        });
        assert!(lenient.suppress_visitor_errors());
        lenient.record_terminate_error(FilterError::Config("x".into()));
        assert!(lenient.terminate_error().is_some());
    }

    #[test]
    fn test_reporting_listener_forces_suppression() {
        let mut ctx = ExecutionContext::default();
        ctx.set_listener(Arc::new(crate::listen::CollectingListener::reporting()));
        assert!(ctx.suppress_visitor_errors());
    }
}
