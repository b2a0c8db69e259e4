//! Execution event listener sink.
//!
//! A listener receives one event per dispatch attempt, for audit and
//! reporting. It is a side channel: it never influences control flow,
//! except that an attached reporting listener forces log-and-continue on
//! visitor failures so a report can observe the whole document.

use std::sync::Mutex;

use crate::event::ElementId;

/// The dispatch point an event was recorded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitSequence {
    Before,
    ChildText,
    ChildElement,
    After,
    Cleanup,
}

/// One dispatch attempt: visitable, visitor, phase, optional error.
#[derive(Debug, Clone)]
pub struct VisitEvent {
    pub element: String,
    pub element_id: ElementId,
    pub visitor: &'static str,
    pub sequence: VisitSequence,
    pub error: Option<String>,
}

/// Sink for dispatch events.
pub trait ExecutionEventListener: Send + Sync {
    fn on_event(&self, event: VisitEvent);

    /// Reporting listeners force error suppression so the report covers
    /// the whole document even under failures.
    fn is_reporting(&self) -> bool {
        false
    }
}

/// Listener that collects every event in memory.
#[derive(Default)]
pub struct CollectingListener {
    reporting: bool,
    events: Mutex<Vec<VisitEvent>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        CollectingListener::default()
    }

    /// A collecting listener that also acts as a report generator.
    pub fn reporting() -> Self {
        CollectingListener {
            reporting: true,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Drain the recorded events.
    pub fn take_events(&self) -> Vec<VisitEvent> {
        let mut guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExecutionEventListener for CollectingListener {
    fn on_event(&self, event: VisitEvent) {
        let mut guard = self.events.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(event);
    }

    fn is_reporting(&self) -> bool {
        self.reporting
    }
}
