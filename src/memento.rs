//! Memento store for per-element, per-visitor transient state.
//!
//! The same visitor instance is invoked on many nested elements within one
//! traversal. State it accumulates for one element (buffered text, writer
//! hand-off) must not leak into siblings or the parent scope, so it is
//! parked here, keyed by the element's stable identity plus the memento
//! type, and discarded when the element's scope closes.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::event::{ElementId, TextNode};

/// Composite memento key: element identity plus memento type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MementoId {
    pub element: ElementId,
    pub kind: TypeId,
}

impl MementoId {
    /// Key for a memento type on the given element.
    pub fn of<M: 'static>(element: ElementId) -> Self {
        MementoId {
            element,
            kind: TypeId::of::<M>(),
        }
    }
}

/// A restorable snapshot of per-element visitor state.
pub trait Memento: Any + Send {
    /// The key this memento is stored under.
    fn id(&self) -> MementoId;

    /// Deep-enough clone preserving the element identity.
    fn copy(&self) -> Box<dyn Memento>;

    /// Copy mutable fields from a sibling memento of the same id.
    fn restore_from(&mut self, other: &dyn Memento);

    fn as_any(&self) -> &dyn Any;
}

/// Caretaker scoped to one execution context.
#[derive(Default)]
pub struct MementoCaretaker {
    store: HashMap<MementoId, Box<dyn Memento>>,
}

impl MementoCaretaker {
    pub fn new() -> Self {
        MementoCaretaker::default()
    }

    /// Store a snapshot of the memento under its id.
    pub fn save(&mut self, memento: &dyn Memento) {
        self.store.insert(memento.id(), memento.copy());
    }

    /// Restore saved state into the passed-in memento.
    ///
    /// When nothing was saved under the id, the memento keeps its default
    /// values and is itself saved as the new baseline, so restore doubles
    /// as get-or-create and never fails.
    pub fn restore(&mut self, memento: &mut dyn Memento) {
        match self.store.get(&memento.id()) {
            Some(saved) => memento.restore_from(saved.as_ref()),
            None => {
                self.store.insert(memento.id(), memento.copy());
            }
        }
    }

    /// Restore, apply a mutation, save.
    pub fn stash<M, F>(&mut self, seed: M, mutate: F)
    where
        M: Memento,
        F: FnOnce(&mut M),
    {
        let mut memento = seed;
        self.restore(&mut memento);
        mutate(&mut memento);
        self.save(&memento);
    }

    /// Drop every memento belonging to the element.
    pub fn forget(&mut self, element: ElementId) {
        self.store.retain(|id, _| id.element != element);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Memento holding text fragments accumulated for one element.
#[derive(Debug, Clone, Default)]
pub struct TextMemento {
    element: ElementId,
    pub fragments: Vec<TextNode>,
}

impl TextMemento {
    pub fn new(element: ElementId) -> Self {
        TextMemento {
            element,
            fragments: Vec::new(),
        }
    }

    /// Take the accumulated fragments, leaving the memento empty.
    pub fn take_fragments(&mut self) -> Vec<TextNode> {
        std::mem::take(&mut self.fragments)
    }
}

impl Memento for TextMemento {
    fn id(&self) -> MementoId {
        MementoId::of::<TextMemento>(self.element)
    }

    fn copy(&self) -> Box<dyn Memento> {
        Box::new(self.clone())
    }

    fn restore_from(&mut self, other: &dyn Memento) {
        if let Some(other) = other.as_any().downcast_ref::<TextMemento>() {
            self.fragments = other.fragments.clone();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TextKind;

    #[test]
    fn test_restore_is_get_or_create() {
        let mut caretaker = MementoCaretaker::new();
        let mut memento = TextMemento::new(9);
        caretaker.restore(&mut memento);
        assert!(memento.fragments.is_empty());
        // The default state became the baseline.
        assert_eq!(caretaker.len(), 1);
    }

    #[test]
    fn test_stash_accumulates() {
        let mut caretaker = MementoCaretaker::new();
        caretaker.stash(TextMemento::new(3), |m| {
            m.fragments.push(TextNode::text("a"));
        });
        caretaker.stash(TextMemento::new(3), |m| {
            m.fragments.push(TextNode::new("b", TextKind::CData));
        });

        let mut out = TextMemento::new(3);
        caretaker.restore(&mut out);
        assert_eq!(out.fragments.len(), 2);
        assert_eq!(out.fragments[0].value, "a");
        assert_eq!(out.fragments[1].value, "b");
    }

    #[test]
    fn test_sibling_elements_do_not_share_state() {
        let mut caretaker = MementoCaretaker::new();
        caretaker.stash(TextMemento::new(1), |m| {
            m.fragments.push(TextNode::text("first"));
        });

        let mut sibling = TextMemento::new(2);
        caretaker.restore(&mut sibling);
        assert!(sibling.fragments.is_empty());
    }

    #[test]
    fn test_forget_drops_element_scope() {
        let mut caretaker = MementoCaretaker::new();
        caretaker.stash(TextMemento::new(5), |m| {
            m.fragments.push(TextNode::text("x"));
        });
        caretaker.forget(5);

        let mut fresh = TextMemento::new(5);
        caretaker.restore(&mut fresh);
        assert!(fresh.fragments.is_empty());
    }
}
