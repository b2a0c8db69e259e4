//! fluxml - Streaming XML transformation pipeline
//!
//! A visitor-based framework that applies configured resources (visitors,
//! type decoders) while traversing an XML document, either as a SAX event
//! stream or as a materialized DOM tree.
//!
//! Delivery modes:
//! A: Streaming SAX dispatch (`SaxFilter`)
//! B: Materialized tree dispatch with equivalent ordering (`DomFilter`)
//! C: Parallel fan-out across independent runs (`parallel`)
//!
//! ## Architecture
//!
//! ```text
//! parser events ---> SaxFilter ---> VisitorTable lookup
//!                        |                |
//!                        v                v
//!                 ExecutionContext   InterceptorStack ---> visitor
//!                  (mementos, writer, counters)
//! ```
//!
//! The [`VisitorTable`] is built once per configuration and shared
//! read-only across runs; per-run state lives in the [`ExecutionContext`].

pub mod config;
pub mod context;
pub mod convert;
pub mod dom;
pub mod error;
pub mod event;
pub mod intercept;
pub mod listen;
pub mod memento;
pub mod parallel;
pub mod reader;
pub mod sax;
pub mod select;
pub mod visitor;
pub mod writer;

pub use config::{ElementVisitorMap, FilterSettings, ResourceConfig, VisitorTable};
pub use context::ExecutionContext;
pub use convert::{DecodeError, DecodedValue, DecoderRegistry, TypeDecoder};
pub use dom::{Document, DomFilter};
pub use error::{FilterError, Result};
pub use event::{Attribute, ElementId, QName, SaxElement, TextKind, TextNode, XmlEvent};
pub use intercept::{DispatchNode, InterceptorStack};
pub use listen::{CollectingListener, ExecutionEventListener, VisitEvent, VisitSequence};
pub use memento::{Memento, MementoCaretaker, MementoId, TextMemento};
pub use reader::XmlEventReader;
pub use sax::SaxFilter;
pub use select::SelectorPath;
pub use visitor::{Capabilities, ElementVisitor, SerializerVisitor, VisitPhase, VisitorBinding};
pub use writer::{ExclusiveWriter, StringSink, WriterClaim};
