//! DOM module - arena-based document and tree delivery.
//!
//! Implements the materialized delivery mode:
//! - Arena allocation for nodes, NodeId (u32) indices
//! - Built from the same event stream the streaming engine consumes
//! - A tree walker producing visitor ordering equivalent to the SAX path

pub mod deliver;
pub mod document;
pub mod node;

pub use deliver::DomFilter;
pub use document::{Children, Document};
pub use node::{Node, NodeId, NodeKind};
