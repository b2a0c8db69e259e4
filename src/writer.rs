//! Exclusive output-writer coordination.
//!
//! One shared mutable writer handle exists per execution context. Traversal
//! is single-threaded, so exclusivity is enforced cooperatively: the first
//! visitor annotated as writer owner acquires the writer for its element
//! scope, and any other visitor writing through the handle without
//! ownership fails fast instead of corrupting the output. Serialization
//! visitors are the exception: their non-owning writes are dropped
//! silently, letting the owner take over an element's serialized form.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::error::{FilterError, Result};
use crate::event::{ElementId, SaxElement};
use crate::visitor::Capabilities;

/// The identity a visitor presents when writing.
#[derive(Debug, Clone, Copy)]
pub struct WriterClaim {
    pub element: ElementId,
    pub visitor: &'static str,
    pub serializer: bool,
}

impl WriterClaim {
    /// Claim for a visitor writing within the given element's scope.
    pub fn new(element: &SaxElement, caps: &Capabilities) -> Self {
        WriterClaim {
            element: element.id(),
            visitor: caps.name,
            serializer: caps.serializer,
        }
    }
}

/// The shared writer handle with cooperative ownership tracking.
pub struct ExclusiveWriter {
    sink: Box<dyn Write + Send>,
    owner: Option<(ElementId, &'static str)>,
}

impl ExclusiveWriter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        ExclusiveWriter { sink, owner: None }
    }

    /// Current owner, if any.
    pub fn owner(&self) -> Option<(ElementId, &'static str)> {
        self.owner
    }

    /// Acquire ownership for an element scope. First claimant wins; a
    /// nested acquire while owned is ignored.
    pub fn acquire(&mut self, element: ElementId, visitor: &'static str) {
        if self.owner.is_none() {
            self.owner = Some((element, visitor));
        }
    }

    /// Release ownership, only by the visitor and element that hold it.
    pub fn release(&mut self, element: ElementId, visitor: &'static str) {
        if self.owner == Some((element, visitor)) {
            self.owner = None;
        }
    }

    /// Write through the handle under the given claim.
    ///
    /// An unowned writer admits any claim. A non-owning serializer claim is
    /// dropped silently; any other non-owning claim is a violation.
    pub fn write_str(&mut self, claim: &WriterClaim, data: &str) -> Result<()> {
        match self.owner {
            None => {
                self.sink.write_all(data.as_bytes())?;
                Ok(())
            }
            Some((_, owner)) if owner == claim.visitor => {
                self.sink.write_all(data.as_bytes())?;
                Ok(())
            }
            Some(_) if claim.serializer => Ok(()),
            Some((_, owner)) => Err(FilterError::WriterAccessViolation {
                attempted: claim.visitor,
                owner,
            }),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for ExclusiveWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveWriter")
            .field("owner", &self.owner)
            .finish()
    }
}

/// An in-memory sink that stays readable after the run.
///
/// The execution context owns the writer box, so callers keep a clone of
/// this handle to collect the serialized output afterwards.
#[derive(Debug, Clone, Default)]
pub struct StringSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl StringSink {
    pub fn new() -> Self {
        StringSink::default()
    }

    /// The bytes written so far, decoded lossily.
    pub fn to_string_lossy(&self) -> String {
        let guard = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&guard).into_owned()
    }

    /// Take the buffered output, leaving the sink empty.
    pub fn take_string(&self) -> String {
        let mut guard = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&std::mem::take(&mut *guard)).into_owned()
    }
}

impl Write for StringSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(visitor: &'static str, serializer: bool) -> WriterClaim {
        WriterClaim {
            element: 1,
            visitor,
            serializer,
        }
    }

    #[test]
    fn test_unowned_writer_admits_all() {
        let sink = StringSink::new();
        let mut writer = ExclusiveWriter::new(Box::new(sink.clone()));
        writer.write_str(&claim("A", false), "a").unwrap();
        writer.write_str(&claim("B", true), "b").unwrap();
        assert_eq!(sink.to_string_lossy(), "ab");
    }

    #[test]
    fn test_owner_writes_others_rejected() {
        let sink = StringSink::new();
        let mut writer = ExclusiveWriter::new(Box::new(sink.clone()));
        writer.acquire(1, "Owner");

        writer.write_str(&claim("Owner", false), "kept").unwrap();
        let err = writer.write_str(&claim("Intruder", false), "dropped");
        match err {
            Err(FilterError::WriterAccessViolation { attempted, owner }) => {
                assert_eq!(attempted, "Intruder");
                assert_eq!(owner, "Owner");
            }
            other => panic!("expected violation, got {other:?}"),
        }
        assert_eq!(sink.to_string_lossy(), "kept");
    }

    #[test]
    fn test_serializer_writes_dropped_silently() {
        let sink = StringSink::new();
        let mut writer = ExclusiveWriter::new(Box::new(sink.clone()));
        writer.acquire(1, "Owner");

        writer.write_str(&claim("Serializer", true), "ignored").unwrap();
        assert_eq!(sink.to_string_lossy(), "");
    }

    #[test]
    fn test_release_requires_matching_owner() {
        let sink = StringSink::new();
        let mut writer = ExclusiveWriter::new(Box::new(sink));
        writer.acquire(7, "Owner");
        writer.release(7, "Other");
        assert!(writer.owner().is_some());
        writer.release(7, "Owner");
        assert!(writer.owner().is_none());
    }
}
