//! Error types for fluxml.

use thiserror::Error;

/// Result type alias for filtering operations.
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised during configuration build or document filtering.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Configuration rejected at delivery-config build time.
    #[error("configuration error: {0}")]
    Config(String),

    /// A decoder was already registered under the same type name.
    #[error("decoder already registered for type '{0}'")]
    DecoderConflict(String),

    /// A visitor failed during dispatch.
    #[error("visitor '{visitor}' failed on element '{element}'")]
    Visitor {
        visitor: String,
        element: String,
        #[source]
        source: Box<FilterError>,
    },

    /// A visitor reported a domain failure of its own.
    #[error("{0}")]
    VisitorMessage(String),

    /// Unauthorized write to an exclusively owned writer.
    #[error("writer access violation: '{attempted}' wrote to a writer owned by '{owner}'")]
    WriterAccessViolation {
        attempted: &'static str,
        owner: &'static str,
    },

    /// Cooperative cancellation signal. Always propagated, regardless of
    /// the terminate-on-visitor-error setting.
    #[error("filtering terminated: {0}")]
    TerminateFiltering(String),

    /// Invalid selector expression.
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// XML parse error reported by the underlying reader.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    /// Check whether this is the cooperative termination signal.
    #[inline]
    pub fn is_terminate(&self) -> bool {
        matches!(self, FilterError::TerminateFiltering(_))
    }

    /// Shorthand for a visitor-level domain failure.
    pub fn visitor_message(message: impl Into<String>) -> Self {
        FilterError::VisitorMessage(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_detection() {
        let err = FilterError::TerminateFiltering("done".into());
        assert!(err.is_terminate());
        assert!(!FilterError::Config("bad".into()).is_terminate());
    }

    #[test]
    fn test_visitor_error_preserves_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = FilterError::Visitor {
            visitor: "X".into(),
            element: "order".into(),
            source: Box::new(FilterError::Io(io)),
        };
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
    }
}
