//! Resource configuration and filter settings.
//!
//! A [`ResourceConfig`] declares the selector a visitor is bound to plus
//! arbitrary string-keyed parameters. Configurations are immutable after
//! load and shared read-only across concurrently executing runs.

pub mod table;

pub use table::{ElementVisitorMap, VisitorTable, VisitorTableBuilder};

use std::collections::HashMap;
use std::sync::Arc;

use crate::select::SelectorPath;

/// Declarative binding target: selector plus parameters.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    selector: SelectorPath,
    params: HashMap<String, String>,
}

impl ResourceConfig {
    /// Create a configuration for the given selector.
    pub fn new(selector: SelectorPath) -> Self {
        ResourceConfig {
            selector,
            params: HashMap::new(),
        }
    }

    /// Parse the selector expression and create a configuration.
    pub fn for_selector(expr: &str) -> crate::error::Result<Arc<Self>> {
        Ok(Arc::new(ResourceConfig::new(SelectorPath::parse(expr)?)))
    }

    /// Add a string parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn selector(&self) -> &SelectorPath {
        &self.selector
    }

    /// Parameter value by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parameter value with a fallback.
    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.param(name).unwrap_or(default)
    }
}

/// Run-level behavior switches.
///
/// Copied into every execution context; the defaults match the documented
/// dispatch semantics.
#[derive(Debug, Clone, Copy)]
pub struct FilterSettings {
    /// Abort the run when a visitor fails (default). When disabled, failures
    /// are logged and recorded on the execution context instead.
    pub terminate_on_visitor_error: bool,
    /// Invoke after-visitors in the reverse of the before order (default),
    /// so producers are unwound after their consumers.
    pub reverse_visit_order_on_after: bool,
    /// Maintain the ancestor element-name stack on the execution context.
    pub maintain_element_stack: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            terminate_on_visitor_error: true,
            reverse_visit_order_on_after: true,
            maintain_element_stack: true,
        }
    }
}
