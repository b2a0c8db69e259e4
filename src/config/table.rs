//! Visitor binding table.
//!
//! Transforms the raw per-selector visitor registrations into a flat,
//! read-only map keyed by literal element local name, with wildcard
//! bindings folded in, in the correct dispatch order. Built once per
//! configuration and shared across concurrently executing runs.
//!
//! Combined lookups for alias name sets are memoized in an LRU cache,
//! so repeated elements resolve without re-merging.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::warn;

use crate::config::{FilterSettings, ResourceConfig};
use crate::context::ExecutionContext;
use crate::error::{FilterError, Result};
use crate::event::SaxElement;
use crate::intercept::{DispatchNode, InterceptorStack};
use crate::select::NameTest;
use crate::visitor::{Capabilities, ElementVisitor, VisitorBinding};

const COMBINED_CACHE_SIZE: usize = 64;

/// The per-element dispatch configuration: four ordered visitor lists plus
/// the two derived flags.
pub struct ElementVisitorMap {
    before: Vec<Arc<dyn DispatchNode>>,
    child: Vec<Arc<dyn DispatchNode>>,
    after: Vec<Arc<dyn DispatchNode>>,
    cleanup: Vec<Arc<dyn DispatchNode>>,
    /// Buffer text events for the element instead of forwarding only.
    accumulate_text: bool,
    /// Visitor owning the output writer for this element, if any.
    acquire_writer_for: Option<&'static str>,
    /// Deepest completed-child materialization any visitor asked for.
    max_node_depth: usize,
}

impl ElementVisitorMap {
    fn empty() -> Self {
        ElementVisitorMap {
            before: Vec::new(),
            child: Vec::new(),
            after: Vec::new(),
            cleanup: Vec::new(),
            accumulate_text: false,
            acquire_writer_for: None,
            max_node_depth: 0,
        }
    }

    pub fn before_visitors(&self) -> &[Arc<dyn DispatchNode>] {
        &self.before
    }

    pub fn child_visitors(&self) -> &[Arc<dyn DispatchNode>] {
        &self.child
    }

    pub fn after_visitors(&self) -> &[Arc<dyn DispatchNode>] {
        &self.after
    }

    pub fn cleanup_visitors(&self) -> &[Arc<dyn DispatchNode>] {
        &self.cleanup
    }

    #[inline]
    pub fn accumulate_text(&self) -> bool {
        self.accumulate_text
    }

    #[inline]
    pub fn acquire_writer_for(&self) -> Option<&'static str> {
        self.acquire_writer_for
    }

    #[inline]
    pub fn max_node_depth(&self) -> usize {
        self.max_node_depth
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.child.is_empty()
            && self.after.is_empty()
            && self.cleanup.is_empty()
    }

    /// Derive the two flags from the merged lists.
    fn finish(mut self) -> Self {
        self.accumulate_text = self
            .before
            .iter()
            .chain(self.after.iter())
            .any(|n| n.caps().consumes_text)
            || self
                .after
                .iter()
                .any(|n| n.binding().config().selector().accesses_text());
        self.acquire_writer_for = self
            .before
            .iter()
            .chain(self.after.iter())
            .find(|n| n.caps().owns_writer)
            .map(|n| n.caps().name);
        self.max_node_depth = self
            .before
            .iter()
            .chain(self.child.iter())
            .chain(self.after.iter())
            .map(|n| n.caps().max_node_depth)
            .max()
            .unwrap_or(0);
        self
    }
}

/// Pseudo-visitor incrementing the occurrence counter for one selector
/// step. One instance per distinct step, shared across all bindings
/// referencing it.
struct IndexCounterVisitor {
    step_key: String,
}

impl ElementVisitor for IndexCounterVisitor {
    fn capabilities(&self) -> Capabilities {
        Capabilities::named("IndexCounter").with_before()
    }

    fn visit_before(&self, _element: &mut SaxElement, ctx: &mut ExecutionContext) -> Result<()> {
        ctx.increment_index(&self.step_key);
        Ok(())
    }
}

/// Builder collecting registrations in order.
pub struct VisitorTableBuilder {
    registrations: Vec<VisitorBinding>,
    interceptors: InterceptorStack,
    settings: FilterSettings,
}

impl VisitorTableBuilder {
    pub fn new() -> Self {
        VisitorTableBuilder {
            registrations: Vec::new(),
            interceptors: InterceptorStack::standard(),
            settings: FilterSettings::default(),
        }
    }

    pub fn settings(mut self, settings: FilterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the interceptor stack. Declaration order in the stack
    /// determines nesting, first declared outermost.
    pub fn interceptors(mut self, interceptors: InterceptorStack) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Register a visitor against a selector expression.
    pub fn register(
        mut self,
        selector: &str,
        visitor: Arc<dyn ElementVisitor>,
    ) -> Result<Self> {
        let config = ResourceConfig::for_selector(selector)?;
        self.registrations.push(VisitorBinding::new(visitor, config));
        Ok(self)
    }

    /// Register a prebuilt binding.
    pub fn register_binding(mut self, binding: VisitorBinding) -> Self {
        self.registrations.push(binding);
        self
    }

    /// Build the read-only table.
    pub fn build(self) -> Result<VisitorTable> {
        VisitorTable::build(self.registrations, self.interceptors, self.settings)
    }
}

impl Default for VisitorTableBuilder {
    fn default() -> Self {
        VisitorTableBuilder::new()
    }
}

/// The precomputed, read-only binding table.
pub struct VisitorTable {
    by_name: HashMap<String, Arc<ElementVisitorMap>>,
    /// Fallback for element names with no concrete registrations: the
    /// wildcard broadcast, merged exactly once.
    star: Arc<ElementVisitorMap>,
    /// Every registered binding, for run-lifecycle notification.
    bindings: Vec<VisitorBinding>,
    combined_cache: Mutex<LruCache<String, Arc<ElementVisitorMap>>>,
    interceptors: InterceptorStack,
    settings: FilterSettings,
}

impl std::fmt::Debug for VisitorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitorTable")
            .field("names", &self.by_name.keys().collect::<Vec<_>>())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl VisitorTable {
    pub fn builder() -> VisitorTableBuilder {
        VisitorTableBuilder::new()
    }

    fn build(
        registrations: Vec<VisitorBinding>,
        interceptors: InterceptorStack,
        settings: FilterSettings,
    ) -> Result<Self> {
        assert_selectors_not_accessing_text(&registrations)?;

        // Wrap each binding once; every list shares the same chain node.
        let nodes: Vec<Arc<dyn DispatchNode>> = registrations
            .iter()
            .map(|b| interceptors.wrap(b.clone()))
            .collect();

        // Index-counter pseudo-visitors, one per distinct indexed step.
        let mut counters: HashMap<String, (String, Arc<dyn DispatchNode>)> = HashMap::new();
        for binding in &registrations {
            let selector = binding.config().selector();
            for (offset, step) in selector.indexed_steps() {
                let key = selector.step_key(offset);
                if counters.contains_key(&key) {
                    continue;
                }
                let target = name_test_key(&step.test);
                let counter = VisitorBinding::new(
                    Arc::new(IndexCounterVisitor {
                        step_key: key.clone(),
                    }),
                    Arc::new(ResourceConfig::new(selector.truncate_at(offset))),
                );
                counters.insert(key, (target, interceptors.wrap(counter)));
            }
        }
        let mut counters_by_name: HashMap<String, Vec<Arc<dyn DispatchNode>>> = HashMap::new();
        for (target, node) in counters.into_values() {
            counters_by_name.entry(target).or_default().push(node);
        }

        // Partition registrations per target name and phase.
        let mut before_map: HashMap<String, Vec<Arc<dyn DispatchNode>>> = HashMap::new();
        let mut child_map: HashMap<String, Vec<Arc<dyn DispatchNode>>> = HashMap::new();
        let mut after_map: HashMap<String, Vec<Arc<dyn DispatchNode>>> = HashMap::new();
        let mut cleanup_map: HashMap<String, Vec<Arc<dyn DispatchNode>>> = HashMap::new();

        for node in &nodes {
            let caps = *node.caps();
            let name = name_test_key(&node.binding().config().selector().target_step().test);
            if caps.before {
                before_map.entry(name.clone()).or_default().push(node.clone());
            }
            if caps.after {
                after_map.entry(name.clone()).or_default().push(node.clone());
            }
            if caps.cleanup {
                cleanup_map.entry(name.clone()).or_default().push(node.clone());
            }
            // Child-list extraction: a children-visiting implementer lands
            // in the child list exactly once, whether registered through
            // its before phase, its after phase or neither.
            if caps.visits_children() {
                child_map.entry(name.clone()).or_default().push(node.clone());
            }
        }

        // Wildcard bindings are collected separately per phase list.
        let star_before = take_star(&mut before_map);
        let star_child = take_star(&mut child_map);
        let star_after = take_star(&mut after_map);
        let star_cleanup = take_star(&mut cleanup_map);
        let star_counters: Vec<Arc<dyn DispatchNode>> = ["*", "**"]
            .iter()
            .filter_map(|k| counters_by_name.remove(*k))
            .flatten()
            .collect();

        let mut concrete_names: Vec<String> = before_map
            .keys()
            .chain(after_map.keys())
            .chain(child_map.keys())
            .chain(cleanup_map.keys())
            .chain(counters_by_name.keys())
            .cloned()
            .collect();
        concrete_names.sort();
        concrete_names.dedup();

        let mut by_name = HashMap::with_capacity(concrete_names.len());
        for name in concrete_names {
            let mut map = ElementVisitorMap::empty();

            let mut before: Vec<Arc<dyn DispatchNode>> = Vec::new();
            before.extend(counters_by_name.get(&name).cloned().unwrap_or_default());
            before.extend(star_counters.iter().cloned());
            let counter_count = before.len();
            before.extend(before_map.get(&name).cloned().unwrap_or_default());
            before.extend(star_before.iter().cloned());

            // Counters stay zero-th; the producers-first sort applies to
            // the real visitors behind them.
            let sorted = producers_first(before.split_off(counter_count));
            before.extend(sorted);
            map.before = before;

            let mut child = child_map.get(&name).cloned().unwrap_or_default();
            child.extend(star_child.iter().cloned());
            map.child = producers_first(child);

            let mut after = after_map.get(&name).cloned().unwrap_or_default();
            after.extend(star_after.iter().cloned());
            map.after = producers_first(after);

            let mut cleanup = cleanup_map.get(&name).cloned().unwrap_or_default();
            cleanup.extend(star_cleanup.iter().cloned());
            map.cleanup = cleanup;

            by_name.insert(name, Arc::new(map.finish()));
        }

        // The star broadcast itself, merged exactly once. Serves as the
        // fallback configuration for names with no concrete bindings.
        let mut star = ElementVisitorMap::empty();
        let mut star_before_full = star_counters.clone();
        star_before_full.extend(producers_first(star_before));
        star.before = star_before_full;
        star.child = producers_first(star_child);
        star.after = producers_first(star_after);
        star.cleanup = star_cleanup;
        let star = Arc::new(star.finish());

        Ok(VisitorTable {
            by_name,
            star,
            bindings: registrations,
            combined_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(COMBINED_CACHE_SIZE).expect("nonzero cache size"),
            )),
            interceptors,
            settings,
        })
    }

    /// Every registered binding, in registration order.
    pub fn bindings(&self) -> &[VisitorBinding] {
        &self.bindings
    }

    /// The dispatch configuration for one element local name.
    pub fn get(&self, name: &str) -> Arc<ElementVisitorMap> {
        self.by_name
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.star.clone())
    }

    /// The wildcard-only configuration.
    pub fn star_config(&self) -> Arc<ElementVisitorMap> {
        self.star.clone()
    }

    /// Union the configurations for an element's applicable name set (its
    /// own local name plus alias names). Flags are ORed, the writer owner
    /// is the first non-empty one. Results are memoized.
    pub fn combined(&self, names: &[&str]) -> Arc<ElementVisitorMap> {
        if names.len() == 1 {
            return self.get(names[0]);
        }
        let key = names.join("|");
        {
            let mut cache = self.combined_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(found) = cache.get(&key) {
                return found.clone();
            }
        }

        let mut merged = ElementVisitorMap::empty();
        for name in names {
            let part = self.get(name);
            extend_dedup(&mut merged.before, &part.before);
            extend_dedup(&mut merged.child, &part.child);
            extend_dedup(&mut merged.after, &part.after);
            extend_dedup(&mut merged.cleanup, &part.cleanup);
            merged.accumulate_text |= part.accumulate_text;
            if merged.acquire_writer_for.is_none() {
                merged.acquire_writer_for = part.acquire_writer_for;
            }
            merged.max_node_depth = merged.max_node_depth.max(part.max_node_depth);
        }
        // Flags were ORed while merging, finish() would recompute them
        // from scratch; keep the merged values.
        let merged = Arc::new(merged);

        let mut cache = self.combined_cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(key, merged.clone());
        merged
    }

    #[inline]
    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Wrap a binding for dynamic mid-traversal registration, using the
    /// same interceptor stack as the static configuration.
    pub fn wrap_dynamic(&self, binding: VisitorBinding) -> Arc<dyn DispatchNode> {
        self.interceptors.wrap(binding)
    }
}

/// Reject `text()` selectors whose target visits child elements. Text
/// selection requires after-only visitation: the text is only complete
/// when the element closes.
fn assert_selectors_not_accessing_text(registrations: &[VisitorBinding]) -> Result<()> {
    for binding in registrations {
        if binding.config().selector().accesses_text() && binding.caps().child_element {
            return Err(FilterError::Config(format!(
                "selector '{}' targets text, but visitor '{}' visits child elements; \
                 text selectors require after-only visitation",
                binding.config().selector(),
                binding.name(),
            )));
        }
    }
    Ok(())
}

fn name_test_key(test: &NameTest) -> String {
    match test {
        NameTest::Name(n) => n.clone(),
        NameTest::Star => "*".to_string(),
        NameTest::StarStar => "**".to_string(),
    }
}

fn take_star(map: &mut HashMap<String, Vec<Arc<dyn DispatchNode>>>) -> Vec<Arc<dyn DispatchNode>> {
    let mut star = map.remove("*").unwrap_or_default();
    star.extend(map.remove("**").unwrap_or_default());
    star
}

fn extend_dedup(list: &mut Vec<Arc<dyn DispatchNode>>, extra: &[Arc<dyn DispatchNode>]) {
    for node in extra {
        if !list.iter().any(|existing| Arc::ptr_eq(existing, node)) {
            list.push(node.clone());
        }
    }
}

/// Stable producers-first topological sort.
///
/// A visitor producing a key another visitor consumes is moved ahead of
/// the consumer; otherwise registration order is preserved. A dependency
/// cycle falls back to registration order for the entangled visitors.
fn producers_first(nodes: Vec<Arc<dyn DispatchNode>>) -> Vec<Arc<dyn DispatchNode>> {
    let n = nodes.len();
    if n < 2 {
        return nodes;
    }

    let produced: Vec<&[&'static str]> = nodes
        .iter()
        .map(|node| node.binding().visitor().produces())
        .collect();
    let consumed: Vec<&[&'static str]> = nodes
        .iter()
        .map(|node| node.binding().visitor().consumes())
        .collect();

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if produced[i].iter().any(|key| consumed[j].contains(key)) {
                edges[i].push(j);
                indegree[j] += 1;
            }
        }
    }
    if indegree.iter().all(|&d| d == 0) {
        return nodes;
    }

    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        // Smallest original index among the ready nodes keeps the sort stable.
        let next = (0..n).find(|&i| !placed[i] && indegree[i] == 0);
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
                for &j in &edges[i] {
                    indegree[j] -= 1;
                }
            }
            None => {
                warn!("producer/consumer cycle between visitors, keeping registration order");
                for i in 0..n {
                    if !placed[i] {
                        order.push(i);
                    }
                }
                break;
            }
        }
    }

    let mut slots: Vec<Option<Arc<dyn DispatchNode>>> = nodes.into_iter().map(Some).collect();
    order
        .into_iter()
        .map(|i| slots[i].take().expect("each index placed once"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::event::TextNode;

    struct Caps(Capabilities);

    impl ElementVisitor for Caps {
        fn capabilities(&self) -> Capabilities {
            self.0
        }
    }

    fn visitor(caps: Capabilities) -> Arc<dyn ElementVisitor> {
        Arc::new(Caps(caps))
    }

    #[test]
    fn test_star_bindings_appended_after_concrete() {
        let table = VisitorTable::builder()
            .register("item", visitor(Capabilities::named("Concrete").with_before()))
            .unwrap()
            .register("*", visitor(Capabilities::named("Broadcast").with_before()))
            .unwrap()
            .build()
            .unwrap();

        let map = table.get("item");
        let names: Vec<_> = map.before_visitors().iter().map(|n| n.caps().name).collect();
        assert_eq!(names, vec!["Concrete", "Broadcast"]);

        // The star's own merged list carries the broadcast exactly once.
        let star = table.star_config();
        let names: Vec<_> = star.before_visitors().iter().map(|n| n.caps().name).collect();
        assert_eq!(names, vec!["Broadcast"]);
    }

    #[test]
    fn test_unknown_name_falls_back_to_star() {
        let table = VisitorTable::builder()
            .register("**", visitor(Capabilities::named("Deep").with_after()))
            .unwrap()
            .build()
            .unwrap();
        let map = table.get("never-registered");
        assert_eq!(map.after_visitors().len(), 1);
    }

    #[test]
    fn test_both_phase_child_implementer_registered_once() {
        // Implements before, after and child visiting; must land in the
        // child list exactly once, through the after path.
        let caps = Capabilities::named("Everything")
            .with_before()
            .with_after()
            .with_child_text();
        let table = VisitorTable::builder()
            .register("order", visitor(caps))
            .unwrap()
            .build()
            .unwrap();

        let map = table.get("order");
        assert_eq!(map.child_visitors().len(), 1);
        assert_eq!(map.before_visitors().len(), 1);
        assert_eq!(map.after_visitors().len(), 1);
    }

    #[test]
    fn test_before_only_child_implementer_added() {
        let caps = Capabilities::named("BeforeKids").with_before().with_child_element();
        let table = VisitorTable::builder()
            .register("order", visitor(caps))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(table.get("order").child_visitors().len(), 1);
    }

    #[test]
    fn test_text_selector_rejects_child_element_visitor() {
        let caps = Capabilities::named("Greedy").with_after().with_child_element();
        let err = VisitorTable::builder()
            .register("price/text()", visitor(caps))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, FilterError::Config(_)));
    }

    #[test]
    fn test_text_selector_sets_accumulate_flag() {
        let table = VisitorTable::builder()
            .register("price/text()", visitor(Capabilities::named("Reader").with_after()))
            .unwrap()
            .build()
            .unwrap();
        assert!(table.get("price").accumulate_text());
        assert!(!table.get("other").accumulate_text());
    }

    #[test]
    fn test_writer_owner_prefers_before_list() {
        let table = VisitorTable::builder()
            .register("order", visitor(Capabilities::named("AfterOwner").with_after().owns_writer()))
            .unwrap()
            .register("order", visitor(Capabilities::named("BeforeOwner").with_before().owns_writer()))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(table.get("order").acquire_writer_for(), Some("BeforeOwner"));
    }

    #[test]
    fn test_index_counter_inserted_zeroth() {
        let table = VisitorTable::builder()
            .register("order/item[2]", visitor(Capabilities::named("Second").with_after()))
            .unwrap()
            .register("order/item", visitor(Capabilities::named("Plain").with_before()))
            .unwrap()
            .build()
            .unwrap();

        let map = table.get("item");
        let names: Vec<_> = map.before_visitors().iter().map(|n| n.caps().name).collect();
        assert_eq!(names, vec!["IndexCounter", "Plain"]);
    }

    #[test]
    fn test_index_counter_shared_across_bindings() {
        let table = VisitorTable::builder()
            .register("order/item[1]", visitor(Capabilities::named("First").with_after()))
            .unwrap()
            .register("order/item[2]", visitor(Capabilities::named("Second").with_after()))
            .unwrap()
            .build()
            .unwrap();

        // Same step, one shared counter.
        let map = table.get("item");
        let counters = map
            .before_visitors()
            .iter()
            .filter(|n| n.caps().name == "IndexCounter")
            .count();
        assert_eq!(counters, 1);
    }

    struct Producer;
    impl ElementVisitor for Producer {
        fn capabilities(&self) -> Capabilities {
            Capabilities::named("Producer").with_before()
        }
        fn produces(&self) -> &[&'static str] {
            &["total"]
        }
    }

    struct Consumer;
    impl ElementVisitor for Consumer {
        fn capabilities(&self) -> Capabilities {
            Capabilities::named("Consumer").with_before()
        }
        fn consumes(&self) -> &[&'static str] {
            &["total"]
        }
    }

    #[test]
    fn test_producers_sorted_first() {
        // Registered consumer-first; the sort must swap them.
        let table = VisitorTable::builder()
            .register("order", Arc::new(Consumer))
            .unwrap()
            .register("order", Arc::new(Producer))
            .unwrap()
            .build()
            .unwrap();

        let names: Vec<_> = table
            .get("order")
            .before_visitors()
            .iter()
            .map(|n| n.caps().name)
            .collect();
        assert_eq!(names, vec!["Producer", "Consumer"]);
    }

    #[test]
    fn test_combined_unions_and_ors_flags() {
        let table = VisitorTable::builder()
            .register("a", visitor(Capabilities::named("A").with_before().consumes_text()))
            .unwrap()
            .register("b", visitor(Capabilities::named("B").with_after().owns_writer()))
            .unwrap()
            .build()
            .unwrap();

        let combined = table.combined(&["a", "b"]);
        assert_eq!(combined.before_visitors().len(), 1);
        assert_eq!(combined.after_visitors().len(), 1);
        assert!(combined.accumulate_text());
        assert_eq!(combined.acquire_writer_for(), Some("B"));

        // Second lookup is served from the cache.
        let again = table.combined(&["a", "b"]);
        assert!(Arc::ptr_eq(&combined, &again));
    }

    // The no-op default callbacks keep pure-capability visitors valid.
    struct PureChild;
    impl ElementVisitor for PureChild {
        fn capabilities(&self) -> Capabilities {
            Capabilities::named("PureChild").with_child_text()
        }
        fn visit_child_text(
            &self,
            _element: &mut SaxElement,
            _text: &TextNode,
            _ctx: &mut ExecutionContext,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pure_child_visitor_reachable() {
        let table = VisitorTable::builder()
            .register("order", Arc::new(PureChild))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(table.get("order").child_visitors().len(), 1);
    }
}
