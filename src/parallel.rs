//! Parallel filtering across independent runs.
//!
//! One filtering run is strictly single-threaded; concurrency exists only
//! across runs. The binding table and interceptor topology are shared
//! read-only, and every run gets its own execution context, so a fleet of
//! documents can be filtered with Rayon without further coordination.

use rayon::prelude::*;

use crate::error::Result;
use crate::sax::SaxFilter;

/// Filter multiple documents in parallel, serializing each through its
/// own writer.
pub fn filter_parallel(filter: &SaxFilter, documents: &[&str]) -> Vec<Result<String>> {
    documents
        .par_iter()
        .map(|doc| filter.filter_to_string(doc))
        .collect()
}

/// Filter multiple documents in parallel with a caller-supplied per-run
/// body, for runs that collect something other than serialized output.
pub fn filter_map_parallel<F, T>(filter: &SaxFilter, documents: &[&str], per_run: F) -> Vec<Result<T>>
where
    F: Fn(&SaxFilter, &str) -> Result<T> + Sync,
    T: Send,
{
    documents
        .par_iter()
        .map(|doc| per_run(filter, doc))
        .collect()
}
