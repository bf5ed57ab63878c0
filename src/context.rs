//! Fact contexts: the read-only query capability.
//!
//! A [`FactContext`] is how one layer sees everything beneath it — its
//! parent trace's facts, that trace's parent's facts, and so on down to a
//! root. Modeling the parent relation as a narrow trait rather than a
//! concrete type means chains can be arbitrarily deep and alternate roots
//! (a permanent global store, a test stub) plug in without inheritance.

use std::collections::HashMap;

use crate::diagnostics::Diagnostic;
use crate::key::{FactKey, KeyHandle};
use crate::slice::{SliceId, SliceKind};
use crate::store::FactValue;

/// Read-only view of accumulated facts plus merged diagnostics.
///
/// Implemented by [`DelegatingTrace`](crate::trace::DelegatingTrace) (the
/// view is backed jointly by the trace's own store and its parent) and by
/// [`EmptyContext`] (the root terminal). The `kind` travels with each query
/// so every layer applies the same set-marker fallback rule.
pub trait FactContext: Send + Sync {
    /// Look up `(slice, key)` with fallback through enclosing layers.
    fn get_erased(&self, slice: SliceId, kind: SliceKind, key: &dyn FactKey) -> Option<FactValue>;

    /// Keys recorded for `slice` at this layer and all enclosing layers.
    ///
    /// Not deduplicated — a key may carry different shadowing values at
    /// different layers.
    fn keys_erased(&self, slice: SliceId) -> Vec<KeyHandle>;

    /// Eagerly materialized contents of `slice`, local overlaid on parent.
    ///
    /// Test and debugging use only.
    fn slice_contents_erased(&self, slice: SliceId) -> HashMap<KeyHandle, FactValue>;

    /// The merged, suppression-filtered diagnostics visible at this layer.
    fn diagnostics(&self) -> Vec<Diagnostic>;
}

/// Root terminal of a layering chain: no facts, no diagnostics.
///
/// The authoritative result set of an analysis is typically a
/// [`DelegatingTrace`](crate::trace::DelegatingTrace) opened directly over
/// this.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyContext;

impl FactContext for EmptyContext {
    fn get_erased(&self, _slice: SliceId, _kind: SliceKind, _key: &dyn FactKey) -> Option<FactValue> {
        None
    }

    fn keys_erased(&self, _slice: SliceId) -> Vec<KeyHandle> {
        Vec::new()
    }

    fn slice_contents_erased(&self, _slice: SliceId) -> HashMap<KeyHandle, FactValue> {
        HashMap::new()
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        Vec::new()
    }
}
