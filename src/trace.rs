//! Delegating traces: the mutable recording surface of an analysis.
//!
//! Resolution code opens a [`DelegatingTrace`] over the current context
//! before a speculative attempt, records candidate facts and diagnostics
//! into it, and on success commits them to the enclosing trace with
//! [`add_all_my_data_to`](DelegatingTrace::add_all_my_data_to) or
//! [`move_all_my_data_to`](DelegatingTrace::move_all_my_data_to). A failed
//! attempt is simply dropped — its facts become unreachable without any
//! cleanup. Queries transparently see parent facts unless shadowed locally.
//!
//! A trace never mutates its parent's store; all writes land in its own
//! [`SlicedStore`](crate::store::SlicedStore).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use crate::context::FactContext;
use crate::diagnostics::{Diagnostic, DiagnosticsMerger, NoSuppression, SuppressionPolicy};
use crate::key::{FactKey, KeyHandle};
use crate::slice::{Slice, SliceId, SliceKind};
use crate::store::{Fact, FactValue, MapStore, RewriteRecord, SlicedStore, TrackingStore};

/// Construction-time configuration for a trace.
///
/// Replaces process-wide toggles: whether the trace audits rewrites is
/// decided per trace, threaded from whatever configuration the host
/// already has.
#[derive(Clone)]
pub struct TraceConfig {
    /// Use a [`TrackingStore`] that logs every overwrite.
    pub track_rewrites: bool,
    /// Capture a backtrace for each logged overwrite. Expensive; only
    /// meaningful together with `track_rewrites`.
    pub capture_origin: bool,
    /// Treat a value-changing overwrite as a fatal contract violation.
    /// Only meaningful together with `track_rewrites`.
    pub strict_rewrites: bool,
    /// Policy applied when computing the merged diagnostics view.
    pub suppression: Arc<dyn SuppressionPolicy>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            track_rewrites: false,
            capture_origin: false,
            strict_rewrites: false,
            suppression: Arc::new(NoSuppression),
        }
    }
}

impl fmt::Debug for TraceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceConfig")
            .field("track_rewrites", &self.track_rewrites)
            .field("capture_origin", &self.capture_origin)
            .field("strict_rewrites", &self.strict_rewrites)
            .finish_non_exhaustive()
    }
}

/// Predicate over trace entries, used to commit a trace selectively.
///
/// Facts are matched by `(slice, key)`; diagnostics by the identity of
/// their associated source element. The blanket impl lets a plain closure
/// `Fn(Option<SliceId>, &dyn FactKey) -> bool` serve as a filter, with
/// `None` standing for "this is a diagnostic".
pub trait TraceEntryFilter {
    fn accept_fact(&self, slice: SliceId, key: &dyn FactKey) -> bool;
    fn accept_diagnostic(&self, element: &dyn FactKey) -> bool;
}

impl<F> TraceEntryFilter for F
where
    F: Fn(Option<SliceId>, &dyn FactKey) -> bool,
{
    fn accept_fact(&self, slice: SliceId, key: &dyn FactKey) -> bool {
        self(Some(slice), key)
    }

    fn accept_diagnostic(&self, element: &dyn FactKey) -> bool {
        self(None, element)
    }
}

/// A mutable fact/diagnostic recording surface layered over a parent
/// context.
///
/// Owns exactly one store and one ordered diagnostics collection; borrows
/// its parent, so the parent is frozen for writing while any child is
/// alive. The debug name identifies the speculative attempt in logs and
/// has no semantic effect.
pub struct DelegatingTrace<'p> {
    store: Box<dyn SlicedStore>,
    parent: &'p dyn FactContext,
    diagnostics: RwLock<Vec<Diagnostic>>,
    suppression: Arc<dyn SuppressionPolicy>,
    name: String,
}

impl<'p> DelegatingTrace<'p> {
    /// Open a trace over `parent` with the default configuration.
    pub fn new(parent: &'p dyn FactContext, name: impl Into<String>) -> Self {
        Self::with_config(parent, name, TraceConfig::default())
    }

    /// Open a trace over `parent` with an explicit configuration.
    pub fn with_config(
        parent: &'p dyn FactContext,
        name: impl Into<String>,
        config: TraceConfig,
    ) -> Self {
        let name = name.into();
        let store: Box<dyn SlicedStore> = if config.track_rewrites {
            Box::new(TrackingStore::new(config.capture_origin, config.strict_rewrites))
        } else {
            Box::new(MapStore::new())
        };
        tracing::debug!(
            trace = %name,
            track_rewrites = config.track_rewrites,
            "opened trace"
        );
        Self {
            store,
            parent,
            diagnostics: RwLock::new(Vec::new()),
            suppression: config.suppression,
            name,
        }
    }

    /// The debug name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This trace's read-only view, for layering further traces on top.
    pub fn context(&self) -> &dyn FactContext {
        self
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record a fact into this trace's own store. The parent is never
    /// touched.
    pub fn record<K, V>(&self, slice: &Slice<K, V>, key: K, value: V)
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
        V: Fact,
    {
        self.store
            .put(slice.id(), KeyHandle::new(key), FactValue::new(value));
    }

    /// Record membership in a set-marker slice (sugar for recording `true`).
    pub fn mark<K>(&self, slice: &Slice<K, bool>, key: K)
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
    {
        self.record(slice, key, true);
    }

    /// Append a diagnostic to this trace's local collection.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.write().unwrap().push(diagnostic);
    }

    // -----------------------------------------------------------------------
    // Typed queries
    // -----------------------------------------------------------------------

    /// Look up a fact, falling back through the parent chain.
    ///
    /// Plain slices: a local value always shadows the parent. Set-marker
    /// slices: a local `true` is authoritative; `false` or absent falls
    /// through, so a `true` recorded higher up is never shadowed.
    ///
    /// # Panics
    ///
    /// If a stored value does not have the slice's declared value type.
    /// That can only happen when two slice handles share an id, which the
    /// registry rules out — hitting it means a bug in calling code.
    pub fn get<K, V>(&self, slice: &Slice<K, V>, key: &K) -> Option<V>
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
        V: Fact + Clone,
    {
        self.get_erased(slice.id(), slice.kind(), key).map(|value| {
            value.downcast_ref::<V>().cloned().unwrap_or_else(|| {
                panic!(
                    "value recorded under slice {} is not a {}: {:?}",
                    slice.tag(),
                    std::any::type_name::<V>(),
                    value
                )
            })
        })
    }

    /// All keys recorded for `slice` here and in enclosing layers, local
    /// keys first, not deduplicated.
    pub fn keys<K, V>(&self, slice: &Slice<K, V>) -> Vec<K>
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
    {
        self.keys_erased(slice.id())
            .into_iter()
            .map(|handle| {
                handle.downcast_ref::<K>().cloned().unwrap_or_else(|| {
                    panic!(
                        "key recorded under slice {} is not a {}: {:?}",
                        slice.tag(),
                        std::any::type_name::<K>(),
                        handle
                    )
                })
            })
            .collect()
    }

    /// Parent contents overlaid by local contents, eagerly materialized.
    ///
    /// Test and debugging use only — this copies the whole slice.
    pub fn slice_contents<K, V>(&self, slice: &Slice<K, V>) -> HashMap<K, V>
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
        V: Fact + Clone,
    {
        self.slice_contents_erased(slice.id())
            .into_iter()
            .map(|(key, value)| {
                let key = key.downcast_ref::<K>().cloned().unwrap_or_else(|| {
                    panic!("key recorded under slice {} is not a {}", slice.tag(), std::any::type_name::<K>())
                });
                let value = value.downcast_ref::<V>().cloned().unwrap_or_else(|| {
                    panic!("value recorded under slice {} is not a {}", slice.tag(), std::any::type_name::<V>())
                });
                (key, value)
            })
            .collect()
    }

    /// The rewrite history of `(slice, key)`, if this trace tracks rewrites.
    pub fn rewrite_log<K, V>(&self, slice: &Slice<K, V>, key: &K) -> Vec<RewriteRecord>
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
    {
        self.store.rewrite_log(slice.id(), key)
    }

    // -----------------------------------------------------------------------
    // Commit / transfer
    // -----------------------------------------------------------------------

    /// Copy every local fact and diagnostic into `target`, unfiltered.
    pub fn add_all_my_data_to(&self, target: &DelegatingTrace<'_>) {
        self.add_data_to(target, None, true);
    }

    /// Copy local facts (and optionally diagnostics) into `target`.
    ///
    /// Entries rejected by `filter` are skipped, not transferred. Facts are
    /// transferred before diagnostics; order among facts is unspecified.
    ///
    /// `target` must be a distinct trace: transferring a trace into itself
    /// would deadlock on the store's shard locks (the enumeration holds
    /// them across each write).
    pub fn add_data_to(
        &self,
        target: &DelegatingTrace<'_>,
        filter: Option<&dyn TraceEntryFilter>,
        commit_diagnostics: bool,
    ) {
        debug_assert!(
            self as *const _ as *const () != target as *const _ as *const (),
            "cannot transfer a trace into itself"
        );
        let mut facts = 0usize;
        for (store_key, value) in self.store.entries() {
            if filter.is_none_or(|f| f.accept_fact(store_key.slice, store_key.key.as_key())) {
                target.store.put(store_key.slice, store_key.key, value);
                facts += 1;
            }
        }

        let mut committed_diagnostics = 0usize;
        if commit_diagnostics {
            let local = self.diagnostics.read().unwrap().clone();
            for diagnostic in local {
                if filter.is_none_or(|f| f.accept_diagnostic(diagnostic.element())) {
                    target.report(diagnostic);
                    committed_diagnostics += 1;
                }
            }
        }

        tracing::debug!(
            from = %self.name,
            to = %target.name,
            facts,
            diagnostics = committed_diagnostics,
            "committed trace data"
        );
    }

    /// Unfiltered commit followed by [`clear`](Self::clear).
    ///
    /// For traces used purely as scratch buffers whose sole purpose was
    /// the transfer.
    pub fn move_all_my_data_to(&self, target: &DelegatingTrace<'_>) {
        self.add_all_my_data_to(target);
        self.clear();
    }

    /// Drop all local facts and diagnostics, retiring this trace for reuse.
    pub fn clear(&self) {
        self.store.clear();
        self.diagnostics.write().unwrap().clear();
        tracing::debug!(trace = %self.name, "cleared trace");
    }
}

impl FactContext for DelegatingTrace<'_> {
    fn get_erased(&self, slice: SliceId, kind: SliceKind, key: &dyn FactKey) -> Option<FactValue> {
        let local = self.store.get(slice, key);
        match kind {
            SliceKind::SetMarker => {
                if let Some(value) = local {
                    debug_assert!(
                        value.downcast_ref::<bool>().is_some(),
                        "set-marker slice {slice} holds a non-boolean value"
                    );
                    // A local `true` is authoritative; `false` must not
                    // shadow a `true` recorded higher in the chain.
                    if value.downcast_ref::<bool>() == Some(&true) {
                        return Some(value);
                    }
                }
            }
            SliceKind::Plain => {
                if local.is_some() {
                    return local;
                }
            }
        }
        self.parent.get_erased(slice, kind, key)
    }

    fn keys_erased(&self, slice: SliceId) -> Vec<KeyHandle> {
        let local = self.store.keys(slice);
        let from_parent = self.parent.keys_erased(slice);
        if local.is_empty() {
            return from_parent;
        }
        if from_parent.is_empty() {
            return local;
        }
        let mut all = local;
        all.extend(from_parent);
        all
    }

    fn slice_contents_erased(&self, slice: SliceId) -> HashMap<KeyHandle, FactValue> {
        let mut contents = self.parent.slice_contents_erased(slice);
        contents.extend(self.store.slice_contents(slice));
        contents
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        let local = self.diagnostics.read().unwrap().clone();
        DiagnosticsMerger::new(&local, self.parent, self.suppression.as_ref()).merged()
    }
}

impl fmt::Display for DelegatingTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for DelegatingTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingTrace")
            .field("name", &self.name)
            .field("facts", &self.store.len())
            .finish_non_exhaustive()
    }
}
