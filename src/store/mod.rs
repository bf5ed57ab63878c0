//! Sliced stores: single-level, multi-channel fact containers.
//!
//! A [`SlicedStore`] maps `(slice, key)` pairs to type-erased fact values,
//! with no awareness of parent layers — fallback is layered on top by
//! [`DelegatingTrace`](crate::trace::DelegatingTrace). Two implementations
//! share the contract:
//!
//! - [`MapStore`] — the plain DashMap-backed store used on hot paths
//! - [`TrackingStore`] — records a rewrite log per key so that illegal or
//!   suspicious overwrites can be audited after the fact
//!
//! Separating the physical map from the fallback logic lets the tracking
//! variant be substituted transparently for debugging without touching
//! trace logic.

pub mod map;
pub mod tracking;

pub use map::MapStore;
pub use tracking::{RewriteRecord, TrackingStore};

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::key::{FactKey, KeyHandle};
use crate::slice::SliceId;

/// Object-safe view of a stored fact value.
///
/// Blanket-implemented for every `'static` type that is printable and
/// thread-safe; callers never implement it by hand.
pub trait Fact: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting back to the concrete value type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Fact for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared, type-erased fact value.
///
/// Cloning clones the `Arc`, not the fact — bulk transfer between traces
/// never deep-copies values.
#[derive(Clone)]
pub struct FactValue(Arc<dyn Fact>);

impl FactValue {
    /// Erase a concrete value.
    pub fn new<V: Fact>(value: V) -> Self {
        Self(Arc::new(value))
    }

    /// Try to get the concrete value back.
    pub fn downcast_ref<V: Fact>(&self) -> Option<&V> {
        // Deref the Arc first: the blanket impl covers `Arc<dyn Fact>`
        // itself, so `self.0.as_any()` would erase the smart pointer
        // instead of the stored fact.
        (*self.0).as_any().downcast_ref::<V>()
    }
}

impl fmt::Debug for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Composite key the physical map is indexed by.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StoreKey {
    /// Which fact channel this entry belongs to.
    pub slice: SliceId,
    /// The erased element identity.
    pub key: KeyHandle,
}

impl StoreKey {
    /// Build a lookup key from a borrowed erased key.
    pub fn from_parts(slice: SliceId, key: &dyn FactKey) -> Self {
        Self {
            slice,
            key: KeyHandle::from_key(key),
        }
    }
}

/// Contract shared by the plain and rewrite-tracking stores.
///
/// All methods see only this store's own contents; parent awareness is the
/// trace's job. Writes take `&self` — the maps underneath are sharded and
/// interior-mutable, matching the one-writer-per-trace discipline without
/// forcing `&mut` through the whole resolution pipeline.
pub trait SlicedStore: fmt::Debug + Send + Sync {
    /// Store `value` under `(slice, key)`, overwriting any existing value.
    fn put(&self, slice: SliceId, key: KeyHandle, value: FactValue);

    /// Look up `(slice, key)`. O(1) amortized expected.
    fn get(&self, slice: SliceId, key: &dyn FactKey) -> Option<FactValue>;

    /// Keys that have a recorded value under `slice`, this store only.
    fn keys(&self, slice: SliceId) -> Vec<KeyHandle>;

    /// Snapshot of all `(key -> value)` pairs for `slice`, this store only.
    ///
    /// Performs a full copy — test and debugging use, never hot paths.
    fn slice_contents(&self, slice: SliceId) -> HashMap<KeyHandle, FactValue>;

    /// Enumerate all `((slice, key), value)` triples currently stored.
    ///
    /// Finite and restartable: each call re-enumerates current contents.
    /// Used only by bulk-transfer logic.
    fn entries(&self) -> Box<dyn Iterator<Item = (StoreKey, FactValue)> + '_>;

    /// Remove all entries, retiring this store for reuse.
    fn clear(&self);

    /// Number of stored `(slice, key)` entries across all slices.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The rewrite history of `(slice, key)`, if this store tracks rewrites.
    ///
    /// The plain store always answers with an empty log.
    fn rewrite_log(&self, _slice: SliceId, _key: &dyn FactKey) -> Vec<RewriteRecord> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_value_downcasts_to_the_stored_type() {
        let value = FactValue::new(String::from("CandidateA"));
        assert_eq!(
            value.downcast_ref::<String>().map(String::as_str),
            Some("CandidateA")
        );
        assert!(value.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn bool_markers_survive_erasure() {
        let value = FactValue::new(true);
        assert_eq!(value.downcast_ref::<bool>(), Some(&true));
        let value = FactValue::new(false);
        assert_eq!(value.downcast_ref::<bool>(), Some(&false));
    }

    #[test]
    fn clone_shares_the_same_fact() {
        let value = FactValue::new(vec![1u32, 2, 3]);
        let copy = value.clone();
        assert_eq!(copy.downcast_ref::<Vec<u32>>(), Some(&vec![1, 2, 3]));
        assert_eq!(value.downcast_ref::<Vec<u32>>(), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn debug_renders_the_fact_not_the_wrapper() {
        let value = FactValue::new("CandidateA");
        assert_eq!(format!("{value:?}"), "\"CandidateA\"");
    }
}
