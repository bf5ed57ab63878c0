//! Plain DashMap-backed sliced store.
//!
//! The default store for every trace: a single sharded hashmap over
//! `(slice, key)` composite keys. Overwrites are silent (last write wins);
//! use [`TrackingStore`](super::TrackingStore) when overwrites need to be
//! audited.

use std::collections::HashMap;

use dashmap::DashMap;

use crate::key::{FactKey, KeyHandle};
use crate::slice::SliceId;

use super::{FactValue, SlicedStore, StoreKey};

/// Single-level multi-channel store over a sharded hashmap.
#[derive(Debug, Default)]
pub struct MapStore {
    data: DashMap<StoreKey, FactValue>,
}

impl MapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }
}

impl SlicedStore for MapStore {
    fn put(&self, slice: SliceId, key: KeyHandle, value: FactValue) {
        self.data.insert(StoreKey { slice, key }, value);
    }

    fn get(&self, slice: SliceId, key: &dyn FactKey) -> Option<FactValue> {
        self.data
            .get(&StoreKey::from_parts(slice, key))
            .map(|entry| entry.value().clone())
    }

    fn keys(&self, slice: SliceId) -> Vec<KeyHandle> {
        self.data
            .iter()
            .filter(|entry| entry.key().slice == slice)
            .map(|entry| entry.key().key.clone())
            .collect()
    }

    fn slice_contents(&self, slice: SliceId) -> HashMap<KeyHandle, FactValue> {
        self.data
            .iter()
            .filter(|entry| entry.key().slice == slice)
            .map(|entry| (entry.key().key.clone(), entry.value().clone()))
            .collect()
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (StoreKey, FactValue)> + '_> {
        Box::new(
            self.data
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone())),
        )
    }

    fn clear(&self) {
        self.data.clear();
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(raw: u32) -> SliceId {
        SliceId::new(raw).unwrap()
    }

    #[test]
    fn put_and_get() {
        let store = MapStore::new();
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new("CandidateA"));
        let value = store.get(slice(1), &42u64).unwrap();
        assert_eq!(value.downcast_ref::<&str>(), Some(&"CandidateA"));
    }

    #[test]
    fn overwrite_is_last_write_wins() {
        let store = MapStore::new();
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new(1u32));
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new(2u32));
        let value = store.get(slice(1), &42u64).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn slices_are_independent_channels() {
        let store = MapStore::new();
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new("a"));
        store.put(slice(2), KeyHandle::new(42u64), FactValue::new("b"));
        assert_eq!(
            store.get(slice(1), &42u64).unwrap().downcast_ref::<&str>(),
            Some(&"a")
        );
        assert_eq!(
            store.get(slice(2), &42u64).unwrap().downcast_ref::<&str>(),
            Some(&"b")
        );
    }

    #[test]
    fn keys_lists_only_the_requested_slice() {
        let store = MapStore::new();
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(()));
        store.put(slice(1), KeyHandle::new(2u64), FactValue::new(()));
        store.put(slice(2), KeyHandle::new(3u64), FactValue::new(()));
        let mut keys: Vec<u64> = store
            .keys(slice(1))
            .iter()
            .map(|k| *k.downcast_ref::<u64>().unwrap())
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2]);
    }

    #[test]
    fn entries_is_restartable() {
        let store = MapStore::new();
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(()));
        store.put(slice(2), KeyHandle::new(2u64), FactValue::new(()));
        assert_eq!(store.entries().count(), 2);
        // A fresh call re-enumerates current contents.
        assert_eq!(store.entries().count(), 2);
    }

    #[test]
    fn clear_empties_the_store() {
        let store = MapStore::new();
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(()));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get(slice(1), &1u64).is_none());
    }

    #[test]
    fn missing_key_is_absent() {
        let store = MapStore::new();
        assert!(store.get(slice(1), &99u64).is_none());
        assert!(store.keys(slice(1)).is_empty());
        assert!(store.slice_contents(slice(1)).is_empty());
    }
}
