//! Rewrite-tracking sliced store.
//!
//! Most slices are written once per key; a second write to the same
//! `(slice, key)` pair usually means two resolution passes disagree about
//! who owns the fact. The store never rejects the write (last write wins,
//! same as [`MapStore`](super::MapStore)) — it records a [`RewriteRecord`]
//! per overwrite so the history can be audited afterwards. With
//! `capture_origin` each record also carries a captured backtrace of the
//! writing call site.
//!
//! Strict mode upgrades a rewrite that *changes* the value to a fatal
//! contract panic; rewriting a key with an identical value stays
//! audit-only.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::key::{FactKey, KeyHandle};
use crate::slice::SliceId;

use super::{FactValue, SlicedStore, StoreKey};

/// One audited overwrite of a `(slice, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRecord {
    /// Store-wide write sequence number at the time of the overwrite.
    pub seq: u64,
    /// Debug rendering of the value that was replaced.
    pub previous: String,
    /// Debug rendering of the value that replaced it.
    pub replacement: String,
    /// Captured backtrace of the writing call site, when origin capture
    /// is enabled.
    pub origin: Option<String>,
}

/// Sliced store that audits overwrites.
#[derive(Debug)]
pub struct TrackingStore {
    data: DashMap<StoreKey, FactValue>,
    log: DashMap<StoreKey, Vec<RewriteRecord>>,
    seq: AtomicU64,
    capture_origin: bool,
    strict: bool,
}

impl TrackingStore {
    /// Create an empty tracking store.
    ///
    /// `capture_origin` attaches a backtrace to every rewrite record;
    /// `strict` makes a value-changing rewrite a fatal contract panic.
    pub fn new(capture_origin: bool, strict: bool) -> Self {
        Self {
            data: DashMap::new(),
            log: DashMap::new(),
            seq: AtomicU64::new(0),
            capture_origin,
            strict,
        }
    }

    /// All `(slice, key)` pairs that were overwritten, with their histories.
    pub fn audited_rewrites(&self) -> Vec<(StoreKey, Vec<RewriteRecord>)> {
        self.log
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl SlicedStore for TrackingStore {
    fn put(&self, slice: SliceId, key: KeyHandle, value: FactValue) {
        let store_key = StoreKey { slice, key };
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        let previous = self
            .data
            .get(&store_key)
            .map(|entry| format!("{:?}", entry.value()));

        if let Some(previous) = previous {
            let replacement = format!("{value:?}");
            if self.strict && previous != replacement {
                panic!(
                    "conflicting rewrite of {}[{:?}]: {previous} -> {replacement}",
                    store_key.slice, store_key.key
                );
            }
            tracing::debug!(
                slice = %store_key.slice,
                key = ?store_key.key,
                %previous,
                %replacement,
                "fact rewritten"
            );
            let origin = self
                .capture_origin
                .then(|| Backtrace::force_capture().to_string());
            self.log.entry(store_key.clone()).or_default().push(RewriteRecord {
                seq,
                previous,
                replacement,
                origin,
            });
        }

        self.data.insert(store_key, value);
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
        self.log.clear();
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn rewrite_log(&self, slice: SliceId, key: &dyn FactKey) -> Vec<RewriteRecord> {
        self.log
            .get(&StoreKey::from_parts(slice, key))
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(raw: u32) -> SliceId {
        SliceId::new(raw).unwrap()
    }

    #[test]
    fn first_write_is_not_audited() {
        let store = TrackingStore::new(false, false);
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new("a"));
        assert!(store.rewrite_log(slice(1), &42u64).is_empty());
        assert!(store.audited_rewrites().is_empty());
    }

    #[test]
    fn overwrite_appends_to_the_log() {
        let store = TrackingStore::new(false, false);
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new("a"));
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new("b"));
        store.put(slice(1), KeyHandle::new(42u64), FactValue::new("c"));

        let log = store.rewrite_log(slice(1), &42u64);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].previous, "\"a\"");
        assert_eq!(log[0].replacement, "\"b\"");
        assert_eq!(log[1].previous, "\"b\"");
        assert_eq!(log[1].replacement, "\"c\"");
        assert!(log[0].seq < log[1].seq);

        // Stored value is still last-write-wins.
        let value = store.get(slice(1), &42u64).unwrap();
        assert_eq!(value.downcast_ref::<&str>(), Some(&"c"));
    }

    #[test]
    fn origin_is_captured_when_enabled() {
        let store = TrackingStore::new(true, false);
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(1u32));
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(2u32));
        let log = store.rewrite_log(slice(1), &1u64);
        assert_eq!(log.len(), 1);
        assert!(log[0].origin.is_some());
    }

    #[test]
    fn origin_is_skipped_when_disabled() {
        let store = TrackingStore::new(false, false);
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(1u32));
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new(2u32));
        assert!(store.rewrite_log(slice(1), &1u64)[0].origin.is_none());
    }

    #[test]
    #[should_panic(expected = "conflicting rewrite")]
    fn strict_mode_panics_on_conflicting_rewrite() {
        let store = TrackingStore::new(false, true);
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new("a"));
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new("b"));
    }

    #[test]
    fn strict_mode_tolerates_identical_rewrite() {
        let store = TrackingStore::new(false, true);
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new("a"));
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new("a"));
        assert_eq!(store.rewrite_log(slice(1), &1u64).len(), 1);
    }

    #[test]
    fn clear_drops_the_audit_log_too() {
        let store = TrackingStore::new(false, false);
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new("a"));
        store.put(slice(1), KeyHandle::new(1u64), FactValue::new("b"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.rewrite_log(slice(1), &1u64).is_empty());
    }
}
