//! Type-erased fact keys.
//!
//! Slices are generic over their key type, but one physical store holds
//! keys from every slice in a single map. [`FactKey`] is the object-safe
//! erasure trait (blanket-implemented for anything hashable, clonable and
//! printable), and [`KeyHandle`] is the boxed, hashable form the store
//! indexes by. Hash and equality delegate to the underlying concrete type,
//! so typed and erased lookups agree.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Object-safe view of a slice key.
///
/// Never implemented by hand — the blanket impl covers every type that
/// satisfies the usual map-key bounds plus `Debug + Send + Sync + 'static`.
pub trait FactKey: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting back to the concrete key type.
    fn as_any(&self) -> &dyn Any;
    /// Equality across the erasure boundary; `false` for mismatched types.
    fn dyn_eq(&self, other: &dyn FactKey) -> bool;
    /// Hash through the erasure boundary (delegates to the concrete `Hash`).
    fn dyn_hash(&self, state: &mut dyn Hasher);
    /// Clone into a fresh boxed key.
    fn clone_key(&self) -> Box<dyn FactKey>;
}

impl<T> FactKey for T
where
    T: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn FactKey) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn clone_key(&self) -> Box<dyn FactKey> {
        Box::new(self.clone())
    }
}

/// Owned, hashable, type-erased key.
///
/// This is what [`SlicedStore`](crate::store::SlicedStore) maps by and what
/// [`Diagnostic`](crate::diagnostics::Diagnostic) carries as its source
/// element identity.
pub struct KeyHandle(Box<dyn FactKey>);

impl KeyHandle {
    /// Erase a concrete key.
    pub fn new<K>(key: K) -> Self
    where
        K: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
    {
        Self(Box::new(key))
    }

    /// Erase a borrowed key by cloning it behind the trait object.
    pub fn from_key(key: &dyn FactKey) -> Self {
        Self(key.clone_key())
    }

    /// Borrow the erased key.
    pub fn as_key(&self) -> &dyn FactKey {
        self.0.as_ref()
    }

    /// Try to get the concrete key back.
    pub fn downcast_ref<K: Any>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }
}

impl Clone for KeyHandle {
    fn clone(&self) -> Self {
        Self(self.0.clone_key())
    }
}

impl PartialEq for KeyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for KeyHandle {}

impl Hash for KeyHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Box<dyn FactKey>> for KeyHandle {
    fn from(key: Box<dyn FactKey>) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(h: &KeyHandle) -> u64 {
        let mut hasher = DefaultHasher::new();
        h.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_keys_compare_equal() {
        let a = KeyHandle::new(42u64);
        let b = KeyHandle::new(42u64);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn distinct_values_compare_unequal() {
        let a = KeyHandle::new(42u64);
        let b = KeyHandle::new(43u64);
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_types_never_compare_equal() {
        // Same bit pattern, different concrete type.
        let a = KeyHandle::new(42u64);
        let b = KeyHandle::new(42i64);
        assert_ne!(a, b);
    }

    #[test]
    fn clone_preserves_identity() {
        let a = KeyHandle::new(String::from("call-site-9"));
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.downcast_ref::<String>().map(String::as_str), Some("call-site-9"));
    }

    #[test]
    fn downcast_to_wrong_type_is_none() {
        let a = KeyHandle::new(7u32);
        assert!(a.downcast_ref::<String>().is_none());
        assert_eq!(a.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn usable_as_hashmap_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(KeyHandle::new(1u64), "one");
        map.insert(KeyHandle::new(2u64), "two");
        assert_eq!(map.get(&KeyHandle::new(1u64)), Some(&"one"));
        assert_eq!(map.get(&KeyHandle::new(3u64)), None);
    }
}
