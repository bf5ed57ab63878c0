//! Slice declarations: typed fact channels.
//!
//! A [`Slice`] identifies one category of analysis result — resolved call
//! targets, inferred expression types, "is exhaustively checked" markers —
//! with a key type, a value type and a [`SliceKind`]. Slices are declared
//! once at setup through a [`SliceRegistry`] and shared as handles; they
//! carry no mutable state.
//!
//! Set-marker slices are only constructible with `bool` values, so the
//! "non-Boolean value in a set-marker slice" contract violation cannot be
//! written down in the first place.

use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use crate::error::{SemTraceResult, SliceError};

/// Unique, niche-optimized identifier for a declared slice.
///
/// Uses `NonZeroU32` so that `Option<SliceId>` is the same size as
/// `SliceId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SliceId(NonZeroU32);

impl SliceId {
    /// Create a `SliceId` from a raw `u32`. Returns `None` if `raw` is zero.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(SliceId)
    }

    /// Get the underlying `u32` value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slice:{}", self.0)
    }
}

/// Semantic kind of a slice, driving the query fallback algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceKind {
    /// Exactly one value per key; a local value always shadows the parent.
    Plain,
    /// Boolean membership marker. `true` is authoritative at any layer;
    /// `false` or absent never shadows a `true` recorded higher up.
    SetMarker,
}

/// Typed handle for a declared fact channel.
///
/// Cheap to clone and share. The key/value types exist only at the API
/// surface — storage is type-erased, and this handle is what keeps reads
/// and writes honest.
pub struct Slice<K, V> {
    id: SliceId,
    tag: Arc<str>,
    kind: SliceKind,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Slice<K, V> {
    fn new(id: SliceId, tag: Arc<str>, kind: SliceKind) -> Self {
        Self {
            id,
            tag,
            kind,
            _types: PhantomData,
        }
    }

    /// The registry-assigned identifier.
    pub fn id(&self) -> SliceId {
        self.id
    }

    /// The unique tag this slice was declared with.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Plain or set-marker.
    pub fn kind(&self) -> SliceKind {
        self.kind
    }
}

impl<K, V> Clone for Slice<K, V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tag: Arc::clone(&self.tag),
            kind: self.kind,
            _types: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for Slice<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .finish()
    }
}

impl<K, V> fmt::Display for Slice<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

/// Process-wide registry of slice declarations.
///
/// Hands out monotonically increasing [`SliceId`]s and rejects duplicate
/// tags. Declaration happens once at setup, before any resolution begins;
/// there is no runtime mutation of a slice after it is declared.
pub struct SliceRegistry {
    next: AtomicU32,
    tags: DashMap<String, SliceId>,
}

impl SliceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
            tags: DashMap::new(),
        }
    }

    /// Declare a plain slice: one `V` per key, local shadows parent.
    pub fn declare<K, V>(&self, tag: &str) -> SemTraceResult<Slice<K, V>> {
        let (id, tag) = self.allocate(tag)?;
        Ok(Slice::new(id, tag, SliceKind::Plain))
    }

    /// Declare a set-marker slice: Boolean membership with monotonic
    /// "true wins through fallback" semantics.
    pub fn declare_set_marker<K>(&self, tag: &str) -> SemTraceResult<Slice<K, bool>> {
        let (id, tag) = self.allocate(tag)?;
        Ok(Slice::new(id, tag, SliceKind::SetMarker))
    }

    fn allocate(&self, tag: &str) -> SemTraceResult<(SliceId, Arc<str>)> {
        match self.tags.entry(tag.to_string()) {
            Entry::Occupied(existing) => Err(SliceError::DuplicateTag {
                tag: tag.to_string(),
                existing_id: existing.get().get(),
            }
            .into()),
            Entry::Vacant(vacant) => {
                // checked_add keeps the counter pinned at u32::MAX once the
                // id space runs out, so exhaustion never wraps into ids that
                // were already handed out.
                let raw = self
                    .next
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
                    .map_err(|_| SliceError::RegistryExhausted)?;
                let id = SliceId::new(raw).ok_or(SliceError::RegistryExhausted)?;
                vacant.insert(id);
                Ok((id, Arc::from(tag)))
            }
        }
    }

    /// Number of declared slices.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether no slices have been declared yet.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl Default for SliceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SliceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceRegistry")
            .field("declared", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<SliceId>>(),
            std::mem::size_of::<SliceId>()
        );
    }

    #[test]
    fn declare_assigns_sequential_ids() {
        let registry = SliceRegistry::new();
        let a: Slice<u64, String> = registry.declare("RESOLVED_CALL").unwrap();
        let b: Slice<u64, u32> = registry.declare("EXPRESSION_TYPE").unwrap();
        assert_eq!(a.id().get(), 1);
        assert_eq!(b.id().get(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let registry = SliceRegistry::new();
        let _: Slice<u64, String> = registry.declare("RESOLVED_CALL").unwrap();
        let result: SemTraceResult<Slice<u64, String>> = registry.declare("RESOLVED_CALL");
        let err = result.unwrap_err();
        assert!(format!("{err}").contains("RESOLVED_CALL"));
    }

    #[test]
    fn set_marker_slices_are_boolean() {
        let registry = SliceRegistry::new();
        let marker: Slice<u64, bool> = registry.declare_set_marker("USED_AS_EXPRESSION").unwrap();
        assert_eq!(marker.kind(), SliceKind::SetMarker);
        assert_eq!(marker.tag(), "USED_AS_EXPRESSION");
    }

    #[test]
    fn slice_display_is_the_tag() {
        let registry = SliceRegistry::new();
        let slice: Slice<u64, String> = registry.declare("RESOLVED_CALL").unwrap();
        assert_eq!(slice.to_string(), "RESOLVED_CALL");
    }

    #[test]
    fn exhaustion_is_sticky() {
        let registry = SliceRegistry::new();
        let first: Slice<u64, u32> = registry.declare("FIRST").unwrap();
        assert_eq!(first.id().get(), 1);

        registry.next.store(u32::MAX, Ordering::Relaxed);
        let exhausted: SemTraceResult<Slice<u64, u32>> = registry.declare("LATE");
        assert!(exhausted.is_err());

        // A later declaration must not wrap around and reuse id 1.
        let still_exhausted: SemTraceResult<Slice<u64, u32>> = registry.declare("LATER");
        assert!(still_exhausted.is_err());
    }

    #[test]
    fn handles_are_cheap_to_clone() {
        let registry = SliceRegistry::new();
        let slice: Slice<u64, String> = registry.declare("RESOLVED_CALL").unwrap();
        let copy = slice.clone();
        assert_eq!(copy.id(), slice.id());
        assert_eq!(copy.kind(), slice.kind());
    }
}
