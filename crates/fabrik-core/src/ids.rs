#![forbid(unsafe_code)]

//! Surface and node identifiers.
//!
//! # Identity policy
//!
//! A [`Tag`] names one logical node within a surface. Tags handed out by a
//! [`TagAllocator`] are never reused for the lifetime of the surface, and the
//! root node's tag always equals the surface id. A node family never changes
//! parent: moving a logical node under a different parent requires a fresh
//! family with a fresh tag. Together these rules make "same tag" and "same
//! family" agree for every tree a surface ever commits.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier of one independently managed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub i32);

impl SurfaceId {
    /// Raw numeric value.
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Tag of the root node for this surface.
    #[inline]
    pub const fn root_tag(self) -> Tag {
        Tag(self.0)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Numeric node identifier, unique within a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(pub i32);

impl Tag {
    /// Sentinel for "no node". Never allocated.
    pub const INVALID: Tag = Tag(0);

    /// Raw numeric value.
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Whether this tag can name a node.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic tag source for one surface.
///
/// Allocation is lock-free and safe to share between the threads that build
/// candidate trees. Tags start above the surface's root tag so they can never
/// collide with it.
#[derive(Debug)]
pub struct TagAllocator {
    surface_id: SurfaceId,
    next: AtomicI32,
}

impl TagAllocator {
    /// Create an allocator whose first tag is `surface_id + 1`.
    pub fn new(surface_id: SurfaceId) -> Self {
        Self::starting_at(surface_id, surface_id.0.saturating_add(1))
    }

    /// Create an allocator starting at an explicit tag value.
    ///
    /// # Panics
    ///
    /// Panics if `first` is not a valid tag or equals the root tag.
    pub fn starting_at(surface_id: SurfaceId, first: i32) -> Self {
        assert!(first != 0, "tag 0 is reserved");
        assert!(
            first != surface_id.0,
            "first tag {first} collides with the root tag of {surface_id}"
        );
        Self {
            surface_id,
            next: AtomicI32::new(first),
        }
    }

    /// Surface this allocator belongs to.
    #[inline]
    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// Allocate the next tag. Tags are never handed out twice.
    ///
    /// # Panics
    ///
    /// Panics when the tag space is exhausted.
    pub fn allocate(&self) -> Tag {
        let tag = self.next.fetch_add(1, Ordering::Relaxed);
        assert!(tag < i32::MAX, "tag space exhausted for {}", self.surface_id);
        if tag == self.surface_id.0 || tag == 0 {
            return self.allocate();
        }
        Tag(tag)
    }

    /// Peek at the next tag without consuming it.
    pub fn peek(&self) -> Tag {
        Tag(self.next.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn root_tag_matches_surface() {
        assert_eq!(SurfaceId(11).root_tag(), Tag(11));
    }

    #[test]
    fn allocator_starts_after_root() {
        let alloc = TagAllocator::new(SurfaceId(1));
        assert_eq!(alloc.allocate(), Tag(2));
        assert_eq!(alloc.allocate(), Tag(3));
        assert_eq!(alloc.peek(), Tag(4));
    }

    #[test]
    fn allocator_skips_root_and_zero() {
        let alloc = TagAllocator::starting_at(SurfaceId(2), -1);
        assert_eq!(alloc.allocate(), Tag(-1));
        assert_eq!(alloc.allocate(), Tag(1));
        assert_eq!(alloc.allocate(), Tag(3));
    }

    #[test]
    #[should_panic(expected = "collides with the root tag")]
    fn allocator_rejects_root_start() {
        let _ = TagAllocator::starting_at(SurfaceId(5), 5);
    }

    #[test]
    fn allocator_never_repeats_across_threads() {
        let alloc = Arc::new(TagAllocator::new(SurfaceId(1)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || (0..500).map(|_| alloc.allocate()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for tag in handle.join().unwrap() {
                assert!(seen.insert(tag), "duplicate tag {tag}");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn invalid_tag() {
        assert!(!Tag::INVALID.is_valid());
        assert!(Tag(-3).is_valid());
    }
}
