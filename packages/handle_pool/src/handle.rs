use std::any::type_name;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Number of bits in the index half of a handle.
pub const INDEX_BITS: u32 = u32::BITS;

/// Position of the generation half of a handle within the raw 64-bit key.
pub const GENERATION_SHIFT: u32 = INDEX_BITS;

/// Mask that selects the index half of a raw 64-bit key.
pub const INDEX_MASK: u64 = (1_u64 << INDEX_BITS) - 1;

/// Mask that selects the generation half of a raw 64-bit key.
pub const GENERATION_MASK: u64 = !INDEX_MASK;

/// The highest slot index a handle can represent.
pub const MAX_INDEX: u32 = u32::MAX;

/// The highest generation a handle can represent. A slot whose generation reaches this value
/// is retired when freed instead of being recycled.
pub const MAX_GENERATION: u32 = u32::MAX;

// Index and generation each occupy exactly one half of the key.
const _: () = assert!(INDEX_BITS.checked_mul(2).expect("tiny constant") == u64::BITS);
const _: () = assert!(INDEX_MASK.count_ones() == INDEX_BITS);
const _: () = assert!(GENERATION_MASK.count_ones() == u64::BITS - INDEX_BITS);

/// A generational reference to a slot in an [`IndexAllocator`][1] or [`StoragePool`][2].
///
/// A handle is a single 64-bit value: the lower half is the slot index and the upper half is the
/// generation of that slot at the time the handle was issued. When a slot is freed its generation
/// is incremented, so handles issued before the free no longer validate even after the index
/// itself has been reissued.
///
/// Handles are typed by the item type of the pool that issued them, which prevents passing a
/// handle to a pool of a different item type. The type parameter is a marker only - handles are
/// `Copy`, `Eq`, `Ord`, `Hash`, `Send` and `Sync` regardless of `T`.
///
/// # Example
///
/// ```rust
/// use handle_pool::{Handle, IndexAllocator};
///
/// let mut allocator = IndexAllocator::<String>::new();
///
/// let handle = allocator.allocate().unwrap();
/// assert_eq!(handle.index(), 0);
/// assert_eq!(handle.generation(), 0);
///
/// // A handle round-trips through its raw 64-bit representation.
/// let bits = handle.to_bits();
/// assert_eq!(Handle::<String>::from_bits(bits), handle);
/// ```
///
/// [1]: crate::IndexAllocator
/// [2]: crate::StoragePool
pub struct Handle<T> {
    key: u64,

    _item: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Assembles a handle from its index and generation.
    ///
    /// Handles obtained this way are only meaningful to the pool that issued the original
    /// handle; the pool will treat an unknown or outdated handle as invalid.
    #[must_use]
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self::from_bits((index as u64) | ((generation as u64) << GENERATION_SHIFT))
    }

    /// Reinterprets a raw 64-bit key as a handle.
    #[must_use]
    pub const fn from_bits(key: u64) -> Self {
        Self {
            key,
            _item: PhantomData,
        }
    }

    /// The raw 64-bit key, with the index in the lower half and the generation in the upper half.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.key
    }

    /// The slot index this handle refers to.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the mask guarantees the value fits in the index half"
    )]
    pub const fn index(self) -> u32 {
        (self.key & INDEX_MASK) as u32
    }

    /// The generation of the slot at the time this handle was issued.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the shift guarantees the value fits in the generation half"
    )]
    pub const fn generation(self) -> u32 {
        ((self.key & GENERATION_MASK) >> GENERATION_SHIFT) as u32
    }

    /// The slot index as a `usize`, for indexing into storage.
    #[must_use]
    pub(crate) fn slot(self) -> usize {
        usize::try_from(self.index()).expect("u32 index always fits in usize on supported targets")
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("index", &self.index())
            .field("generation", &self.generation())
            .finish()
    }
}

impl<T> From<Handle<T>> for u64 {
    fn from(value: Handle<T>) -> Self {
        value.to_bits()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use static_assertions::assert_impl_all;

    use super::*;

    // The marker must not leak the item type's auto traits into the handle.
    assert_impl_all!(Handle<Rc<Cell<u8>>>: Send, Sync, Copy, Eq, Ord, Hash, fmt::Debug);

    #[test]
    fn parts_are_split_into_halves() {
        let handle = Handle::<u8>::from_parts(7, 3);

        assert_eq!(handle.index(), 7);
        assert_eq!(handle.generation(), 3);
        assert_eq!(handle.to_bits(), 7 | (3 << 32));
        assert_eq!(u64::from(handle), handle.to_bits());
    }

    #[test]
    fn extreme_values_survive_encoding() {
        let handle = Handle::<u8>::from_parts(MAX_INDEX, MAX_GENERATION);

        assert_eq!(handle.index(), MAX_INDEX);
        assert_eq!(handle.generation(), MAX_GENERATION);
        assert_eq!(handle.to_bits(), u64::MAX);

        let handle = Handle::<u8>::from_parts(MAX_INDEX, 0);
        assert_eq!(handle.generation(), 0);

        let handle = Handle::<u8>::from_parts(0, MAX_GENERATION);
        assert_eq!(handle.index(), 0);
    }

    #[test]
    fn equality_requires_both_fields() {
        let a = Handle::<u8>::from_parts(1, 0);

        assert_eq!(a, Handle::from_parts(1, 0));
        assert_ne!(a, Handle::from_parts(1, 1));
        assert_ne!(a, Handle::from_parts(2, 0));
    }

    #[test]
    fn hashes_as_scalar() {
        let set: HashSet<Handle<u8>> = [
            Handle::from_parts(0, 0),
            Handle::from_parts(0, 1),
            Handle::from_parts(0, 0),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn debug_shows_fields() {
        let text = format!("{:?}", Handle::<u16>::from_parts(5, 9));

        assert!(text.contains("index: 5"));
        assert!(text.contains("generation: 9"));
        assert!(text.contains("u16"));
    }
}
