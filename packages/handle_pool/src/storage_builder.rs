use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::{IndexAllocator, MAX_GENERATION, MAX_INDEX, StoragePool};

const DEFAULT_INITIAL_SLOTS: NonZero<usize> = nz!(1);

/// Builder for creating an instance of [`StoragePool`].
///
/// The builder is created from the placeholder value that fills every storage slot before its
/// first insert. Use [`StoragePool::new()`][1] instead if the item type's `Default` value is a
/// suitable placeholder and the default limits are sufficient.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use handle_pool::StoragePool;
///
/// let pool = StoragePool::<i64>::builder(-1)
///     .initial_slots(NonZero::new(16).unwrap())
///     .max_index(1023)
///     .build();
///
/// assert_eq!(pool.slot_count(), 16);
/// assert_eq!(*pool.placeholder(), -1);
/// ```
///
/// [1]: StoragePool::new
#[must_use]
pub struct StoragePoolBuilder<T, H = T> {
    placeholder: T,
    initial_slots: NonZero<usize>,
    max_index: u32,
    max_generation: u32,

    _handle: PhantomData<fn() -> H>,
}

impl<T, H> fmt::Debug for StoragePoolBuilder<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoragePoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("handle_type", &format_args!("{}", type_name::<H>()))
            .field("initial_slots", &self.initial_slots)
            .field("max_index", &self.max_index)
            .field("max_generation", &self.max_generation)
            .finish_non_exhaustive()
    }
}

impl<T, H> StoragePoolBuilder<T, H> {
    pub(crate) fn new(placeholder: T) -> Self {
        Self {
            placeholder,
            initial_slots: DEFAULT_INITIAL_SLOTS,
            max_index: MAX_INDEX,
            max_generation: MAX_GENERATION,
            _handle: PhantomData,
        }
    }

    /// Sets the number of storage slots allocated up front, all holding the placeholder.
    ///
    /// Storage grows by doubling from this size when a handle with a higher index is inserted.
    pub fn initial_slots(mut self, initial_slots: NonZero<usize>) -> Self {
        self.initial_slots = initial_slots;
        self
    }

    /// Sets the highest index the pool's allocator may issue.
    ///
    /// See [`IndexAllocatorBuilder::max_index()`][1].
    ///
    /// [1]: crate::IndexAllocatorBuilder::max_index
    pub fn max_index(mut self, max_index: u32) -> Self {
        self.max_index = max_index;
        self
    }

    /// Sets the generation at which a slot is retired instead of recycled when freed.
    ///
    /// See [`IndexAllocatorBuilder::max_generation()`][1].
    ///
    /// [1]: crate::IndexAllocatorBuilder::max_generation
    pub fn max_generation(mut self, max_generation: u32) -> Self {
        self.max_generation = max_generation;
        self
    }
}

impl<T: Clone, H> StoragePoolBuilder<T, H> {
    /// Builds the storage pool with the specified configuration.
    #[must_use]
    pub fn build(self) -> StoragePool<T, H> {
        let allocator = IndexAllocator::builder()
            .max_index(self.max_index)
            .max_generation(self.max_generation)
            .build();

        let storage = vec![self.placeholder.clone(); self.initial_slots.get()];

        StoragePool::new_inner(allocator, storage, self.placeholder)
    }
}
