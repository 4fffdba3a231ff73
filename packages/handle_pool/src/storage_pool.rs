use std::any::type_name;
use std::fmt;

use tracing::debug;

use crate::{AllocatorStats, Handle, IndexAllocator, Result, StoragePoolBuilder};

/// An [`IndexAllocator`] paired with a growable array of items aligned with the allocator's
/// slot indices.
///
/// The pool separates handle management from item storage: [`allocate()`][1] only issues a
/// handle, [`insert()`][2] writes an item into the slot the handle refers to and
/// [`get()`][3] reads it back. Freeing a handle retires it in the allocator but leaves the item in
/// place until the slot is overwritten by a later insert.
///
/// # Placeholder and growth
///
/// Every storage slot holds a copy of the pool's placeholder value until an item is inserted into
/// it. The storage starts with at least one slot. When an item is inserted for a handle whose
/// index is beyond the current storage, the storage is doubled (repeatedly, if necessary) until
/// it covers the index, with new slots filled with the placeholder. Growth preserves all
/// previously inserted items.
///
/// # Handle type
///
/// Handles are tagged with `H`, which defaults to the item type `T`. Choose a different `H` to
/// keep the storage type out of the handles given to callers, for example a pool that stores
/// `TextureData` but hands out `Handle<Texture>`:
///
/// ```rust
/// use handle_pool::{Handle, StoragePool};
///
/// struct Texture;
///
/// #[derive(Clone, Default)]
/// struct TextureData {
///     pixels: Vec<u8>,
/// }
///
/// let mut pool = StoragePool::<TextureData, Texture>::new();
///
/// let handle: Handle<Texture> = pool.allocate().unwrap();
/// pool.insert(handle, TextureData { pixels: vec![0; 16] });
/// assert_eq!(pool.get(handle).pixels.len(), 16);
/// ```
///
/// # Validity
///
/// [`get()`][3], [`get_mut()`][4] and [`insert()`][2] do not check whether the handle is still
/// valid - they address storage by index only. Check [`is_valid()`][5] first, or use
/// [`get_checked()`][6], if the handle may be stale.
///
/// # Example
///
/// ```rust
/// use handle_pool::StoragePool;
///
/// let mut pool = StoragePool::<String>::new();
///
/// let handle = pool.allocate().unwrap();
/// pool.insert(handle, "Hello".to_string());
/// assert_eq!(pool.get(handle), "Hello");
///
/// pool.free_with(handle, |item| item.clear()).unwrap();
/// assert!(!pool.is_valid(handle));
/// assert_eq!(pool.get_checked(handle), None);
/// ```
///
/// [1]: Self::allocate
/// [2]: Self::insert
/// [3]: Self::get
/// [4]: Self::get_mut
/// [5]: Self::is_valid
/// [6]: Self::get_checked
pub struct StoragePool<T, H = T> {
    allocator: IndexAllocator<H>,

    /// Index-aligned with the allocator's slots. Never empty.
    storage: Vec<T>,

    /// Fills storage slots that have not yet had an item inserted.
    placeholder: T,
}

impl<T, H> StoragePool<T, H> {
    #[must_use]
    pub(crate) fn new_inner(allocator: IndexAllocator<H>, storage: Vec<T>, placeholder: T) -> Self {
        assert!(
            !storage.is_empty(),
            "StoragePool must start with at least one storage slot"
        );

        Self {
            allocator,
            storage,
            placeholder,
        }
    }

    /// Starts building a new [`StoragePool`] that uses `placeholder` for slots without items.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handle_pool::StoragePool;
    ///
    /// let mut pool = StoragePool::<char>::builder('?').build();
    ///
    /// let handle = pool.allocate().unwrap();
    /// assert_eq!(*pool.get(handle), '?');
    /// ```
    pub fn builder(placeholder: T) -> StoragePoolBuilder<T, H> {
        StoragePoolBuilder::new(placeholder)
    }

    /// Issues a handle. No storage slot is touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`][1] if the allocator's index space is exhausted.
    ///
    /// [1]: crate::Error::Exhausted
    pub fn allocate(&mut self) -> Result<Handle<H>> {
        self.allocator.allocate()
    }

    /// Gets a reference to the item in the handle's slot.
    ///
    /// The handle is not checked for validity: for a freed handle this returns whatever the slot
    /// currently holds, and for an allocated handle that was never inserted it returns the
    /// placeholder (if the storage already covers the index).
    ///
    /// # Panics
    ///
    /// Panics if the handle's index is beyond the current storage.
    #[must_use]
    pub fn get(&self, handle: Handle<H>) -> &T {
        let slot_count = self.storage.len();

        self.storage.get(handle.slot()).unwrap_or_else(|| {
            panic!(
                "handle index {} is beyond the {slot_count} storage slots of pool of {}",
                handle.index(),
                type_name::<T>()
            )
        })
    }

    /// Gets an exclusive reference to the item in the handle's slot.
    ///
    /// The handle is not checked for validity; see [`get()`][1].
    ///
    /// # Panics
    ///
    /// Panics if the handle's index is beyond the current storage.
    ///
    /// [1]: Self::get
    #[must_use]
    pub fn get_mut(&mut self, handle: Handle<H>) -> &mut T {
        let slot_count = self.storage.len();

        self.storage.get_mut(handle.slot()).unwrap_or_else(|| {
            panic!(
                "handle index {} is beyond the {slot_count} storage slots of pool of {}",
                handle.index(),
                type_name::<T>()
            )
        })
    }

    /// Gets a reference to the item in the handle's slot if the handle is valid and its slot
    /// exists in storage.
    #[must_use]
    pub fn get_checked(&self, handle: Handle<H>) -> Option<&T> {
        if !self.allocator.is_valid(handle) {
            return None;
        }

        self.storage.get(handle.slot())
    }

    /// Gets an exclusive reference to the item in the handle's slot if the handle is valid and
    /// its slot exists in storage.
    #[must_use]
    pub fn get_checked_mut(&mut self, handle: Handle<H>) -> Option<&mut T> {
        if !self.allocator.is_valid(handle) {
            return None;
        }

        self.storage.get_mut(handle.slot())
    }

    /// Frees the handle without touching its storage slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DoubleFree`][1] or [`Error::UnknownHandle`][2] if the handle is not the
    /// live handle for its slot. See [`IndexAllocator::free()`].
    ///
    /// [1]: crate::Error::DoubleFree
    /// [2]: crate::Error::UnknownHandle
    pub fn free(&mut self, handle: Handle<H>) -> Result<()> {
        self.allocator.free(handle)
    }

    /// Frees the handle after passing its item to `cleanup`, for example to release resources
    /// the item owns.
    ///
    /// The handle is checked before `cleanup` is called; a rejected handle does not reach
    /// `cleanup`. If the handle's slot was never materialized in storage (nothing was inserted at
    /// or beyond its index), there is no item and `cleanup` is not called. The item is left in
    /// its slot after `cleanup` returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DoubleFree`][1] or [`Error::UnknownHandle`][2] if the handle is not the
    /// live handle for its slot.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handle_pool::StoragePool;
    ///
    /// let mut pool = StoragePool::<Vec<u8>>::new();
    ///
    /// let handle = pool.allocate().unwrap();
    /// pool.insert(handle, vec![1, 2, 3]);
    ///
    /// pool.free_with(handle, |buffer| {
    ///     buffer.clear();
    ///     buffer.shrink_to_fit();
    /// })
    /// .unwrap();
    ///
    /// // The cleaned-up item stays in the slot until it is overwritten.
    /// assert!(pool.get(handle).is_empty());
    /// ```
    ///
    /// [1]: crate::Error::DoubleFree
    /// [2]: crate::Error::UnknownHandle
    pub fn free_with<F>(&mut self, handle: Handle<H>, cleanup: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        self.allocator.check_live(handle)?;

        if let Some(item) = self.storage.get_mut(handle.slot()) {
            cleanup(item);
        }

        self.allocator.free(handle)
    }

    /// Exposes the entire backing storage to `f`, including slots of freed or never-allocated
    /// handles and slots still holding the placeholder.
    ///
    /// The slice is index-aligned with handles: the item for handle `h` is at `h.index()`. Use
    /// [`is_valid()`][1] or [`iter()`][2] to distinguish live items.
    ///
    /// [1]: Self::is_valid
    /// [2]: Self::iter
    pub fn iterate_storage<F>(&mut self, f: F)
    where
        F: FnOnce(&mut [T]),
    {
        f(&mut self.storage);
    }

    /// Iterates over the live handles whose slots exist in storage, together with their items.
    ///
    /// Items are visited in index order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handle_pool::StoragePool;
    ///
    /// let mut pool = StoragePool::<u32>::new();
    ///
    /// let a = pool.allocate().unwrap();
    /// let b = pool.allocate().unwrap();
    /// pool.insert(a, 10);
    /// pool.insert(b, 20);
    /// pool.free(a).unwrap();
    ///
    /// let live = pool.iter().map(|(_, item)| *item).collect::<Vec<_>>();
    /// assert_eq!(live, vec![20]);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = (Handle<H>, &T)> {
        self.allocator
            .live_handles()
            .map_while(|handle| self.storage.get(handle.slot()).map(|item| (handle, item)))
    }

    /// Whether the handle is the live handle for its slot.
    ///
    /// See [`IndexAllocator::is_valid()`].
    #[must_use]
    pub fn is_valid(&self, handle: Handle<H>) -> bool {
        self.allocator.is_valid(handle)
    }

    /// The number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocator.len()
    }

    /// Whether there are no live handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocator.is_empty()
    }

    /// The number of storage slots, including slots holding the placeholder.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.storage.len()
    }

    /// The value that fills storage slots before an item is inserted into them.
    #[must_use]
    pub fn placeholder(&self) -> &T {
        &self.placeholder
    }

    /// The allocator that issues this pool's handles.
    #[must_use]
    pub fn allocator(&self) -> &IndexAllocator<H> {
        &self.allocator
    }

    /// A snapshot of the allocator counters, for diagnostics.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats::of(&self.allocator)
    }
}

impl<T: Clone, H> StoragePool<T, H> {
    /// Writes `value` into the handle's slot, growing the storage if it does not cover the
    /// handle's index. Any item previously in the slot is dropped.
    ///
    /// The handle is not checked for validity.
    ///
    /// # Panics
    ///
    /// Panics if growing the storage would overflow `usize`.
    pub fn insert(&mut self, handle: Handle<H>, value: T) {
        let slot = handle.slot();

        if slot >= self.storage.len() {
            self.grow_to_cover(slot);
        }

        *self
            .storage
            .get_mut(slot)
            .expect("guarded by growth above") = value;
    }

    fn grow_to_cover(&mut self, slot: usize) {
        let old_slot_count = self.storage.len();
        let mut new_slot_count = old_slot_count;

        while new_slot_count <= slot {
            new_slot_count = new_slot_count
                .checked_mul(2)
                .expect("storage slot count overflow: handle index cannot be covered");
        }

        self.storage
            .resize(new_slot_count, self.placeholder.clone());

        debug!(
            old_slot_count,
            new_slot_count,
            item_type = type_name::<T>(),
            "grew storage"
        );
    }
}

impl<T: Default + Clone, H> StoragePool<T, H> {
    /// Creates a pool with a single storage slot that uses `T::default()` as its placeholder and
    /// the full handle index and generation range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handle_pool::StoragePool;
    ///
    /// let pool = StoragePool::<u64>::new();
    ///
    /// assert!(pool.is_empty());
    /// assert_eq!(pool.slot_count(), 1);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::builder(T::default()).build()
    }
}

impl<T: Default + Clone, H> Default for StoragePool<T, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, H> fmt::Debug for StoragePool<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("allocator", &self.allocator)
            .field("slot_count", &self.storage.len())
            .finish_non_exhaustive()
    }
}
