use std::any::type_name;
use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, trace, warn};

use crate::{Error, Handle, IndexAllocatorBuilder, Result};

/// Issues and recycles generational [`Handle`]s.
///
/// Fresh indices are issued in increasing order starting from zero, each with generation zero.
/// Freeing a handle increments the generation of its slot and queues the slot for reissue; the
/// queue is FIFO, so the slot that has been free the longest is reused first. This spreads churn
/// over the whole index space and delays generation saturation for any single slot.
///
/// When a slot whose generation is already at the configured maximum is freed, the slot is
/// retired: it is never reissued and every handle that ever referred to it is invalid.
///
/// The allocator does not store any items - see [`StoragePool`][1] for a pool that pairs the
/// allocator with index-aligned storage.
///
/// # Example
///
/// ```rust
/// use handle_pool::IndexAllocator;
///
/// let mut allocator = IndexAllocator::<u64>::new();
///
/// let first = allocator.allocate().unwrap();
/// let second = allocator.allocate().unwrap();
/// assert_eq!((first.index(), second.index()), (0, 1));
///
/// allocator.free(first).unwrap();
/// assert!(!allocator.is_valid(first));
///
/// // The freed slot comes back with the next generation.
/// let reused = allocator.allocate().unwrap();
/// assert_eq!(reused.index(), 0);
/// assert_eq!(reused.generation(), 1);
/// assert!(allocator.is_valid(reused));
/// ```
///
/// [1]: crate::StoragePool
pub struct IndexAllocator<T> {
    /// One entry per issued index. The length of this table is the next fresh index.
    slots: Vec<Slot>,

    /// Handles for freed slots, already carrying the incremented generation, oldest first.
    free_list: VecDeque<Handle<T>>,

    max_index: u32,
    max_generation: u32,

    /// Number of slots currently in the `Live` state.
    live: usize,

    /// Number of slots currently in the `Retired` state.
    retired: usize,
}

/// Generation table entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Slot {
    /// A handle with this generation has been issued and not yet freed.
    Live { generation: u32 },

    /// The handle with this generation waits in the free list to be reissued.
    Vacant { generation: u32 },

    /// The generation saturated; the index will never be issued again.
    Retired,
}

impl<T> IndexAllocator<T> {
    #[must_use]
    pub(crate) fn new_inner(max_index: u32, max_generation: u32) -> Self {
        Self {
            slots: Vec::new(),
            free_list: VecDeque::new(),
            max_index,
            max_generation,
            live: 0,
            retired: 0,
        }
    }

    /// Creates an allocator that may use the full handle index and generation range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handle_pool::IndexAllocator;
    ///
    /// let allocator = IndexAllocator::<u8>::new();
    ///
    /// assert!(allocator.is_empty());
    /// assert_eq!(allocator.next_index(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a new [`IndexAllocator`] with custom limits.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handle_pool::IndexAllocator;
    ///
    /// let mut allocator = IndexAllocator::<u8>::builder().max_index(1).build();
    ///
    /// allocator.allocate().unwrap();
    /// allocator.allocate().unwrap();
    /// assert!(allocator.allocate().is_err());
    /// ```
    pub fn builder() -> IndexAllocatorBuilder<T> {
        IndexAllocatorBuilder::new()
    }

    /// Issues a handle, reusing the longest-free slot if there is one.
    ///
    /// A recycled handle has the same index as the handle that was freed and a generation one
    /// higher. A fresh handle has the next never-issued index and generation zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if every index up to the configured maximum has been issued
    /// and no freed slot is waiting for reuse. Allocation succeeds again once a handle is freed.
    pub fn allocate(&mut self) -> Result<Handle<T>> {
        if let Some(handle) = self.free_list.pop_front() {
            let slot = self
                .slots
                .get_mut(handle.slot())
                .expect("free list only contains handles for issued indices");

            debug_assert_eq!(
                *slot,
                Slot::Vacant {
                    generation: handle.generation()
                }
            );

            *slot = Slot::Live {
                generation: handle.generation(),
            };
            self.increment_live();

            trace!(
                index = handle.index(),
                generation = handle.generation(),
                "reissued recycled handle"
            );

            return Ok(handle);
        }

        if self.is_exhausted() {
            return Err(Error::Exhausted {
                max_index: self.max_index,
            });
        }

        let index = u32::try_from(self.slots.len())
            .expect("guarded by exhaustion check - the table never outgrows max_index + 1");

        self.slots.push(Slot::Live { generation: 0 });
        self.increment_live();

        trace!(index, "issued fresh handle");

        if self.is_exhausted() {
            debug!(
                max_index = self.max_index,
                item_type = type_name::<T>(),
                "index space exhausted"
            );
        }

        Ok(Handle::from_parts(index, 0))
    }

    /// Returns a handle to the allocator, invalidating it.
    ///
    /// The slot's generation is incremented and the slot is queued for reuse. If the generation
    /// is already at the configured maximum, the slot is retired instead and never reissued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DoubleFree`] if the handle is not the live handle for its slot (it was
    /// already freed, or its slot was retired). Returns [`Error::UnknownHandle`] if the handle's
    /// index was never issued by this allocator. Both indicate a defect in the caller; the
    /// allocator state is left unchanged.
    pub fn free(&mut self, handle: Handle<T>) -> Result<()> {
        self.check_live(handle)?;

        let max_generation = self.max_generation;

        let slot = self
            .slots
            .get_mut(handle.slot())
            .expect("guarded by check_live above");

        self.live = self
            .live
            .checked_sub(1)
            .expect("a live slot was just verified so the live count is at least one");

        if handle.generation() >= max_generation {
            *slot = Slot::Retired;

            self.retired = self
                .retired
                .checked_add(1)
                .expect("retired count is bounded by the slot count");

            warn!(
                index = handle.index(),
                generation = handle.generation(),
                item_type = type_name::<T>(),
                "slot retired after its generation saturated"
            );

            return Ok(());
        }

        let generation = handle
            .generation()
            .checked_add(1)
            .expect("generation is below max_generation so it cannot overflow");

        *slot = Slot::Vacant { generation };
        self.free_list
            .push_back(Handle::from_parts(handle.index(), generation));

        trace!(
            index = handle.index(),
            generation = handle.generation(),
            "freed handle"
        );

        Ok(())
    }

    /// Whether the handle is the live handle for its slot.
    ///
    /// Returns `false` for handles that have been freed, for handles of retired slots and for
    /// handles whose index was never issued by this allocator.
    #[must_use]
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        matches!(
            self.slots.get(handle.slot()),
            Some(Slot::Live { generation }) if *generation == handle.generation()
        )
    }

    /// Verifies that `free(handle)` would succeed, without changing any state.
    pub(crate) fn check_live(&self, handle: Handle<T>) -> Result<()> {
        match self.slots.get(handle.slot()) {
            None => {
                warn!(
                    index = handle.index(),
                    next_index = self.next_index(),
                    item_type = type_name::<T>(),
                    "rejected free of a handle that was never issued"
                );

                Err(Error::UnknownHandle {
                    index: handle.index(),
                    next_index: self.next_index(),
                })
            }
            Some(Slot::Live { generation }) if *generation == handle.generation() => Ok(()),
            Some(_) => {
                warn!(
                    index = handle.index(),
                    generation = handle.generation(),
                    item_type = type_name::<T>(),
                    "rejected double free"
                );

                Err(Error::DoubleFree {
                    index: handle.index(),
                    generation: handle.generation(),
                })
            }
        }
    }

    /// The generation currently recorded for a slot: the generation of its live handle, or of
    /// the handle waiting in the free list.
    ///
    /// Returns `None` for indices that were never issued and for retired slots.
    #[must_use]
    pub fn current_generation(&self, index: u32) -> Option<u32> {
        let index = usize::try_from(index).ok()?;

        match self.slots.get(index)? {
            Slot::Live { generation } | Slot::Vacant { generation } => Some(*generation),
            Slot::Retired => None,
        }
    }

    /// Iterates over the live handles in index order.
    pub fn live_handles(&self) -> impl Iterator<Item = Handle<T>> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Live { generation } => Some(Handle::from_parts(
                    u32::try_from(index).expect("the table never outgrows the u32 index space"),
                    *generation,
                )),
                Slot::Vacant { .. } | Slot::Retired => None,
            })
    }

    /// The number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether there are no live handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The smallest index that has never been issued. Equal to the number of issued indices.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.slots.len()
    }

    /// The number of freed handles waiting to be reissued.
    #[must_use]
    pub fn free_list_len(&self) -> usize {
        self.free_list.len()
    }

    /// The number of entries in the generation table.
    #[must_use]
    pub fn generation_table_len(&self) -> usize {
        self.slots.len()
    }

    /// The number of slots permanently removed from reuse due to generation saturation.
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.retired
    }

    /// Whether every index up to the configured maximum has been issued.
    ///
    /// An exhausted allocator can still hand out recycled handles from its free list.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        let max_index = usize::try_from(self.max_index)
            .expect("u32 index always fits in usize on supported targets");

        self.slots.len() > max_index
    }

    /// The highest index this allocator may issue.
    #[must_use]
    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// The generation at which a slot is retired instead of recycled when freed.
    #[must_use]
    pub fn max_generation(&self) -> u32 {
        self.max_generation
    }

    fn increment_live(&mut self) {
        self.live = self
            .live
            .checked_add(1)
            .expect("live count is bounded by the slot count");
    }

    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        let live = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Live { .. }))
            .count();
        let vacant = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Vacant { .. }))
            .count();
        let retired = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Retired))
            .count();

        assert_eq!(live, self.live);
        assert_eq!(retired, self.retired);
        assert_eq!(vacant, self.free_list.len());

        for handle in &self.free_list {
            assert_eq!(
                self.slots.get(handle.slot()),
                Some(&Slot::Vacant {
                    generation: handle.generation()
                })
            );
        }
    }
}

impl<T> Default for IndexAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IndexAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("next_index", &self.next_index())
            .field("live", &self.live)
            .field("free_list_len", &self.free_list.len())
            .field("retired", &self.retired)
            .field("max_index", &self.max_index)
            .field("max_generation", &self.max_generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use std::cell::RefCell;
    use std::sync::Mutex;
    use std::thread;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(IndexAllocator<std::rc::Rc<u8>>: Send, Sync, fmt::Debug);

    #[test]
    fn fresh_indices_are_sequential_with_generation_zero() {
        let mut allocator = IndexAllocator::<u32>::new();

        for expected in 0..100 {
            let handle = allocator.allocate().unwrap();

            assert_eq!(handle.index(), expected);
            assert_eq!(handle.generation(), 0);
            assert!(allocator.is_valid(handle));
        }

        assert_eq!(allocator.len(), 100);
        assert_eq!(allocator.next_index(), 100);
        assert_eq!(allocator.generation_table_len(), 100);
        allocator.integrity_check();
    }

    #[test]
    fn freed_slot_is_reissued_with_next_generation() {
        let mut allocator = IndexAllocator::<u32>::new();

        let h0 = allocator.allocate().unwrap();
        let h1 = allocator.allocate().unwrap();
        let h2 = allocator.allocate().unwrap();

        allocator.free(h1).unwrap();
        assert!(!allocator.is_valid(h1));
        assert_eq!(allocator.len(), 2);
        assert_eq!(allocator.free_list_len(), 1);

        let h3 = allocator.allocate().unwrap();
        assert_eq!(h3.index(), 1);
        assert_eq!(h3.generation(), 1);
        assert!(allocator.is_valid(h3));
        assert!(!allocator.is_valid(h1));

        assert!(allocator.is_valid(h0));
        assert!(allocator.is_valid(h2));
        assert_eq!(allocator.free_list_len(), 0);
        allocator.integrity_check();
    }

    #[test]
    fn freeing_twice_is_double_free() {
        let mut allocator = IndexAllocator::<u32>::new();

        let handle = allocator.allocate().unwrap();
        allocator.free(handle).unwrap();

        assert_eq!(
            allocator.free(handle),
            Err(Error::DoubleFree {
                index: 0,
                generation: 0
            })
        );

        // The rejected free must not have touched the free list.
        assert_eq!(allocator.free_list_len(), 1);
        allocator.integrity_check();
    }

    #[test]
    fn stale_handle_of_reissued_slot_is_double_free() {
        let mut allocator = IndexAllocator::<u32>::new();

        let old = allocator.allocate().unwrap();
        allocator.free(old).unwrap();
        let new = allocator.allocate().unwrap();

        assert!(matches!(
            allocator.free(old),
            Err(Error::DoubleFree { .. })
        ));
        assert!(allocator.is_valid(new));
        allocator.integrity_check();
    }

    #[test]
    fn queued_handle_is_not_valid_until_reissued() {
        let mut allocator = IndexAllocator::<u32>::new();

        let handle = allocator.allocate().unwrap();
        allocator.free(handle).unwrap();

        let queued = Handle::from_parts(0, 1);
        assert!(!allocator.is_valid(queued));
        assert!(matches!(
            allocator.free(queued),
            Err(Error::DoubleFree { .. })
        ));

        assert_eq!(allocator.allocate().unwrap(), queued);
        assert!(allocator.is_valid(queued));
    }

    #[test]
    fn unknown_index_is_reported() {
        let mut allocator = IndexAllocator::<u32>::new();
        _ = allocator.allocate().unwrap();

        let forged = Handle::from_parts(5, 0);

        assert!(!allocator.is_valid(forged));
        assert_eq!(
            allocator.free(forged),
            Err(Error::UnknownHandle {
                index: 5,
                next_index: 1
            })
        );
        assert_eq!(allocator.current_generation(5), None);
    }

    #[test]
    fn reuse_is_oldest_freed_first() {
        let mut allocator = IndexAllocator::<u32>::new();

        let handles = (0..5)
            .map(|_| allocator.allocate().unwrap())
            .collect::<Vec<_>>();

        allocator.free(handles[3]).unwrap();
        allocator.free(handles[0]).unwrap();
        allocator.free(handles[4]).unwrap();

        let reused = (0..3)
            .map(|_| allocator.allocate().unwrap().index())
            .collect::<Vec<_>>();
        assert_eq!(reused, vec![3, 0, 4]);

        // With the free list drained, fresh indices continue where they left off.
        assert_eq!(allocator.allocate().unwrap().index(), 5);
        allocator.integrity_check();
    }

    #[test]
    fn exhaustion_is_reported_until_a_slot_is_freed() {
        let mut allocator = IndexAllocator::<u32>::builder().max_index(2).build();

        let handles = (0..3)
            .map(|_| allocator.allocate().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(handles.last().unwrap().index(), 2);
        assert!(allocator.is_exhausted());

        for _ in 0..3 {
            assert_eq!(
                allocator.allocate(),
                Err(Error::Exhausted { max_index: 2 })
            );
        }

        allocator.free(handles[1]).unwrap();
        assert!(allocator.is_exhausted());

        let recycled = allocator.allocate().unwrap();
        assert_eq!(recycled.index(), 1);
        assert_eq!(recycled.generation(), 1);

        assert!(allocator.allocate().is_err());
        allocator.integrity_check();
    }

    #[test]
    fn single_slot_space_is_usable() {
        let mut allocator = IndexAllocator::<u32>::builder().max_index(0).build();

        let handle = allocator.allocate().unwrap();
        assert_eq!(handle.index(), 0);
        assert!(allocator.is_exhausted());
        assert!(allocator.allocate().is_err());
    }

    #[test]
    fn saturated_slot_is_retired_and_invalidated() {
        let mut allocator = IndexAllocator::<u32>::builder().max_generation(1).build();

        let gen0 = allocator.allocate().unwrap();
        allocator.free(gen0).unwrap();

        let gen1 = allocator.allocate().unwrap();
        assert_eq!(gen1.generation(), 1);

        allocator.free(gen1).unwrap();

        assert!(!allocator.is_valid(gen0));
        assert!(!allocator.is_valid(gen1));
        assert_eq!(allocator.retired_count(), 1);
        assert_eq!(allocator.free_list_len(), 0);
        assert_eq!(allocator.current_generation(0), None);

        assert!(matches!(
            allocator.free(gen1),
            Err(Error::DoubleFree { .. })
        ));

        // The retired index is skipped - a fresh index is issued instead.
        let next = allocator.allocate().unwrap();
        assert_eq!(next.index(), 1);
        assert_eq!(next.generation(), 0);
        allocator.integrity_check();
    }

    #[test]
    fn zero_max_generation_retires_on_first_free() {
        let mut allocator = IndexAllocator::<u32>::builder()
            .max_index(0)
            .max_generation(0)
            .build();

        let handle = allocator.allocate().unwrap();
        allocator.free(handle).unwrap();

        assert_eq!(allocator.retired_count(), 1);
        assert!(allocator.is_empty());
        assert_eq!(
            allocator.allocate(),
            Err(Error::Exhausted { max_index: 0 })
        );
    }

    #[test]
    fn current_generation_tracks_frees() {
        let mut allocator = IndexAllocator::<u32>::new();

        let handle = allocator.allocate().unwrap();
        assert_eq!(allocator.current_generation(0), Some(0));

        allocator.free(handle).unwrap();
        assert_eq!(allocator.current_generation(0), Some(1));
    }

    #[test]
    fn len_tracks_live_handles() {
        let mut allocator = IndexAllocator::<u32>::new();
        assert!(allocator.is_empty());

        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_eq!(allocator.len(), 2);

        allocator.free(a).unwrap();
        assert_eq!(allocator.len(), 1);

        _ = allocator.free(a);
        assert_eq!(allocator.len(), 1);

        allocator.free(b).unwrap();
        assert!(allocator.is_empty());
    }

    #[test]
    fn live_handles_skip_freed_and_retired_slots() {
        let mut allocator = IndexAllocator::<u32>::builder().max_generation(0).build();

        let handles = (0..4)
            .map(|_| allocator.allocate().unwrap())
            .collect::<Vec<_>>();

        // With max_generation 0 the freed slot is retired rather than recycled.
        allocator.free(handles[1]).unwrap();

        let live = allocator.live_handles().collect::<Vec<_>>();
        assert_eq!(live, vec![handles[0], handles[2], handles[3]]);
    }

    #[test]
    fn churn_keeps_indices_compact() {
        let mut allocator = IndexAllocator::<u32>::new();

        let mut handles = (0..8)
            .map(|_| allocator.allocate().unwrap())
            .collect::<Vec<_>>();

        for _ in 0..100 {
            let handle = handles.remove(0);
            allocator.free(handle).unwrap();
            handles.push(allocator.allocate().unwrap());
        }

        assert_eq!(allocator.next_index(), 8);
        assert!(handles.iter().all(|h| allocator.is_valid(*h)));
        allocator.integrity_check();
    }

    #[test]
    fn in_refcell_works_fine() {
        let allocator = RefCell::new(IndexAllocator::<u32>::new());

        let handle = allocator.borrow_mut().allocate().unwrap();
        assert!(allocator.borrow().is_valid(handle));

        allocator.borrow_mut().free(handle).unwrap();
        assert!(!allocator.borrow().is_valid(handle));
    }

    #[test]
    fn multithreaded_via_mutex() {
        let allocator = Mutex::new(IndexAllocator::<u32>::new());

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let handle = allocator.lock().unwrap().allocate().unwrap();
                        allocator.lock().unwrap().free(handle).unwrap();
                    }
                });
            }
        });

        let allocator = allocator.into_inner().unwrap();
        assert!(allocator.is_empty());
        assert!(allocator.next_index() <= 4);
        allocator.integrity_check();
    }

    #[test]
    fn debug_shows_counters() {
        let mut allocator = IndexAllocator::<u32>::new();
        _ = allocator.allocate().unwrap();

        let text = format!("{allocator:?}");
        assert!(text.contains("next_index: 1"));
        assert!(text.contains("live: 1"));
    }
}
