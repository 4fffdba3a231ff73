//! Introspection of allocator counters. Nothing here affects allocator behavior.

use std::any::type_name;
use std::fmt;

use tracing::debug;

use crate::IndexAllocator;

/// A point-in-time snapshot of the counters of an [`IndexAllocator`].
///
/// # Example
///
/// ```rust
/// use handle_pool::{AllocatorStats, IndexAllocator};
///
/// let mut allocator = IndexAllocator::<u32>::new();
/// let handle = allocator.allocate().unwrap();
/// allocator.free(handle).unwrap();
///
/// let stats = AllocatorStats::of(&allocator);
/// assert_eq!(stats.next_index, 1);
/// assert_eq!(stats.free_list_len, 1);
/// assert!(!stats.exhausted);
///
/// println!("{stats}");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct AllocatorStats {
    /// The smallest index that has never been issued.
    pub next_index: usize,

    /// The number of freed handles waiting to be reissued.
    pub free_list_len: usize,

    /// The number of entries in the generation table.
    pub generation_table_len: usize,

    /// Whether every index up to the configured maximum has been issued.
    pub exhausted: bool,

    /// The number of live handles.
    pub live: usize,

    /// The number of slots retired due to generation saturation.
    pub retired: usize,
}

impl AllocatorStats {
    /// Reads the current counters of `allocator`.
    #[must_use]
    pub fn of<T>(allocator: &IndexAllocator<T>) -> Self {
        Self {
            next_index: allocator.next_index(),
            free_list_len: allocator.free_list_len(),
            generation_table_len: allocator.generation_table_len(),
            exhausted: allocator.is_exhausted(),
            live: allocator.len(),
            retired: allocator.retired_count(),
        }
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "next index: {}, free list: {}, generation table: {}, live: {}, retired: {}, exhausted: {}",
            self.next_index,
            self.free_list_len,
            self.generation_table_len,
            self.live,
            self.retired,
            if self.exhausted { "yes" } else { "no" }
        )
    }
}

/// Emits the counters of `allocator` as a single `debug`-level tracing event.
#[cfg_attr(test, mutants::skip)] // Output goes to whatever subscriber is installed; nothing to assert.
pub fn report<T>(allocator: &IndexAllocator<T>) {
    let stats = AllocatorStats::of(allocator);

    debug!(
        item_type = type_name::<T>(),
        next_index = stats.next_index,
        free_list_len = stats.free_list_len,
        generation_table_len = stats.generation_table_len,
        live = stats.live,
        retired = stats.retired,
        exhausted = stats.exhausted,
        "allocator diagnostics"
    );
}
