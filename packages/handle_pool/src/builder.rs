use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{IndexAllocator, MAX_GENERATION, MAX_INDEX};

/// Builder for creating an instance of [`IndexAllocator`].
///
/// You only need to use this builder if you want to limit the index space or the generation
/// range. The default configuration used by [`IndexAllocator::new()`][1] uses the full range of
/// both halves of a [`Handle`][2].
///
/// # Examples
///
/// ```
/// use handle_pool::IndexAllocator;
///
/// let allocator = IndexAllocator::<u32>::builder()
///     .max_index(1023)
///     .max_generation(255)
///     .build();
///
/// assert_eq!(allocator.max_index(), 1023);
/// assert_eq!(allocator.max_generation(), 255);
/// ```
///
/// [1]: IndexAllocator::new
/// [2]: crate::Handle
#[must_use]
pub struct IndexAllocatorBuilder<T> {
    max_index: u32,
    max_generation: u32,

    _item: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for IndexAllocatorBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexAllocatorBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("max_index", &self.max_index)
            .field("max_generation", &self.max_generation)
            .finish()
    }
}

impl<T> IndexAllocatorBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            max_index: MAX_INDEX,
            max_generation: MAX_GENERATION,
            _item: PhantomData,
        }
    }

    /// Sets the highest index the allocator may issue. Once every index up to and including
    /// this one has been issued, fresh allocations fail with [`Error::Exhausted`][1] and only
    /// recycled slots can be handed out.
    ///
    /// [1]: crate::Error::Exhausted
    pub fn max_index(mut self, max_index: u32) -> Self {
        self.max_index = max_index;
        self
    }

    /// Sets the generation at which a slot is retired instead of recycled when freed.
    ///
    /// Lower values make every slot usable for fewer allocation cycles. This is mostly useful
    /// for exercising slot retirement without billions of allocations.
    pub fn max_generation(mut self, max_generation: u32) -> Self {
        self.max_generation = max_generation;
        self
    }

    /// Builds the allocator with the specified configuration.
    #[must_use]
    pub fn build(self) -> IndexAllocator<T> {
        IndexAllocator::new_inner(self.max_index, self.max_generation)
    }
}
