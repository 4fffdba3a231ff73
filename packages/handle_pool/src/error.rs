use thiserror::Error;

/// Errors reported by [`IndexAllocator`][1] and [`StoragePool`][2] operations.
///
/// [`Exhausted`][Error::Exhausted] is an expected, recoverable condition. The other variants
/// signal a defect in the caller (a handle used after it was retired, or a handle that never came
/// from this pool) and are not expected to be recovered from - the caller decides whether to
/// panic, log or propagate.
///
/// [1]: crate::IndexAllocator
/// [2]: crate::StoragePool
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Every index up to the configured maximum has been issued and no freed slot is waiting
    /// to be reissued.
    #[error("index space exhausted: all indices up to {max_index} are in use")]
    Exhausted {
        /// The highest index the allocator is configured to issue.
        max_index: u32,
    },

    /// The handle was freed while it was not the live handle for its slot, which means it had
    /// already been freed before (or its slot was retired).
    #[error("double free detected for handle with index {index} and generation {generation}")]
    DoubleFree {
        /// Slot index of the rejected handle.
        index: u32,

        /// Generation of the rejected handle.
        generation: u32,
    },

    /// The handle refers to an index that this allocator has never issued.
    #[error("handle index {index} was never issued (next index is {next_index})")]
    UnknownHandle {
        /// Slot index of the rejected handle.
        index: u32,

        /// The number of indices the allocator has issued so far.
        next_index: usize,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
