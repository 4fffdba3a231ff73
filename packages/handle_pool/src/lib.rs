#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Generational handles for pooled objects, with stale-handle and double-free detection.
//!
//! This crate provides two building blocks:
//!
//! * [`IndexAllocator`] issues and recycles [`Handle`]s. A handle is a single 64-bit value that
//!   combines a slot index (lower half) and the generation of that slot (upper half). Freeing a
//!   handle increments its slot's generation, so outdated copies of the handle are detected with
//!   a single comparison even after the index has been reissued.
//! * [`StoragePool`] pairs an allocator with a growable item array that is aligned with the
//!   allocator's indices, adding insert, lookup, iteration and cleanup-on-free.
//!
//! Handles are small `Copy` values that can be compared, hashed and stored anywhere. They carry
//! no ownership - they are capability tokens that only the issuing pool can interpret.
//!
//! # Reuse and retirement
//!
//! Freed slots are reissued oldest-freed-first, spreading generation growth across the whole
//! index space. A slot whose generation reaches the maximum is retired when freed: it is never
//! reissued and no handle for it validates again. Retirement is not an error.
//!
//! # Errors
//!
//! Running out of indices is reported as [`Error::Exhausted`] and is recoverable by freeing a
//! handle. Freeing a handle that is not live is reported as [`Error::DoubleFree`] (or
//! [`Error::UnknownHandle`] for indices the allocator never issued) and indicates a defect in the
//! caller - whether to panic, log or propagate is up to the caller.
//!
//! # Thread safety
//!
//! The types in this crate are not internally synchronized. They may be moved between threads
//! and wrapped in a `Mutex` for shared use.
//!
//! # Example
//!
//! ```rust
//! use handle_pool::{Error, StoragePool};
//!
//! let mut pool = StoragePool::<&str>::new();
//!
//! let h0 = pool.allocate().unwrap();
//! let h1 = pool.allocate().unwrap();
//! let _h2 = pool.allocate().unwrap();
//!
//! pool.free(h1).unwrap();
//! assert!(!pool.is_valid(h1));
//!
//! // The freed index is reused with the next generation.
//! let h3 = pool.allocate().unwrap();
//! assert_eq!((h3.index(), h3.generation()), (1, 1));
//! assert!(pool.is_valid(h3));
//! assert!(!pool.is_valid(h1));
//!
//! pool.insert(h0, "A");
//! assert_eq!(*pool.get(h0), "A");
//!
//! // Freeing the outdated handle again is detected.
//! assert!(matches!(pool.free(h1), Err(Error::DoubleFree { .. })));
//! ```

mod builder;
pub mod diagnostics;
mod error;
mod handle;
mod index_allocator;
mod storage_builder;
mod storage_pool;

pub use builder::*;
pub use diagnostics::AllocatorStats;
pub use error::Error;
pub(crate) use error::Result;
pub use handle::*;
pub use index_allocator::IndexAllocator;
pub use storage_builder::*;
pub use storage_pool::StoragePool;
