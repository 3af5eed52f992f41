//! Allocators with explicit alignment control for allocator-aware containers.
//!
//! This crate defines the [`Allocator`] contract that containers are generic
//! over, a set of allocators implementing it, and [`allocate_memory`], the
//! single entry point through which containers request memory. The crate is
//! `no_std` compatible; the only platform dependency is the aligned allocation
//! primitive in [`raw`].
//!
//! # Available Allocators
//!
//! ## [`HeapAllocator`]
//!
//! The default allocator. A stateless wrapper around the platform heap that
//! honours any power-of-two alignment together with an arbitrary alignment
//! offset. All instances compare equal.
//!
//! ## [`NullAllocator`]
//!
//! Fails every request. Useful for checking that code is generic over its
//! allocator and for containers that must stay empty.
//!
//! ## [`FixedAllocator`] and [`FixedAllocatorWithOverflow`]
//!
//! Allocators that own a [`FixedPool`]: a free-list over a caller-supplied
//! buffer cut into equally sized nodes. Best suited for:
//!
//! - Node-based containers with a known upper bound on their size
//! - Avoiding heap traffic on hot paths
//! - Keeping a container's nodes close together in memory
//!
//! **Performance**: O(1) allocation and deallocation. The overflow flavour
//! falls back to another allocator (by default [`HeapAllocator`]) once the
//! buffer is exhausted.
//!
//! ## [`FixedPoolReference`]
//!
//! A `Copy` handle that lets several containers draw from one pool.
//!
//! ## [`CountingAllocator`]
//!
//! An adapter that counts the allocations passing through it.
//!
//! # Usage Examples
//!
//! ## Allocating through the dispatcher
//!
//! ```rust
//! use allocator::{Allocator, HeapAllocator, allocate_memory, is_aligned_with_offset};
//!
//! let heap = HeapAllocator::with_name("scratch");
//!
//! // 64-byte alignment for the address 8 bytes into the block.
//! let ptr = allocate_memory(&heap, 256, 64, 8).unwrap();
//! assert!(is_aligned_with_offset(ptr, 64, 8));
//!
//! unsafe { heap.deallocate(ptr, 256) };
//! ```
//!
//! ## Sharing a pool between two users
//!
//! ```rust
//! use core::alloc::Layout;
//!
//! use allocator::{
//!     Allocator, FixedPoolReference, FixedPoolWithOverflow, HeapAllocator, PoolBuffer,
//!     allocate_memory,
//! };
//!
//! let mut buffer = PoolBuffer::<{ 32 * 16 }>::new();
//! let pool = FixedPoolWithOverflow::with_buffer(
//!     &mut buffer,
//!     Layout::new::<[u64; 4]>(),
//!     HeapAllocator::new(),
//! )
//! .unwrap();
//!
//! let first = FixedPoolReference::new(&pool);
//! let second = FixedPoolReference::new(&pool);
//! assert_eq!(first, second);
//!
//! // Twenty nodes from a pool of sixteen: the last four overflow to the heap.
//! let nodes: Vec<_> = (0..20)
//!     .map(|i| {
//!         let allocator = if i % 2 == 0 { &first } else { &second };
//!         allocate_memory(allocator, 32, 8, 0).unwrap()
//!     })
//!     .collect();
//! assert_eq!(pool.overflow_count(), 4);
//!
//! for node in nodes {
//!     unsafe { first.deallocate(node, 32) };
//! }
//! assert_eq!(pool.pool().free_count(), 16);
//! ```
//!
//! # Design Considerations
//!
//! ## Failure
//!
//! Allocators report exhaustion by returning `None` and never panic on it.
//! Containers turn `None` into an [`AllocError`].
//!
//! ## Equality
//!
//! Two allocators compare equal exactly when one may release blocks of the
//! other. Containers use this to decide whether nodes can change owners on
//! move and swap.
//!
//! ## Thread Safety
//!
//! Pools are `Send` but not `Sync`; sharing them between threads requires
//! external synchronisation. The only lock in the crate guards the
//! [default allocator](default_allocator).
//!
//! ## Performance Characteristics
//!
//! | Allocator | Allocation | Deallocation | Memory Overhead | Best Use Case |
//! |-----------|------------|--------------|-----------------|---------------|
//! | `HeapAllocator` | platform | platform | 1 word + alignment padding | General purpose |
//! | `FixedAllocator` | O(1) | O(1) | none | Bounded node containers |
//! | `FixedAllocatorWithOverflow` | O(1)* | O(1)* | none* | Usually bounded containers |
//!
//! *While the pool has free nodes.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod config;
mod counting;
mod default;
mod dispatch;
mod error;
mod fixed_pool;
mod heap;
mod null;
mod pool_allocator;
pub mod raw;
mod traits;

pub use self::{
    config::{DEFAULT_NAME, MIN_ALIGNMENT, PoolBuffer},
    counting::CountingAllocator,
    default::{
        DefaultAllocatorRef, SharedAllocator, default_allocator, reset_default_allocator,
        set_default_allocator,
    },
    dispatch::{allocate_memory, is_aligned_with_offset},
    error::{AllocError, AllocSnafu, Location, PoolInitError},
    fixed_pool::{FixedPool, FixedPoolWithOverflow, Pool},
    heap::HeapAllocator,
    null::NullAllocator,
    pool_allocator::{
        FixedAllocator, FixedAllocatorWithOverflow, FixedPoolReference, PoolAllocator,
    },
    traits::Allocator,
};
