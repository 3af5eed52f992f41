//! Allocator-aware containers.
//!
//! The containers in this crate are generic over an
//! [`Allocator`](allocator::Allocator) and request every byte they use
//! through [`allocate_memory`](allocator::allocate_memory). They never assume
//! that two allocators of the same type are interchangeable: moving nodes
//! between containers only happens when the allocators compare equal.
//!
//! - [`List`]: a doubly-linked list.
//! - [`HashMap`]: a separately chained hash map.
//!
//! # Sharing a pool
//!
//! ```rust
//! use allocator::{FixedPool, FixedPoolReference, PoolBuffer};
//! use containers::List;
//!
//! type Nodes<'p> = FixedPoolReference<'p, FixedPool<'p>>;
//!
//! let mut buffer = PoolBuffer::<1024>::new();
//! let pool = FixedPool::with_buffer(&mut buffer, List::<u64, Nodes>::node_layout())?;
//!
//! let mut odd = List::new_in(FixedPoolReference::new(&pool));
//! let mut even = List::new_in(FixedPoolReference::new(&pool));
//! for i in 0..10_u64 {
//!     if i % 2 == 0 { even.push_back(i)? } else { odd.push_back(i)? }
//! }
//! assert_eq!(pool.capacity() - pool.free_count(), 10);
//!
//! // Same pool, so the nodes simply change hands.
//! even.take_from(&mut odd)?;
//! assert_eq!(even.len(), 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod error;
pub mod hash_map;
pub mod list;

pub use self::{error::SwapError, hash_map::HashMap, list::List};
