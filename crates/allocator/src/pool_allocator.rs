//! Allocator handles over fixed pools.
//!
//! A [`Pool`] by itself is not an [`Allocator`]: containers need a value they
//! can store, compare and name. This module provides two such handles:
//!
//! - [`PoolAllocator`] owns its pool. A container embedding one gets a private
//!   pool that no other container can draw from. [`FixedAllocator`] and
//!   [`FixedAllocatorWithOverflow`] name the two common flavours.
//! - [`FixedPoolReference`] borrows a pool. It is `Copy`, so any number of
//!   containers can share one pool; copying the handle copies the reference,
//!   never the pool.
//!
//! Both handles compare equal only when they draw from the same pool
//! instance, which is exactly when a block from one may be released through
//! the other.

use core::{alloc::Layout, fmt, mem::MaybeUninit, ptr, ptr::NonNull};

use crate::{
    Allocator, HeapAllocator,
    config::DEFAULT_NAME,
    error::PoolInitError,
    fixed_pool::{FixedPool, FixedPoolWithOverflow, Pool},
};

/// Name reported by every [`FixedPoolReference`].
const REFERENCE_NAME: &str = "fixed_pool_reference";

/// An allocator that owns a pool.
pub struct PoolAllocator<P> {
    pool: P,
    #[cfg(feature = "names")]
    name: &'static str,
}

/// An allocator over a private [`FixedPool`] without fallback.
///
/// Requests that do not fit a node, and requests made while the pool is
/// exhausted, fail.
///
/// # Examples
///
/// ```
/// # use core::alloc::Layout;
/// # use allocator::{Allocator, FixedAllocator, PoolBuffer, allocate_memory};
/// let mut buffer = PoolBuffer::<{ 24 * 2 }>::new();
/// let mut allocator = FixedAllocator::default();
/// allocator.init(&mut buffer, Layout::from_size_align(24, 8).unwrap()).unwrap();
///
/// let a = allocate_memory(&allocator, 24, 8, 0).unwrap();
/// let b = allocate_memory(&allocator, 24, 8, 0).unwrap();
/// assert!(allocate_memory(&allocator, 24, 8, 0).is_none());
/// unsafe {
///     allocator.deallocate(a, 24);
///     allocator.deallocate(b, 24);
/// }
/// ```
pub type FixedAllocator<'buf> = PoolAllocator<FixedPool<'buf>>;

/// An allocator over a private [`FixedPoolWithOverflow`].
pub type FixedAllocatorWithOverflow<'buf, A = HeapAllocator> =
    PoolAllocator<FixedPoolWithOverflow<'buf, A>>;

impl<P> PoolAllocator<P> {
    #[must_use]
    pub const fn new(pool: P) -> Self {
        Self::with_name(pool, DEFAULT_NAME)
    }

    #[cfg_attr(not(feature = "names"), expect(unused_variables))]
    #[must_use]
    pub const fn with_name(pool: P, name: &'static str) -> Self {
        Self {
            pool,
            #[cfg(feature = "names")]
            name,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }
}

impl<'buf> PoolAllocator<FixedPool<'buf>> {
    /// Lays the owned pool over `buffer`. See [`FixedPool::init`].
    pub fn init(
        &mut self,
        buffer: &'buf mut [MaybeUninit<u8>],
        node_layout: Layout,
    ) -> Result<usize, PoolInitError> {
        self.pool.init(buffer, node_layout)
    }
}

impl<'buf, A> PoolAllocator<FixedPoolWithOverflow<'buf, A>> {
    /// Lays the owned pool over `buffer`. See [`FixedPool::init`].
    pub fn init(
        &mut self,
        buffer: &'buf mut [MaybeUninit<u8>],
        node_layout: Layout,
    ) -> Result<usize, PoolInitError> {
        self.pool.init(buffer, node_layout)
    }
}

impl<P> Default for PoolAllocator<P>
where
    P: Default,
{
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P> fmt::Debug for PoolAllocator<P>
where
    P: fmt::Debug + Pool,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("name", &self.name())
            .field("pool", &self.pool)
            .finish()
    }
}

impl<P> PartialEq for PoolAllocator<P> {
    fn eq(&self, other: &Self) -> bool {
        // Each handle owns its pool, so only the handle itself shares it.
        ptr::eq(&self.pool, &other.pool)
    }
}

impl<P> Eq for PoolAllocator<P> {}

impl<P> Allocator for PoolAllocator<P>
where
    P: Pool,
{
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.pool.allocate_block(size, self.pool.node_alignment(), 0)
    }

    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        self.pool.allocate_block(size, alignment, offset)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.pool.deallocate_block(ptr, size) }
    }

    fn name(&self) -> &'static str {
        #[cfg(feature = "names")]
        {
            self.name
        }
        #[cfg(not(feature = "names"))]
        {
            DEFAULT_NAME
        }
    }

    #[cfg_attr(not(feature = "names"), expect(unused_variables))]
    fn set_name(&mut self, name: &'static str) {
        #[cfg(feature = "names")]
        {
            self.name = name;
        }
    }

    fn min_alignment(&self) -> usize {
        self.pool.node_alignment()
    }
}

/// A shared, non-owning allocator handle over a pool.
///
/// # Examples
///
/// ```
/// # use core::alloc::Layout;
/// # use allocator::{FixedPool, FixedPoolReference, PoolBuffer, allocate_memory};
/// let mut buffer = PoolBuffer::<{ 32 * 4 }>::new();
/// let pool = FixedPool::with_buffer(&mut buffer, Layout::new::<[u64; 4]>()).unwrap();
///
/// let first = FixedPoolReference::new(&pool);
/// let second = first;
/// assert_eq!(first, second);
///
/// let _node = allocate_memory(&first, 32, 8, 0).unwrap();
/// assert_eq!(second.pool().free_count(), 3);
/// ```
pub struct FixedPoolReference<'p, P> {
    pool: &'p P,
}

impl<'p, P> FixedPoolReference<'p, P> {
    #[must_use]
    pub const fn new(pool: &'p P) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &'p P {
        self.pool
    }
}

impl<P> Clone for FixedPoolReference<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for FixedPoolReference<'_, P> {}

impl<P> fmt::Debug for FixedPoolReference<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FixedPoolReference")
            .field(&ptr::from_ref(self.pool))
            .finish()
    }
}

impl<P> PartialEq for FixedPoolReference<'_, P> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.pool, other.pool)
    }
}

impl<P> Eq for FixedPoolReference<'_, P> {}

impl<P> Allocator for FixedPoolReference<'_, P>
where
    P: Pool,
{
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.pool.allocate_block(size, self.pool.node_alignment(), 0)
    }

    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        self.pool.allocate_block(size, alignment, offset)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.pool.deallocate_block(ptr, size) }
    }

    fn name(&self) -> &'static str {
        REFERENCE_NAME
    }

    fn set_name(&mut self, _name: &'static str) {}

    fn min_alignment(&self) -> usize {
        self.pool.node_alignment()
    }
}
