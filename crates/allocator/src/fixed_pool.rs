//! Fixed-size node pools.
//!
//! This module provides [`FixedPool`], a free-list allocator over a
//! caller-owned buffer partitioned into equally sized nodes, and
//! [`FixedPoolWithOverflow`], which pairs a pool with a fallback allocator
//! that takes over once the buffer is exhausted.
//!
//! # Algorithm
//!
//! The buffer is cut into `capacity` nodes of `node_size` bytes, each aligned
//! to `node_alignment`. Unused nodes form a singly-linked stack threaded
//! through their first machine word:
//!
//! ```text
//!  head
//!   │
//!   ▼
//! ┌──────┬──────┐   ┌──────┬──────┐   ┌──────┬──────┐
//! │ next │      │ ─▶│ next │      │ ─▶│ null │      │
//! └──────┴──────┘   └──────┴──────┘   └──────┴──────┘
//!  node 0            node 1            node N-1
//! ```
//!
//! - **Allocation** pops the head of the stack: O(1), no search.
//! - **Deallocation** pushes the node back: O(1).
//!
//! Because the free list is a stack, a node that was just released is the
//! next one handed out. Repeated allocate/release cycles of one node keep
//! touching the same memory.
//!
//! # Memory Safety
//!
//! The pool never owns its buffer; it borrows it for `'buf`. Releasing an
//! address that did not come from the pool, or releasing it twice, corrupts
//! the free list. Debug builds check that released addresses fall on a node
//! boundary inside the buffer; double frees are not detected.
//!
//! # Thread Safety
//!
//! Pools use interior mutability without synchronisation: they are `Send`
//! but not `Sync`. Several containers on one thread can share a pool through
//! [`FixedPoolReference`](crate::FixedPoolReference).

use core::{
    alloc::Layout,
    cell::Cell,
    fmt,
    marker::PhantomData,
    mem::MaybeUninit,
    ptr::{self, NonNull},
};

use snafu::ensure;

use crate::{
    Allocator, HeapAllocator, allocate_memory,
    error::{NodeTooSmallSnafu, PoolInitError},
};

/// Size of the free-list link stored in every unused node.
const LINK_SIZE: usize = size_of::<*mut u8>();

/// Reads the free-list link stored at the start of `node`.
///
/// # Safety
///
/// `node` must point to an unused node of at least `LINK_SIZE` bytes.
unsafe fn read_link(node: NonNull<u8>) -> *mut u8 {
    unsafe { node.cast::<*mut u8>().read_unaligned() }
}

/// Stores `next` as the free-list link of `node`.
///
/// # Safety
///
/// `node` must point to an unused node of at least `LINK_SIZE` bytes.
unsafe fn write_link(node: NonNull<u8>, next: *mut u8) {
    unsafe { node.cast::<*mut u8>().write_unaligned(next) }
}

/// Node-granular memory source that allocator handles can be built on.
///
/// Implemented by [`FixedPool`] and [`FixedPoolWithOverflow`], so that
/// [`PoolAllocator`](crate::PoolAllocator) and
/// [`FixedPoolReference`](crate::FixedPoolReference) work with either flavour.
pub trait Pool {
    /// Usable size of one node in bytes.
    fn node_size(&self) -> usize;

    /// Alignment every node is placed at.
    fn node_alignment(&self) -> usize;

    /// Allocates a block of `size` bytes such that `address - offset` is a
    /// multiple of `alignment`, or returns `None` if the pool cannot serve
    /// the request.
    fn allocate_block(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>>;

    /// Returns a block obtained from [`allocate_block`](Self::allocate_block).
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by `self.allocate_block(size, ..)`
    /// - `ptr` has not been returned yet and is not accessed afterwards
    unsafe fn deallocate_block(&self, ptr: NonNull<u8>, size: usize);
}

/// A free-list allocator over a caller-supplied buffer of uniform nodes.
///
/// A pool starts out empty ([`FixedPool::new`]) and becomes usable once
/// [`init`](Self::init) has laid it over a buffer. An empty pool fails every
/// allocation.
///
/// # Examples
///
/// ```
/// # use core::alloc::Layout;
/// # use allocator::{FixedPool, PoolBuffer};
/// let mut buffer = PoolBuffer::<256>::new();
/// let pool = FixedPool::with_buffer(&mut buffer, Layout::new::<[u64; 4]>()).unwrap();
/// assert_eq!(pool.capacity(), 8);
///
/// let a = pool.allocate().unwrap();
/// unsafe { pool.deallocate(a) };
/// assert_eq!(pool.allocate(), Some(a)); // LIFO reuse
/// ```
pub struct FixedPool<'buf> {
    /// Top of the free-node stack, or null when the pool is exhausted.
    head: Cell<*mut u8>,
    /// First node of the partitioned buffer.
    begin: *mut u8,
    /// One past the last whole node.
    end: *mut u8,
    /// Distance between two nodes; the node size padded to its alignment.
    node_size: usize,
    node_alignment: usize,
    capacity: usize,
    free_count: Cell<usize>,
    _buffer: PhantomData<&'buf mut [MaybeUninit<u8>]>,
}

// The pool hands out pointers into a buffer it borrows exclusively, and no
// operation relies on thread-local state.
unsafe impl Send for FixedPool<'_> {}

impl Default for FixedPool<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FixedPool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("begin", &self.begin)
            .field("node_size", &self.node_size)
            .field("node_alignment", &self.node_alignment)
            .field("capacity", &self.capacity)
            .field("free_count", &self.free_count.get())
            .finish_non_exhaustive()
    }
}

impl<'buf> FixedPool<'buf> {
    /// Creates a pool with no buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: Cell::new(ptr::null_mut()),
            begin: ptr::null_mut(),
            end: ptr::null_mut(),
            node_size: 0,
            node_alignment: 1,
            capacity: 0,
            free_count: Cell::new(0),
            _buffer: PhantomData,
        }
    }

    /// Creates a pool laid over `buffer`. See [`init`](Self::init).
    pub fn with_buffer(
        buffer: &'buf mut [MaybeUninit<u8>],
        node_layout: Layout,
    ) -> Result<Self, PoolInitError> {
        let mut pool = Self::new();
        pool.init(buffer, node_layout)?;
        Ok(pool)
    }

    /// Partitions `buffer` into nodes of `node_layout` and threads all of
    /// them onto the free list.
    ///
    /// The start of the buffer is rounded up to `node_layout.align()` and the
    /// node size is padded to a multiple of it, so the pool holds
    /// `(buffer.len() - adjustment) / padded_size` nodes. A buffer too small
    /// for a single node yields a pool that is permanently exhausted.
    ///
    /// Any previous partitioning is forgotten. Blocks handed out before the
    /// call must no longer be in use.
    ///
    /// # Returns
    ///
    /// The number of nodes in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolInitError::NodeTooSmall`] if a node cannot hold a
    /// free-list link.
    pub fn init(
        &mut self,
        buffer: &'buf mut [MaybeUninit<u8>],
        node_layout: Layout,
    ) -> Result<usize, PoolInitError> {
        ensure!(
            node_layout.size() >= LINK_SIZE,
            NodeTooSmallSnafu {
                node_size: node_layout.size(),
                min_size: LINK_SIZE,
            }
        );

        let node_size = node_layout.pad_to_align().size();
        let node_alignment = node_layout.align();

        let start = buffer.as_mut_ptr().cast::<u8>();
        let align_offset = start.align_offset(node_alignment);
        let usable = buffer.len().saturating_sub(align_offset);
        let capacity = usable / node_size;
        let begin = if capacity == 0 {
            start
        } else {
            start.wrapping_add(align_offset)
        };

        // Thread back to front so that node 0 ends up on top of the stack.
        let mut head = ptr::null_mut();
        for index in (0..capacity).rev() {
            unsafe {
                let node = NonNull::new_unchecked(begin.add(index * node_size));
                write_link(node, head);
                head = node.as_ptr();
            }
        }

        self.head.set(head);
        self.begin = begin;
        self.end = begin.wrapping_add(capacity * node_size);
        self.node_size = node_size;
        self.node_alignment = node_alignment;
        self.capacity = capacity;
        self.free_count.set(capacity);

        tracing::debug!(
            capacity,
            node_size,
            node_alignment,
            buffer_len = buffer.len(),
            "fixed pool initialized"
        );

        Ok(capacity)
    }

    /// Takes a node off the free list.
    ///
    /// Returns `None` if every node is in use or the pool has no buffer.
    #[must_use]
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        let node = NonNull::new(self.head.get())?;
        let next = unsafe { read_link(node) };
        self.head.set(next);
        self.free_count.set(self.free_count.get() - 1);
        Some(node)
    }

    /// Puts a node back on the free list.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by [`allocate`](Self::allocate) on this pool
    /// - `ptr` has not been released since, and is not accessed afterwards
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `ptr` does not point at a node of this pool.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        debug_assert!(
            self.owns(ptr.as_ptr()),
            "{ptr:p} does not belong to this pool"
        );
        debug_assert!(
            (ptr.addr().get() - self.begin.addr()).is_multiple_of(self.node_size),
            "{ptr:p} is not on a node boundary"
        );

        unsafe { write_link(ptr, self.head.get()) };
        self.head.set(ptr.as_ptr());
        self.free_count.set(self.free_count.get() + 1);
    }

    /// Returns `true` if `ptr` lies inside the partitioned buffer.
    #[must_use]
    pub fn owns(&self, ptr: *const u8) -> bool {
        (self.begin.addr()..self.end.addr()).contains(&ptr.addr())
    }

    /// Returns `true` if a single node can hold `size` bytes placed so that
    /// `address - offset` is a multiple of `alignment`.
    #[must_use]
    pub fn can_satisfy(&self, size: usize, alignment: usize, offset: usize) -> bool {
        size <= self.node_size
            && alignment <= self.node_alignment
            && offset & (alignment - 1) == 0
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.node_size != 0
    }

    /// Total number of nodes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of nodes currently on the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_count.get()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.head.get().is_null()
    }

    /// Node size after padding to the node alignment.
    #[must_use]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    #[must_use]
    pub fn node_alignment(&self) -> usize {
        self.node_alignment
    }
}

impl Pool for FixedPool<'_> {
    fn node_size(&self) -> usize {
        self.node_size
    }

    fn node_alignment(&self) -> usize {
        self.node_alignment
    }

    fn allocate_block(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        if !self.can_satisfy(size, alignment, offset) {
            return None;
        }
        self.allocate()
    }

    unsafe fn deallocate_block(&self, ptr: NonNull<u8>, _size: usize) {
        unsafe { self.deallocate(ptr) }
    }
}

/// A [`FixedPool`] backed by a fallback allocator.
///
/// Requests are served from the pool while it has free nodes. Once it is
/// exhausted, or when a request does not fit a node, the request goes to the
/// overflow allocator instead. Callers see no difference apart from the
/// allocation succeeding.
///
/// Released blocks are routed by address: anything inside the pool's buffer
/// returns to the free list, everything else to the overflow allocator.
/// Overflow blocks are always requested and released with at least
/// `node_size` bytes, so the sizes the overflow allocator sees match up.
pub struct FixedPoolWithOverflow<'buf, A = HeapAllocator> {
    pool: FixedPool<'buf>,
    overflow: A,
    overflow_count: Cell<usize>,
}

impl<A> fmt::Debug for FixedPoolWithOverflow<'_, A>
where
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPoolWithOverflow")
            .field("pool", &self.pool)
            .field("overflow", &self.overflow)
            .field("overflow_count", &self.overflow_count.get())
            .finish()
    }
}

impl<A> Default for FixedPoolWithOverflow<'_, A>
where
    A: Default,
{
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<'buf, A> FixedPoolWithOverflow<'buf, A> {
    /// Creates an overflow pool with no buffer; every request goes to
    /// `overflow` until [`init`](Self::init) is called.
    #[must_use]
    pub const fn new(overflow: A) -> Self {
        Self {
            pool: FixedPool::new(),
            overflow,
            overflow_count: Cell::new(0),
        }
    }

    /// Creates an overflow pool laid over `buffer`.
    pub fn with_buffer(
        buffer: &'buf mut [MaybeUninit<u8>],
        node_layout: Layout,
        overflow: A,
    ) -> Result<Self, PoolInitError> {
        let mut pool = Self::new(overflow);
        pool.init(buffer, node_layout)?;
        Ok(pool)
    }

    /// Lays the fixed part of the pool over `buffer`. See [`FixedPool::init`].
    pub fn init(
        &mut self,
        buffer: &'buf mut [MaybeUninit<u8>],
        node_layout: Layout,
    ) -> Result<usize, PoolInitError> {
        self.pool.init(buffer, node_layout)
    }

    #[must_use]
    pub fn pool(&self) -> &FixedPool<'buf> {
        &self.pool
    }

    #[must_use]
    pub fn overflow_allocator(&self) -> &A {
        &self.overflow
    }

    /// Number of live blocks that came from the overflow allocator.
    #[must_use]
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.get()
    }

    fn overflow_size(&self, size: usize) -> usize {
        size.max(self.pool.node_size)
    }
}

impl<A> FixedPoolWithOverflow<'_, A>
where
    A: Allocator,
{
    /// Allocates one node, from the pool if possible and from the overflow
    /// allocator otherwise.
    #[must_use]
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        self.allocate_with(self.pool.node_size, self.pool.node_alignment, 0)
    }

    /// Allocates `size` bytes such that `address - offset` is a multiple of
    /// `alignment`.
    ///
    /// Requests that fit a node are served from the free list while it lasts;
    /// the rest go to the overflow allocator.
    #[must_use]
    pub fn allocate_with(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        if self.pool.can_satisfy(size, alignment, offset)
            && let Some(ptr) = self.pool.allocate()
        {
            return Some(ptr);
        }

        tracing::trace!(
            size,
            alignment,
            offset,
            free_nodes = self.pool.free_count(),
            "fixed pool cannot serve request, using overflow allocator"
        );
        let ptr = allocate_memory(&self.overflow, self.overflow_size(size), alignment, offset)?;
        self.overflow_count.set(self.overflow_count.get() + 1);
        Some(ptr)
    }

    /// Releases a block to wherever it came from.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by this pool with a request of `size` bytes
    /// - `ptr` has not been released since, and is not accessed afterwards
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        if self.pool.owns(ptr.as_ptr()) {
            unsafe { self.pool.deallocate(ptr) }
        } else {
            unsafe { self.overflow.deallocate(ptr, self.overflow_size(size)) }
            self.overflow_count.set(self.overflow_count.get() - 1);
        }
    }
}

impl<A> Pool for FixedPoolWithOverflow<'_, A>
where
    A: Allocator,
{
    fn node_size(&self) -> usize {
        self.pool.node_size
    }

    fn node_alignment(&self) -> usize {
        self.pool.node_alignment
    }

    fn allocate_block(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        self.allocate_with(size, alignment, offset)
    }

    unsafe fn deallocate_block(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.deallocate(ptr, size) }
    }
}
