use core::{cell::Cell, ptr::NonNull};

use crate::{Allocator, HeapAllocator};

/// An allocator adapter that keeps statistics about the traffic it forwards.
///
/// Every request is passed to the wrapped allocator unchanged. Successful
/// allocations and all deallocations update the counters, which makes the
/// adapter handy for asserting that a container returns every block it
/// takes.
///
/// Equality delegates to the wrapped allocator: blocks may be released
/// through any adapter whose inner allocator compares equal, but the
/// counters of each adapter only see their own traffic.
///
/// # Examples
///
/// ```
/// # use allocator::{Allocator, CountingAllocator, HeapAllocator};
/// let counting = CountingAllocator::new(HeapAllocator::new());
/// let ptr = counting.allocate(64).unwrap();
/// assert_eq!(counting.live_bytes(), 64);
/// unsafe { counting.deallocate(ptr, 64) };
/// assert_eq!(counting.live_allocations(), 0);
/// assert_eq!(counting.total_allocations(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CountingAllocator<A = HeapAllocator> {
    inner: A,
    live_allocations: Cell<usize>,
    live_bytes: Cell<usize>,
    total_allocations: Cell<usize>,
}

impl<A> CountingAllocator<A> {
    #[must_use]
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            live_allocations: Cell::new(0),
            live_bytes: Cell::new(0),
            total_allocations: Cell::new(0),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Number of blocks allocated and not yet released.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.get()
    }

    /// Sum of the sizes of all blocks not yet released.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Number of successful allocations since creation or the last
    /// [`reset`](Self::reset).
    #[must_use]
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.get()
    }

    /// Clears all counters.
    pub fn reset(&self) {
        self.live_allocations.set(0);
        self.live_bytes.set(0);
        self.total_allocations.set(0);
    }

    fn record(&self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        if ptr.is_some() {
            self.live_allocations.set(self.live_allocations.get() + 1);
            self.live_bytes.set(self.live_bytes.get() + size);
            self.total_allocations.set(self.total_allocations.get() + 1);
        }
        ptr
    }
}

impl<A> PartialEq for CountingAllocator<A>
where
    A: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<A> Eq for CountingAllocator<A> where A: Eq {}

impl<A> Allocator for CountingAllocator<A>
where
    A: Allocator,
{
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.record(self.inner.allocate(size), size)
    }

    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        self.record(self.inner.allocate_aligned(size, alignment, offset), size)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.inner.deallocate(ptr, size) };
        self.live_allocations
            .set(self.live_allocations.get().saturating_sub(1));
        self.live_bytes.set(self.live_bytes.get().saturating_sub(size));
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn set_name(&mut self, name: &'static str) {
        self.inner.set_name(name);
    }

    fn min_alignment(&self) -> usize {
        self.inner.min_alignment()
    }
}
