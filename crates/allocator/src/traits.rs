use core::ptr::NonNull;

use crate::MIN_ALIGNMENT;

/// The contract every allocator usable by the containers fulfils.
///
/// An allocator hands out untyped blocks of memory. Blocks are requested
/// either at the allocator's minimum guaranteed alignment
/// ([`allocate`](Self::allocate)) or with an explicit alignment and alignment
/// offset ([`allocate_aligned`](Self::allocate_aligned)). Containers should
/// not pick between the two themselves; they go through
/// [`allocate_memory`](crate::allocate_memory), which routes each request and
/// checks the result.
///
/// # Failure
///
/// Exhaustion is reported by returning `None`. Allocators never panic on
/// exhaustion and never retry.
///
/// # Equality
///
/// Allocators express equality through [`PartialEq`]. Two allocators compare
/// equal if and only if a block allocated by one may be released by the other.
/// Stateless allocators such as [`HeapAllocator`](crate::HeapAllocator) are
/// equal to every instance of their type; pool-backed allocators are equal
/// only when they draw from the same pool. Containers rely on this to decide
/// whether nodes may change owners, so two values of the same type are not
/// assumed to be interchangeable.
///
/// The trait itself does not require [`PartialEq`] so that it stays usable as
/// a trait object (see [`default_allocator`](crate::default_allocator)).
///
/// # Thread Safety
///
/// Nothing in the contract implies synchronisation. Sharing an allocator
/// between threads is only possible when the implementing type is `Sync`.
pub trait Allocator {
    /// Allocates `size` bytes at the allocator's minimum guaranteed alignment.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocates `size` bytes such that `address - offset` is a multiple of
    /// `alignment`.
    ///
    /// `alignment` must be a power of two. `offset` may be any value,
    /// including zero.
    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>>;

    /// Releases a block previously returned by this allocator or by an
    /// allocator equal to it.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by `self` or by an allocator that compares equal
    ///   to `self`
    /// - `size` is the size that was requested when the block was allocated
    /// - `ptr` has not been released yet and is not accessed afterwards
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);

    /// Returns the debug name of this allocator instance.
    fn name(&self) -> &'static str;

    /// Sets the debug name of this allocator instance.
    ///
    /// Names never influence allocation behavior.
    fn set_name(&mut self, name: &'static str);

    /// Alignment every block returned by [`allocate`](Self::allocate) is
    /// guaranteed to have.
    ///
    /// Defaults to [`MIN_ALIGNMENT`]. Pool-backed allocators only guarantee
    /// the alignment of their nodes.
    fn min_alignment(&self) -> usize {
        MIN_ALIGNMENT
    }
}

impl<A> Allocator for &A
where
    A: Allocator + ?Sized,
{
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size)
    }

    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        (**self).allocate_aligned(size, alignment, offset)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { (**self).deallocate(ptr, size) }
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn set_name(&mut self, _name: &'static str) {}

    fn min_alignment(&self) -> usize {
        (**self).min_alignment()
    }
}
