//! Allocation dispatching.
//!
//! Containers never call [`Allocator::allocate`] or
//! [`Allocator::allocate_aligned`] directly. They describe what they need
//! (size, alignment and alignment offset) to [`allocate_memory`], which picks
//! the cheapest path the allocator contract allows and checks the result.

use core::ptr::NonNull;

use crate::{Allocator, MIN_ALIGNMENT};

/// Returns `true` if `ptr - offset` is a multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[must_use]
pub fn is_aligned_with_offset(ptr: NonNull<u8>, alignment: usize, offset: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    ptr.addr().get().wrapping_sub(offset) & (alignment - 1) == 0
}

/// Allocates `size` bytes from `allocator` such that `address - offset` is
/// aligned to `alignment`.
///
/// Requests whose alignment is at most [`MIN_ALIGNMENT`] (or the allocator's
/// own [`min_alignment`](Allocator::min_alignment), if smaller) and whose
/// offset is a multiple of the alignment are already satisfied by any block
/// the plain path returns, so they are routed to [`Allocator::allocate`].
/// Everything else goes to [`Allocator::allocate_aligned`].
///
/// Returns `None` if the allocator is exhausted.
///
/// # Debug Assertions
///
/// In debug builds the returned address is checked against the request. A
/// failure there points at the allocator: either its plain path returns less
/// than its [`min_alignment`](Allocator::min_alignment), or its aligned path
/// ignores the request. Release builds do not check.
///
/// # Examples
///
/// ```
/// # use allocator::{Allocator, HeapAllocator, allocate_memory, is_aligned_with_offset};
/// let heap = HeapAllocator::new();
/// let ptr = allocate_memory(&heap, 100, 64, 16).unwrap();
/// assert!(is_aligned_with_offset(ptr, 64, 16));
/// unsafe { heap.deallocate(ptr, 100) };
/// ```
pub fn allocate_memory<A>(
    allocator: &A,
    size: usize,
    alignment: usize,
    offset: usize,
) -> Option<NonNull<u8>>
where
    A: Allocator + ?Sized,
{
    debug_assert!(
        alignment.is_power_of_two(),
        "alignment must be a power of two"
    );

    let plain_alignment = MIN_ALIGNMENT.min(allocator.min_alignment());
    if alignment <= plain_alignment && offset & (alignment - 1) == 0 {
        let ptr = allocator.allocate(size)?;
        debug_assert!(
            is_aligned_with_offset(ptr, alignment, offset),
            "allocator `{}` returned {ptr:p} for a {alignment}-aligned request; \
             its minimum alignment does not match the reported {plain_alignment}",
            allocator.name(),
        );
        Some(ptr)
    } else {
        let ptr = allocator.allocate_aligned(size, alignment, offset)?;
        debug_assert!(
            is_aligned_with_offset(ptr, alignment, offset),
            "allocator `{}` returned {ptr:p} for alignment {alignment} with offset {offset}",
            allocator.name(),
        );
        Some(ptr)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::{CountingAllocator, HeapAllocator};

    /// Records which path the dispatcher took.
    #[derive(Default)]
    struct PathRecorder {
        heap: HeapAllocator,
        plain: Cell<usize>,
        aligned: Cell<usize>,
    }

    impl Allocator for PathRecorder {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            self.plain.set(self.plain.get() + 1);
            self.heap.allocate(size)
        }

        fn allocate_aligned(
            &self,
            size: usize,
            alignment: usize,
            offset: usize,
        ) -> Option<NonNull<u8>> {
            self.aligned.set(self.aligned.get() + 1);
            self.heap.allocate_aligned(size, alignment, offset)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
            unsafe { self.heap.deallocate(ptr, size) }
        }

        fn name(&self) -> &'static str {
            "path-recorder"
        }

        fn set_name(&mut self, _name: &'static str) {}
    }

    /// Plain path only guarantees byte alignment.
    struct Misaligned(HeapAllocator);

    impl Allocator for Misaligned {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            let ptr = self.0.allocate(size + 1)?;
            Some(unsafe { ptr.add(1) })
        }

        fn allocate_aligned(
            &self,
            size: usize,
            alignment: usize,
            offset: usize,
        ) -> Option<NonNull<u8>> {
            self.0.allocate_aligned(size, alignment, offset)
        }

        unsafe fn deallocate(&self, _ptr: NonNull<u8>, _size: usize) {}

        fn name(&self) -> &'static str {
            "misaligned"
        }

        fn set_name(&mut self, _name: &'static str) {}
    }

    /// Aligned path ignores the requested alignment.
    struct IgnoresAlignment(HeapAllocator);

    impl Allocator for IgnoresAlignment {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            self.0.allocate(size)
        }

        fn allocate_aligned(
            &self,
            size: usize,
            alignment: usize,
            offset: usize,
        ) -> Option<NonNull<u8>> {
            let ptr = self.0.allocate_aligned(size + 1, alignment, offset)?;
            Some(unsafe { ptr.add(1) })
        }

        unsafe fn deallocate(&self, _ptr: NonNull<u8>, _size: usize) {}

        fn name(&self) -> &'static str {
            "ignores-alignment"
        }

        fn set_name(&mut self, _name: &'static str) {}
    }

    #[test]
    fn test_alignment_and_offset_grid() {
        let allocator = CountingAllocator::new(HeapAllocator::new());
        for alignment in [1, 2, 4, 8, 16] {
            for offset in [0, 16] {
                let ptr = allocate_memory(&allocator, 100, alignment, offset).unwrap();
                assert!(is_aligned_with_offset(ptr, alignment, offset));
                unsafe { allocator.deallocate(ptr, 100) };
                assert_eq!(allocator.live_bytes(), 0);
            }
        }
        assert_eq!(allocator.total_allocations(), 10);
    }

    #[test]
    fn test_small_alignment_takes_plain_path() {
        let recorder = PathRecorder::default();
        for alignment in [1, 2, 4, 8, MIN_ALIGNMENT] {
            let ptr = allocate_memory(&recorder, 8, alignment, 0).unwrap();
            unsafe { recorder.deallocate(ptr, 8) };
        }
        assert_eq!(recorder.plain.get(), 5);
        assert_eq!(recorder.aligned.get(), 0);
    }

    #[test]
    fn test_large_alignment_takes_aligned_path() {
        let recorder = PathRecorder::default();
        let ptr = allocate_memory(&recorder, 8, MIN_ALIGNMENT * 2, 0).unwrap();
        assert!(is_aligned_with_offset(ptr, MIN_ALIGNMENT * 2, 0));
        unsafe { recorder.deallocate(ptr, 8) };
        assert_eq!(recorder.plain.get(), 0);
        assert_eq!(recorder.aligned.get(), 1);
    }

    #[test]
    fn test_incompatible_offset_takes_aligned_path() {
        let recorder = PathRecorder::default();
        let ptr = allocate_memory(&recorder, 8, 4, 3).unwrap();
        assert!(is_aligned_with_offset(ptr, 4, 3));
        unsafe { recorder.deallocate(ptr, 8) };
        assert_eq!(recorder.plain.get(), 0);
        assert_eq!(recorder.aligned.get(), 1);
    }

    #[test]
    fn test_is_aligned_with_offset() {
        let ptr = NonNull::new(ptr_at(0x1010)).unwrap();
        assert!(is_aligned_with_offset(ptr, 16, 0));
        assert!(is_aligned_with_offset(ptr, 8, 8));
        assert!(is_aligned_with_offset(ptr, 4096, 0x10));
        assert!(!is_aligned_with_offset(ptr, 32, 0));
        assert!(!is_aligned_with_offset(ptr, 16, 4));
    }

    fn ptr_at(addr: usize) -> *mut u8 {
        core::ptr::without_provenance_mut(addr)
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "minimum alignment does not match")]
    fn test_misaligned_plain_path_is_caught() {
        let allocator = Misaligned(HeapAllocator::new());
        let _ = allocate_memory(&allocator, 8, 8, 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "for alignment 64 with offset 0")]
    fn test_misaligned_aligned_path_is_caught() {
        let allocator = IgnoresAlignment(HeapAllocator::new());
        let _ = allocate_memory(&allocator, 8, 64, 0);
    }
}
