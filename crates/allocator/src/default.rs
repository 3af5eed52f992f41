//! Process-wide default allocator.
//!
//! Code that does not pick an allocator explicitly can ask for the current
//! default with [`default_allocator`]. The default starts out as a static
//! [`HeapAllocator`] and can be replaced at any time with
//! [`set_default_allocator`].
//!
//! Replacement is not reference counted. Containers that captured the old
//! default through [`DefaultAllocatorRef`] keep using it, so a replaced
//! allocator must stay usable for as long as such containers live. Requiring
//! `&'static` references enforces this.

use core::{fmt, ptr::NonNull};

use spin::rwlock::RwLock;

use crate::{Allocator, HeapAllocator};

/// A default allocator that can be shared across threads.
pub type SharedAllocator = &'static (dyn Allocator + Sync);

static HEAP: HeapAllocator = HeapAllocator::new();
static DEFAULT: RwLock<SharedAllocator> = RwLock::new(&HEAP);

/// Returns the current default allocator.
#[must_use]
pub fn default_allocator() -> SharedAllocator {
    *DEFAULT.read()
}

/// Makes `allocator` the default and returns the previous default.
pub fn set_default_allocator(allocator: SharedAllocator) -> SharedAllocator {
    let previous = core::mem::replace(&mut *DEFAULT.write(), allocator);
    tracing::debug!(
        previous = previous.name(),
        current = allocator.name(),
        "default allocator replaced"
    );
    previous
}

/// Restores the built-in heap allocator as the default and returns the
/// previous default.
pub fn reset_default_allocator() -> SharedAllocator {
    set_default_allocator(&HEAP)
}

/// An allocator handle bound to the default allocator at construction time.
///
/// Changing the default afterwards does not affect existing handles: blocks
/// are always released to the allocator that produced them.
///
/// Two handles compare equal when they captured the same allocator object
/// of the same type. Handles over two distinct `static` heap allocators
/// compare unequal even though either could release the other's blocks;
/// containers then copy elements instead of exchanging nodes.
///
/// # Examples
///
/// ```
/// # use allocator::{Allocator, DefaultAllocatorRef, allocate_memory};
/// let allocator = DefaultAllocatorRef::new();
/// let ptr = allocate_memory(&allocator, 64, 8, 0).unwrap();
/// unsafe { allocator.deallocate(ptr, 64) };
/// assert_eq!(allocator, DefaultAllocatorRef::new());
/// ```
#[derive(Clone, Copy)]
pub struct DefaultAllocatorRef {
    allocator: SharedAllocator,
}

impl DefaultAllocatorRef {
    /// Captures the current default allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(default_allocator())
    }

    #[must_use]
    pub const fn with_allocator(allocator: SharedAllocator) -> Self {
        Self { allocator }
    }

    #[must_use]
    pub fn get(&self) -> SharedAllocator {
        self.allocator
    }
}

impl Default for DefaultAllocatorRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultAllocatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAllocatorRef")
            .field("name", &self.allocator.name())
            .finish_non_exhaustive()
    }
}

impl PartialEq for DefaultAllocatorRef {
    fn eq(&self, other: &Self) -> bool {
        // Zero-sized allocators may share an address, so the vtable must
        // match as well.
        core::ptr::eq(self.allocator, other.allocator)
    }
}

impl Eq for DefaultAllocatorRef {}

impl Allocator for DefaultAllocatorRef {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocator.allocate(size)
    }

    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        self.allocator.allocate_aligned(size, alignment, offset)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { self.allocator.deallocate(ptr, size) }
    }

    fn name(&self) -> &'static str {
        self.allocator.name()
    }

    fn set_name(&mut self, _name: &'static str) {}

    fn min_alignment(&self) -> usize {
        self.allocator.min_alignment()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{NullAllocator, allocate_memory};

    /// Serialises tests that replace the process-wide default.
    static DEFAULT_LOCK: Mutex<()> = Mutex::new(());

    static NULL: NullAllocator = NullAllocator::new();
    #[cfg(feature = "names")]
    static NAMED_HEAP: HeapAllocator = HeapAllocator::with_name("named");

    #[test]
    fn test_initial_default_is_heap() {
        let _guard = DEFAULT_LOCK.lock().unwrap();
        let allocator = default_allocator();
        let ptr = allocate_memory(allocator, 32, 8, 0).unwrap();
        unsafe { allocator.deallocate(ptr, 32) };
        assert!(core::ptr::addr_eq(allocator, &HEAP));
    }

    #[test]
    fn test_replace_and_reset() {
        let _guard = DEFAULT_LOCK.lock().unwrap();
        let previous = set_default_allocator(&NULL);
        assert!(core::ptr::addr_eq(previous, &HEAP));
        assert!(allocate_memory(default_allocator(), 8, 8, 0).is_none());

        let replaced = reset_default_allocator();
        assert!(core::ptr::addr_eq(replaced, &NULL));
        assert!(core::ptr::addr_eq(default_allocator(), &HEAP));
    }

    #[test]
    fn test_handle_keeps_captured_allocator() {
        let _guard = DEFAULT_LOCK.lock().unwrap();
        let before = DefaultAllocatorRef::new();
        set_default_allocator(&NULL);
        let after = DefaultAllocatorRef::new();
        reset_default_allocator();

        assert_ne!(before, after);
        assert!(allocate_memory(&after, 8, 8, 0).is_none());
        let ptr = allocate_memory(&before, 8, 8, 0).unwrap();
        unsafe { before.deallocate(ptr, 8) };
    }

    /// A zero-sized allocator distinct from [`NullAllocator`].
    struct ZeroSizedHeap;

    impl Allocator for ZeroSizedHeap {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            HeapAllocator::new().allocate(size)
        }

        fn allocate_aligned(
            &self,
            size: usize,
            alignment: usize,
            offset: usize,
        ) -> Option<NonNull<u8>> {
            HeapAllocator::new().allocate_aligned(size, alignment, offset)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
            unsafe { HeapAllocator::new().deallocate(ptr, size) }
        }

        fn name(&self) -> &'static str {
            "zero-sized-heap"
        }

        fn set_name(&mut self, _name: &'static str) {}
    }

    static ZERO_SIZED_HEAP: ZeroSizedHeap = ZeroSizedHeap;

    #[test]
    fn test_distinct_zero_sized_allocators_are_unequal() {
        let null = DefaultAllocatorRef::with_allocator(&NULL);
        let heap = DefaultAllocatorRef::with_allocator(&ZERO_SIZED_HEAP);
        assert_ne!(null, heap);
        assert_ne!(
            DefaultAllocatorRef::with_allocator(&NullAllocator),
            DefaultAllocatorRef::with_allocator(&ZeroSizedHeap)
        );
        assert_eq!(null, DefaultAllocatorRef::with_allocator(&NULL));
    }

    #[cfg(feature = "names")]
    #[test]
    fn test_handle_reports_captured_name() {
        let handle = DefaultAllocatorRef::with_allocator(&NAMED_HEAP);
        assert_eq!(handle.name(), "named");
        assert_eq!(handle, DefaultAllocatorRef::with_allocator(&NAMED_HEAP));
    }
}
