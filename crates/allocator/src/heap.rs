//! The default heap allocator.
//!
//! [`HeapAllocator`] is a stateless wrapper around the platform aligned
//! allocation primitive in [`raw`](crate::raw). Apart from a debug name it
//! carries no state, so every instance can release blocks allocated by every
//! other instance and all instances compare equal.
//!
//! # Block Layout
//!
//! Each block is preceded by a one-word prefix holding the address of the raw
//! platform block it was carved from:
//!
//! ```text
//! raw block (aligned to max(alignment, word size))
//! ┌─────────────┬────────────────┬─────────────────────────────┐
//! │ padding     │ raw address    │ user data (`size` bytes)    │
//! └─────────────┴────────────────┴─────────────────────────────┘
//!                                ▲
//!                                └── returned pointer `p`, with
//!                                    (p - offset) % alignment == 0
//! ```
//!
//! The prefix lets [`allocate_aligned`](crate::Allocator::allocate_aligned)
//! honour any alignment offset, not only offsets that happen to be multiples
//! of the alignment, while [`deallocate`](crate::Allocator::deallocate) can
//! always recover the raw block without knowing how it was requested.

use core::{fmt, ptr::NonNull};

use crate::{Allocator, MIN_ALIGNMENT, config::DEFAULT_NAME, raw};

const PREFIX_SIZE: usize = size_of::<*mut u8>();

/// The default allocator of the containers.
///
/// # Examples
///
/// ```
/// # use allocator::{Allocator, HeapAllocator};
/// let heap = HeapAllocator::with_name("scratch");
/// let ptr = heap.allocate_aligned(100, 64, 0).unwrap();
/// assert_eq!(ptr.addr().get() % 64, 0);
/// unsafe { heap.deallocate(ptr, 100) };
/// assert_eq!(heap, HeapAllocator::new());
/// ```
#[derive(Clone, Copy)]
pub struct HeapAllocator {
    #[cfg(feature = "names")]
    name: &'static str,
}

impl HeapAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_name(DEFAULT_NAME)
    }

    #[cfg_attr(not(feature = "names"), expect(unused_variables))]
    #[must_use]
    pub const fn with_name(name: &'static str) -> Self {
        Self {
            #[cfg(feature = "names")]
            name,
        }
    }

    /// Number of bytes to place before the user pointer so that the pointer
    /// satisfies `(p - offset) % alignment == 0` and the prefix fits.
    ///
    /// The raw block is aligned to at least `alignment`, so only the
    /// residue of `offset` matters.
    const fn padding(alignment: usize, offset: usize) -> usize {
        PREFIX_SIZE + (offset.wrapping_sub(PREFIX_SIZE) & (alignment - 1))
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeapAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapAllocator")
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for HeapAllocator {
    fn eq(&self, _other: &Self) -> bool {
        // All instances share the single platform heap.
        true
    }
}

impl Eq for HeapAllocator {}

impl Allocator for HeapAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_aligned(size, MIN_ALIGNMENT, 0)
    }

    fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        offset: usize,
    ) -> Option<NonNull<u8>> {
        debug_assert!(alignment.is_power_of_two());
        let padding = Self::padding(alignment, offset);
        let raw_size = padding.checked_add(size)?;
        let raw_block = raw::allocate(raw_size, alignment)?;

        unsafe {
            let ptr = raw_block.add(padding);
            ptr.sub(PREFIX_SIZE)
                .cast::<*mut u8>()
                .write_unaligned(raw_block.as_ptr());
            Some(ptr)
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _size: usize) {
        unsafe {
            let raw_block = ptr.sub(PREFIX_SIZE).cast::<*mut u8>().read_unaligned();
            debug_assert!(!raw_block.is_null(), "corrupted heap block prefix");
            raw::deallocate(NonNull::new_unchecked(raw_block));
        }
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
}
