//! Compile-time configuration shared by every allocator in the crate.

use core::{
    fmt,
    mem::MaybeUninit,
    ops::{Deref, DerefMut},
};

/// Minimum alignment guaranteed by the plain `allocate(size)` path of the
/// built-in heap allocator.
///
/// [`allocate_memory`](crate::allocate_memory) relies on this value to decide
/// whether a request can be routed to the plain path. An allocator whose plain
/// path returns less-aligned memory trips the dispatcher's debug assertion.
pub const MIN_ALIGNMENT: usize = 2 * size_of::<usize>();

/// Name given to allocators created without an explicit one.
pub const DEFAULT_NAME: &str = "default";

const _: () = assert!(MIN_ALIGNMENT.is_power_of_two());

/// Inline backing storage for a fixed pool.
///
/// The buffer is aligned to 16 bytes (at least [`MIN_ALIGNMENT`] on every
/// supported target), so a pool laid over it loses no space to alignment for
/// nodes aligned to 16 bytes or less.
///
/// # Examples
///
/// ```
/// # use core::alloc::Layout;
/// # use allocator::{FixedPool, PoolBuffer};
/// let mut buffer = PoolBuffer::<{ 24 * 8 }>::new();
/// let pool = FixedPool::with_buffer(&mut buffer, Layout::from_size_align(24, 8).unwrap())
///     .unwrap();
/// assert_eq!(pool.capacity(), 8);
/// ```
#[repr(C, align(16))]
pub struct PoolBuffer<const SIZE: usize> {
    bytes: [MaybeUninit<u8>; SIZE],
}

const _: () = assert!(align_of::<PoolBuffer<0>>() >= MIN_ALIGNMENT);

impl<const SIZE: usize> PoolBuffer<SIZE> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [MaybeUninit::uninit(); SIZE],
        }
    }
}

impl<const SIZE: usize> Default for PoolBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> Deref for PoolBuffer<SIZE> {
    type Target = [MaybeUninit<u8>];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl<const SIZE: usize> DerefMut for PoolBuffer<SIZE> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}

impl<const SIZE: usize> fmt::Debug for PoolBuffer<SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuffer")
            .field("addr", &self.bytes.as_ptr())
            .field("size", &SIZE)
            .finish()
    }
}
