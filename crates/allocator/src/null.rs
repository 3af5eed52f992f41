use core::ptr::NonNull;

use crate::Allocator;

/// An allocator that never allocates.
///
/// Every request fails with `None` and deallocation does nothing. It is useful
/// for checking that code is generic over the allocator it is given, and for
/// containers that must stay empty.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullAllocator;

impl NullAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Allocator for NullAllocator {
    fn allocate(&self, _size: usize) -> Option<NonNull<u8>> {
        None
    }

    fn allocate_aligned(
        &self,
        _size: usize,
        _alignment: usize,
        _offset: usize,
    ) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _size: usize) {}

    fn name(&self) -> &'static str {
        ""
    }

    fn set_name(&mut self, _name: &'static str) {}
}
