//! Platform aligned allocation primitive.
//!
//! This is the only module that talks to the platform allocator. Everything
//! above it (most importantly [`HeapAllocator`](crate::HeapAllocator)) sees a
//! pair of functions that hand out and take back blocks aligned to an
//! arbitrary power of two.

use core::ptr::NonNull;

/// Allocates `size` bytes aligned to `alignment`.
///
/// The alignment is raised to at least the size of a pointer, which is the
/// smallest value every platform primitive accepts. A zero `size` is treated
/// as one byte so each successful call returns a distinct address.
///
/// Returns `None` if the platform allocator is exhausted.
///
/// # Panics
///
/// Panics if `alignment` is not a power of two.
#[must_use]
pub fn allocate(size: usize, alignment: usize) -> Option<NonNull<u8>> {
    assert!(
        alignment.is_power_of_two(),
        "alignment must be a power of two"
    );
    let alignment = alignment.max(size_of::<*mut u8>());
    let size = size.max(1);
    let ptr = unsafe { imp::allocate(size, alignment) };
    NonNull::new(ptr)
}

/// Releases a block obtained from [`allocate`].
///
/// # Safety
///
/// The caller must ensure that:
///
/// - `ptr` was returned by [`allocate`] and has not been released yet
/// - The block is not accessed after this call
pub unsafe fn deallocate(ptr: NonNull<u8>) {
    unsafe { imp::deallocate(ptr.as_ptr()) }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod imp {
            use core::{ffi::c_void, ptr};

            pub(super) unsafe fn allocate(size: usize, alignment: usize) -> *mut u8 {
                let mut out: *mut c_void = ptr::null_mut();
                let res = unsafe { libc::posix_memalign(&raw mut out, alignment, size) };
                if res != 0 {
                    return ptr::null_mut();
                }
                out.cast()
            }

            pub(super) unsafe fn deallocate(ptr: *mut u8) {
                unsafe { libc::free(ptr.cast()) }
            }
        }
    } else if #[cfg(windows)] {
        mod imp {
            pub(super) unsafe fn allocate(size: usize, alignment: usize) -> *mut u8 {
                unsafe { libc::aligned_malloc(size, alignment).cast() }
            }

            pub(super) unsafe fn deallocate(ptr: *mut u8) {
                unsafe { libc::aligned_free(ptr.cast()) }
            }
        }
    } else {
        compile_error!("no aligned allocation primitive for this platform");
    }
}
