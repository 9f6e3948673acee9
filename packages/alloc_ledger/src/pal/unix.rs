use std::ptr::{self, NonNull};

use crate::pal::Bindings;

/// FFI bindings that target the real operating system that the build is targeting.
///
/// You would only use different bindings in PAL unit tests that need to use mock bindings.
/// Even then, whenever possible, unit tests should use real bindings for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetBindings;

impl Bindings for BuildTargetBindings {
    fn reserve_zeroed(&self, len: usize) -> Option<NonNull<u8>> {
        // SAFETY: Anonymous private mapping without an address hint. No other safety requirements.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return None;
        }

        // Anonymous mappings are zero-filled by the kernel.
        NonNull::new(ptr.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: The caller guarantees this is exactly one mapping created by `reserve_zeroed()`.
        let result = unsafe { libc::munmap(ptr.as_ptr().cast(), len) };

        debug_assert!(result == 0, "munmap() rejected a mapping that we created");
    }
}
