use std::ptr::NonNull;

use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE, VirtualAlloc, VirtualFree,
};

use crate::pal::Bindings;

/// FFI bindings that target the real operating system that the build is targeting.
///
/// You would only use different bindings in PAL unit tests that need to use mock bindings.
/// Even then, whenever possible, unit tests should use real bindings for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetBindings;

impl Bindings for BuildTargetBindings {
    fn reserve_zeroed(&self, len: usize) -> Option<NonNull<u8>> {
        // SAFETY: No address hint, no other safety requirements. Committed pages are zero-filled.
        let ptr = unsafe { VirtualAlloc(None, len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };

        NonNull::new(ptr.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _len: usize) {
        // SAFETY: The caller guarantees this is exactly one region created by `reserve_zeroed()`.
        // MEM_RELEASE requires a size of zero and releases the entire reservation.
        let result = unsafe { VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE) };

        debug_assert!(
            result.is_ok(),
            "VirtualFree() rejected a region that we created"
        );
    }
}
