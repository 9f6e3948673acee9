use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

use crate::pal::Bindings;

const REGION_ALIGNMENT: usize = 4096;

/// We use this under Miri (and on targets without a dedicated PAL) because Miri cannot talk
/// to a real OS. The `System` allocator bypasses any `#[global_allocator]`, so this still
/// cannot recurse into an instrumented allocator.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetBindings;

impl Bindings for BuildTargetBindings {
    fn reserve_zeroed(&self, len: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(len, REGION_ALIGNMENT).ok()?;

        if layout.size() == 0 {
            return None;
        }

        // SAFETY: Layout has a nonzero size, verified above.
        NonNull::new(unsafe { System.alloc_zeroed(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, len: usize) {
        // The layout was valid when the region was reserved, so it is still valid now.
        let Ok(layout) = Layout::from_size_align(len, REGION_ALIGNMENT) else {
            return;
        };

        // SAFETY: The caller guarantees this region came from `reserve_zeroed()` with this length,
        // which allocated it from `System` with this exact layout.
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }
}
