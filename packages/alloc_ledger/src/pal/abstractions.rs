use std::fmt::Debug;
use std::ptr::NonNull;

/// Bindings for the operating system facilities that hand out memory without going
/// through the process-wide allocator.
///
/// All PAL FFI calls must go through this trait, enabling them to be mocked.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Bindings: Debug + Send + Sync + 'static {
    /// Reserves and commits `len` bytes of zero-filled memory aligned to at least a page.
    ///
    /// Returns `None` if the operating system refuses the request. Must not allocate
    /// through the global allocator, as that may be the allocator being instrumented.
    fn reserve_zeroed(&self, len: usize) -> Option<NonNull<u8>>;

    /// Returns a region obtained from `reserve_zeroed()` to the operating system.
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must describe exactly one region previously returned by
    /// `reserve_zeroed()` on the same bindings, and the region must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, len: usize);
}
