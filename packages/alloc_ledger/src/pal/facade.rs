use std::fmt::Debug;
use std::ptr::NonNull;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockBindings;
use crate::pal::{Bindings, BuildTargetBindings};

#[derive(Clone)]
pub(crate) enum BindingsFacade {
    Real(&'static BuildTargetBindings),

    #[cfg(test)]
    Mock(Arc<MockBindings>),
}

impl BindingsFacade {
    pub(crate) const fn real() -> Self {
        Self::Real(&BuildTargetBindings)
    }
}

impl Bindings for BindingsFacade {
    fn reserve_zeroed(&self, len: usize) -> Option<NonNull<u8>> {
        match self {
            Self::Real(bindings) => bindings.reserve_zeroed(len),
            #[cfg(test)]
            Self::Mock(bindings) => bindings.reserve_zeroed(len),
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, len: usize) {
        match self {
            // SAFETY: Forwarding the caller's guarantees.
            Self::Real(bindings) => unsafe { bindings.release(ptr, len) },
            #[cfg(test)]
            // SAFETY: Forwarding the caller's guarantees.
            Self::Mock(bindings) => unsafe { bindings.release(ptr, len) },
        }
    }
}

impl From<&'static BuildTargetBindings> for BindingsFacade {
    fn from(bindings: &'static BuildTargetBindings) -> Self {
        Self::Real(bindings)
    }
}

#[cfg(test)]
impl From<MockBindings> for BindingsFacade {
    fn from(bindings: MockBindings) -> Self {
        Self::Mock(Arc::new(bindings))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for BindingsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(bindings) => bindings.fmt(f),
            #[cfg(test)]
            Self::Mock(bindings) => bindings.fmt(f),
        }
    }
}
