use std::hint::spin_loop;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// After this many doubling rounds of busy-waiting we start yielding the time slice instead.
const MAX_BACKOFF_STEP: u32 = 6;

/// A test-and-test-and-set lock that never allocates and never parks.
///
/// Only the cold paths (reporting, iteration, reset) take this lock. Holders are short-lived,
/// so waiters spin with exponential backoff and then fall back to yielding, which keeps the
/// lock usable from inside an allocator hook where parking primitives may allocate.
#[derive(Debug)]
pub(crate) struct Spinlock {
    locked: AtomicBool,
}

impl Spinlock {
    pub(crate) const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> SpinlockGuard<'_> {
        if !self.try_acquire() {
            self.lock_contended();
        }

        SpinlockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    #[cfg(test)]
    pub(crate) fn try_lock(&self) -> Option<SpinlockGuard<'_>> {
        self.try_acquire().then_some(SpinlockGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        // Test before we test-and-set, so waiters do not bounce the cache line around.
        !self.locked.load(Ordering::Relaxed)
            && self
                .locked
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    #[cold]
    fn lock_contended(&self) {
        let mut step = 0;

        loop {
            while self.locked.load(Ordering::Relaxed) {
                if step < MAX_BACKOFF_STEP {
                    for _ in 0..(1_u32 << step) {
                        spin_loop();
                    }

                    step = step.wrapping_add(1);
                } else {
                    thread::yield_now();
                }
            }

            if self.try_acquire() {
                return;
            }
        }
    }

    #[inline]
    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Releases the [`Spinlock`] when dropped.
#[derive(Debug)]
pub(crate) struct SpinlockGuard<'a> {
    lock: &'a Spinlock,

    // The lock must be released on the thread that acquired it.
    _not_send: PhantomData<*const ()>,
}

impl Drop for SpinlockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::UnsafeCell;
    use std::sync::Arc;

    use super::*;

    static_assertions::assert_impl_all!(Spinlock: Send, Sync);
    static_assertions::assert_not_impl_any!(SpinlockGuard<'static>: Send);

    #[test]
    fn try_lock_fails_while_held() {
        let lock = Spinlock::new();

        let guard = lock.lock();
        assert!(lock.try_lock().is_none());

        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn lock_provides_mutual_exclusion() {
        const THREADS: usize = 4;
        const ITERATIONS: usize = 10_000;

        struct Shared {
            lock: Spinlock,
            value: UnsafeCell<usize>,
        }

        // SAFETY: `value` is only accessed while `lock` is held.
        unsafe impl Sync for Shared {}

        let shared = Arc::new(Shared {
            lock: Spinlock::new(),
            value: UnsafeCell::new(0),
        });

        thread::scope(|s| {
            for _ in 0..THREADS {
                let shared = Arc::clone(&shared);

                s.spawn(move || {
                    for _ in 0..ITERATIONS {
                        let _guard = shared.lock.lock();

                        // SAFETY: We hold the lock.
                        unsafe {
                            *shared.value.get() += 1;
                        }
                    }
                });
            }
        });

        let _guard = shared.lock.lock();

        // SAFETY: We hold the lock and all other threads have exited.
        let value = unsafe { *shared.value.get() };
        assert_eq!(value, THREADS * ITERATIONS);
    }
}
