use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

pub mod hashtable;

/// Thread-safe handle to a value guarded by a single exclusive latch. Clones
/// share the same underlying value, so a handle can be moved into each worker
/// thread.
///
/// Structures built on this expose their public operations on the
/// `Synchronized<...Internal>` alias. Each operation takes the latch once and
/// works on the guarded `...Internal` value, whose own methods never latch.
pub struct Synchronized<T> {
    inner: Arc<Mutex<T>>,
}

pub trait Latch<T> {
    /// Acquires the latch. It is released when the guard drops, including on
    /// early returns and error paths.
    fn lock(&self) -> MutexGuard<'_, T>;
}

impl<T> Synchronized<T> {
    pub fn init(value: T) -> Self {
        Synchronized {
            inner: Arc::new(Mutex::new(value)),
        }
    }
}

impl<T> Latch<T> for Synchronized<T> {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

impl<T> Clone for Synchronized<T> {
    fn clone(&self) -> Self {
        Synchronized {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use rayon::ThreadPoolBuilder;

    use super::*;

    #[test]
    fn clones_share_state() {
        let counter = Synchronized::init(0usize);
        let other = counter.clone();
        *other.lock() += 5;
        assert_eq!(*counter.lock(), 5);
    }

    #[test]
    fn concurrent_increments() {
        let pool = ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        let counter = Synchronized::init(0usize);

        pool.scope(|s| {
            for _ in 0..1000 {
                let counter = counter.clone();
                s.spawn(move |_| {
                    *counter.lock() += 1;
                });
            }
        });

        assert_eq!(*counter.lock(), 1000);
    }
}
